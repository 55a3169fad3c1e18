//! Publishing one event to many relays.

use crate::RelayRejection;
use async_trait::async_trait;
use futures_util::future::join_all;
use indexmap::IndexMap;
use nostr_event_model::Event;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Deadline for one relay to acknowledge one event.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Transport able to hand an event to a relay.
///
/// Each call settles independently; callers race it against a deadline.
#[async_trait]
pub trait RelayCapability: Send + Sync {
    async fn publish(&self, url: &str, event: &Event) -> Result<(), RelayRejection>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Fulfilled,
    Rejected,
}

/// What one relay did with one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PerRelayOutcome {
    pub status: OutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PerRelayOutcome {
    pub fn fulfilled() -> Self {
        Self {
            status: OutcomeStatus::Fulfilled,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Rejected,
            reason: Some(reason.into()),
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        self.status == OutcomeStatus::Fulfilled
    }
}

/// Per-relay outcomes of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishResultsOfEvent {
    pub event: Event,
    pub results: IndexMap<String, PerRelayOutcome>,
}

impl PublishResultsOfEvent {
    pub fn any_fulfilled(&self) -> bool {
        self.results.values().any(PerRelayOutcome::is_fulfilled)
    }

    /// Reason of the last rejection, if any relay rejected.
    pub fn last_reason(&self) -> Option<&str> {
        self.results
            .values()
            .rev()
            .find_map(|outcome| outcome.reason.as_deref())
    }
}

/// Results keyed by event id.
pub type PublishResults = IndexMap<String, PublishResultsOfEvent>;

/// Success ratio of one relay across a results map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelayTally {
    pub succeeded: usize,
    pub total: usize,
    pub last_reason: Option<String>,
}

/// Tally outcomes per relay, in first-seen relay order.
pub fn relay_tallies(results: &PublishResults) -> IndexMap<String, RelayTally> {
    let mut tallies: IndexMap<String, RelayTally> = IndexMap::new();
    for event_results in results.values() {
        for (url, outcome) in &event_results.results {
            let tally = tallies.entry(url.clone()).or_default();
            tally.total += 1;
            if outcome.is_fulfilled() {
                tally.succeeded += 1;
            } else if let Some(reason) = &outcome.reason {
                tally.last_reason = Some(reason.clone());
            }
        }
    }
    tallies
}

/// Publish `event` to every url, each raced against `timeout`.
///
/// All relays are awaited together; one slow or failing relay never affects
/// another's outcome. An empty url list yields an empty map.
pub async fn publish_to_relays(
    relay: &dyn RelayCapability,
    event: &Event,
    urls: &[String],
    timeout: Duration,
) -> IndexMap<String, PerRelayOutcome> {
    if urls.is_empty() {
        return IndexMap::new();
    }

    let attempts = urls.iter().map(|url| async move {
        let outcome = match tokio::time::timeout(timeout, relay.publish(url, event)).await {
            Ok(Ok(())) => PerRelayOutcome::fulfilled(),
            Ok(Err(rejection)) => PerRelayOutcome::rejected(rejection.to_string()),
            Err(_) => PerRelayOutcome::rejected(RelayRejection::Timeout(timeout).to_string()),
        };
        (url.clone(), outcome)
    });

    let outcomes: IndexMap<String, PerRelayOutcome> = join_all(attempts).await.into_iter().collect();
    for (url, outcome) in &outcomes {
        match &outcome.reason {
            Some(reason) => warn!(event_id = %event.id, relay = %url, reason = %reason, "Relay rejected event"),
            None => debug!(event_id = %event.id, relay = %url, "Relay accepted event"),
        }
    }
    outcomes
}
