//! One-shot publishing outside the queue.
//!
//! Unlike the queue, these calls fail loudly: an event that no targeted relay
//! accepted is an error for the caller.

use crate::{
    normalize_relay_url, publish_to_relays, resolve_relays, sign_events, ExecuteError,
    ExecuteResult, PublishDeps, PublishResults, PublishResultsOfEvent, RelayCapability,
};
use futures_util::future::join_all;
use nostr_event_model::{Event, UnsignedEvent};
use std::time::Duration;
use tracing::{info, warn};

/// Events to sign and publish together, e.g. drafts merged at sign-in.
#[derive(Debug, Clone, Default)]
pub struct PublishPlan {
    events: Vec<UnsignedEvent>,
}

impl PublishPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(mut self, event: UnsignedEvent) -> Self {
        self.events.push(event);
        self
    }

    pub fn push(&mut self, event: UnsignedEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[UnsignedEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl FromIterator<UnsignedEvent> for PublishPlan {
    fn from_iter<I: IntoIterator<Item = UnsignedEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

/// Sign every event of `plan` and publish each to its resolved relays.
///
/// Returns an empty result when no user is signed in. Fails with
/// [`ExecuteError::NoRelays`] before publishing anything if some event has no
/// relay, and with [`ExecuteError::AllRelaysFailed`] if some event was
/// accepted by none of its relays.
pub async fn execute(
    plan: PublishPlan,
    deps: &PublishDeps,
    timeout: Duration,
) -> ExecuteResult<PublishResults> {
    let signed = sign_events(&plan.events, deps.user.as_ref()).await?;
    if signed.is_empty() {
        return Ok(PublishResults::new());
    }

    let mut targets: Vec<(Event, Vec<String>)> = Vec::with_capacity(signed.len());
    for (event, unsigned) in signed.into_iter().zip(&plan.events) {
        let urls = resolve_relays(unsigned.write_relay_conf.as_ref(), &deps.relays);
        if urls.is_empty() {
            return Err(ExecuteError::NoRelays);
        }
        targets.push((event, urls));
    }

    let relay = deps.relay.as_ref();
    let attempts = targets.into_iter().map(|(event, urls)| async move {
        let results = publish_to_relays(relay, &event, &urls, timeout).await;
        PublishResultsOfEvent { event, results }
    });
    collect_results(join_all(attempts).await)
}

/// Re-send already signed events to one relay.
pub async fn republish_events(
    events: &[Event],
    url: &str,
    relay: &dyn RelayCapability,
    timeout: Duration,
) -> ExecuteResult<PublishResults> {
    let url = normalize_relay_url(url);
    if url.is_empty() {
        return Err(ExecuteError::NoRelays);
    }
    info!(relay = %url, count = events.len(), "Republishing events");

    let urls = [url];
    let attempts = events.iter().map(|event| {
        let urls = &urls;
        async move {
            let results = publish_to_relays(relay, event, urls, timeout).await;
            PublishResultsOfEvent {
                event: event.clone(),
                results,
            }
        }
    });
    collect_results(join_all(attempts).await)
}

fn collect_results(per_event: Vec<PublishResultsOfEvent>) -> ExecuteResult<PublishResults> {
    let mut results = PublishResults::with_capacity(per_event.len());
    let mut first_failure: Option<ExecuteError> = None;
    for event_results in per_event {
        if !event_results.any_fulfilled() && first_failure.is_none() {
            let reason = event_results
                .last_reason()
                .unwrap_or("no relay accepted the event")
                .to_string();
            warn!(event_id = %event_results.event.id, reason = %reason, "Event rejected by all relays");
            first_failure = Some(ExecuteError::AllRelaysFailed {
                event_id: event_results.event.id.clone(),
                reason,
            });
        }
        results.insert(event_results.event.id.clone(), event_results);
    }
    match first_failure {
        Some(err) => Err(err),
        None => Ok(results),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RelayLists, RelayRejection, User};
    use async_trait::async_trait;
    use nostr_event_model::{parse_secret_key, WriteRelayConf, KIND_KNOWLEDGE_NODE};
    use parking_lot::Mutex;
    use std::sync::Arc;

    const SECRET: &str = "d217c1ff2f8a65c3e3a1740db3b9f58b8c848bb45e26d00ed4714e4a0f4ceecf";

    /// Rejects every publish to urls in `rejecting`.
    #[derive(Default)]
    struct MockRelay {
        rejecting: Vec<String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl MockRelay {
        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl RelayCapability for MockRelay {
        async fn publish(&self, url: &str, event: &Event) -> Result<(), RelayRejection> {
            self.calls.lock().push((url.to_string(), event.content.clone()));
            if self.rejecting.iter().any(|r| r == url) {
                Err(RelayRejection::Rejected(format!("blocked: {url}")))
            } else {
                Ok(())
            }
        }
    }

    fn node(d: &str) -> UnsignedEvent {
        UnsignedEvent::new(
            KIND_KNOWLEDGE_NODE,
            "",
            1_700_000_000,
            vec![vec!["d".to_string(), d.to_string()]],
            d,
        )
    }

    fn deps(relay: Arc<MockRelay>, user_relays: &[&str]) -> PublishDeps {
        PublishDeps {
            user: Some(User::local(parse_secret_key(SECRET).unwrap()).unwrap()),
            relays: RelayLists {
                user: user_relays.iter().map(|r| r.to_string()).collect(),
                ..Default::default()
            },
            relay,
        }
    }

    #[tokio::test]
    async fn test_execute_succeeds_with_partial_failure() {
        let relay = Arc::new(MockRelay {
            rejecting: vec!["wss://r2".to_string()],
            ..Default::default()
        });
        let deps = deps(relay.clone(), &["wss://r1", "wss://r2"]);
        let plan: PublishPlan = [node("a"), node("b")].into_iter().collect();

        let results = execute(plan, &deps, Duration::from_secs(1)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(relay.calls().len(), 4);
        for event_results in results.values() {
            assert!(event_results.results["wss://r1"].is_fulfilled());
            assert!(!event_results.results["wss://r2"].is_fulfilled());
        }
    }

    #[tokio::test]
    async fn test_execute_fails_when_every_relay_rejects() {
        let relay = Arc::new(MockRelay {
            rejecting: vec!["wss://r1".to_string()],
            ..Default::default()
        });
        let deps = deps(relay, &["wss://r1"]);

        let err = execute(PublishPlan::new().with_event(node("a")), &deps, Duration::from_secs(1))
            .await
            .unwrap_err();
        match err {
            ExecuteError::AllRelaysFailed { reason, .. } => assert_eq!(reason, "blocked: wss://r1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_execute_without_relays() {
        let relay = Arc::new(MockRelay::default());
        let deps = deps(relay.clone(), &[]);
        let err = execute(PublishPlan::new().with_event(node("a")), &deps, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteError::NoRelays));
        assert_eq!(err.to_string(), "no relays to publish on");
        assert!(relay.calls().is_empty());
    }

    #[tokio::test]
    async fn test_execute_signed_out_is_noop() {
        let relay = Arc::new(MockRelay::default());
        let mut deps = deps(relay.clone(), &["wss://r1"]);
        deps.user = None;
        let results = execute(PublishPlan::new().with_event(node("a")), &deps, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(results.is_empty());
        assert!(relay.calls().is_empty());
    }

    #[tokio::test]
    async fn test_execute_honors_write_relay_conf() {
        let relay = Arc::new(MockRelay::default());
        let deps = deps(relay.clone(), &["wss://r1"]);
        let event = node("a").with_write_relay_conf(WriteRelayConf::only(["wss://special/"]));

        execute(PublishPlan::new().with_event(event), &deps, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(
            relay.calls(),
            vec![("wss://special".to_string(), "a".to_string())]
        );
    }

    #[tokio::test]
    async fn test_republish_to_single_relay() {
        let relay = Arc::new(MockRelay::default());
        let deps = deps(relay.clone(), &["wss://r1"]);
        let signed = sign_events(&[node("a"), node("b")], deps.user.as_ref()).await.unwrap();

        let results = republish_events(&signed, " wss://other/ ", relay.as_ref(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(relay.calls().iter().all(|(url, _)| url == "wss://other"));
    }

    #[tokio::test]
    async fn test_republish_rejected() {
        let relay = Arc::new(MockRelay {
            rejecting: vec!["wss://bad".to_string()],
            ..Default::default()
        });
        let deps = deps(relay.clone(), &[]);
        let signed = sign_events(&[node("a")], deps.user.as_ref()).await.unwrap();

        let err = republish_events(&signed, "wss://bad", relay.as_ref(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteError::AllRelaysFailed { .. }));

        let err = republish_events(&signed, "  ", relay.as_ref(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteError::NoRelays));
    }
}
