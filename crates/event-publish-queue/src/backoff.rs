//! Per-relay failure tracking.
//!
//! A relay is tracked only while it is failing. Each failure pushes its next
//! attempt further out, `min(2^failures * base, max)` from now; one success
//! forgets it. No relay is ever excluded for good.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayBackoffState {
    /// Consecutive failures, starting at 1.
    pub failures: u32,
    pub next_retry_after: Instant,
}

#[derive(Debug, Clone)]
pub struct RelayBackoffTracker {
    base: Duration,
    max: Duration,
    relays: HashMap<String, RelayBackoffState>,
}

impl RelayBackoffTracker {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            relays: HashMap::new(),
        }
    }

    /// Untracked, or its cooldown has elapsed.
    pub fn is_available(&self, url: &str, now: Instant) -> bool {
        self.relays
            .get(url)
            .map_or(true, |state| now >= state.next_retry_after)
    }

    pub fn record_outcome(&mut self, url: &str, succeeded: bool, now: Instant) {
        if succeeded {
            if self.relays.remove(url).is_some() {
                info!(relay = %url, "Relay recovered");
            }
            return;
        }

        let failures = self.relays.get(url).map_or(0, |s| s.failures) + 1;
        let cooldown = self.cooldown(failures);
        debug!(relay = %url, failures, cooldown_ms = cooldown.as_millis() as u64, "Relay backing off");
        self.relays.insert(
            url.to_string(),
            RelayBackoffState {
                failures,
                next_retry_after: now + cooldown,
            },
        );
    }

    fn cooldown(&self, failures: u32) -> Duration {
        self.base
            .saturating_mul(2u32.saturating_pow(failures))
            .min(self.max)
    }

    pub fn failures(&self, url: &str) -> u32 {
        self.relays.get(url).map_or(0, |s| s.failures)
    }

    pub fn state(&self, url: &str) -> Option<RelayBackoffState> {
        self.relays.get(url).copied()
    }

    /// End of the soonest cooldown still running, if any.
    pub fn earliest_retry(&self, now: Instant) -> Option<Instant> {
        self.relays
            .values()
            .map(|s| s.next_retry_after)
            .filter(|at| *at > now)
            .min()
    }

    /// Relays still cooling down with their remaining time, soonest first.
    pub fn backed_off(&self, now: Instant) -> Vec<(String, Duration)> {
        let mut relays: Vec<(String, Duration)> = self
            .relays
            .iter()
            .filter(|(_, s)| s.next_retry_after > now)
            .map(|(url, s)| (url.clone(), s.next_retry_after - now))
            .collect();
        relays.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        relays
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> RelayBackoffTracker {
        RelayBackoffTracker::new(Duration::from_secs(1), Duration::from_secs(60))
    }

    #[test]
    fn test_untracked_relay_is_available() {
        let t = tracker();
        assert!(t.is_available("wss://r1", Instant::now()));
        assert_eq!(t.failures("wss://r1"), 0);
        assert_eq!(t.earliest_retry(Instant::now()), None);
    }

    #[test]
    fn test_failures_grow_exponentially_to_cap() {
        let mut t = tracker();
        let now = Instant::now();
        let expected = [2, 4, 8, 16, 32, 60, 60];
        for (i, secs) in expected.iter().enumerate() {
            t.record_outcome("wss://r1", false, now);
            let state = t.state("wss://r1").unwrap();
            assert_eq!(state.failures, i as u32 + 1);
            assert_eq!(state.next_retry_after - now, Duration::from_secs(*secs));
        }
    }

    #[test]
    fn test_cap_holds_for_huge_failure_counts() {
        let t = tracker();
        assert_eq!(t.cooldown(40), Duration::from_secs(60));
    }

    #[test]
    fn test_availability_follows_cooldown() {
        let mut t = tracker();
        let now = Instant::now();
        t.record_outcome("wss://r1", false, now);

        assert!(!t.is_available("wss://r1", now));
        assert!(!t.is_available("wss://r1", now + Duration::from_millis(1999)));
        assert!(t.is_available("wss://r1", now + Duration::from_secs(2)));
        assert!(t.is_available("wss://r2", now));
    }

    #[test]
    fn test_success_clears_state() {
        let mut t = tracker();
        let now = Instant::now();
        t.record_outcome("wss://r1", false, now);
        t.record_outcome("wss://r1", false, now);
        t.record_outcome("wss://r1", true, now);
        assert_eq!(t.failures("wss://r1"), 0);
        assert!(t.state("wss://r1").is_none());
    }

    #[test]
    fn test_earliest_retry_and_backed_off() {
        let mut t = tracker();
        let now = Instant::now();
        t.record_outcome("wss://slow", false, now);
        t.record_outcome("wss://slow", false, now);
        t.record_outcome("wss://fast", false, now);

        assert_eq!(t.earliest_retry(now), Some(now + Duration::from_secs(2)));
        assert_eq!(
            t.backed_off(now),
            vec![
                ("wss://fast".to_string(), Duration::from_secs(2)),
                ("wss://slow".to_string(), Duration::from_secs(4)),
            ]
        );

        let later = now + Duration::from_secs(3);
        assert_eq!(t.earliest_retry(later), Some(now + Duration::from_secs(4)));
        assert_eq!(t.backed_off(later).len(), 1);
        assert_eq!(t.earliest_retry(now + Duration::from_secs(5)), None);
    }
}
