use super::harness::{fast_config, node, settle, wait_until, Behavior, TestHarness, R1, R2};
use crate::BackedOffRelay;
use relay_publish_executor::{relay_tallies, RelayTally};
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn partial_relay_failure_still_delivers() {
    let h = TestHarness::new(fast_config(), &[R1, R2]);
    h.relay.set_default(R2, Behavior::Reject("blocked: not a member"));

    h.queue.enqueue(vec![node("a", "a"), node("b", "b")]);
    wait_until("delivery", || h.result_batches() == 1).await;

    let results = h.results.lock()[0].clone();
    let tallies = relay_tallies(&results);
    assert_eq!(
        tallies[R1],
        RelayTally {
            succeeded: 2,
            total: 2,
            last_reason: None
        }
    );
    assert_eq!(tallies[R2].succeeded, 0);
    assert_eq!(tallies[R2].total, 2);
    assert_eq!(tallies[R2].last_reason.as_deref(), Some("blocked: not a member"));

    assert_eq!(h.queue.get_status().pending_count, 0);
    assert_eq!(h.queue.relay_failures(R1), 0);
    assert_eq!(h.queue.relay_failures(R2), 1);
}

#[tokio::test(start_paused = true)]
async fn success_resets_failure_count() {
    let h = TestHarness::new(fast_config(), &[R1]);
    h.relay.script(R1, [Behavior::Reject("rate-limited")]);

    h.queue.enqueue(vec![node("a", "a")]);
    wait_until("first attempt", || h.relay.call_count() == 1).await;
    wait_until("failure recorded", || h.queue.relay_failures(R1) == 1).await;

    wait_until("retry delivers", || h.result_batches() == 1).await;
    assert_eq!(h.queue.relay_failures(R1), 0);
    assert!(h.queue.get_status().backed_off_relays.is_empty());
}

#[tokio::test(start_paused = true)]
async fn backed_off_event_is_retried_automatically() {
    let h = TestHarness::new(fast_config(), &[R1]);
    h.relay.script(R1, [Behavior::Reject("down for maintenance")]);

    let start = Instant::now();
    h.queue.enqueue(vec![node("a", "a")]);
    wait_until("first failure", || h.queue.relay_failures(R1) == 1).await;

    let status = h.queue.get_status();
    assert_eq!(status.pending_count, 1);
    assert_eq!(
        status.backed_off_relays,
        vec![BackedOffRelay {
            url: R1.to_string(),
            retry_after_secs: 2
        }]
    );

    wait_until("delivery", || h.result_batches() == 1).await;
    assert!(Instant::now() - start >= Duration::from_secs(2));
    assert_eq!(h.relay.contents_for(R1), vec!["a", "a"]);
    assert_eq!(h.queue.get_status().pending_count, 0);
}

#[tokio::test(start_paused = true)]
async fn repeated_failures_back_off_further() {
    let h = TestHarness::new(fast_config(), &[R1]);
    h.relay.script(
        R1,
        [
            Behavior::Reject("no"),
            Behavior::Reject("no"),
            Behavior::Reject("no"),
        ],
    );

    h.queue.enqueue(vec![node("a", "a")]);
    wait_until("delivery", || h.result_batches() == 1).await;

    let starts: Vec<Instant> = h.relay.calls().iter().map(|c| c.started).collect();
    assert_eq!(starts.len(), 4);
    assert!(starts[1] - starts[0] >= Duration::from_secs(2));
    assert!(starts[2] - starts[1] >= Duration::from_secs(4));
    assert!(starts[3] - starts[2] >= Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn timeout_counts_as_failure() {
    let mut config = fast_config();
    config.publish_timeout = Duration::from_millis(50);
    let h = TestHarness::new(config, &[R1]);
    h.relay.script(R1, [Behavior::Hang]);

    h.queue.enqueue(vec![node("a", "a")]);
    wait_until("timeout recorded", || h.queue.relay_failures(R1) == 1).await;
    assert_eq!(h.queue.get_status().pending_count, 1);
    assert_eq!(h.result_batches(), 0);

    wait_until("retry delivers", || h.result_batches() == 1).await;
}

#[tokio::test(start_paused = true)]
async fn backed_off_relay_is_skipped_but_others_used() {
    let h = TestHarness::new(fast_config(), &[R1, R2]);
    h.relay.script(R2, [Behavior::Reject("busy")]);

    h.queue.enqueue(vec![node("a", "a")]);
    wait_until("first delivery", || h.result_batches() == 1).await;
    assert_eq!(h.queue.relay_failures(R2), 1);

    h.queue.enqueue(vec![node("b", "b")]);
    wait_until("second delivery", || h.result_batches() == 2).await;

    assert_eq!(h.relay.contents_for(R1), vec!["a", "b"]);
    assert_eq!(h.relay.contents_for(R2), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn event_without_relays_stays_buffered() {
    let h = TestHarness::new(fast_config(), &[]);

    h.queue.enqueue(vec![node("a", "a")]);
    settle(Duration::from_secs(5)).await;

    assert_eq!(h.relay.call_count(), 0);
    assert_eq!(h.queue.get_status().pending_count, 1);

    h.deps.set_user_relays(&[R1]);
    h.queue.enqueue(vec![node("b", "b")]);
    wait_until("delivery", || h.queue.get_status().pending_count == 0).await;
    assert_eq!(h.relay.contents_for(R1), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn signed_out_flush_keeps_buffer() {
    let h = TestHarness::new(fast_config(), &[R1]);
    h.deps.sign_out();

    h.queue.enqueue(vec![node("a", "a")]);
    settle(Duration::from_secs(5)).await;
    assert_eq!(h.relay.call_count(), 0);
    assert_eq!(h.queue.get_status().pending_count, 1);
    assert!(!h.queue.get_status().flushing);

    h.deps.sign_in();
    h.queue.flush().await;
    assert_eq!(h.relay.contents_for(R1), vec!["a"]);
    assert_eq!(h.queue.get_status().pending_count, 0);
}
