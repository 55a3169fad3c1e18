//! The publish queue.
//!
//! All mutable state lives in one [`QueueState`] behind a `parking_lot`
//! mutex. The lock is never held across an `.await`: every flush reads a
//! snapshot under the lock, does its network work unlocked, then applies the
//! outcome under the lock again.
//!
//! Timers are Tokio tasks whose handles sit in the state so they can be
//! aborted on re-arm and on [`PublishQueue::destroy`]. A timer that fires
//! spawns the flush on its own task, so aborting a timer never cancels a
//! flush that is already running.

use crate::outbox_writer::OutboxWriter;
use crate::{BackedOffRelay, QueueConfig, QueueStatus, RelayBackoffTracker};
use futures_util::future::join_all;
use indexmap::{IndexMap, IndexSet};
use nostr_event_model::{logical_key, target_logical_key, Event, LogicalKey, UnsignedEvent};
use parking_lot::Mutex;
use pending_event_outbox::{OutboxEntry, OutboxStore};
use relay_publish_executor::{
    execute, publish_to_relays, resolve_relays, sign_events, PublishDeps, PublishDepsProvider,
    PublishPlan, PublishResults, PublishResultsOfEvent,
};
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Receives the outcomes of delivered events.
///
/// Called once per flush that delivered anything, and once per immediately
/// published delete. Closures taking [`PublishResults`] implement this.
pub trait PublishResultsSink: Send + Sync {
    fn on_results(&self, results: PublishResults);
}

impl<F> PublishResultsSink for F
where
    F: Fn(PublishResults) + Send + Sync,
{
    fn on_results(&self, results: PublishResults) {
        self(results)
    }
}

struct QueueState {
    buffer: IndexMap<LogicalKey, UnsignedEvent>,
    /// Keys of the snapshot the running flush is publishing.
    in_flight: IndexSet<LogicalKey>,
    backoff: RelayBackoffTracker,
    flushing: bool,
    destroyed: bool,
    /// A flush was refused because another one was running.
    flush_requested: bool,
    debounce_timer: Option<JoinHandle<()>>,
    retry_timer: Option<JoinHandle<()>>,
    teardown: Option<JoinHandle<()>>,
}

struct QueueInner {
    config: QueueConfig,
    store: Arc<dyn OutboxStore>,
    outbox: OutboxWriter,
    deps: Arc<dyn PublishDepsProvider>,
    sink: Arc<dyn PublishResultsSink>,
    state: Mutex<QueueState>,
}

/// Buffers, coalesces, and reliably publishes events.
///
/// Cheap to clone; clones share one queue.
#[derive(Clone)]
pub struct PublishQueue {
    inner: Arc<QueueInner>,
}

/// A buffered event with at least one relay it can be attempted on.
struct Candidate {
    key: LogicalKey,
    unsigned: UnsignedEvent,
    urls: Vec<String>,
}

/// One snapshot entry ready to go out.
struct Attempt {
    key: LogicalKey,
    unsigned: UnsignedEvent,
    event: Event,
    urls: Vec<String>,
}

impl PublishQueue {
    /// Create an empty queue. Must be called within a Tokio runtime.
    ///
    /// Nothing is loaded from `store` until [`init`](Self::init).
    pub fn new(
        store: Arc<dyn OutboxStore>,
        config: QueueConfig,
        deps: Arc<dyn PublishDepsProvider>,
        sink: Arc<dyn PublishResultsSink>,
    ) -> Self {
        let backoff = RelayBackoffTracker::new(config.backoff_base, config.backoff_max);
        Self {
            inner: Arc::new(QueueInner {
                config,
                outbox: OutboxWriter::spawn(store.clone()),
                store,
                deps,
                sink,
                state: Mutex::new(QueueState {
                    buffer: IndexMap::new(),
                    in_flight: IndexSet::new(),
                    backoff,
                    flushing: false,
                    destroyed: false,
                    flush_requested: false,
                    debounce_timer: None,
                    retry_timer: None,
                    teardown: None,
                }),
            }),
        }
    }

    /// Buffer events for publishing.
    ///
    /// Each event replaces any buffered event with the same logical key and
    /// is mirrored to the outbox. A delete whose target is still buffered and
    /// not being published cancels that entry without touching the network;
    /// any other delete is published right away.
    pub fn enqueue(&self, events: Vec<UnsignedEvent>) {
        let inner = &self.inner;
        let mut immediate = Vec::new();
        {
            let mut state = inner.state.lock();
            if state.destroyed {
                debug!(count = events.len(), "Queue destroyed, dropping enqueue");
                return;
            }

            let mut buffered_any = false;
            for event in events {
                if event.is_delete() {
                    let target = target_logical_key(&event);
                    let Some(target) = target.filter(|key| state.buffer.contains_key(key)) else {
                        immediate.push(event);
                        continue;
                    };
                    state.buffer.shift_remove(&target);
                    inner.outbox.remove(target.clone());
                    if state.in_flight.contains(&target) {
                        info!(key = %target, "Deleted entry is being published, sending delete");
                        immediate.push(event);
                    } else {
                        info!(key = %target, "Cancelled buffered entry");
                    }
                    continue;
                }

                let key = logical_key(&event);
                debug!(key = %key, kind = event.kind, "Buffering event");
                inner.outbox.put(OutboxEntry::new(key.clone(), event.clone()));
                state.buffer.insert(key, event);
                buffered_any = true;
            }

            if buffered_any {
                inner.arm_debounce(&mut state);
            }
        }

        for delete in immediate {
            inner.publish_immediately(delete);
        }
    }

    pub fn get_status(&self) -> QueueStatus {
        let state = self.inner.state.lock();
        let now = Instant::now();
        QueueStatus {
            pending_count: state.buffer.len(),
            flushing: state.flushing,
            backed_off_relays: state
                .backoff
                .backed_off(now)
                .into_iter()
                .map(|(url, remaining)| BackedOffRelay {
                    url,
                    retry_after_secs: remaining.as_secs_f64().ceil() as u64,
                })
                .collect(),
        }
    }

    /// Failure count of one relay, 0 when healthy.
    pub fn relay_failures(&self, url: &str) -> u32 {
        self.inner.state.lock().backoff.failures(url)
    }

    /// Keys currently buffered, in publish order.
    pub fn pending_keys(&self) -> Vec<LogicalKey> {
        self.inner.state.lock().buffer.keys().cloned().collect()
    }

    /// Replay the outbox, then persist the buffer on Ctrl-C or SIGTERM.
    ///
    /// Tokio's signal listeners replace the default handlers, so the process
    /// keeps running after the signal; applications end it themselves, or
    /// pass their own trigger to [`init_with_teardown`](Self::init_with_teardown).
    pub async fn init(&self) {
        self.init_with_teardown(shutdown_signal()).await;
    }

    /// Replay the outbox, then persist the buffer once `teardown` completes.
    ///
    /// Replayed entries never overwrite events already buffered. Load errors
    /// are logged and the queue carries on in memory.
    pub async fn init_with_teardown<F>(&self, teardown: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let inner = &self.inner;
        match inner.store.get_pending_events().await {
            Ok(entries) => {
                let mut state = inner.state.lock();
                if state.destroyed {
                    return;
                }
                let mut restored = 0usize;
                for entry in entries {
                    if !state.buffer.contains_key(&entry.key) {
                        state.buffer.insert(entry.key, entry.event);
                        restored += 1;
                    }
                }
                info!(restored, pending = state.buffer.len(), "Replayed outbox");
                if !state.buffer.is_empty() {
                    inner.arm_debounce(&mut state);
                }
            }
            Err(e) => warn!(error = %e, "Failed to load outbox, continuing in memory"),
        }

        let weak = Arc::downgrade(inner);
        let hook = tokio::spawn(async move {
            teardown.await;
            if let Some(inner) = weak.upgrade() {
                info!("Shutting down, persisting publish buffer");
                inner.persist_buffer().await;
            }
        });

        let mut state = inner.state.lock();
        if state.destroyed {
            hook.abort();
        } else if let Some(previous) = state.teardown.replace(hook) {
            previous.abort();
        }
    }

    /// Stop all timers and ignore further work. Idempotent.
    ///
    /// A flush already past its snapshot still completes.
    pub fn destroy(&self) {
        let mut state = self.inner.state.lock();
        if state.destroyed {
            return;
        }
        state.destroyed = true;
        for handle in [
            state.debounce_timer.take(),
            state.retry_timer.take(),
            state.teardown.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
        info!(pending = state.buffer.len(), "Publish queue destroyed");
    }

    /// Run one flush cycle now. Refused while another flush runs.
    pub async fn flush(&self) {
        self.inner.flush().await;
    }

    /// Write every buffered event to the outbox and wait for it.
    pub async fn persist_buffer(&self) {
        self.inner.persist_buffer().await;
    }

    /// Wait until outbox writes issued so far have been applied.
    pub async fn sync_outbox(&self) {
        self.inner.outbox.sync().await;
    }
}

impl QueueInner {
    fn arm_debounce(self: &Arc<Self>, state: &mut QueueState) {
        if let Some(timer) = state.debounce_timer.take() {
            timer.abort();
        }
        let weak = Arc::downgrade(self);
        state.debounce_timer = Some(spawn_flush_timer(weak, self.config.debounce));
    }

    async fn persist_buffer(&self) {
        {
            let state = self.state.lock();
            for (key, event) in &state.buffer {
                self.outbox.put(OutboxEntry::new(key.clone(), event.clone()));
            }
            debug!(count = state.buffer.len(), "Persisting publish buffer");
        }
        self.outbox.sync().await;
    }

    fn publish_immediately(self: &Arc<Self>, delete: UnsignedEvent) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let deps = inner.deps.publish_deps();
            let plan = PublishPlan::new().with_event(delete);
            match execute(plan, &deps, inner.config.publish_timeout).await {
                Ok(results) if !results.is_empty() => inner.sink.on_results(results),
                Ok(_) => debug!("Delete not published, no user signed in"),
                Err(e) => warn!(error = %e, "Failed to publish delete"),
            }
        });
    }

    async fn flush(self: &Arc<Self>) {
        let deps = self.deps.publish_deps();
        let snapshot: Vec<Candidate> = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.destroyed || state.buffer.is_empty() {
                return;
            }
            if state.flushing {
                debug!("Flush already running, deferring");
                state.flush_requested = true;
                return;
            }
            let now = Instant::now();
            let limit = self.config.batch_size.unwrap_or(usize::MAX);
            let backoff = &state.backoff;
            let snapshot: Vec<Candidate> = state
                .buffer
                .iter()
                .filter_map(|(key, unsigned)| {
                    let targets = resolve_relays(unsigned.write_relay_conf.as_ref(), &deps.relays);
                    if targets.is_empty() {
                        warn!(key = %key, "No relays to publish on, keeping event buffered");
                        return None;
                    }
                    let urls: Vec<String> = targets
                        .into_iter()
                        .filter(|url| backoff.is_available(url, now))
                        .collect();
                    if urls.is_empty() {
                        debug!(key = %key, "All relays backed off, keeping event buffered");
                        return None;
                    }
                    Some(Candidate {
                        key: key.clone(),
                        unsigned: unsigned.clone(),
                        urls,
                    })
                })
                .take(limit)
                .collect();
            if !snapshot.is_empty() {
                state.flushing = true;
                state.flush_requested = false;
                state.in_flight = snapshot.iter().map(|c| c.key.clone()).collect();
            }
            snapshot
        };

        if snapshot.is_empty() {
            debug!("No buffered event can be attempted");
            self.schedule_retry();
            return;
        }

        debug!(count = snapshot.len(), "Flushing publish buffer");
        let attempted = self.publish_snapshot(snapshot.as_slice(), &deps).await;

        let follow_up = {
            let mut state = self.state.lock();
            state.flushing = false;
            state.in_flight.clear();
            let progressed = attempted.is_some()
                && state
                    .buffer
                    .keys()
                    .any(|key| !snapshot.iter().any(|c| &c.key == key));
            let follow_up = !state.destroyed && (state.flush_requested || progressed);
            state.flush_requested = false;
            follow_up
        };

        if let Some(delivered) = attempted.filter(|d| !d.is_empty()) {
            info!(delivered = delivered.len(), "Flush delivered events");
            self.sink.on_results(delivered);
        }
        self.schedule_retry();
        if follow_up {
            let mut state = self.state.lock();
            if !state.destroyed {
                self.arm_debounce(&mut state);
            }
        }
    }

    /// Sign and publish a snapshot, returning results of delivered events.
    ///
    /// `None` means nothing was attempted because signing produced nothing.
    async fn publish_snapshot(
        &self,
        snapshot: &[Candidate],
        deps: &PublishDeps,
    ) -> Option<PublishResults> {
        let unsigned: Vec<UnsignedEvent> = snapshot.iter().map(|c| c.unsigned.clone()).collect();
        let signed = match sign_events(&unsigned, deps.user.as_ref()).await {
            Ok(signed) => signed,
            Err(e) => {
                warn!(error = %e, "Signing failed, keeping events buffered");
                Vec::new()
            }
        };
        if signed.is_empty() {
            debug!("Nothing signed, aborting flush");
            return None;
        }

        let attempts: Vec<Attempt> = snapshot
            .iter()
            .zip(signed)
            .map(|(candidate, event)| Attempt {
                key: candidate.key.clone(),
                unsigned: candidate.unsigned.clone(),
                event,
                urls: candidate.urls.clone(),
            })
            .collect();

        let relay = deps.relay.as_ref();
        let timeout = self.config.publish_timeout;
        let outcomes = join_all(attempts.into_iter().map(|attempt| async move {
            let results = publish_to_relays(relay, &attempt.event, &attempt.urls, timeout).await;
            (
                attempt.key,
                attempt.unsigned,
                PublishResultsOfEvent {
                    event: attempt.event,
                    results,
                },
            )
        }))
        .await;

        let mut delivered = PublishResults::new();
        let mut state = self.state.lock();
        let now = Instant::now();

        let mut relay_ok: IndexMap<&str, bool> = IndexMap::new();
        for (_, _, event_results) in &outcomes {
            for (url, outcome) in &event_results.results {
                *relay_ok.entry(url.as_str()).or_insert(false) |= outcome.is_fulfilled();
            }
        }
        for (url, ok) in relay_ok {
            state.backoff.record_outcome(url, ok, now);
        }

        for (key, unsigned, event_results) in outcomes {
            if !event_results.any_fulfilled() {
                continue;
            }
            if state.buffer.get(&key) == Some(&unsigned) {
                state.buffer.shift_remove(&key);
                self.outbox.remove(key);
            } else {
                debug!(key = %key, "Entry replaced or cancelled during flush");
            }
            delivered.insert(event_results.event.id.clone(), event_results);
        }
        Some(delivered)
    }

    fn schedule_retry(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if let Some(timer) = state.retry_timer.take() {
            timer.abort();
        }
        if state.destroyed || state.buffer.is_empty() {
            return;
        }
        let now = Instant::now();
        let Some(earliest) = state.backoff.earliest_retry(now) else {
            return;
        };
        let delay = earliest
            .saturating_duration_since(now)
            .max(self.config.retry_floor);
        debug!(delay_ms = delay.as_millis() as u64, "Retry scheduled");
        state.retry_timer = Some(spawn_flush_timer(Arc::downgrade(self), delay));
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Sleep, then start a flush on a separate task.
fn spawn_flush_timer(queue: Weak<QueueInner>, delay: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if let Some(inner) = queue.upgrade() {
            tokio::spawn(async move {
                inner.flush().await;
            });
        }
    })
}
