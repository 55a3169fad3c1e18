use crate::{RelayCapability, RelayLists, User};
use std::sync::Arc;

/// Everything a publish needs, read fresh for every attempt.
#[derive(Clone)]
pub struct PublishDeps {
    /// `None` while signed out.
    pub user: Option<User>,
    pub relays: RelayLists,
    pub relay: Arc<dyn RelayCapability>,
}

/// Supplies the current user, relay lists and transport.
///
/// Queues call this on every flush so sign-in and relay list changes take
/// effect without rebuilding the queue.
pub trait PublishDepsProvider: Send + Sync {
    fn publish_deps(&self) -> PublishDeps;
}

impl<F> PublishDepsProvider for F
where
    F: Fn() -> PublishDeps + Send + Sync,
{
    fn publish_deps(&self) -> PublishDeps {
        self()
    }
}
