//! Positioning backend seam.
//!
//! A backend exposes the platform's cached fix and a way to subscribe to
//! fresh fixes. Subscriptions are registered and removed synchronously so
//! that removal can run from `Drop`; fixes arrive on a tokio channel.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::types::{BackendError, Coordinate, UpdateRequest};

/// Identifies one registered fresh-position subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Allocate a process-unique id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A registered subscription and the channel its fixes arrive on
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub updates: mpsc::Receiver<Coordinate>,
}

impl Subscription {
    /// Create a subscription with a fresh id; returns the sending half for the backend.
    pub fn channel(capacity: usize) -> (Self, mpsc::Sender<Coordinate>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: SubscriptionId::next(),
                updates: rx,
            },
            tx,
        )
    }
}

/// Platform positioning service
pub trait PositioningBackend: Send + Sync {
    /// Last cached fix, if the platform holds one.
    fn last_known_position(
        &self,
    ) -> impl Future<Output = Result<Option<Coordinate>, BackendError>> + Send;

    /// Register for fresh fixes.
    fn request_updates(&self, request: &UpdateRequest) -> Result<Subscription, BackendError>;

    /// Stop delivering fixes for `id`. Unknown ids are ignored.
    fn remove_updates(&self, id: SubscriptionId);
}

/// Removes a subscription from its backend when dropped.
pub struct SubscriptionGuard<'a, B: PositioningBackend> {
    backend: &'a B,
    id: SubscriptionId,
}

impl<'a, B: PositioningBackend> SubscriptionGuard<'a, B> {
    /// Split `subscription` into a guard and its update receiver.
    pub fn new(
        backend: &'a B,
        subscription: Subscription,
    ) -> (Self, mpsc::Receiver<Coordinate>) {
        let Subscription { id, updates } = subscription;
        (Self { backend, id }, updates)
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl<B: PositioningBackend> Drop for SubscriptionGuard<'_, B> {
    fn drop(&mut self) {
        tracing::trace!("Removing location updates for {}", self.id);
        self.backend.remove_updates(self.id);
    }
}
