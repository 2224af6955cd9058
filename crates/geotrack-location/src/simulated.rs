//! Configurable in-process positioning backend.
//!
//! Serves a fixed cached fix and delivers a fixed fresh fix after a delay.
//! Used on platforms without a native backend and for demos.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::backend::{PositioningBackend, Subscription, SubscriptionId};
use crate::types::{BackendError, Coordinate, PlatformSnapshot, UpdateRequest};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedSettings {
    pub last_known: Option<Coordinate>,
    pub fresh: Option<Coordinate>,
    pub fresh_delay: Duration,
    pub status: PlatformSnapshot,
}

#[derive(Debug)]
pub struct SimulatedBackend {
    settings: SimulatedSettings,
    active: Mutex<HashMap<SubscriptionId, CancellationToken>>,
}

impl SimulatedBackend {
    pub fn new(settings: SimulatedSettings) -> Self {
        Self {
            settings,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Platform state this backend pretends to run under.
    pub fn status(&self) -> PlatformSnapshot {
        self.settings.status
    }

    /// Number of subscriptions not yet removed.
    pub fn active_subscriptions(&self) -> usize {
        self.active.lock().len()
    }
}

impl PositioningBackend for SimulatedBackend {
    async fn last_known_position(&self) -> Result<Option<Coordinate>, BackendError> {
        Ok(self.settings.last_known)
    }

    fn request_updates(&self, request: &UpdateRequest) -> Result<Subscription, BackendError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BackendError::Platform(e.to_string()))?;

        let (subscription, tx) = Subscription::channel(request.max_updates as usize);
        let token = CancellationToken::new();
        self.active.lock().insert(subscription.id, token.clone());

        let fresh = self.settings.fresh;
        let delay = self.settings.fresh_delay.max(request.min_update_interval);
        let id = subscription.id;

        runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::trace!("Simulated updates for {} cancelled", id);
                }
                _ = tokio::time::sleep(delay) => {
                    if let Some(coordinate) = fresh {
                        let _ = tx.send(coordinate).await;
                    }
                    // Keep the stream open until removed, like a live provider.
                    token.cancelled().await;
                }
            }
        });

        Ok(subscription)
    }

    fn remove_updates(&self, id: SubscriptionId) {
        if let Some(token) = self.active.lock().remove(&id) {
            token.cancel();
        }
    }
}
