//! Start/stop tracking controller.
//!
//! Owns the screen state and the persisted tracking flag, and drives the
//! location fetcher. Prompting the user is left to the caller: the session
//! reports what is missing through `SessionEvent`.

use std::sync::Arc;

use geotrack_core::{AppError, LocationError};
use geotrack_location::{
    Coordinate, FetchError, LocationFetcher, PlatformStatus, PositioningBackend,
};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::screen::{render, Screen, View};
use crate::tracking_store::TrackingStore;

/// Outcome of a session action
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    /// A fix was obtained and the location screen is showing it.
    Tracking(Coordinate),
    /// Location permission must be granted before tracking can start.
    PermissionRequired,
    /// Location services must be enabled before tracking can start.
    ProviderPromptRequired,
    /// The fetch failed; the welcome screen is showing.
    Failed(LocationError),
    /// The request was abandoned before a fix arrived.
    Cancelled,
    Stopped,
    AlreadyTracking,
}

/// Abandons a session's pending location request from another task.
///
/// Every request runs on a child of the current token; cancelling swaps in a
/// fresh one so later requests start uncancelled.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    pending: Arc<Mutex<CancellationToken>>,
}

impl StopHandle {
    /// Cancel the in-flight request, if any.
    pub fn cancel_pending(&self) {
        let mut pending = self.pending.lock();
        pending.cancel();
        *pending = CancellationToken::new();
    }

    fn request_token(&self) -> CancellationToken {
        self.pending.lock().child_token()
    }
}

pub struct TrackingSession<B> {
    fetcher: LocationFetcher<B>,
    store: TrackingStore,
    screen: Screen,
    display_name: String,
    stop_handle: StopHandle,
}

impl<B: PositioningBackend> TrackingSession<B> {
    pub fn new(
        fetcher: LocationFetcher<B>,
        store: TrackingStore,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            store,
            screen: Screen::Welcome,
            display_name: display_name.into(),
            stop_handle: StopHandle::default(),
        }
    }

    /// Handle for cancelling a pending start or restore from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop_handle.clone()
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn is_tracking(&self) -> bool {
        self.store.is_tracking()
    }

    pub fn view(&self) -> View {
        render(self.screen, self.store.is_tracking(), &self.display_name)
    }

    /// Resume a session that was tracking when the app last ran.
    ///
    /// Returns `None` when the persisted flag is off.
    ///
    /// # Errors
    ///
    /// Storage failures while persisting the flag.
    pub async fn restore<S>(
        &mut self,
        status: &S,
    ) -> Result<Option<SessionEvent>, AppError>
    where
        S: PlatformStatus + Sync + ?Sized,
    {
        if !self.store.is_tracking() {
            return Ok(None);
        }
        tracing::info!("Resuming tracking session");
        self.locate(status).await.map(Some)
    }

    /// Start tracking: fetch a fix, persist the flag, show the location screen.
    ///
    /// The flag is only persisted once a fix is obtained.
    ///
    /// # Errors
    ///
    /// Storage failures while persisting the flag.
    pub async fn start<S>(
        &mut self,
        status: &S,
    ) -> Result<SessionEvent, AppError>
    where
        S: PlatformStatus + Sync + ?Sized,
    {
        if !self.screen.can_start() {
            return Ok(SessionEvent::AlreadyTracking);
        }
        self.locate(status).await
    }

    /// Stop tracking, abandon any pending request, and return to the welcome screen.
    ///
    /// # Errors
    ///
    /// Storage failures while persisting the flag.
    pub fn stop(&mut self) -> Result<SessionEvent, AppError> {
        self.stop_handle.cancel_pending();
        self.store.set_tracking(false)?;
        self.screen = self.screen.on_stop();
        tracing::info!("Tracking stopped");
        Ok(SessionEvent::Stopped)
    }

    /// Start when idle, stop when tracking.
    ///
    /// # Errors
    ///
    /// Storage failures while persisting the flag.
    pub async fn toggle<S>(
        &mut self,
        status: &S,
    ) -> Result<SessionEvent, AppError>
    where
        S: PlatformStatus + Sync + ?Sized,
    {
        if self.store.is_tracking() || !self.screen.can_start() {
            self.stop()
        } else {
            self.start(status).await
        }
    }

    async fn locate<S>(
        &mut self,
        status: &S,
    ) -> Result<SessionEvent, AppError>
    where
        S: PlatformStatus + Sync + ?Sized,
    {
        self.screen = self.screen.on_start();
        let request = self.stop_handle.request_token();

        let result = self
            .fetcher
            .fetch_location_cancellable(
                status.permission_state(),
                status.provider_available(),
                &request,
            )
            .await;

        let coordinate = match result {
            Ok(coordinate) => coordinate,
            Err(e) => {
                self.screen = self.screen.on_failure();
                tracing::info!("Could not start tracking: {}", e);
                return Ok(match e {
                    FetchError::PermissionDenied => SessionEvent::PermissionRequired,
                    FetchError::ProviderDisabled => SessionEvent::ProviderPromptRequired,
                    FetchError::Unavailable if request.is_cancelled() => SessionEvent::Cancelled,
                    FetchError::Unavailable => SessionEvent::Failed(e.into()),
                });
            }
        };

        if let Err(e) = self.store.set_tracking(true) {
            self.screen = self.screen.on_failure();
            return Err(e.into());
        }
        self.screen = self.screen.on_fix(coordinate);
        tracing::info!("Tracking at {}", coordinate);
        Ok(SessionEvent::Tracking(coordinate))
    }
}
