//! One-shot location acquisition.
//!
//! A fetch checks the caller-supplied permission and provider state, asks
//! the backend for its cached fix and, when there is none, subscribes for a
//! single fresh fix. The subscription is owned by a drop guard so it is
//! removed exactly once however the fetch ends.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::backend::{PositioningBackend, SubscriptionGuard};
use crate::types::{
    Coordinate, FetchError, PermissionState, PlatformStatus, ProviderPolicy, UpdateRequest,
};

/// Fetch behaviour shared by every request made through one fetcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    pub policy: ProviderPolicy,
    pub update_request: UpdateRequest,
    /// Give up on the fresh fix after this long. `None` waits indefinitely.
    pub fresh_fix_timeout: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            policy: ProviderPolicy::Strict,
            update_request: UpdateRequest::single_fix(),
            fresh_fix_timeout: None,
        }
    }
}

/// Check permission and provider state against `policy`.
pub fn check_access(
    policy: ProviderPolicy,
    permission: PermissionState,
    provider_available: bool,
) -> Result<(), FetchError> {
    match policy {
        ProviderPolicy::Strict => {
            if !provider_available {
                return Err(FetchError::ProviderDisabled);
            }
            if !permission.any_granted() {
                return Err(FetchError::PermissionDenied);
            }
        }
        ProviderPolicy::Lenient => {
            if !permission.any_granted() {
                return Err(if provider_available {
                    FetchError::PermissionDenied
                } else {
                    FetchError::ProviderDisabled
                });
            }
        }
    }
    Ok(())
}

/// Produces at most one coordinate per request.
///
/// Holds no per-request state; concurrent fetches each own their own
/// subscription.
pub struct LocationFetcher<B> {
    backend: Arc<B>,
    options: FetchOptions,
}

impl<B> Clone for LocationFetcher<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            options: self.options.clone(),
        }
    }
}

impl<B: PositioningBackend> LocationFetcher<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_options(backend, FetchOptions::default())
    }

    /// Create a fetcher; the update request is always capped to a single update.
    pub fn with_options(backend: Arc<B>, mut options: FetchOptions) -> Self {
        options.update_request.max_updates = 1;
        Self { backend, options }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetch the current location.
    ///
    /// # Errors
    ///
    /// `ProviderDisabled` / `PermissionDenied` when the access check fails
    /// (the backend is not touched), `Unavailable` when the backend fails,
    /// the update stream ends, or the fresh-fix timeout expires.
    pub async fn fetch_location(
        &self,
        permission: PermissionState,
        provider_available: bool,
    ) -> Result<Coordinate, FetchError> {
        check_access(self.options.policy, permission, provider_available)?;

        let cached = self.backend.last_known_position().await.map_err(|e| {
            tracing::debug!("Last known position query failed: {}", e);
            FetchError::Unavailable
        })?;

        if let Some(coordinate) = cached {
            tracing::debug!("Using last known position");
            return Ok(coordinate);
        }

        self.fresh_fix().await
    }

    /// Read permission and provider state from `status`, then fetch.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_location`](Self::fetch_location).
    pub async fn fetch_with_status<S>(&self, status: &S) -> Result<Coordinate, FetchError>
    where
        S: PlatformStatus + Sync + ?Sized,
    {
        let permission = status.permission_state();
        let provider_available = status.provider_available();
        self.fetch_location(permission, provider_available).await
    }

    /// Fetch, abandoning the request when `cancel` fires.
    ///
    /// A cancelled request never yields a coordinate, even if one arrived at
    /// the same moment.
    ///
    /// # Errors
    ///
    /// `Unavailable` on cancellation, otherwise as [`fetch_location`](Self::fetch_location).
    pub async fn fetch_location_cancellable(
        &self,
        permission: PermissionState,
        provider_available: bool,
        cancel: &CancellationToken,
    ) -> Result<Coordinate, FetchError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Location request cancelled");
                Err(FetchError::Unavailable)
            }
            result = self.fetch_location(permission, provider_available) => result,
        }
    }

    async fn fresh_fix(&self) -> Result<Coordinate, FetchError> {
        let subscription = self
            .backend
            .request_updates(&self.options.update_request)
            .map_err(|e| {
                tracing::debug!("Failed to request location updates: {}", e);
                FetchError::Unavailable
            })?;

        let (guard, mut updates) = SubscriptionGuard::new(self.backend.as_ref(), subscription);
        tracing::debug!("No cached position, waiting for a fresh fix on {}", guard.id());

        let update = match self.options.fresh_fix_timeout {
            Some(limit) => match tokio::time::timeout(limit, updates.recv()).await {
                Ok(update) => update,
                Err(_) => {
                    tracing::debug!("No fresh fix within {:?}", limit);
                    None
                }
            },
            None => updates.recv().await,
        };

        drop(guard);
        update.ok_or(FetchError::Unavailable)
    }
}
