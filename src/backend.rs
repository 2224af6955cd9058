//! Backend selection from configuration.

use anyhow::Result;
use geotrack_core::{LocationBackendKind, LocationConfig};
#[cfg(target_os = "linux")]
use geotrack_location::GeoClueBackend;
use geotrack_location::{
    BackendError, Coordinate, PlatformSnapshot, PositioningBackend, SimulatedBackend,
    Subscription, SubscriptionId, UpdateRequest,
};

pub enum AppBackend {
    Simulated(SimulatedBackend),
    #[cfg(target_os = "linux")]
    GeoClue(GeoClueBackend),
}

impl AppBackend {
    pub fn from_config(config: &LocationConfig) -> Result<Self> {
        match config.backend {
            LocationBackendKind::Simulated => Ok(Self::Simulated(SimulatedBackend::new(
                config.simulated.settings(),
            ))),
            #[cfg(target_os = "linux")]
            LocationBackendKind::GeoClue => {
                Ok(Self::GeoClue(GeoClueBackend::new(config.desktop_id.clone())))
            }
            #[cfg(not(target_os = "linux"))]
            LocationBackendKind::GeoClue => {
                anyhow::bail!("The GeoClue backend is only available on Linux")
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Simulated(_) => "simulated",
            #[cfg(target_os = "linux")]
            Self::GeoClue(_) => "geoclue",
        }
    }

    /// Current permission and provider state.
    pub async fn status(&self) -> PlatformSnapshot {
        match self {
            Self::Simulated(backend) => backend.status(),
            #[cfg(target_os = "linux")]
            Self::GeoClue(backend) => backend.probe_status().await,
        }
    }
}

impl PositioningBackend for AppBackend {
    async fn last_known_position(&self) -> Result<Option<Coordinate>, BackendError> {
        match self {
            Self::Simulated(backend) => backend.last_known_position().await,
            #[cfg(target_os = "linux")]
            Self::GeoClue(backend) => backend.last_known_position().await,
        }
    }

    fn request_updates(&self, request: &UpdateRequest) -> Result<Subscription, BackendError> {
        match self {
            Self::Simulated(backend) => backend.request_updates(request),
            #[cfg(target_os = "linux")]
            Self::GeoClue(backend) => backend.request_updates(request),
        }
    }

    fn remove_updates(&self, id: SubscriptionId) {
        match self {
            Self::Simulated(backend) => backend.remove_updates(id),
            #[cfg(target_os = "linux")]
            Self::GeoClue(backend) => backend.remove_updates(id),
        }
    }
}
