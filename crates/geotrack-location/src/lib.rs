//! Location acquisition for geotrack
//!
//! Fetches the device location with a "cached fix first, one fresh fix
//! second" strategy over a pluggable positioning backend.

pub mod backend;
pub mod fetcher;
#[cfg(target_os = "linux")]
pub mod geoclue;
pub mod simulated;
pub mod types;

pub use backend::{PositioningBackend, Subscription, SubscriptionGuard, SubscriptionId};
pub use fetcher::{check_access, FetchOptions, LocationFetcher};
#[cfg(target_os = "linux")]
pub use geoclue::GeoClueBackend;
pub use simulated::{SimulatedBackend, SimulatedSettings};
pub use types::*;
