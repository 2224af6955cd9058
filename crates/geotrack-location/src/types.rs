use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Geographic coordinate produced by a positioning backend.
///
/// Fields are private so a fix cannot be altered once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// True if both components are finite and inside the WGS84 ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

/// Location permissions as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionState {
    pub fine_location_granted: bool,
    pub coarse_location_granted: bool,
}

impl PermissionState {
    pub const GRANTED: Self = Self {
        fine_location_granted: true,
        coarse_location_granted: true,
    };

    pub const DENIED: Self = Self {
        fine_location_granted: false,
        coarse_location_granted: false,
    };

    pub fn any_granted(&self) -> bool {
        self.fine_location_granted || self.coarse_location_granted
    }
}

/// Synchronous reads of platform location state.
pub trait PlatformStatus {
    fn permission_state(&self) -> PermissionState;

    /// True if at least one provider (satellite or network) is enabled.
    fn provider_available(&self) -> bool;
}

/// A point-in-time copy of the platform location state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlatformSnapshot {
    pub permission: PermissionState,
    pub provider_available: bool,
}

impl PlatformStatus for PlatformSnapshot {
    fn permission_state(&self) -> PermissionState {
        self.permission
    }

    fn provider_available(&self) -> bool {
        self.provider_available
    }
}

/// How the provider check combines with the permission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderPolicy {
    /// A disabled provider fails the request on its own.
    #[default]
    Strict,
    /// A disabled provider fails the request only when no permission is granted either.
    Lenient,
}

/// Accuracy/power trade-off requested from the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    HighAccuracy,
    Balanced,
    LowPower,
    Passive,
}

pub const DEFAULT_UPDATE_INTERVAL_MS: u64 = 1000;
pub const DEFAULT_MIN_UPDATE_INTERVAL_MS: u64 = 500;

/// Parameters of a fresh-position subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    pub priority: Priority,
    pub interval: Duration,
    pub min_update_interval: Duration,
    pub max_updates: u32,
    pub wait_for_accurate: bool,
}

impl UpdateRequest {
    /// A request for exactly one high-accuracy update.
    pub fn single_fix() -> Self {
        Self {
            priority: Priority::HighAccuracy,
            interval: Duration::from_millis(DEFAULT_UPDATE_INTERVAL_MS),
            min_update_interval: Duration::from_millis(DEFAULT_MIN_UPDATE_INTERVAL_MS),
            max_updates: 1,
            wait_for_accurate: false,
        }
    }
}

impl Default for UpdateRequest {
    fn default() -> Self {
        Self::single_fix()
    }
}

/// Why a fetch produced no coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location provider disabled")]
    ProviderDisabled,
    #[error("Location unavailable")]
    Unavailable,
}

/// Positioning backend errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("Platform error: {0}")]
    Platform(String),
    #[error("Request rejected: {0}")]
    Rejected(String),
    #[error("Backend closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_accessors_and_display() {
        let c = Coordinate::new(30.7333, 76.7794);
        assert_eq!(c.latitude(), 30.7333);
        assert_eq!(c.longitude(), 76.7794);
        assert_eq!(c.to_string(), "30.7333, 76.7794");
    }

    #[test]
    fn test_coordinate_validity() {
        assert!(Coordinate::new(51.5, -0.12).is_valid());
        assert!(Coordinate::new(-90.0, 180.0).is_valid());
        assert!(!Coordinate::new(90.5, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, -181.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_permission_any_granted() {
        assert!(PermissionState::GRANTED.any_granted());
        assert!(!PermissionState::DENIED.any_granted());
        let coarse_only = PermissionState {
            fine_location_granted: false,
            coarse_location_granted: true,
        };
        assert!(coarse_only.any_granted());
    }

    #[test]
    fn test_single_fix_request_shape() {
        let request = UpdateRequest::single_fix();
        assert_eq!(request.priority, Priority::HighAccuracy);
        assert_eq!(request.interval, Duration::from_millis(1000));
        assert_eq!(request.min_update_interval, Duration::from_millis(500));
        assert_eq!(request.max_updates, 1);
        assert!(!request.wait_for_accurate);
    }

    #[test]
    fn test_policy_serde_names() {
        let json = serde_json::to_string(&ProviderPolicy::Lenient).unwrap();
        assert_eq!(json, "\"lenient\"");
        let priority: Priority = serde_json::from_str("\"high_accuracy\"").unwrap();
        assert_eq!(priority, Priority::HighAccuracy);
    }
}
