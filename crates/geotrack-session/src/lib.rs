//! Tracking session for geotrack: persisted tracking flag, screen
//! navigation and the start/stop controller.

pub mod screen;
pub mod session;
pub mod tracking_store;

pub use screen::{render, LocationView, Screen, View, WelcomeView};
pub use session::{SessionEvent, StopHandle, TrackingSession};
pub use tracking_store::{TrackingPrefs, TrackingStore};
