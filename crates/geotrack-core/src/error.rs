//! Centralized error types for geotrack.
//!
//! Every error family carries a `user_message()` suitable for display on
//! either screen; the `Display` text is for logs.

use geotrack_location::FetchError;
use thiserror::Error;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display in the UI.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Location(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Storage(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        AppError::Location(e.into())
    }
}

/// Location acquisition errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location provider disabled")]
    ProviderDisabled,

    #[error("Location unavailable")]
    Unavailable,
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            LocationError::PermissionDenied => {
                "Location permission is required. Grant access and try again."
            }
            LocationError::ProviderDisabled => {
                "Location services are turned off. Enable them and try again."
            }
            LocationError::Unavailable => "Couldn't get your location. Please try again.",
        }
    }
}

impl From<FetchError> for LocationError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::PermissionDenied => LocationError::PermissionDenied,
            FetchError::ProviderDisabled => LocationError::ProviderDisabled,
            FetchError::Unavailable => LocationError::Unavailable,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// Local preference storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("Stored preferences are corrupted: {0}")]
    Corrupt(String),
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::Read { .. } => "Couldn't load saved settings. Using defaults.",
            StorageError::Write { .. } => "Couldn't save your tracking state.",
            StorageError::Corrupt(_) => "Saved settings were unreadable and have been reset.",
        }
    }
}
