use crate::error::{AppError, ConfigError};
use geotrack_location::{
    Coordinate, FetchOptions, PermissionState, PlatformSnapshot, Priority, ProviderPolicy,
    SimulatedSettings, UpdateRequest,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "geotrack";
const CONFIG_FILE: &str = "config.toml";
const PREFS_FILE: &str = "prefs.json";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Who is shown on the location screen
    #[serde(default)]
    pub profile: ProfileConfig,

    /// Location acquisition settings
    #[serde(default)]
    pub location: LocationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub display_name: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            display_name: "Guest".to_string(),
        }
    }
}

/// Which positioning backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LocationBackendKind {
    #[default]
    Simulated,
    /// GeoClue2 over the system bus (Linux only)
    GeoClue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default)]
    pub backend: LocationBackendKind,

    /// Whether a disabled provider alone fails a request
    #[serde(default)]
    pub provider_policy: ProviderPolicy,

    #[serde(default)]
    pub priority: Priority,

    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,

    #[serde(default = "default_min_update_interval_ms")]
    pub min_update_interval_ms: u64,

    /// Give up waiting for a fresh fix after this many seconds (unset waits forever)
    #[serde(default)]
    pub fresh_fix_timeout_secs: Option<u64>,

    /// Desktop id reported to GeoClue
    #[serde(default = "default_desktop_id")]
    pub desktop_id: String,

    #[serde(default)]
    pub simulated: SimulatedConfig,
}

fn default_update_interval_ms() -> u64 {
    geotrack_location::DEFAULT_UPDATE_INTERVAL_MS
}

fn default_min_update_interval_ms() -> u64 {
    geotrack_location::DEFAULT_MIN_UPDATE_INTERVAL_MS
}

fn default_desktop_id() -> String {
    APP_DIR.to_string()
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            backend: LocationBackendKind::default(),
            provider_policy: ProviderPolicy::default(),
            priority: Priority::default(),
            update_interval_ms: default_update_interval_ms(),
            min_update_interval_ms: default_min_update_interval_ms(),
            fresh_fix_timeout_secs: None,
            desktop_id: default_desktop_id(),
            simulated: SimulatedConfig::default(),
        }
    }
}

impl LocationConfig {
    /// Fetch options for a single-fix request.
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            policy: self.provider_policy,
            update_request: UpdateRequest {
                priority: self.priority,
                interval: Duration::from_millis(self.update_interval_ms),
                min_update_interval: Duration::from_millis(self.min_update_interval_ms),
                ..UpdateRequest::single_fix()
            },
            fresh_fix_timeout: self.fresh_fix_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Settings for the simulated backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatedConfig {
    /// Fix reported as the cached position
    #[serde(default)]
    pub last_known: Option<Coordinate>,

    /// Fix delivered to fresh-position subscriptions
    #[serde(default)]
    pub fresh: Option<Coordinate>,

    #[serde(default = "default_fresh_delay_ms")]
    pub fresh_delay_ms: u64,

    #[serde(default = "default_true")]
    pub fine_location_granted: bool,

    #[serde(default = "default_true")]
    pub coarse_location_granted: bool,

    #[serde(default = "default_true")]
    pub provider_enabled: bool,
}

fn default_fresh_delay_ms() -> u64 {
    1500
}

fn default_true() -> bool {
    true
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            last_known: None,
            fresh: Some(Coordinate::new(30.7333, 76.7794)),
            fresh_delay_ms: default_fresh_delay_ms(),
            fine_location_granted: true,
            coarse_location_granted: true,
            provider_enabled: true,
        }
    }
}

impl SimulatedConfig {
    pub fn settings(&self) -> SimulatedSettings {
        SimulatedSettings {
            last_known: self.last_known,
            fresh: self.fresh,
            fresh_delay: Duration::from_millis(self.fresh_delay_ms),
            status: PlatformSnapshot {
                permission: PermissionState {
                    fine_location_granted: self.fine_location_granted,
                    coarse_location_granted: self.coarse_location_granted,
                },
                provider_available: self.provider_enabled,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            profile: ProfileConfig::default(),
            location: LocationConfig::default(),
        }
    }
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl Config {
    /// Load configuration from file, creating default if it doesn't exist
    pub fn load() -> Result<Self, AppError> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing a default file there if missing
    pub fn load_from(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            let mut config = Self::default();
            if let Some(parent) = path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(path)?;
            tracing::info!("Created default config at {}", path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path)?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult), AppError> {
        Self::load_validated_from(&Self::config_path()?)
    }

    pub fn load_validated_from(path: &Path) -> Result<(Self, ValidationResult), AppError> {
        let config = Self::load_from(path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.profile.display_name.trim().is_empty() {
            result.add_warning("profile.display_name", "Display name is empty");
        }

        let location = &self.location;
        if location.update_interval_ms == 0 {
            result.add_error(
                "location.update_interval_ms",
                "Update interval must be greater than 0",
            );
        }
        if location.min_update_interval_ms > location.update_interval_ms {
            result.add_error(
                "location.min_update_interval_ms",
                "Minimum update interval cannot exceed the update interval",
            );
        }
        if location.fresh_fix_timeout_secs == Some(0) {
            result.add_error(
                "location.fresh_fix_timeout_secs",
                "Timeout must be greater than 0 (omit it to wait indefinitely)",
            );
        }
        if location.desktop_id.trim().is_empty() {
            result.add_error("location.desktop_id", "Desktop id cannot be empty");
        }

        if location.backend == LocationBackendKind::GeoClue && !cfg!(target_os = "linux") {
            result.add_error("location.backend", "GeoClue is only available on Linux");
        }

        let simulated = &location.simulated;
        for (field, fix) in [
            ("location.simulated.last_known", simulated.last_known),
            ("location.simulated.fresh", simulated.fresh),
        ] {
            if let Some(fix) = fix {
                if !fix.is_valid() {
                    result.add_error(field, format!("Coordinate out of range: {}", fix));
                }
            }
        }
        if location.backend == LocationBackendKind::Simulated
            && simulated.last_known.is_none()
            && simulated.fresh.is_none()
        {
            result.add_warning(
                "location.simulated",
                "No simulated fix configured - requests will never complete",
            );
        }

        result
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;

        std::fs::write(path, contents)?;

        Ok(())
    }

    /// Path of the persisted tracking preferences
    pub fn prefs_path(&self) -> PathBuf {
        self.config_dir.join(PREFS_FILE)
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("user config directory".to_string()))?
            .join(APP_DIR);

        Ok(config_dir.join(CONFIG_FILE))
    }
}
