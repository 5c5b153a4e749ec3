//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `hushbot.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use serde::Deserialize;

use hushbot_domain::error::ValidationError;
use hushbot_domain::geo::Coordinates;
use hushbot_domain::geofence::{DEFAULT_RADIUS_METERS, Geofence};
use hushbot_domain::transition::TransitionMask;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Engine tuning.
    pub engine: EngineConfig,
    /// Initial grants of the virtual device.
    pub permissions: PermissionsConfig,
    /// Last known position of the virtual device.
    pub location: Option<Coordinates>,
    /// Geofences registered at startup.
    pub geofences: Vec<GeofenceConfig>,
    /// Mock location replay.
    pub mock: MockConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the in-process event bus.
    pub event_bus_capacity: usize,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub location_granted: bool,
    pub policy_granted: bool,
}

/// A geofence seeded at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct GeofenceConfig {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_radius")]
    pub radius_meters: f64,
    #[serde(default)]
    pub transition_mask: TransitionMask,
}

/// Positions fed to the mock location harness, one per step.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    pub enabled: bool,
    pub step_interval_ms: u64,
    pub route: Vec<Coordinates>,
}

impl Config {
    /// Load configuration from `hushbot.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// result does not validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("hushbot.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("HUSHBOT_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        if let Some(enabled) = var("HUSHBOT_MOCK").and_then(|val| val.parse().ok()) {
            self.mock.enabled = enabled;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.event_bus_capacity == 0 {
            return Err(ConfigError::Validation(
                "event_bus_capacity must be non-zero".to_string(),
            ));
        }
        if let Some(location) = &self.location {
            location.validate()?;
        }
        for geofence in &self.geofences {
            geofence.to_geofence()?;
        }
        for point in &self.mock.route {
            point.validate()?;
        }
        Ok(())
    }

    /// The startup geofences as validated domain values.
    ///
    /// # Errors
    ///
    /// Returns the first definition that fails validation.
    pub fn seed_geofences(&self) -> Result<Vec<Geofence>, ValidationError> {
        self.geofences
            .iter()
            .map(GeofenceConfig::to_geofence)
            .collect()
    }
}

impl GeofenceConfig {
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the definition is invalid.
    pub fn to_geofence(&self) -> Result<Geofence, ValidationError> {
        Geofence::builder()
            .name(self.name.trim())
            .center(self.latitude, self.longitude)
            .radius_meters(self.radius_meters)
            .transition_mask(self.transition_mask)
            .build()
    }
}

fn default_radius() -> f64 {
    DEFAULT_RADIUS_METERS
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "hushbotd=info,hushbot=info".to_string(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_bus_capacity: 256,
        }
    }
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            location_granted: true,
            policy_granted: true,
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            step_interval_ms: 100,
            route: Vec::new(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// A geofence or position in the file is invalid.
    #[error("invalid configuration: {0}")]
    Domain(#[from] ValidationError),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn should_produce_sensible_defaults() {
        let config = Config::default();
        assert_eq!(config.engine.event_bus_capacity, 256);
        assert!(config.permissions.location_granted);
        assert!(config.permissions.policy_granted);
        assert!(config.location.is_none());
        assert!(config.geofences.is_empty());
        assert!(!config.mock.enabled);
    }

    #[test]
    fn should_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.engine.event_bus_capacity, 256);
        assert_eq!(config.logging.filter, "hushbotd=info,hushbot=info");
    }

    #[test]
    fn should_parse_full_toml() {
        let toml = "
            [logging]
            filter = 'debug'

            [engine]
            event_bus_capacity = 16

            [permissions]
            location_granted = false
            policy_granted = true

            [location]
            latitude = 37.0
            longitude = -122.0

            [[geofences]]
            name = 'Home'
            latitude = 37.0
            longitude = -122.0
            radius_meters = 75.0
            transition_mask = 'enter'

            [[geofences]]
            name = 'Office'
            latitude = 37.5
            longitude = -122.5

            [mock]
            enabled = true
            step_interval_ms = 10
            route = [{ latitude = 37.0, longitude = -122.0 }, { latitude = 37.01, longitude = -122.01 }]
        ";
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.logging.filter, "debug");
        assert_eq!(config.engine.event_bus_capacity, 16);
        assert!(!config.permissions.location_granted);
        assert!(config.location.is_some());
        assert_eq!(config.geofences.len(), 2);
        assert_eq!(config.geofences[0].transition_mask, TransitionMask::Enter);
        assert!((config.geofences[1].radius_meters - 50.0).abs() < f64::EPSILON);
        assert_eq!(config.geofences[1].transition_mask, TransitionMask::Both);
        assert!(config.mock.enabled);
        assert_eq!(config.mock.route.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_return_default_when_file_not_found() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        assert_eq!(config.engine.event_bus_capacity, 256);
    }

    #[test]
    fn should_reject_zero_capacity() {
        let mut config = Config::default();
        config.engine.event_bus_capacity = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn should_reject_geofence_below_minimum_radius() {
        let config: Config = toml::from_str(
            "
            [[geofences]]
            name = 'Tiny'
            latitude = 0.0
            longitude = 0.0
            radius_meters = 5.0
            ",
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Domain(ValidationError::RadiusTooSmall { .. }))
        ));
    }

    #[test]
    fn should_reject_route_point_out_of_range() {
        let config: Config = toml::from_str(
            "
            [mock]
            route = [{ latitude = 95.0, longitude = 0.0 }]
            ",
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_convert_seed_geofences() {
        let config: Config = toml::from_str(
            "
            [[geofences]]
            name = 'My Office'
            latitude = 48.85
            longitude = 2.35
            ",
        )
        .unwrap();

        let geofences = config.seed_geofences().unwrap();

        assert_eq!(geofences[0].id.as_str(), "my-office");
    }

    #[test]
    fn should_prefer_rust_log_over_hushbot_log() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("HUSHBOT_LOG", "warn"), ("RUST_LOG", "trace")]));
        assert_eq!(config.logging.filter, "trace");
    }

    #[test]
    fn should_toggle_mock_from_env() {
        let mut config = Config::default();
        config.apply_overrides(env(&[("HUSHBOT_MOCK", "true")]));
        assert!(config.mock.enabled);

        config.apply_overrides(env(&[("HUSHBOT_MOCK", "nope")]));
        assert!(config.mock.enabled);
    }

    #[test]
    fn should_report_parse_error_for_invalid_toml() {
        let result: Result<Config, _> = toml::from_str("invalid {{{");
        assert!(result.is_err());
    }
}
