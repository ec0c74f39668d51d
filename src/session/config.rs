use serde::{Deserialize, Serialize};

use crate::lm::LmConfig;
use crate::parameters::{Bounds, BoundsError};

/// Session defaults and solver settings.
///
/// Every field has a default, so a partial JSON object is enough:
///
/// ```
/// use actfit::session::SessionConfig;
///
/// let config: SessionConfig = serde_json::from_str(r#"{"default_bounds": {"min": 0.1, "max": 30.0}}"#).unwrap();
/// assert_eq!(config.default_value, 1.0);
/// assert_eq!(config.default_bounds.max, 30.0);
///
/// // The default value must lie inside the default bounds
/// assert!(serde_json::from_str::<SessionConfig>(r#"{"default_value": 50.0}"#).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSessionConfig")]
pub struct SessionConfig {
    /// Starting value of every parameter after a function is selected
    pub default_value: f64,

    /// Starting bounds of every parameter after a function is selected
    pub default_bounds: Bounds,

    /// Solver settings
    pub solver: LmConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_value: 1.0,
            default_bounds: Bounds {
                min: 0.0,
                max: 10.0,
            },
            solver: LmConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Check that the default value lies inside the default bounds.
    pub fn validate(&self) -> Result<(), BoundsError> {
        self.default_bounds.check(self.default_value)
    }
}

/// Unchecked form read from JSON, missing fields filled from the defaults.
#[derive(Deserialize)]
#[serde(default)]
struct RawSessionConfig {
    default_value: f64,
    default_bounds: Bounds,
    solver: LmConfig,
}

impl Default for RawSessionConfig {
    fn default() -> Self {
        let SessionConfig {
            default_value,
            default_bounds,
            solver,
        } = SessionConfig::default();
        Self {
            default_value,
            default_bounds,
            solver,
        }
    }
}

impl TryFrom<RawSessionConfig> for SessionConfig {
    type Error = BoundsError;

    fn try_from(raw: RawSessionConfig) -> Result<Self, Self::Error> {
        let config = Self {
            default_value: raw.default_value,
            default_bounds: raw.default_bounds,
            solver: raw.solver,
        };
        config.validate()?;
        Ok(config)
    }
}
