//! Configuration types for tree construction and the pheromone model.

use serde::{Deserialize, Serialize};

/// Limits for type-directed tree construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Maximum node depth before the current attempt is abandoned.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
    /// Number of fresh attempts from the root before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_max_depth() -> usize {
    500
}
fn default_max_attempts() -> usize {
    99_999
}

impl BuildConfig {
    /// Validate construction limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::InvalidDepth);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidAttempts("max_attempts"));
        }
        Ok(())
    }
}

/// Pheromone model parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PheromoneConfig {
    /// Fraction of every concentration removed per evaporation round, in (0, 1).
    #[serde(default = "default_evaporation_rate")]
    pub evaporation_rate: f64,
    /// Concentration seeded on the general label for every reachable combination.
    #[serde(default = "default_initial_concentration")]
    pub initial_concentration: f64,
    /// Concentration of any other label before it is first deposited.
    #[serde(default)]
    pub default_concentration: f64,
}

impl Default for PheromoneConfig {
    fn default() -> Self {
        Self {
            evaporation_rate: default_evaporation_rate(),
            initial_concentration: default_initial_concentration(),
            default_concentration: 0.0,
        }
    }
}

fn default_evaporation_rate() -> f64 {
    1.0 / 20.0
}
fn default_initial_concentration() -> f64 {
    1.0
}

impl PheromoneConfig {
    /// Validate pheromone parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.evaporation_rate > 0.0 && self.evaporation_rate < 1.0) {
            return Err(ConfigError::InvalidRate {
                name: "evaporation_rate",
                value: self.evaporation_rate,
            });
        }
        if !(self.initial_concentration.is_finite() && self.initial_concentration >= 0.0) {
            return Err(ConfigError::InvalidConcentration(self.initial_concentration));
        }
        if !(self.default_concentration.is_finite() && self.default_concentration >= 0.0) {
            return Err(ConfigError::InvalidConcentration(self.default_concentration));
        }
        Ok(())
    }
}

/// Settings for pheromone-guided failure diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisConfig {
    /// Trees sampled in the discovery phase, and rounds in the reproduction phase.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Pheromone parameters for the diagnosis colony.
    #[serde(default)]
    pub pheromone: PheromoneConfig,
    /// Construction limits.
    #[serde(default)]
    pub build: BuildConfig,
}

impl Default for DiagnosisConfig {
    fn default() -> Self {
        Self {
            sample_size: default_sample_size(),
            pheromone: PheromoneConfig::default(),
            build: BuildConfig::default(),
        }
    }
}

fn default_sample_size() -> usize {
    250
}

impl DiagnosisConfig {
    /// Validate diagnosis settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_size == 0 {
            return Err(ConfigError::InvalidSampleSize);
        }
        self.pheromone.validate()?;
        self.build.validate()
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Maximum depth must be non-zero")]
    InvalidDepth,
    #[error("{0} must be non-zero")]
    InvalidAttempts(&'static str),
    #[error("{name} must lie in its valid range, got {value}")]
    InvalidRate { name: &'static str, value: f64 },
    #[error("Concentrations must be finite and non-negative, got {0}")]
    InvalidConcentration(f64),
    #[error("Sample size must be non-zero")]
    InvalidSampleSize,
    #[error("Population size must be at least 1")]
    PopulationTooSmall,
    #[error("Tournament size must be at least 1")]
    InvalidTournamentSize,
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        assert!(BuildConfig::default().validate().is_ok());
        assert!(PheromoneConfig::default().validate().is_ok());
        assert!(DiagnosisConfig::default().validate().is_ok());
    }

    #[test]
    fn test_evaporation_rate_bounds() {
        let mut config = PheromoneConfig::default();
        config.evaporation_rate = 0.0;
        assert!(config.validate().is_err());
        config.evaporation_rate = 1.0;
        assert!(config.validate().is_err());
        config.evaporation_rate = 0.5;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: BuildConfig = serde_json::from_str(r#"{"max_depth": 40}"#).unwrap();
        assert_eq!(config.max_depth, 40);
        assert_eq!(config.max_attempts, 99_999);
    }
}
