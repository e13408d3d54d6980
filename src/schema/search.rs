//! Search configuration and run statistics for evolutionary optimization.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{BuildConfig, ConfigError};

/// Top-level configuration for an evolutionary search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of trees per generation.
    #[serde(default = "default_population_size")]
    pub population_size: usize,
    /// Maximum number of generations.
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Trees sampled per tournament.
    #[serde(default = "default_tournament_size")]
    pub tournament_size: usize,
    /// Probability of filling a slot by crossover (0.0-1.0).
    #[serde(default = "default_crossover_rate")]
    pub crossover_rate: f64,
    /// Probability of filling a slot by mutation (0.0-1.0).
    ///
    /// Interpreted as a share of the non-crossover remainder.
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Crossover retries on incompatible parents before a fresh build.
    #[serde(default = "default_crossover_attempts")]
    pub crossover_attempts: usize,
    /// Builds tried per tree when satisfying input requirements.
    #[serde(default = "default_requirement_attempts")]
    pub requirement_attempts: usize,
    /// Tournament redraws when a failed tree cannot be replaced.
    #[serde(default = "default_redraw_attempts")]
    pub redraw_attempts: usize,
    /// Parsimony pressure applied during selection.
    #[serde(default)]
    pub parsimony: ParsimonyConfig,
    /// Construction limits.
    #[serde(default)]
    pub build: BuildConfig,
    /// Score the population on the rayon thread pool.
    ///
    /// Objectives are `Send + Sync`, so this is safe; leave it off for cheap
    /// objectives where the pool overhead dominates.
    #[serde(default)]
    pub parallel: bool,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            population_size: default_population_size(),
            iterations: default_iterations(),
            tournament_size: default_tournament_size(),
            crossover_rate: default_crossover_rate(),
            mutation_rate: default_mutation_rate(),
            crossover_attempts: default_crossover_attempts(),
            requirement_attempts: default_requirement_attempts(),
            redraw_attempts: default_redraw_attempts(),
            parsimony: ParsimonyConfig::default(),
            build: BuildConfig::default(),
            parallel: false,
            random_seed: None,
        }
    }
}

fn default_population_size() -> usize {
    250
}
fn default_iterations() -> usize {
    25
}
fn default_tournament_size() -> usize {
    25
}
fn default_crossover_rate() -> f64 {
    0.8
}
fn default_mutation_rate() -> f64 {
    0.01
}
fn default_crossover_attempts() -> usize {
    99_999
}
fn default_requirement_attempts() -> usize {
    9_999
}
fn default_redraw_attempts() -> usize {
    1_000
}

/// Parsimony pressure against tree bloat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParsimonyConfig {
    /// Probability that a larger-than-average tree is scored as failed (Poli 2003).
    #[serde(default = "default_random_probability")]
    pub random_probability: Option<f64>,
    /// Penalize size by the size/score covariance (Poli & McPhee 2008).
    #[serde(default)]
    pub covariance: bool,
}

impl Default for ParsimonyConfig {
    fn default() -> Self {
        Self {
            random_probability: default_random_probability(),
            covariance: false,
        }
    }
}

fn default_random_probability() -> Option<f64> {
    Some(0.33)
}

impl ParsimonyConfig {
    /// No parsimony pressure beyond the pseudo-Pareto filter.
    pub fn none() -> Self {
        Self {
            random_probability: None,
            covariance: false,
        }
    }
}

impl SearchConfig {
    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate search configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.build.validate()?;

        if self.population_size == 0 {
            return Err(ConfigError::PopulationTooSmall);
        }
        if self.tournament_size == 0 {
            return Err(ConfigError::InvalidTournamentSize);
        }

        let check_rate = |value: f64, name: &'static str| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::InvalidRate { name, value })
            }
        };
        check_rate(self.crossover_rate, "crossover_rate")?;
        check_rate(self.mutation_rate, "mutation_rate")?;
        if let Some(p) = self.parsimony.random_probability {
            check_rate(p, "parsimony.random_probability")?;
        }

        if self.crossover_attempts == 0 {
            return Err(ConfigError::InvalidAttempts("crossover_attempts"));
        }
        if self.requirement_attempts == 0 {
            return Err(ConfigError::InvalidAttempts("requirement_attempts"));
        }
        if self.redraw_attempts == 0 {
            return Err(ConfigError::InvalidAttempts("redraw_attempts"));
        }
        Ok(())
    }
}

/// Statistics for a single generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Generation number (0-based).
    pub generation: usize,
    /// Best raw score in the scored population.
    pub best_score: f64,
    /// Mean raw score over trees that did not fail.
    pub mean_score: f64,
    /// Number of trees that failed (scored negative infinity).
    pub failures: usize,
    /// Mean non-root node count.
    pub mean_size: f64,
}

/// Summary of a completed search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchStats {
    /// Generations actually run.
    pub generations: usize,
    /// Best score observed across all rounds.
    pub best_score: f64,
    /// Generation in which the best tree was observed.
    pub best_generation: usize,
    /// Time taken (in seconds).
    pub elapsed_seconds: f64,
    /// Reason for stopping.
    pub stop_reason: StopReason,
}

/// Reason a search stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// Ran the configured number of generations.
    MaxIterations,
    /// A round's best score reached the objective's declared maximum.
    TargetReached,
    /// Cancelled through the engine's cancel handle.
    Cancelled,
}
