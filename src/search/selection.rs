//! Tournament selection with parsimony pressure.

use rand::seq::index;

use crate::error::GpError;
use crate::rng::GpRng;
use crate::schema::{ParsimonyConfig, SearchConfig};
use crate::tree::{Tree, TreeBuilder, analyze};

use super::objective::{FAILED_SCORE, Objective};

/// Build trees until one contains every input the objective requires.
///
/// Fails with [`GpError::UnsatisfiableConstraint`] after `attempts` builds.
pub fn build_to_requirements(
    objective: &Objective,
    builder: &TreeBuilder<'_>,
    attempts: usize,
    rng: &mut GpRng,
) -> Result<Tree, GpError> {
    for _ in 0..attempts {
        let tree = builder.build_random(objective.target(), rng)?;
        if objective.satisfies_requirements(&tree) {
            return Ok(tree);
        }
    }
    Err(GpError::UnsatisfiableConstraint(
        "Could not meet input requirements".to_owned(),
    ))
}

/// Mean of the finite values, if any.
fn finite_mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Apply parsimony pressure and the pseudo-Pareto filter to raw scores.
///
/// Random parsimony scores a larger-than-average tree as failed with a
/// fixed probability (Poli 2003). Covariance parsimony subtracts
/// `c * size` from every finite score, with `c = cov(size, score) / var(size)`
/// over the finite entries (Poli & McPhee 2008). Finally any tree that is
/// both below the mean score and above the mean size is scored as failed.
pub fn apply_parsimony(
    scores: &[f64],
    sizes: &[usize],
    config: &ParsimonyConfig,
    rng: &mut GpRng,
) -> Vec<f64> {
    let mut adjusted = scores.to_vec();
    if sizes.is_empty() {
        return adjusted;
    }
    let mean_size = sizes.iter().sum::<usize>() as f64 / sizes.len() as f64;

    if let Some(probability) = config.random_probability {
        for (score, &size) in adjusted.iter_mut().zip(sizes) {
            if size as f64 > mean_size && rng.unit() < probability {
                *score = FAILED_SCORE;
            }
        }
    }

    if config.covariance {
        let pairs: Vec<(f64, f64)> = sizes
            .iter()
            .zip(&adjusted)
            .filter(|(_, score)| score.is_finite())
            .map(|(&size, &score)| (size as f64, score))
            .collect();
        if pairs.len() > 1 {
            let n = pairs.len() as f64;
            let size_mean = pairs.iter().map(|(size, _)| size).sum::<f64>() / n;
            let score_mean = pairs.iter().map(|(_, score)| score).sum::<f64>() / n;
            let covariance = pairs
                .iter()
                .map(|(size, score)| (size - size_mean) * (score - score_mean))
                .sum::<f64>()
                / n;
            let variance = pairs
                .iter()
                .map(|(size, _)| (size - size_mean).powi(2))
                .sum::<f64>()
                / n;
            if variance > 0.0 {
                let c = covariance / variance;
                for (score, &size) in adjusted.iter_mut().zip(sizes) {
                    if score.is_finite() {
                        *score -= c * size as f64;
                    }
                }
            }
        }
    }

    if let Some(mean_score) = finite_mean(adjusted.iter().copied()) {
        for (score, &size) in adjusted.iter_mut().zip(sizes) {
            if *score < mean_score && size as f64 > mean_size {
                *score = FAILED_SCORE;
            }
        }
    }
    adjusted
}

/// Tournament selection over a scored population.
///
/// Scores are fixed when the selector is created; every draw samples
/// `tournament_size` distinct trees (capped at the population size) and
/// returns a copy of the best.
/// When the best sampled tree failed, a fresh requirement-satisfying tree
/// is built instead.
pub struct TournamentSelector<'a> {
    population: &'a [Tree],
    scores: Vec<f64>,
    objective: &'a Objective,
    builder: &'a TreeBuilder<'a>,
    tournament_size: usize,
    requirement_attempts: usize,
    redraw_attempts: usize,
}

impl<'a> TournamentSelector<'a> {
    /// Create a selector from raw scores, applying the configured parsimony.
    pub fn new(
        population: &'a [Tree],
        raw_scores: &[f64],
        objective: &'a Objective,
        builder: &'a TreeBuilder<'a>,
        config: &SearchConfig,
        rng: &mut GpRng,
    ) -> Self {
        let sizes: Vec<usize> = population.iter().map(|t| analyze(t).num_nodes).collect();
        let scores = apply_parsimony(raw_scores, &sizes, &config.parsimony, rng);
        Self {
            population,
            scores,
            objective,
            builder,
            tournament_size: config.tournament_size,
            requirement_attempts: config.requirement_attempts,
            redraw_attempts: config.redraw_attempts,
        }
    }

    /// Scores after parsimony adjustment, aligned with the population.
    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    /// Run one tournament.
    pub fn select(&self, rng: &mut GpRng) -> Result<Tree, GpError> {
        if self.population.is_empty() {
            return Err(GpError::UnsatisfiableConstraint(
                "Cannot select from an empty population".to_owned(),
            ));
        }
        for _ in 0..self.redraw_attempts {
            let entrants = self.tournament_size.clamp(1, self.population.len());
            let mut sampled = index::sample(rng, self.population.len(), entrants).into_iter();
            let Some(mut best) = sampled.next() else {
                continue;
            };
            for challenger in sampled {
                if self.scores[challenger] > self.scores[best] {
                    best = challenger;
                }
            }
            if self.scores[best] > FAILED_SCORE {
                return Ok(self.population[best].clone());
            }
            match build_to_requirements(self.objective, self.builder, self.requirement_attempts, rng)
            {
                Ok(tree) => return Ok(tree),
                Err(GpError::UnsatisfiableConstraint(reason)) => {
                    log::debug!("Tournament redraw: {reason}");
                }
                Err(error) => return Err(error),
            }
        }
        Err(GpError::UnsatisfiableConstraint(format!(
            "No selectable tree after {} tournaments",
            self.redraw_attempts
        )))
    }

    /// Endless stream of tournament winners.
    pub fn iter<'s>(
        &'s self,
        rng: &'s mut GpRng,
    ) -> impl Iterator<Item = Result<Tree, GpError>> + 's {
        std::iter::repeat_with(move || self.select(rng))
    }
}
