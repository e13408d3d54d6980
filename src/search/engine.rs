//! Generational replacement and the optimization loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;

use crate::error::GpError;
use crate::rng::GpRng;
use crate::schema::{GenerationStats, SearchConfig, SearchStats, StopReason};
use crate::tree::{Recipient, Tree, TreeBuilder, analyze, crossover, mutate};
use crate::typing::TypeRegistry;

use super::objective::{FAILED_SCORE, Objective};
use super::selection::{TournamentSelector, build_to_requirements};

/// Outcome of a search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Best tree observed in any round.
    pub best: Tree,
    /// Raw score of `best`.
    pub best_score: f64,
    /// Statistics of every scored round.
    pub history: Vec<GenerationStats>,
    /// Run summary.
    pub stats: SearchStats,
}

/// Score every tree, on the rayon pool when `parallel` is set.
pub fn score_population(population: &[Tree], objective: &Objective, parallel: bool) -> Vec<f64> {
    if parallel {
        population.par_iter().map(|tree| objective.score(tree)).collect()
    } else {
        population.iter().map(|tree| objective.score(tree)).collect()
    }
}

/// Index of the first highest score.
fn best_index(scores: &[f64]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &score)| match best {
            Some((_, top)) if top >= score => best,
            _ => Some((i, score)),
        })
        .map(|(i, _)| i)
}

/// Produce the next population from an already scored one.
///
/// Slot 0 holds the best tree by raw score. Every other slot is filled by
/// crossover with probability `crossover_rate`, otherwise by mutation with
/// probability `mutation_rate / (1 - crossover_rate)`, otherwise by a plain
/// tournament winner.
pub fn breed(
    population: &[Tree],
    scores: &[f64],
    objective: &Objective,
    builder: &TreeBuilder<'_>,
    config: &SearchConfig,
    rng: &mut GpRng,
) -> Result<Vec<Tree>, GpError> {
    let Some(elite) = best_index(scores) else {
        return Ok(Vec::new());
    };
    let selector = TournamentSelector::new(population, scores, objective, builder, config, rng);
    let mutation_share = if config.crossover_rate < 1.0 {
        config.mutation_rate / (1.0 - config.crossover_rate)
    } else {
        0.0
    };

    let mut next = Vec::with_capacity(population.len());
    next.push(population[elite].clone());
    while next.len() < population.len() {
        let child = if rng.unit() < config.crossover_rate {
            crossover_offspring(&selector, objective, builder, config, rng)?
        } else if rng.unit() < mutation_share {
            let mut tree = selector.select(rng)?;
            mutate(&mut tree, builder, None, rng)?;
            tree
        } else {
            selector.select(rng)?
        };
        next.push(child);
    }
    Ok(next)
}

fn crossover_offspring(
    selector: &TournamentSelector<'_>,
    objective: &Objective,
    builder: &TreeBuilder<'_>,
    config: &SearchConfig,
    rng: &mut GpRng,
) -> Result<Tree, GpError> {
    for _ in 0..config.crossover_attempts {
        let mut first = selector.select(rng)?;
        let mut second = selector.select(rng)?;
        match crossover(&mut first, Some(&mut second), rng) {
            Ok(Recipient::First) => return Ok(first),
            Ok(Recipient::Second) => return Ok(second),
            Err(error) if error.is_unsatisfiable() => continue,
            Err(error) => return Err(error),
        }
    }
    log::warn!(
        "No compatible parents after {} crossover attempts, building a fresh tree",
        config.crossover_attempts
    );
    build_to_requirements(objective, builder, config.requirement_attempts, rng)
}

/// Score `population` and produce the next one of equal size.
pub fn next_generation(
    population: &[Tree],
    objective: &Objective,
    builder: &TreeBuilder<'_>,
    config: &SearchConfig,
    rng: &mut GpRng,
) -> Result<Vec<Tree>, GpError> {
    let scores = score_population(population, objective, config.parallel);
    breed(population, &scores, objective, builder, config, rng)
}

/// Summarize one scored round.
pub fn generation_stats(generation: usize, population: &[Tree], scores: &[f64]) -> GenerationStats {
    let finite: Vec<f64> = scores.iter().copied().filter(|s| s.is_finite()).collect();
    let mean_score = if finite.is_empty() {
        FAILED_SCORE
    } else {
        finite.iter().sum::<f64>() / finite.len() as f64
    };
    let mean_size = if population.is_empty() {
        0.0
    } else {
        population.iter().map(|t| analyze(t).num_nodes).sum::<usize>() as f64
            / population.len() as f64
    };
    GenerationStats {
        generation,
        best_score: scores.iter().copied().fold(FAILED_SCORE, f64::max),
        mean_score,
        failures: scores.iter().filter(|s| **s == FAILED_SCORE).count(),
        mean_size,
    }
}

/// Evolutionary search over trees of the objective's target type.
pub struct SearchEngine<'r> {
    registry: &'r TypeRegistry,
    objective: Objective,
    config: SearchConfig,
    rng: GpRng,
    cancelled: Arc<AtomicBool>,
}

impl<'r> SearchEngine<'r> {
    /// Create an engine, validating `config`.
    pub fn new(
        registry: &'r TypeRegistry,
        objective: Objective,
        config: SearchConfig,
    ) -> Result<Self, GpError> {
        config.validate()?;
        let rng = GpRng::from_seed_option(config.random_seed);
        Ok(Self {
            registry,
            objective,
            config,
            rng,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get cancellation handle. Cancellation is checked between rounds.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// The objective being maximized.
    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    /// Build the initial population of requirement-satisfying trees.
    pub fn initialize(&mut self) -> Result<Vec<Tree>, GpError> {
        let builder = TreeBuilder::new(self.registry, self.config.build);
        let requested = self.config.population_size;
        let mut population = Vec::with_capacity(requested);
        for _ in 0..requested {
            match build_to_requirements(
                &self.objective,
                &builder,
                self.config.requirement_attempts,
                &mut self.rng,
            ) {
                Ok(tree) => population.push(tree),
                Err(GpError::UnsatisfiableConstraint(_)) => {
                    return Err(GpError::RequirementsUnmet {
                        found: population.len(),
                        requested,
                    });
                }
                Err(error) => return Err(error),
            }
        }
        Ok(population)
    }

    /// Run with a callback receiving the statistics of every scored round.
    pub fn run_with_callback<F>(&mut self, mut callback: F) -> Result<SearchResult, GpError>
    where
        F: FnMut(&GenerationStats),
    {
        let start_time = Instant::now();
        log::info!(
            "Creating initial population of {}",
            self.config.population_size
        );
        let mut population = self.initialize()?;
        let builder = TreeBuilder::new(self.registry, self.config.build);

        let mut history = Vec::with_capacity(self.config.iterations);
        let mut best: Option<(Tree, f64, usize)> = None;
        let mut stop_reason = StopReason::MaxIterations;

        log::info!("Optimizing");
        for generation in 0..self.config.iterations {
            if self.cancelled.load(Ordering::Relaxed) {
                stop_reason = StopReason::Cancelled;
                break;
            }

            let scores = score_population(&population, &self.objective, self.config.parallel);
            let stats = generation_stats(generation, &population, &scores);
            log::info!(
                "Generation {}: best {:.2}, mean {:.2}, size {:.1}",
                generation + 1,
                stats.best_score,
                stats.mean_score,
                stats.mean_size
            );
            track_best(&mut best, &population, &scores, generation);
            callback(&stats);
            history.push(stats);

            if self.objective.is_target_reached(stats.best_score) {
                stop_reason = StopReason::TargetReached;
                break;
            }
            population = breed(
                &population,
                &scores,
                &self.objective,
                &builder,
                &self.config,
                &mut self.rng,
            )?;
        }

        // The current population has not been scored yet.
        if stop_reason != StopReason::TargetReached {
            let scores = score_population(&population, &self.objective, self.config.parallel);
            track_best(&mut best, &population, &scores, history.len());
        }

        let (best, best_score, best_generation) = best.ok_or(GpError::RequirementsUnmet {
            found: 0,
            requested: self.config.population_size,
        })?;
        Ok(SearchResult {
            best,
            best_score,
            stats: SearchStats {
                generations: history.len(),
                best_score,
                best_generation,
                elapsed_seconds: start_time.elapsed().as_secs_f64(),
                stop_reason,
            },
            history,
        })
    }

    /// Run the search (blocking).
    pub fn run(&mut self) -> Result<SearchResult, GpError> {
        self.run_with_callback(|_| {})
    }
}

/// Keep the best tree seen so far; the first round always sets it.
fn track_best(
    best: &mut Option<(Tree, f64, usize)>,
    population: &[Tree],
    scores: &[f64],
    generation: usize,
) {
    let Some(index) = best_index(scores) else {
        return;
    };
    let improved = best
        .as_ref()
        .is_none_or(|(_, score, _)| scores[index] > *score);
    if improved {
        *best = Some((population[index].clone(), scores[index], generation));
    }
}

/// Run a full search with `config` and return the best tree found.
pub fn optimize(
    registry: &TypeRegistry,
    objective: Objective,
    config: SearchConfig,
) -> Result<SearchResult, GpError> {
    SearchEngine::new(registry, objective, config)?.run()
}
