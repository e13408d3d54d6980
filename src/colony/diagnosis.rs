//! Pheromone-guided discovery and localization of evaluation failures.

use std::collections::BTreeMap;

use crate::error::{EvalError, GpError};
use crate::rng::GpRng;
use crate::schema::DiagnosisConfig;
use crate::tree::{Tree, TreeBuilder, analyze};
use crate::typing::{TypeDecl, TypeRegistry, Value};

use super::pheromone::{Label, PheromoneModel, PheromoneSelection, WeightedEdge};

/// Failures observed while sampling trees of one type.
#[derive(Debug, Clone)]
pub struct Diagnosis {
    /// Every failing tree, grouped by failure label.
    pub failures: BTreeMap<Label, Vec<Tree>>,
    /// Smallest tree found for each failure.
    pub minimal_reproductions: BTreeMap<Label, Tree>,
    /// Edges reinforced by each failure, strongest first.
    pub edge_weightings: BTreeMap<Label, Vec<WeightedEdge>>,
}

impl Diagnosis {
    /// Labels of the distinct failures found.
    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.failures.keys()
    }
}

/// Label a tree by the failure it produces, if any.
fn outcome<F>(tree: &Tree, test: &F) -> Option<Label>
where
    F: Fn(&Value) -> Result<(), EvalError>,
{
    match tree.evaluate().and_then(|value| test(&value)) {
        Ok(()) => None,
        Err(error) => Some(Label::Outcome(error.to_string())),
    }
}

/// Sample trees of `target`, collect evaluation failures, then steer the
/// builder toward each failure with a pheromone model.
///
/// `test` is applied to every successfully evaluated value; returning an
/// error counts as a failure. Failures are labelled by their message.
pub fn diagnose<F>(
    registry: &TypeRegistry,
    target: impl Into<TypeDecl>,
    test: F,
    config: &DiagnosisConfig,
    rng: &mut GpRng,
) -> Result<Diagnosis, GpError>
where
    F: Fn(&Value) -> Result<(), EvalError>,
{
    config.validate()?;
    let target = Into::<TypeDecl>::into(target).canonicalize();
    let builder = TreeBuilder::new(registry, config.build);
    let mut colony = PheromoneModel::new(registry, config.pheromone)?;
    let mut failures: BTreeMap<Label, Vec<Tree>> = BTreeMap::new();

    log::info!("Collecting failure sample of {} trees", config.sample_size);
    {
        let mut round = colony.iteration();
        for _ in 0..config.sample_size {
            let tree = builder.build_random(&target, rng)?;
            let label = outcome(&tree, &test);
            round.deposit(&[(&tree, 1.0)], label.as_ref().unwrap_or(&Label::General))?;
            if let Some(label) = label {
                failures.entry(label).or_default().push(tree);
            }
        }
    }

    if failures.is_empty() {
        return Err(GpError::NoFailures {
            trials: config.sample_size,
        });
    }
    log::info!("Discovered {} distinct failures", failures.len());

    let known: Vec<Label> = failures.keys().cloned().collect();
    for _ in 0..config.sample_size {
        let mut round = colony.iteration();
        for label in &known {
            let built = {
                let mut strategy = PheromoneSelection::new(&round, label.clone());
                builder.build(&target, None, &mut strategy, rng)
            };
            let tree = match built {
                Ok(tree) => tree,
                Err(error) if error.is_unsatisfiable() => {
                    log::debug!("No reproduction attempt for {label}: {error}");
                    continue;
                }
                Err(error) => return Err(error),
            };
            match outcome(&tree, &test) {
                Some(found) if failures.contains_key(&found) => {
                    round.deposit(&[(&tree, 1.0)], &found)?;
                    failures.entry(found).or_default().push(tree);
                }
                _ => round.deposit(&[(&tree, 1.0)], &Label::General)?,
            }
        }
    }

    let minimal_reproductions = failures
        .iter()
        .filter_map(|(label, trees)| {
            trees
                .iter()
                .min_by_key(|tree| analyze(tree).num_nodes)
                .map(|tree| (label.clone(), tree.clone()))
        })
        .collect();
    let edge_weightings = known
        .iter()
        .map(|label| (label.clone(), colony.ranked_edges(label)))
        .collect();
    log::info!("Diagnosis complete");

    Ok(Diagnosis {
        failures,
        minimal_reproductions,
        edge_weightings,
    })
}
