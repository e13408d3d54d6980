//! Pheromone-weighted child selection.
//!
//! Every parent operation owns a row of child combinations. Each combination
//! carries a concentration per [`Label`]; selection is a roulette wheel over
//! the combinations weighted by how strongly they prefer the requested label
//! over all other labels.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::error::GpError;
use crate::rng::GpRng;
use crate::schema::PheromoneConfig;
use crate::tree::{SelectionStrategy, Tree, analyze};
use crate::typing::{Operation, TypeRegistry};

/// The dimension a concentration is tracked along.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    /// General desirability.
    #[default]
    General,
    /// A specific observed outcome, such as a failure kind.
    Outcome(String),
}

impl Label {
    /// Label for a named outcome.
    pub fn outcome(name: impl Into<String>) -> Self {
        Self::Outcome(name.into())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::General => write!(f, "general"),
            Self::Outcome(name) => write!(f, "{name}"),
        }
    }
}

type Concentrations = BTreeMap<Label, f64>;
type Row = BTreeMap<Vec<Operation>, Concentrations>;

/// Per-parent, per-combination, per-label concentration table.
#[derive(Debug, Clone)]
pub struct PheromoneModel {
    table: BTreeMap<Operation, Row>,
    labels: BTreeSet<Label>,
    config: PheromoneConfig,
    iteration: usize,
}

impl PheromoneModel {
    /// Seed the table from every parent in `registry`.
    ///
    /// Each parent gets one entry per combination reachable from its
    /// parameter types, with the general label set to the initial concentration.
    pub fn new(registry: &TypeRegistry, config: PheromoneConfig) -> Result<Self, GpError> {
        config.validate()?;

        let mut table = BTreeMap::new();
        for parent in registry.operations().iter().filter(|op| !op.is_leaf()) {
            let options: Vec<&[Operation]> = parent
                .params()
                .iter()
                .map(|param| registry.returning(param))
                .collect();
            let row: Row = combinations(&options)
                .into_iter()
                .map(|combination| {
                    let seeded = BTreeMap::from([(Label::General, config.initial_concentration)]);
                    (combination, seeded)
                })
                .collect();
            table.insert(parent.clone(), row);
        }

        Ok(Self {
            table,
            labels: BTreeSet::from([Label::General]),
            config,
            iteration: 0,
        })
    }

    /// Model parameters.
    pub fn config(&self) -> &PheromoneConfig {
        &self.config
    }

    /// Evaporation rounds completed so far.
    pub fn iteration_count(&self) -> usize {
        self.iteration
    }

    /// Every label seen so far, the general label included.
    pub fn labels(&self) -> impl Iterator<Item = &Label> {
        self.labels.iter()
    }

    /// Concentration of a label that has not been materialized on an entry.
    fn lazy_default(&self, label: &Label) -> f64 {
        let base = match label {
            Label::General => self.config.initial_concentration,
            Label::Outcome(_) => self.config.default_concentration,
        };
        base * (1.0 - self.config.evaporation_rate).powf(self.iteration as f64)
    }

    fn level(&self, entry: &Concentrations, label: &Label) -> f64 {
        entry
            .get(label)
            .copied()
            .unwrap_or_else(|| self.lazy_default(label))
    }

    /// Concentration of `combination` under `label` for `parent`.
    pub fn concentration(&self, parent: &Operation, combination: &[Operation], label: &Label) -> f64 {
        self.table
            .get(parent)
            .and_then(|row| row.get(combination))
            .map_or_else(|| self.lazy_default(label), |entry| self.level(entry, label))
    }

    /// Share of an entry's total concentration held by `label`.
    fn preference(&self, entry: &Concentrations, label: &Label) -> f64 {
        let own = self.level(entry, label);
        let mut total: f64 = self.labels.iter().map(|l| self.level(entry, l)).sum();
        if !self.labels.contains(label) {
            total += own;
        }
        if total > 0.0 { own / total } else { 0.0 }
    }

    /// Roulette-wheel choice of a child combination for `parent`.
    ///
    /// `children`, when given, is a positional allow-list: position `i` of a
    /// combination must be a member of `children[i]`. Fails with
    /// [`GpError::UnsatisfiableConstraint`] if no combination survives the
    /// filter or every survivor has zero weight.
    pub fn select(
        &self,
        parent: &Operation,
        label: &Label,
        children: Option<&[Vec<Operation>]>,
        rng: &mut GpRng,
    ) -> Result<Vec<Operation>, GpError> {
        let row = self.table.get(parent).ok_or_else(|| {
            GpError::UnsatisfiableConstraint(format!("{parent} has no child combinations"))
        })?;

        let weighted: Vec<(&Vec<Operation>, f64)> = row
            .iter()
            .filter(|(combination, _)| {
                children.is_none_or(|allowed| {
                    allowed.len() == combination.len()
                        && combination
                            .iter()
                            .zip(allowed)
                            .all(|(op, options)| options.contains(op))
                })
            })
            .map(|(combination, entry)| (combination, self.preference(entry, label)))
            .collect();
        if weighted.is_empty() {
            return Err(GpError::UnsatisfiableConstraint(format!(
                "No child combination of {parent} satisfies the allowed children"
            )));
        }

        let total: f64 = weighted.iter().map(|(_, weight)| weight).sum();
        if !(total > 0.0 && total.is_finite()) {
            return Err(GpError::UnsatisfiableConstraint(format!(
                "Every child combination of {parent} has zero weight under {label}"
            )));
        }

        let mut remainder = rng.unit() * total;
        let mut chosen = None;
        for (combination, weight) in weighted {
            if weight <= 0.0 {
                continue;
            }
            chosen = Some(combination);
            remainder -= weight;
            if remainder <= 0.0 {
                break;
            }
        }
        // Rounding can leave a sliver of remainder; the last positive entry wins.
        chosen.cloned().ok_or_else(|| {
            GpError::UnsatisfiableConstraint(format!("No weighted combination for {parent}"))
        })
    }

    /// Reinforce every structural edge of each tree under `label`.
    ///
    /// A tree contributes `1 / ((2 - fitness) * num_nodes)` to each of its
    /// edges, so fitter and smaller trees deposit more. Fitness must lie
    /// in [0, 1]; nothing is deposited if any value is out of range.
    pub fn deposit(&mut self, trees: &[(&Tree, f64)], label: &Label) -> Result<(), GpError> {
        if let Some(&(_, fitness)) = trees
            .iter()
            .find(|(_, fitness)| !(0.0..=1.0).contains(fitness))
        {
            return Err(GpError::InvalidFitness(fitness));
        }

        self.labels.insert(label.clone());
        for &(tree, fitness) in trees {
            let info = analyze(tree);
            if info.graph_edges.is_empty() {
                continue;
            }
            let distance = (2.0 - fitness) * info.num_nodes as f64;
            let amount = 1.0 / distance;
            for edge in info.graph_edges {
                let initial = self.lazy_default(label);
                let level = self
                    .table
                    .entry(edge.parent)
                    .or_default()
                    .entry(edge.children)
                    .or_default()
                    .entry(label.clone())
                    .or_insert(initial);
                *level += amount;
            }
        }
        Ok(())
    }

    /// Decay every concentration and advance the iteration counter.
    pub fn evaporate(&mut self) {
        let keep = 1.0 - self.config.evaporation_rate;
        for entry in self.table.values_mut().flat_map(BTreeMap::values_mut) {
            for level in entry.values_mut() {
                *level *= keep;
            }
        }
        self.iteration += 1;
    }

    /// Scoped round of deposits; evaporation runs when the guard drops.
    pub fn iteration(&mut self) -> Iteration<'_> {
        Iteration { model: self }
    }

    /// Every materialized `(parent, combination, label, concentration)`.
    pub fn iter(&self) -> impl Iterator<Item = (&Operation, &[Operation], &Label, f64)> {
        self.table.iter().flat_map(|(parent, row)| {
            row.iter().flat_map(move |(combination, entry)| {
                entry
                    .iter()
                    .map(move |(label, level)| (parent, combination.as_slice(), label, *level))
            })
        })
    }

    /// Edges with a materialized `label` entry, strongest first.
    pub fn ranked_edges(&self, label: &Label) -> Vec<WeightedEdge> {
        let mut edges: Vec<WeightedEdge> = self
            .iter()
            .filter(|(_, _, l, _)| *l == label)
            .map(|(parent, children, _, concentration)| WeightedEdge {
                parent: parent.clone(),
                children: children.to_vec(),
                concentration,
            })
            .collect();
        edges.sort_by(|a, b| b.concentration.total_cmp(&a.concentration));
        edges
    }
}

/// A parent and child combination with its concentration under one label.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedEdge {
    pub parent: Operation,
    pub children: Vec<Operation>,
    pub concentration: f64,
}

impl fmt::Display for WeightedEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} | (", self.concentration)?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{child}")?;
        }
        write!(f, ") -> {}", self.parent)
    }
}

/// Cartesian product of per-position options, in lexicographic order.
fn combinations(options: &[&[Operation]]) -> Vec<Vec<Operation>> {
    options.iter().fold(vec![Vec::new()], |acc, position| {
        acc.iter()
            .flat_map(|prefix| {
                position.iter().map(move |op| {
                    let mut next = prefix.clone();
                    next.push(op.clone());
                    next
                })
            })
            .collect()
    })
}

/// Guard for one round of pheromone updates.
///
/// Derefs to the model; dropping it evaporates exactly once, including
/// when the round is left early through an error or a panic.
pub struct Iteration<'m> {
    model: &'m mut PheromoneModel,
}

impl Deref for Iteration<'_> {
    type Target = PheromoneModel;

    fn deref(&self) -> &Self::Target {
        self.model
    }
}

impl DerefMut for Iteration<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.model
    }
}

impl Drop for Iteration<'_> {
    fn drop(&mut self) {
        self.model.evaporate();
    }
}

/// Builder strategy drawing child combinations from a pheromone model.
#[derive(Debug, Clone)]
pub struct PheromoneSelection<'m> {
    model: &'m PheromoneModel,
    label: Label,
}

impl<'m> PheromoneSelection<'m> {
    pub fn new(model: &'m PheromoneModel, label: Label) -> Self {
        Self { model, label }
    }
}

impl SelectionStrategy for PheromoneSelection<'_> {
    fn select(
        &mut self,
        parent: &Operation,
        candidates: &[Vec<Operation>],
        rng: &mut GpRng,
    ) -> Result<Vec<Operation>, GpError> {
        self.model.select(parent, &self.label, Some(candidates), rng)
    }
}
