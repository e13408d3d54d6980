//! Structural genetic operators: subtree mutation and subtree crossover.

use crate::error::GpError;
use crate::rng::GpRng;
use crate::typing::{OperationSet, Type};

use super::analysis::{NodeLocation, StructuralInfo, analyze};
use super::builder::{TreeBuilder, UniformSelection};
use super::node::Tree;

/// Which argument of [`crossover`] received the graft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    First,
    Second,
}

/// Replace a random non-root subtree with a freshly built one of the same type.
///
/// The type is drawn uniformly among the types present, then a location of
/// that type. Trees without non-root nodes are left unchanged.
pub fn mutate(
    tree: &mut Tree,
    builder: &TreeBuilder<'_>,
    allowed: Option<&OperationSet>,
    rng: &mut GpRng,
) -> Result<(), GpError> {
    let info = analyze(tree);
    let Some((ty, location)) = pick_location(&info, rng) else {
        return Ok(());
    };
    let fresh = builder.build(ty, allowed, &mut UniformSelection, rng)?;
    tree.replace(&info.path(&location), fresh.into_root());
    Ok(())
}

/// Graft a copy of a donor subtree into a recipient at a slot of the same type.
///
/// With `second` present, a coin flip decides which tree receives the graft;
/// the donor is never modified. Without it the tree crosses with itself.
/// Fails with [`GpError::UnsatisfiableType`] when the trees share no
/// non-root type, in which case neither tree changes.
pub fn crossover(
    first: &mut Tree,
    second: Option<&mut Tree>,
    rng: &mut GpRng,
) -> Result<Recipient, GpError> {
    let Some(second) = second else {
        let info = analyze(first);
        let (ty, target) = pick_location(&info, rng).ok_or_else(incompatible)?;
        let donor = pick(&info.nodes_by_type[&ty], rng);
        let graft = first.node_at(&info.path(donor)).cloned();
        if let Some(graft) = graft {
            first.replace(&info.path(&target), graft);
        }
        return Ok(Recipient::First);
    };

    let (recipient, donor, side) = if rng.unit() < 0.5 {
        (first, &*second, Recipient::First)
    } else {
        (second, &*first, Recipient::Second)
    };

    let recipient_info = analyze(recipient);
    let donor_info = analyze(donor);
    let shared: Vec<&Type> = recipient_info
        .nodes_by_type
        .keys()
        .filter(|ty| donor_info.nodes_by_type.contains_key(*ty))
        .collect();
    if shared.is_empty() {
        log::debug!("Crossover found no shared type between {recipient} and {donor}");
        return Err(incompatible());
    }

    let ty = shared[rng.index(shared.len())];
    let target = pick(&recipient_info.nodes_by_type[ty], rng);
    let source = pick(&donor_info.nodes_by_type[ty], rng);
    if let Some(graft) = donor.node_at(&donor_info.path(source)) {
        recipient.replace(&recipient_info.path(target), graft.clone());
    }
    Ok(side)
}

fn incompatible() -> GpError {
    GpError::UnsatisfiableType("Trees are not compatible".to_owned())
}

fn pick<'a>(locations: &'a [NodeLocation], rng: &mut GpRng) -> &'a NodeLocation {
    &locations[rng.index(locations.len())]
}

/// Uniform type among those present, then a uniform location of that type.
fn pick_location(info: &StructuralInfo, rng: &mut GpRng) -> Option<(Type, NodeLocation)> {
    if info.nodes_by_type.is_empty() {
        return None;
    }
    let (ty, locations) = info
        .nodes_by_type
        .iter()
        .nth(rng.index(info.nodes_by_type.len()))?;
    Some((ty.clone(), *pick(locations, rng)))
}
