//! Structure pairing: groups active harvest structures into singleton-or-pair
//! choice groups by greedy nearest-neighbor matching.
//!
//! * `pair_structures`: the pure matcher
//! * `derive_plot_pairs`: per-frame system rebuilding `PairSet`
//! * `clear_pairs_on_area_change`: zone transitions discard derived pairs

use bevy::prelude::*;

use crate::shared::*;
use crate::valuation::structure_value;

pub struct PairingPlugin;

impl Plugin for PairingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<PairSet>().add_systems(
            Update,
            (clear_pairs_on_area_change, derive_plot_pairs)
                .chain()
                .in_set(OverlayStep::DerivePairs),
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Greedy nearest-neighbor matching
// ─────────────────────────────────────────────────────────────────────────────

/// Pairs each structure with its nearest unpaired neighbor within
/// `PAIR_DISTANCE`, emitting a singleton when none is close enough.
///
/// This is greedy matching, not minimum-weight perfect matching: the result
/// depends on processing order, which is the (arbitrary) order of `items`.
/// Callers must not rely on any determinism beyond "consistent within one
/// call".
pub fn pair_structures(mut items: Vec<(Entity, Vec2, f64)>) -> Vec<PlotPair> {
    let mut pairs = Vec::with_capacity(items.len());

    while let Some((entity, position, value)) = items.pop() {
        let nearest = items
            .iter()
            .enumerate()
            .map(|(index, &(_, other_position, _))| (index, position.distance(other_position)))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match nearest {
            Some((index, distance)) if distance <= PAIR_DISTANCE => {
                let (neighbor, _, neighbor_value) = items.swap_remove(index);
                pairs.push(PlotPair {
                    primary: entity,
                    primary_value: value,
                    secondary: Some((neighbor, neighbor_value)),
                });
            }
            _ => pairs.push(PlotPair {
                primary: entity,
                primary_value: value,
                secondary: None,
            }),
        }
    }

    pairs
}

// ─────────────────────────────────────────────────────────────────────────────
// Systems
// ─────────────────────────────────────────────────────────────────────────────

/// Rebuilds `PairSet` every frame from the currently active structures,
/// valuing each against the current price snapshot.
pub fn derive_plot_pairs(
    prices: Res<CurrentPrices>,
    settings: Res<OverlaySettings>,
    mut pair_set: ResMut<PairSet>,
    structures: Query<(Entity, &Transform, &HarvestStructure, &SeedInventory)>,
) {
    let items: Vec<(Entity, Vec2, f64)> = structures
        .iter()
        .filter(|(_, _, structure, _)| structure.is_active())
        .map(|(entity, transform, _, inventory)| {
            (
                entity,
                transform.translation.truncate(),
                structure_value(inventory, prices.snapshot.as_ref(), &settings),
            )
        })
        .collect();

    pair_set.pairs = pair_structures(items);
}

pub fn clear_pairs_on_area_change(
    mut events: EventReader<AreaChangeEvent>,
    mut pair_set: ResMut<PairSet>,
) {
    if events.read().next().is_some() {
        pair_set.pairs.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
