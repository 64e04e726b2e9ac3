//! Crop-rotation solver: the exhaustive search for the seed-harvesting order
//! that maximizes total expected value when the "seeds of other colors may
//! upgrade on completing a plot" area modifier is active.
//!
//! * `upgrade`: the tier-shift applied to unfinished plots
//! * `solve_rotation`: the permutation and choice-vector search
//! * `solve_crop_rotation`: per-frame system with an exact-match cache
//!
//! Cost is O(pairs! × 2^pairs_with_secondary × pairs). That is a deliberate
//! choice, not an oversight: the game never presents more than a handful of
//! simultaneously active pairs, and exhaustive search is exact where any
//! heuristic would need a correctness argument. `solve_rotation` is a free
//! function so a branch-and-bound or DP formulation could replace it without
//! touching callers if pair counts ever grow.

use bevy::prelude::*;
use std::collections::HashSet;

use crate::shared::*;
use crate::valuation::{profile_value, seed_profile};

pub struct RotationPlugin;

impl Plugin for RotationPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RotationPlan>()
            .init_resource::<RotationCache>()
            .add_systems(
                Update,
                (clear_rotation_on_area_change, solve_crop_rotation)
                    .chain()
                    .in_set(OverlayStep::SolveRotation),
            );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// One pair as the solver sees it: aggregated profiles plus the entities they
/// came from (for reporting the winning order).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfilePair {
    pub primary: (SeedProfile, Entity),
    pub secondary: Option<(SeedProfile, Entity)>,
}

impl ProfilePair {
    fn key(&self) -> (SeedProfile, Option<SeedProfile>) {
        (self.primary.0, self.secondary.map(|(profile, _)| profile))
    }
}

/// Exact-match cache over the observed seed-composition set. While the set is
/// unchanged the previous `RotationPlan` is reused verbatim and the search
/// never runs.
#[derive(Resource, Debug, Clone, Default)]
pub struct RotationCache {
    pub key: Option<HashSet<(SeedProfile, Option<SeedProfile>)>>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Upgrade transfer rule
// ─────────────────────────────────────────────────────────────────────────────

/// Applies the cross-color upgrade to a not-yet-completed plot after a plot
/// of `completed` color finishes. Identity when the colors already match.
///
/// Mass shifts one tier up by the configured chances; tier 4 absorbs:
/// `t1' = t1(1-c1)`, `t2' = t2(1-c2) + t1·c1`, `t3' = t3(1-c3) + t2·c2`,
/// `t4' = t4 + t3·c3`.
pub fn upgrade(profile: &SeedProfile, completed: SeedColor, chances: &[f64; 3]) -> SeedProfile {
    if profile.color == completed {
        return *profile;
    }

    let [c1, c2, c3] = [
        chances[0] as f32,
        chances[1] as f32,
        chances[2] as f32,
    ];
    let [t1, t2, t3, t4] = profile.tiers;
    SeedProfile {
        color: profile.color,
        tiers: [
            t1 * (1.0 - c1),
            t2 * (1.0 - c2) + t1 * c1,
            t3 * (1.0 - c3) + t2 * c2,
            t4 + t3 * c3,
        ],
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Exhaustive search
// ─────────────────────────────────────────────────────────────────────────────

/// Calls `visit` with every permutation of `0..n`, by fixing one position at
/// a time and swapping each remaining candidate into it.
fn for_each_permutation(n: usize, visit: &mut impl FnMut(&[usize])) {
    fn recurse(items: &mut [usize], start: usize, visit: &mut impl FnMut(&[usize])) {
        if start == items.len() {
            visit(items);
            return;
        }
        for i in start..items.len() {
            items.swap(start, i);
            recurse(items, start + 1, visit);
            items.swap(start, i);
        }
    }

    let mut items: Vec<usize> = (0..n).collect();
    recurse(&mut items, 0, visit);
}

/// Finds the completion order and per-pair plot choices maximizing total
/// realized value.
///
/// For every permutation of the pair list and every binary choice vector over
/// pairs that have a secondary, completions are simulated in order: the
/// chosen plot is valued at its current (possibly upgraded) profile, then
/// every unfinished plot on both sides of later pairs is upgraded by the
/// completed plot's color. Ties keep the earliest-found plan.
pub fn solve_rotation(
    pairs: &[ProfilePair],
    prices: Option<&JuicePrices>,
    settings: &OverlaySettings,
) -> RotationPlan {
    if pairs.is_empty() {
        return RotationPlan::default();
    }

    let chances = settings.rotation_upgrade_chance;
    let mut best_value = f64::NEG_INFINITY;
    let mut best_order: Vec<Entity> = Vec::new();

    for_each_permutation(pairs.len(), &mut |perm| {
        let choice_bits = perm
            .iter()
            .filter(|&&index| pairs[index].secondary.is_some())
            .count();

        for mask in 0u32..(1u32 << choice_bits) {
            let mut working: Vec<(SeedProfile, Option<SeedProfile>)> = pairs
                .iter()
                .map(|pair| (pair.primary.0, pair.secondary.map(|(profile, _)| profile)))
                .collect();

            let mut total = 0.0;
            let mut order = Vec::with_capacity(perm.len());
            let mut bit_cursor = 0;

            for (step, &index) in perm.iter().enumerate() {
                let take_secondary = if pairs[index].secondary.is_some() {
                    let chosen = (mask >> bit_cursor) & 1 == 1;
                    bit_cursor += 1;
                    chosen
                } else {
                    false
                };

                // A set bit always has a secondary by construction of the mask.
                let chosen = if take_secondary {
                    working[index]
                        .1
                        .zip(pairs[index].secondary.map(|(_, entity)| entity))
                } else {
                    None
                };
                let (profile, entity) =
                    chosen.unwrap_or((working[index].0, pairs[index].primary.1));

                total += profile_value(&profile, prices, settings);
                order.push(entity);

                for &later in &perm[step + 1..] {
                    working[later].0 = upgrade(&working[later].0, profile.color, &chances);
                    working[later].1 = working[later]
                        .1
                        .map(|side| upgrade(&side, profile.color, &chances));
                }
            }

            if total > best_value {
                best_value = total;
                best_order = order;
            }
        }
    });

    RotationPlan {
        order: best_order,
        total_value: best_value,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Systems
// ─────────────────────────────────────────────────────────────────────────────

/// Re-derives the rotation plan from the current pairs. Skips the search
/// entirely while the observed seed-composition set is unchanged; clears the
/// plan outright while the area modifier is inactive.
pub fn solve_crop_rotation(
    prices: Res<CurrentPrices>,
    settings: Res<OverlaySettings>,
    modifiers: Res<AreaModifiers>,
    pair_set: Res<PairSet>,
    mut cache: ResMut<RotationCache>,
    mut plan: ResMut<RotationPlan>,
    inventories: Query<&SeedInventory>,
) {
    if !modifiers.cross_color_upgrade {
        if cache.key.is_some() || !plan.order.is_empty() {
            *plan = RotationPlan::default();
            cache.key = None;
        }
        return;
    }

    let profile_for = |entity: Entity| -> SeedProfile {
        match inventories.get(entity) {
            Ok(inventory) => seed_profile(inventory),
            Err(_) => {
                warn!("[Rotation] Paired structure has no seed inventory");
                SeedProfile::default()
            }
        }
    };

    let profile_pairs: Vec<ProfilePair> = pair_set
        .pairs
        .iter()
        .map(|pair| ProfilePair {
            primary: (profile_for(pair.primary), pair.primary),
            secondary: pair
                .secondary
                .map(|(entity, _)| (profile_for(entity), entity)),
        })
        .collect();

    let key: HashSet<(SeedProfile, Option<SeedProfile>)> =
        profile_pairs.iter().map(ProfilePair::key).collect();

    if cache.key.as_ref() == Some(&key) {
        return;
    }

    *plan = solve_rotation(&profile_pairs, prices.snapshot.as_ref(), &settings);
    cache.key = Some(key);
}

pub fn clear_rotation_on_area_change(
    mut events: EventReader<AreaChangeEvent>,
    mut cache: ResMut<RotationCache>,
    mut plan: ResMut<RotationPlan>,
) {
    if events.read().next().is_some() {
        *plan = RotationPlan::default();
        cache.key = None;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
