//! Valuation engine: expected juice value of a structure's seed inventory,
//! or of an abstract seed composition, at current market prices.
//!
//! Pure functions, no ECS. Anomalies (unknown color/tier tags, absent price
//! snapshot) are logged and degrade to zero value; nothing here fails.

use bevy::prelude::*;

use crate::shared::*;

// ─────────────────────────────────────────────────────────────────────────────
// Per-plant pricing formula
// ─────────────────────────────────────────────────────────────────────────────

/// Expected value of one plant of the given tier whose color trades at
/// `color_price`. Tier 4 also pays out the white-seed bonus. Unknown tiers
/// log an anomaly and contribute nothing.
pub fn plant_yield_value(
    tier: u8,
    color_price: f64,
    prices: &JuicePrices,
    settings: &OverlaySettings,
) -> f64 {
    match tier {
        1 | 2 | 3 => settings.seeds_per_plant[usize::from(tier) - 1] * color_price,
        4 => {
            settings.seeds_per_plant[3] * color_price
                + settings.t4_white_seed_chance * prices.white
        }
        unknown => {
            warn!("[Valuation] Seed had unknown tier {}", unknown);
            0.0
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Structure valuation (raw inventory entries)
// ─────────────────────────────────────────────────────────────────────────────

/// Total expected value of a structure's seed inventory.
///
/// Returns 0 with a log when no price snapshot is loaded yet, and 0 with a
/// log when any entry carries an unresolvable color tag (the host failed to
/// resolve the seed's definition, so the whole inventory is suspect).
pub fn structure_value(
    inventory: &SeedInventory,
    prices: Option<&JuicePrices>,
    settings: &OverlaySettings,
) -> f64 {
    let Some(prices) = prices else {
        info!("[Valuation] Prices are still not loaded, unable to calculate values");
        return 0.0;
    };

    if inventory
        .entries
        .iter()
        .any(|entry| SeedColor::from_raw(entry.color).is_none())
    {
        warn!("[Valuation] Some seeds have no resolvable definition");
        return 0.0;
    }

    inventory
        .entries
        .iter()
        .map(|entry| match SeedColor::from_raw(entry.color) {
            Some(color) => {
                plant_yield_value(entry.tier, color.price_in(prices), prices, settings)
                    * f64::from(entry.count)
            }
            None => 0.0,
        })
        .sum()
}

// ─────────────────────────────────────────────────────────────────────────────
// Composition valuation (aggregated profile)
// ─────────────────────────────────────────────────────────────────────────────

/// The aggregated-composition overload used by the rotation solver, where
/// plots are abstract profiles rather than live inventories. The profile's
/// single resolved color prices every tier.
pub fn profile_value(
    profile: &SeedProfile,
    prices: Option<&JuicePrices>,
    settings: &OverlaySettings,
) -> f64 {
    let Some(prices) = prices else {
        info!("[Valuation] Prices are still not loaded, unable to calculate values");
        return 0.0;
    };

    let color_price = profile.color.price_in(prices);
    profile
        .tiers
        .iter()
        .enumerate()
        .map(|(index, &count)| {
            plant_yield_value(index as u8 + 1, color_price, prices, settings) * f64::from(count)
        })
        .sum()
}

// ─────────────────────────────────────────────────────────────────────────────
// Aggregation: inventory → SeedProfile
// ─────────────────────────────────────────────────────────────────────────────

/// Aggregates a seed inventory into a `SeedProfile`: dominant color by total
/// seed count, plus per-tier count sums.
///
/// Any entry with an unresolvable color or tier collapses the whole profile
/// to the default (Purple, all zeros), mirroring the zero-value anomaly
/// policy above. An empty inventory yields the default profile. Dominant-color
/// ties break toward the higher color tag (implementation-defined, like the
/// pairing order).
pub fn seed_profile(inventory: &SeedInventory) -> SeedProfile {
    if inventory.entries.is_empty() {
        return SeedProfile::default();
    }

    let mut per_color = [0u32; 3];
    let mut tiers = [0.0f32; 4];

    for entry in &inventory.entries {
        let Some(color) = SeedColor::from_raw(entry.color) else {
            warn!("[Valuation] Some seeds have no resolvable definition");
            return SeedProfile::default();
        };
        if !(1..=4).contains(&entry.tier) {
            warn!("[Valuation] Seed had unknown tier {}", entry.tier);
            return SeedProfile::default();
        }
        per_color[color as usize - 1] += entry.count;
        tiers[usize::from(entry.tier) - 1] += entry.count as f32;
    }

    let dominant = [SeedColor::Purple, SeedColor::Yellow, SeedColor::Blue]
        .into_iter()
        .max_by_key(|&color| per_color[color as usize - 1])
        .unwrap_or(SeedColor::Purple);

    SeedProfile {
        color: dominant,
        tiers,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
