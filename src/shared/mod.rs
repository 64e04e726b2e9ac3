//! Shared components, resources, and events for Plotwise.
//!
//! This is the type contract. Every domain plugin imports from here.
//! No domain imports from any other domain directly.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::time::Duration;

// ═══════════════════════════════════════════════════════════════════════
// SEEDS
// ═══════════════════════════════════════════════════════════════════════

/// The three harvestable juice colors. Discriminants match the raw type
/// tags the host reports on seed entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SeedColor {
    Purple = 1,
    Yellow = 2,
    Blue = 3,
}

impl SeedColor {
    /// Resolves a raw host type tag. `None` for anything outside 1..=3;
    /// callers treat that as a data-quality anomaly (log, value 0).
    pub fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(SeedColor::Purple),
            2 => Some(SeedColor::Yellow),
            3 => Some(SeedColor::Blue),
            _ => None,
        }
    }

    pub fn price_in(self, prices: &JuicePrices) -> f64 {
        match self {
            SeedColor::Purple => prices.purple,
            SeedColor::Yellow => prices.yellow,
            SeedColor::Blue => prices.blue,
        }
    }
}

/// One line of a structure's seed inventory, exactly as the host reports it.
/// `color` and `tier` stay raw here; resolution (and anomaly logging) happens
/// at the valuation/aggregation sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedEntry {
    pub color: u8,
    pub tier: u8,
    pub count: u32,
}

/// Seed inventory attached to a harvest structure. Owned by the host
/// simulation; the overlay only ever reads it.
#[derive(Component, Debug, Clone, Default)]
pub struct SeedInventory {
    pub entries: Vec<SeedEntry>,
}

impl SeedInventory {
    pub fn new(entries: Vec<SeedEntry>) -> Self {
        Self { entries }
    }
}

/// Aggregated seed composition of one plot: the dominant color plus float
/// plant counts per tier. Counts are floats because crop-rotation upgrades
/// shift fractional expected mass between tiers.
///
/// Equality and hashing are value-based (tier counts compared bit-for-bit);
/// this type is the rotation solver's cache/change-detection key. Counts are
/// products of non-negative inputs and never NaN.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedProfile {
    pub color: SeedColor,
    pub tiers: [f32; 4],
}

impl Default for SeedProfile {
    fn default() -> Self {
        Self {
            color: SeedColor::Purple,
            tiers: [0.0; 4],
        }
    }
}

impl Eq for SeedProfile {}

impl Hash for SeedProfile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.color.hash(state);
        for count in &self.tiers {
            count.to_bits().hash(state);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// STRUCTURES
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureKind {
    Extractor,
    Irrigator,
}

/// The small activity/color state tag on a structure. Only `Ready`
/// structures participate in pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureState {
    Dormant,
    Ready,
    Spent,
}

/// A harvest structure in the world. The host spawns and mutates these;
/// the overlay holds only per-frame references.
#[derive(Component, Debug, Clone)]
pub struct HarvestStructure {
    pub kind: StructureKind,
    pub state: StructureState,
}

impl HarvestStructure {
    /// "Ready to harvest / has a color assigned": the pairing predicate.
    pub fn is_active(&self) -> bool {
        self.state == StructureState::Ready
    }
}

/// Two nearby structures forming a mutually-exclusive harvest choice, or a
/// lone structure with no neighbor within `PAIR_DISTANCE`. Values are
/// precomputed at pairing time from the current price snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotPair {
    pub primary: Entity,
    pub primary_value: f64,
    pub secondary: Option<(Entity, f64)>,
}

/// The pairs derived this frame. Rebuilt every update, reset on area change.
#[derive(Resource, Debug, Clone, Default)]
pub struct PairSet {
    pub pairs: Vec<PlotPair>,
}

// ═══════════════════════════════════════════════════════════════════════
// PRICES
// ═══════════════════════════════════════════════════════════════════════

/// One full market snapshot: unit prices for the three seed colors plus the
/// white bonus juice paid out by tier-4 plants. Immutable once built;
/// replaced wholesale on refresh, never patched field-by-field.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct JuicePrices {
    pub purple: f64,
    pub yellow: f64,
    pub blue: f64,
    pub white: f64,
}

/// The latest successfully loaded or fetched snapshot, or `None` before the
/// first load completes. Written only by the prices domain; everything else
/// reads. The frame loop always sees either the previous snapshot or a fully
/// replaced newer one.
#[derive(Resource, Debug, Clone, Default)]
pub struct CurrentPrices {
    pub snapshot: Option<JuicePrices>,
}

// ═══════════════════════════════════════════════════════════════════════
// ROTATION
// ═══════════════════════════════════════════════════════════════════════

/// The recommended harvest order under the crop-rotation modifier, with the
/// total expected value realized by following it. Empty order = no plan.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct RotationPlan {
    pub order: Vec<Entity>,
    pub total_value: f64,
}

/// Host-reported game-area modifiers consumed by the overlay. The rotation
/// solver only runs while `cross_color_upgrade` is active.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct AreaModifiers {
    pub cross_color_upgrade: bool,
}

// ═══════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════

/// Fired by the host on any zone transition. All derived overlay state
/// (pairs, plan, rotation cache) is discarded; the price snapshot survives.
#[derive(Event, Debug, Clone)]
pub struct AreaChangeEvent;

/// Fired when the user asks for a price reload (the settings-panel button in
/// the original overlay; a keybind in the demo host). Re-runs the disk-load
/// path.
#[derive(Event, Debug, Clone)]
pub struct ReloadPricesEvent;

// ═══════════════════════════════════════════════════════════════════════
// SYSTEM ORDERING
// ═══════════════════════════════════════════════════════════════════════

/// Per-frame pipeline: pairs are derived first, the rotation plan second,
/// labels last. Configured with `.chain()` in `main.rs`.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayStep {
    DerivePairs,
    SolveRotation,
    Render,
}

// ═══════════════════════════════════════════════════════════════════════
// SETTINGS
// ═══════════════════════════════════════════════════════════════════════

/// User-facing overlay configuration, loaded from `assets/overlay_settings.ron`.
/// Every field has a default so a partial (or missing) file still works.
#[derive(Resource, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    /// League name sent with every pricing query. Empty = refresh refused.
    pub league: String,
    /// Minutes between market refreshes, clamped to 5..=60.
    pub refresh_period_minutes: u32,
    /// Expected seed yield per plant, tiers 1-4.
    pub seeds_per_plant: [f64; 4],
    /// Chance a tier-4 plant also drops a white seed.
    pub t4_white_seed_chance: f64,
    /// Crop-rotation upgrade chances: tier 1→2, 2→3, 3→4.
    pub rotation_upgrade_chance: [f64; 3],
    /// Label colors as sRGB triples.
    pub good_color: (f32, f32, f32),
    pub neutral_color: (f32, f32, f32),
    pub bad_color: (f32, f32, f32),
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            league: String::from("Standard"),
            refresh_period_minutes: 15,
            seeds_per_plant: [0.0, 5.0, 100.0, 500.0],
            t4_white_seed_chance: 0.1,
            rotation_upgrade_chance: [0.33, 0.33, 0.33],
            good_color: (0.2, 0.85, 0.2),
            neutral_color: (0.9, 0.85, 0.2),
            bad_color: (0.9, 0.2, 0.2),
        }
    }
}

impl OverlaySettings {
    pub const DEFAULT_PATH: &'static str = "assets/overlay_settings.ron";

    /// Reads settings from `path`, clamping bounded fields afterward.
    pub fn load(path: &str) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Read failed for {}: {}", path, e))?;
        let mut settings: OverlaySettings =
            ron::from_str(&text).map_err(|e| format!("Parse failed for {}: {}", path, e))?;
        settings.clamp_bounds();
        Ok(settings)
    }

    /// Loads from the default path, falling back to defaults with a warning.
    /// A missing file is normal on first run.
    pub fn load_or_default() -> Self {
        match Self::load(Self::DEFAULT_PATH) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("[Settings] {}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Enforces the bounds the original settings sliders enforced. Tiers 1-3
    /// cap at 300 seeds per plant; only tier 4 goes to 900.
    pub fn clamp_bounds(&mut self) {
        self.refresh_period_minutes = self.refresh_period_minutes.clamp(5, 60);
        for seeds in &mut self.seeds_per_plant[..3] {
            *seeds = seeds.clamp(0.0, 300.0);
        }
        self.seeds_per_plant[3] = self.seeds_per_plant[3].clamp(0.0, 900.0);
        self.t4_white_seed_chance = self.t4_white_seed_chance.clamp(0.0, 1.0);
        for chance in &mut self.rotation_upgrade_chance {
            *chance = chance.clamp(0.0, 1.0);
        }
    }

    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh_period_minutes) * 60)
    }
}

/// Converts a settings color triple into a Bevy color.
pub fn settings_color(rgb: (f32, f32, f32)) -> Color {
    Color::srgb(rgb.0, rgb.1, rgb.2)
}

// ═══════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════

/// Maximum distance (world units) at which two structures form a pair.
pub const PAIR_DISTANCE: f32 = 85.0;

pub const SCREEN_WIDTH: f32 = 960.0;
pub const SCREEN_HEIGHT: f32 = 540.0;

// ═══════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn seed_color_resolves_known_tags_only() {
        assert_eq!(SeedColor::from_raw(1), Some(SeedColor::Purple));
        assert_eq!(SeedColor::from_raw(2), Some(SeedColor::Yellow));
        assert_eq!(SeedColor::from_raw(3), Some(SeedColor::Blue));
        assert_eq!(SeedColor::from_raw(0), None);
        assert_eq!(SeedColor::from_raw(4), None);
    }

    #[test]
    fn seed_profile_equality_is_value_based() {
        let a = SeedProfile {
            color: SeedColor::Yellow,
            tiers: [1.0, 2.5, 0.0, 7.0],
        };
        let b = SeedProfile {
            color: SeedColor::Yellow,
            tiers: [1.0, 2.5, 0.0, 7.0],
        };
        let c = SeedProfile {
            color: SeedColor::Yellow,
            tiers: [1.0, 2.5, 0.0, 7.1],
        };
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b), "equal profiles must hash identically");
        assert!(!set.contains(&c));
    }

    #[test]
    fn settings_clamp_respects_slider_bounds() {
        let mut settings = OverlaySettings {
            refresh_period_minutes: 2,
            seeds_per_plant: [400.0, -5.0, 1000.0, 1200.0],
            t4_white_seed_chance: 3.0,
            rotation_upgrade_chance: [-0.5, 0.33, 1.5],
            ..Default::default()
        };
        settings.clamp_bounds();
        assert_eq!(settings.refresh_period_minutes, 5);
        assert_eq!(
            settings.seeds_per_plant,
            [300.0, 0.0, 300.0, 900.0],
            "tiers 1-3 cap at 300, tier 4 at 900"
        );
        assert_eq!(settings.t4_white_seed_chance, 1.0);
        assert_eq!(settings.rotation_upgrade_chance, [0.0, 0.33, 1.0]);
    }
}
