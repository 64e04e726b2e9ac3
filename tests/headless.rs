//! Headless integration tests for Plotwise.
//!
//! These tests exercise the overlay's ECS pipeline without a window or GPU.
//! They use Bevy's `MinimalPlugins` to tick the app, register only the
//! pure-logic systems (skipping all rendering), and verify that the
//! derive-pairs / solve-rotation / price-store loops work correctly.
//!
//! Run with: `cargo test --test headless`

use bevy::prelude::*;
use bevy::tasks::{futures_lite::future, IoTaskPool};
use plotwise::pairing::{clear_pairs_on_area_change, derive_plot_pairs};
use plotwise::prices::{
    handle_reload_prices, maybe_begin_refresh, poll_price_task, write_cache, PriceBoard,
    PriceCachePath, PriceTaskOutcome,
};
use plotwise::rotation::{clear_rotation_on_area_change, solve_crop_rotation, RotationCache};
use plotwise::shared::*;

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

// ─────────────────────────────────────────────────────────────────────────────
// Test App Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builds a minimal Bevy app with all shared resources and events registered
/// but NO rendering, windowing, or asset loading. Systems must be added
/// per-test depending on what's being exercised.
fn build_test_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);

    // ── Shared Resources (mirrors main.rs + plugins) ─────────────────────
    app.insert_resource(OverlaySettings::default())
        .init_resource::<CurrentPrices>()
        .init_resource::<PairSet>()
        .init_resource::<RotationPlan>()
        .init_resource::<RotationCache>()
        .init_resource::<AreaModifiers>();

    // ── Shared Events (mirrors main.rs) ──────────────────────────────────
    app.add_event::<AreaChangeEvent>().add_event::<ReloadPricesEvent>();

    // ── Frame pipeline ordering (mirrors main.rs) ────────────────────────
    app.configure_sets(
        Update,
        (
            OverlayStep::DerivePairs,
            OverlayStep::SolveRotation,
            OverlayStep::Render,
        )
            .chain(),
    );

    app
}

/// Registers the derive-pairs and solve-rotation halves of the pipeline.
fn add_pipeline_systems(app: &mut App) {
    app.add_systems(
        Update,
        (clear_pairs_on_area_change, derive_plot_pairs)
            .chain()
            .in_set(OverlayStep::DerivePairs),
    );
    app.add_systems(
        Update,
        (clear_rotation_on_area_change, solve_crop_rotation)
            .chain()
            .in_set(OverlayStep::SolveRotation),
    );
}

fn flat_prices() -> JuicePrices {
    JuicePrices {
        purple: 1.0,
        yellow: 1.0,
        blue: 1.0,
        white: 0.0,
    }
}

fn spawn_structure(
    app: &mut App,
    position: Vec2,
    state: StructureState,
    entries: Vec<SeedEntry>,
) -> Entity {
    app.world_mut()
        .spawn((
            HarvestStructure {
                kind: StructureKind::Extractor,
                state,
            },
            SeedInventory::new(entries),
            Transform::from_translation(position.extend(0.0)),
        ))
        .id()
}

fn single_line(color: u8, tier: u8, count: u32) -> Vec<SeedEntry> {
    vec![SeedEntry { color, tier, count }]
}

fn pair_members(pairs: &[PlotPair]) -> HashSet<Entity> {
    pairs
        .iter()
        .flat_map(|pair| std::iter::once(pair.primary).chain(pair.secondary.map(|(e, _)| e)))
        .collect()
}

fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("plotwise_it_{}_{}", std::process::id(), name))
}

// ─────────────────────────────────────────────────────────────────────────────
// Pairing pipeline
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_pairing_partitions_structures() {
    let mut app = build_test_app();
    add_pipeline_systems(&mut app);
    app.world_mut().resource_mut::<CurrentPrices>().snapshot = Some(flat_prices());

    let a = spawn_structure(
        &mut app,
        Vec2::new(0.0, 0.0),
        StructureState::Ready,
        single_line(1, 2, 10),
    );
    let b = spawn_structure(
        &mut app,
        Vec2::new(50.0, 0.0),
        StructureState::Ready,
        single_line(2, 2, 10),
    );
    let stray = spawn_structure(
        &mut app,
        Vec2::new(500.0, 0.0),
        StructureState::Ready,
        single_line(3, 2, 10),
    );

    app.update();

    let pairs = &app.world().resource::<PairSet>().pairs;
    assert_eq!(pairs.len(), 2, "one real pair plus one singleton");
    assert_eq!(pair_members(pairs), HashSet::from([a, b, stray]));

    let stray_pair = pairs
        .iter()
        .find(|pair| pair.primary == stray)
        .expect("the far structure must be its own group");
    assert!(stray_pair.secondary.is_none());

    // Flat prices, 10 tier-2 plants, 5 seeds per plant: 50 each side.
    for pair in pairs {
        assert_eq!(pair.primary_value, 50.0);
    }
}

#[test]
fn test_only_ready_structures_participate() {
    let mut app = build_test_app();
    add_pipeline_systems(&mut app);
    app.world_mut().resource_mut::<CurrentPrices>().snapshot = Some(flat_prices());

    let ready = spawn_structure(
        &mut app,
        Vec2::new(0.0, 0.0),
        StructureState::Ready,
        single_line(1, 2, 10),
    );
    spawn_structure(
        &mut app,
        Vec2::new(30.0, 0.0),
        StructureState::Spent,
        single_line(2, 2, 10),
    );
    spawn_structure(
        &mut app,
        Vec2::new(-30.0, 0.0),
        StructureState::Dormant,
        single_line(3, 2, 10),
    );

    app.update();

    let pairs = &app.world().resource::<PairSet>().pairs;
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].primary, ready);
    assert!(
        pairs[0].secondary.is_none(),
        "inactive neighbors must not pair"
    );
}

#[test]
fn test_pairs_without_prices_value_zero() {
    let mut app = build_test_app();
    add_pipeline_systems(&mut app);

    spawn_structure(
        &mut app,
        Vec2::new(0.0, 0.0),
        StructureState::Ready,
        single_line(1, 2, 10),
    );

    app.update();

    let pairs = &app.world().resource::<PairSet>().pairs;
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0].primary_value, 0.0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Rotation pipeline
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_rotation_plan_covers_every_group() {
    let mut app = build_test_app();
    add_pipeline_systems(&mut app);
    app.world_mut().resource_mut::<CurrentPrices>().snapshot = Some(flat_prices());
    app.world_mut()
        .resource_mut::<AreaModifiers>()
        .cross_color_upgrade = true;

    let spawned: HashSet<Entity> = [
        spawn_structure(
            &mut app,
            Vec2::new(-200.0, 0.0),
            StructureState::Ready,
            single_line(1, 2, 10),
        ),
        spawn_structure(
            &mut app,
            Vec2::new(-160.0, 0.0),
            StructureState::Ready,
            single_line(2, 2, 10),
        ),
        spawn_structure(
            &mut app,
            Vec2::new(200.0, 0.0),
            StructureState::Ready,
            single_line(3, 2, 10),
        ),
        spawn_structure(
            &mut app,
            Vec2::new(240.0, 0.0),
            StructureState::Ready,
            single_line(1, 3, 2),
        ),
    ]
    .into();

    app.update();

    let plan = app.world().resource::<RotationPlan>().clone();
    assert_eq!(
        plan.order.len(),
        2,
        "one completion per pair, not per structure"
    );
    assert!(plan.order.iter().all(|entity| spawned.contains(entity)));
    assert!(plan.total_value > 0.0);
}

#[test]
fn test_rotation_requires_the_area_modifier() {
    let mut app = build_test_app();
    add_pipeline_systems(&mut app);
    app.world_mut().resource_mut::<CurrentPrices>().snapshot = Some(flat_prices());

    spawn_structure(
        &mut app,
        Vec2::new(0.0, 0.0),
        StructureState::Ready,
        single_line(1, 2, 10),
    );

    app.update();
    assert!(
        app.world().resource::<RotationPlan>().order.is_empty(),
        "no modifier, no plan"
    );

    app.world_mut()
        .resource_mut::<AreaModifiers>()
        .cross_color_upgrade = true;
    app.update();
    assert_eq!(app.world().resource::<RotationPlan>().order.len(), 1);

    app.world_mut()
        .resource_mut::<AreaModifiers>()
        .cross_color_upgrade = false;
    app.update();
    assert!(
        app.world().resource::<RotationPlan>().order.is_empty(),
        "toggling the modifier off must clear the plan"
    );
}

#[test]
fn test_rotation_cache_skips_unchanged_compositions() {
    let mut app = build_test_app();
    add_pipeline_systems(&mut app);
    app.world_mut().resource_mut::<CurrentPrices>().snapshot = Some(flat_prices());
    app.world_mut()
        .resource_mut::<AreaModifiers>()
        .cross_color_upgrade = true;

    let purple = spawn_structure(
        &mut app,
        Vec2::new(0.0, 0.0),
        StructureState::Ready,
        single_line(1, 2, 10),
    );
    spawn_structure(
        &mut app,
        Vec2::new(40.0, 0.0),
        StructureState::Ready,
        single_line(2, 2, 10),
    );

    // 10 tier-2 plants at 5 seeds each, unit prices: either side is worth 50.
    app.update();
    assert_eq!(app.world().resource::<RotationPlan>().total_value, 50.0);

    // Prices triple but compositions are identical, so the cached plan
    // (and its now-stale total) survives untouched.
    app.world_mut().resource_mut::<CurrentPrices>().snapshot = Some(JuicePrices {
        purple: 3.0,
        yellow: 3.0,
        blue: 3.0,
        white: 0.0,
    });
    app.update();
    assert_eq!(
        app.world().resource::<RotationPlan>().total_value,
        50.0,
        "unchanged compositions must not trigger a re-solve"
    );

    // A composition change invalidates the cache; the new solve sees the
    // new prices: 20 purple tier-2 plants at 5 seeds and price 3 is 300.
    app.world_mut()
        .entity_mut(purple)
        .insert(SeedInventory::new(single_line(1, 2, 20)));
    app.update();
    assert_eq!(app.world().resource::<RotationPlan>().total_value, 300.0);
}

#[test]
fn test_area_change_clears_derived_state() {
    let mut app = build_test_app();
    add_pipeline_systems(&mut app);
    app.world_mut().resource_mut::<CurrentPrices>().snapshot = Some(flat_prices());
    app.world_mut()
        .resource_mut::<AreaModifiers>()
        .cross_color_upgrade = true;

    let a = spawn_structure(
        &mut app,
        Vec2::new(0.0, 0.0),
        StructureState::Ready,
        single_line(1, 2, 10),
    );
    let b = spawn_structure(
        &mut app,
        Vec2::new(40.0, 0.0),
        StructureState::Ready,
        single_line(2, 2, 10),
    );

    app.update();
    assert!(!app.world().resource::<PairSet>().pairs.is_empty());
    assert!(!app.world().resource::<RotationPlan>().order.is_empty());

    // The host despawns the old zone's structures and announces the change.
    app.world_mut().entity_mut(a).despawn();
    app.world_mut().entity_mut(b).despawn();
    app.world_mut().send_event(AreaChangeEvent);
    app.update();

    assert!(app.world().resource::<PairSet>().pairs.is_empty());
    assert!(app.world().resource::<RotationPlan>().order.is_empty());

    // The price snapshot is keyed to the league, not the zone.
    assert!(app.world().resource::<CurrentPrices>().snapshot.is_some());
}

// ─────────────────────────────────────────────────────────────────────────────
// Price store
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_reload_event_installs_cached_prices() {
    let cache_file = scratch_path("reload.json");
    let expected = JuicePrices {
        purple: 2.0,
        yellow: 4.5,
        blue: 0.5,
        white: 120.0,
    };
    write_cache(&cache_file, &expected).expect("cache write succeeds");

    let mut app = build_test_app();
    app.insert_resource(PriceCachePath(cache_file.clone()))
        .init_resource::<PriceBoard>()
        .add_systems(Update, (handle_reload_prices, poll_price_task).chain());

    app.update();
    assert!(
        app.world().resource::<CurrentPrices>().snapshot.is_none(),
        "nothing loads until a reload is requested"
    );

    app.world_mut().send_event(ReloadPricesEvent);

    // The load runs on the IO pool; give it a few frames to land.
    for _ in 0..200 {
        app.update();
        if app.world().resource::<CurrentPrices>().snapshot.is_some() {
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    assert_eq!(
        app.world().resource::<CurrentPrices>().snapshot,
        Some(expected)
    );
    let _ = std::fs::remove_file(&cache_file);
}

/// Parks a prepared outcome in the in-flight slot and ticks the app until
/// `poll_price_task` has drained it.
fn apply_outcome(app: &mut App, outcome: PriceTaskOutcome) {
    let task = IoTaskPool::get().spawn(async move { outcome });
    app.world_mut().resource_mut::<PriceBoard>().inflight = Some(task);
    for _ in 0..200 {
        app.update();
        if app.world().resource::<PriceBoard>().inflight.is_none() {
            return;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("price task never completed");
}

#[test]
fn test_successful_fetch_restarts_the_refresh_timer() {
    let mut app = build_test_app();
    app.init_resource::<PriceBoard>()
        .add_systems(Update, poll_price_task);

    let fetched = flat_prices();
    apply_outcome(&mut app, PriceTaskOutcome::Fetched(fetched));

    assert_eq!(
        app.world().resource::<CurrentPrices>().snapshot,
        Some(fetched)
    );
    let period = app.world().resource::<OverlaySettings>().refresh_period();
    let board = app.world().resource::<PriceBoard>();
    assert_eq!(board.refresh_timer.duration(), period);
    assert!(
        !board.refresh_timer.finished(),
        "the next refresh must wait out the full period"
    );
}

#[test]
fn test_failed_fetch_waits_for_the_next_interval() {
    let mut app = build_test_app();
    app.init_resource::<PriceBoard>()
        .add_systems(Update, poll_price_task);

    apply_outcome(
        &mut app,
        PriceTaskOutcome::FetchFailed(String::from("connection refused")),
    );

    // The old snapshot state is untouched and the timer holds the retry off
    // until the next scheduled interval.
    assert!(app.world().resource::<CurrentPrices>().snapshot.is_none());
    let period = app.world().resource::<OverlaySettings>().refresh_period();
    let board = app.world().resource::<PriceBoard>();
    assert_eq!(board.refresh_timer.duration(), period);
    assert!(
        !board.refresh_timer.finished(),
        "a failed fetch must not retry before the timer elapses"
    );
}

#[test]
fn test_inflight_refresh_blocks_a_second_one() {
    let mut app = build_test_app();
    app.init_resource::<PriceBoard>()
        .init_resource::<PriceCachePath>()
        .add_systems(Update, maybe_begin_refresh);

    // An empty league makes the would-be refresh branch observable: reaching
    // it restarts the timer with a warning instead of touching the network.
    app.world_mut()
        .resource_mut::<OverlaySettings>()
        .league
        .clear();

    let parked = IoTaskPool::get().spawn(future::pending::<PriceTaskOutcome>());
    app.world_mut().resource_mut::<PriceBoard>().inflight = Some(parked);

    // Timer is due (default zero duration), but the occupied slot must win.
    for _ in 0..3 {
        app.update();
    }
    {
        let board = app.world().resource::<PriceBoard>();
        assert!(board.inflight.is_some(), "the parked task must keep its slot");
        assert!(
            board.refresh_timer.finished(),
            "no refresh attempt may start while one is in flight"
        );
    }

    // Once the slot frees up, the due timer goes through the refresh branch.
    app.world_mut().resource_mut::<PriceBoard>().inflight = None;
    app.update();
    let period = app.world().resource::<OverlaySettings>().refresh_period();
    let board = app.world().resource::<PriceBoard>();
    assert_eq!(board.refresh_timer.duration(), period);
    assert!(!board.refresh_timer.finished());
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_shipped_settings_file_parses_to_defaults() {
    let settings =
        OverlaySettings::load(OverlaySettings::DEFAULT_PATH).expect("shipped settings parse");
    assert_eq!(settings.league, "Standard");
    assert_eq!(settings.refresh_period_minutes, 15);
    assert_eq!(settings.seeds_per_plant, [0.0, 5.0, 100.0, 500.0]);
    assert_eq!(settings.rotation_upgrade_chance, [0.33, 0.33, 0.33]);
}
