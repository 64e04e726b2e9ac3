//! Price store: owns the market snapshot, the on-disk cache, and the
//! asynchronous refresh cycle.
//!
//! One task slot (`PriceBoard::inflight`) serves both the disk load and the
//! network refresh, so at most one of either is ever running. The check and
//! the set both happen on the frame-loop thread; the task hands its outcome
//! back as a future result, and the frame loop installs the snapshot, so
//! readers only ever see a previous snapshot or a fully replaced new one.

use bevy::prelude::*;
use bevy::tasks::futures_lite::future;
use bevy::tasks::{block_on, IoTaskPool, Task};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::shared::*;

pub mod api;

pub struct PricePlugin;

impl Plugin for PricePlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CurrentPrices>()
            .init_resource::<PriceBoard>()
            .init_resource::<PriceCachePath>()
            .add_systems(Startup, begin_cache_load)
            .add_systems(
                Update,
                (handle_reload_prices, poll_price_task, maybe_begin_refresh).chain(),
            );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resources
// ─────────────────────────────────────────────────────────────────────────────

/// Where the price cache lives. Overridable so tests can point it at a
/// scratch directory.
#[derive(Resource, Debug, Clone)]
pub struct PriceCachePath(pub PathBuf);

impl Default for PriceCachePath {
    fn default() -> Self {
        Self(PathBuf::from("assets/price_cache.json"))
    }
}

/// What a background price task reports back to the frame loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PriceTaskOutcome {
    /// Cache file read; `fresh` means its mtime was within the refresh
    /// period, which suppresses the immediate first fetch.
    Loaded { prices: JuicePrices, fresh: bool },
    CacheMissing,
    LoadFailed(String),
    Fetched(JuicePrices),
    FetchFailed(String),
}

/// Price-store bookkeeping. The snapshot itself lives in the shared
/// `CurrentPrices` resource; this holds the single in-flight task slot and
/// the refresh timer.
#[derive(Resource, Default)]
pub struct PriceBoard {
    pub inflight: Option<Task<PriceTaskOutcome>>,
    /// One-shot; finished means a refresh is due. The default zero-duration
    /// timer is born finished, so the first frame triggers a fetch unless a
    /// fresh cache load resets it first.
    pub refresh_timer: Timer,
}

impl PriceBoard {
    fn restart_refresh_timer(&mut self, settings: &OverlaySettings) {
        self.refresh_timer = Timer::new(settings.refresh_period(), TimerMode::Once);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache file I/O
// ─────────────────────────────────────────────────────────────────────────────

/// Reads the cache file and judges its freshness against `refresh_period`.
pub fn read_cache(path: &Path, refresh_period: Duration) -> PriceTaskOutcome {
    if !path.exists() {
        return PriceTaskOutcome::CacheMissing;
    }

    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            return PriceTaskOutcome::LoadFailed(format!(
                "Read failed for {}: {}",
                path.display(),
                e
            ))
        }
    };
    let prices: JuicePrices = match serde_json::from_str(&text) {
        Ok(prices) => prices,
        Err(e) => {
            return PriceTaskOutcome::LoadFailed(format!(
                "Parse failed for {}: {}",
                path.display(),
                e
            ))
        }
    };

    let fresh = fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age < refresh_period)
        .unwrap_or(false);

    PriceTaskOutcome::Loaded { prices, fresh }
}

/// Persists a snapshot. Written to a temp file first, then renamed for
/// atomicity.
pub fn write_cache(path: &Path, prices: &JuicePrices) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Could not create {}: {}", parent.display(), e))?;
        }
    }

    let json = serde_json::to_string_pretty(prices)
        .map_err(|e| format!("Serialization failed: {}", e))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &json)
        .map_err(|e| format!("Write failed for {}: {}", tmp_path.display(), e))?;
    fs::rename(&tmp_path, path).map_err(|e| format!("Rename failed: {}", e))?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Systems
// ─────────────────────────────────────────────────────────────────────────────

/// Startup: kick off the disk load.
pub fn begin_cache_load(
    mut board: ResMut<PriceBoard>,
    cache_path: Res<PriceCachePath>,
    settings: Res<OverlaySettings>,
) {
    spawn_cache_load(&mut board, &cache_path, &settings);
}

/// The reload control surface: re-runs the disk-load path on request. Any
/// task already in flight is dropped and superseded.
pub fn handle_reload_prices(
    mut events: EventReader<ReloadPricesEvent>,
    mut board: ResMut<PriceBoard>,
    cache_path: Res<PriceCachePath>,
    settings: Res<OverlaySettings>,
) {
    if events.read().next().is_some() {
        info!("[Prices] Reloading price data from disk");
        spawn_cache_load(&mut board, &cache_path, &settings);
    }
}

fn spawn_cache_load(board: &mut PriceBoard, cache_path: &PriceCachePath, settings: &OverlaySettings) {
    let path = cache_path.0.clone();
    let refresh_period = settings.refresh_period();
    let task = IoTaskPool::get().spawn(async move { read_cache(&path, refresh_period) });
    board.inflight = Some(task);
}

/// Drains the in-flight task once it completes and applies its outcome. The
/// refresh timer restarts on every fetch completion, success or failure, so
/// a failing endpoint is retried once per period rather than every frame.
pub fn poll_price_task(
    mut board: ResMut<PriceBoard>,
    mut prices: ResMut<CurrentPrices>,
    settings: Res<OverlaySettings>,
) {
    let Some(task) = board.inflight.as_mut() else {
        return;
    };
    let Some(outcome) = block_on(future::poll_once(task)) else {
        return;
    };
    board.inflight = None;

    match outcome {
        PriceTaskOutcome::Loaded {
            prices: snapshot,
            fresh,
        } => {
            info!("[Prices] Price data loaded from disk (fresh: {})", fresh);
            prices.snapshot = Some(snapshot);
            if fresh {
                board.restart_refresh_timer(&settings);
            }
        }
        PriceTaskOutcome::CacheMissing => {
            info!("[Prices] Cached price data doesn't exist");
        }
        PriceTaskOutcome::LoadFailed(e) => {
            warn!("[Prices] {}", e);
        }
        PriceTaskOutcome::Fetched(snapshot) => {
            info!("[Prices] Market data update complete");
            prices.snapshot = Some(snapshot);
            board.restart_refresh_timer(&settings);
        }
        PriceTaskOutcome::FetchFailed(e) => {
            warn!("[Prices] {}", e);
            board.restart_refresh_timer(&settings);
        }
    }
}

/// Lazily starts a market refresh once the timer elapses and nothing else is
/// in flight. An empty league is a configuration error: logged, refresh
/// skipped, timer restarted so the log doesn't repeat every frame.
pub fn maybe_begin_refresh(
    time: Res<Time>,
    mut board: ResMut<PriceBoard>,
    settings: Res<OverlaySettings>,
    cache_path: Res<PriceCachePath>,
) {
    board.refresh_timer.tick(time.delta());
    if !board.refresh_timer.finished() || board.inflight.is_some() {
        return;
    }

    if settings.league.trim().is_empty() {
        warn!("[Prices] Please configure the league before prices can refresh");
        board.restart_refresh_timer(&settings);
        return;
    }

    info!("[Prices] Starting market data update");
    let league = settings.league.clone();
    let path = cache_path.0.clone();
    let task = IoTaskPool::get().spawn(async move {
        match api::fetch_prices(&league) {
            Ok(snapshot) => {
                if let Err(e) = write_cache(&path, &snapshot) {
                    warn!("[Prices] {}", e);
                }
                PriceTaskOutcome::Fetched(snapshot)
            }
            Err(e) => PriceTaskOutcome::FetchFailed(e),
        }
    });
    board.inflight = Some(task);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
