mod shared;
mod prices;
mod valuation;
mod pairing;
mod rotation;
mod overlay;
mod demo;

use bevy::prelude::*;
use bevy::window::{PresentMode, WindowResolution};

use shared::*;

fn main() {
    App::new()
        .add_plugins(
            DefaultPlugins
                .set(WindowPlugin {
                    primary_window: Some(Window {
                        title: "Plotwise".into(),
                        resolution: WindowResolution::new(SCREEN_WIDTH, SCREEN_HEIGHT),
                        present_mode: PresentMode::AutoVsync,
                        resizable: true,
                        ..default()
                    }),
                    ..default()
                })
                .set(ImagePlugin::default_nearest()),
        )
        // Settings load once at startup; edits require a restart.
        .insert_resource(OverlaySettings::load_or_default())
        // Shared resources
        .init_resource::<AreaModifiers>()
        // Events
        .add_event::<AreaChangeEvent>()
        .add_event::<ReloadPricesEvent>()
        // Frame pipeline ordering
        .configure_sets(
            Update,
            (
                OverlayStep::DerivePairs,
                OverlayStep::SolveRotation,
                OverlayStep::Render,
            )
                .chain(),
        )
        // Domain plugins
        .add_plugins(prices::PricePlugin)
        .add_plugins(pairing::PairingPlugin)
        .add_plugins(rotation::RotationPlugin)
        .add_plugins(overlay::OverlayPlugin)
        // Demo host
        .add_plugins(demo::DemoPlugin)
        .run();
}
