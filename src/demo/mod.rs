//! Demo host: a stand-in for the game providing structures for the overlay
//! to annotate. Spawns a randomized field of harvest structures with seed
//! inventories and exposes keybinds for the host-side events the overlay
//! reacts to.
//!
//! Keys:
//!   R   regenerate the field (fires an area change)
//!   T   toggle the crop-rotation area modifier
//!   F5  reload prices from disk

use bevy::prelude::*;
use rand::Rng;

use crate::shared::*;

pub struct DemoPlugin;

impl Plugin for DemoPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, (spawn_camera, spawn_field))
            .add_systems(Update, demo_keybinds.before(OverlayStep::DerivePairs));
    }
}

/// Marks entities owned by the demo host so regeneration can sweep them.
#[derive(Component)]
pub struct DemoStructure;

const STRUCTURE_SIZE: Vec2 = Vec2::new(18.0, 18.0);
const PAIR_CLUSTERS: usize = 4;
const STRAY_STRUCTURES: usize = 2;

pub fn spawn_camera(mut commands: Commands) {
    commands.spawn(Camera2d);
}

fn sprite_color(kind: StructureKind) -> Color {
    match kind {
        StructureKind::Extractor => Color::srgb(0.55, 0.3, 0.7),
        StructureKind::Irrigator => Color::srgb(0.3, 0.5, 0.75),
    }
}

fn random_inventory(rng: &mut impl Rng) -> SeedInventory {
    let color = rng.gen_range(1..=3u8);
    let mut entries = Vec::new();
    for tier in 1..=4u8 {
        let count = match tier {
            1 => rng.gen_range(8..=23),
            2 => rng.gen_range(0..=6),
            3 => rng.gen_range(0..=2),
            _ => rng.gen_range(0..=1),
        };
        if count > 0 {
            entries.push(SeedEntry { color, tier, count });
        }
    }
    // The occasional off-color minority line, as real plots have.
    if rng.gen_bool(0.3) {
        entries.push(SeedEntry {
            color: 1 + (color % 3),
            tier: 1,
            count: rng.gen_range(1..=4),
        });
    }
    SeedInventory::new(entries)
}

fn spawn_structure(commands: &mut Commands, rng: &mut impl Rng, position: Vec2) {
    let kind = if rng.gen_bool(0.5) {
        StructureKind::Extractor
    } else {
        StructureKind::Irrigator
    };
    commands.spawn((
        DemoStructure,
        HarvestStructure {
            kind,
            state: StructureState::Ready,
        },
        random_inventory(rng),
        Sprite::from_color(sprite_color(kind), STRUCTURE_SIZE),
        Transform::from_translation(position.extend(0.0)),
    ));
}

/// Lays out clustered pairs (within pairing range of each other) plus a few
/// strays far from everything.
pub fn spawn_field(mut commands: Commands) {
    let mut rng = rand::thread_rng();

    let half_w = SCREEN_WIDTH / 2.0 - 80.0;
    let half_h = SCREEN_HEIGHT / 2.0 - 80.0;

    for i in 0..PAIR_CLUSTERS {
        // Spread anchors across columns so clusters don't overlap.
        let anchor = Vec2::new(
            -half_w + (i as f32 + 0.5) * (2.0 * half_w / PAIR_CLUSTERS as f32),
            rng.gen_range(-half_h..half_h * 0.3),
        );
        spawn_structure(&mut commands, &mut rng, anchor);
        let offset = Vec2::new(
            rng.gen_range(25.0..PAIR_DISTANCE * 0.8),
            rng.gen_range(-30.0..30.0),
        );
        spawn_structure(&mut commands, &mut rng, anchor + offset);
    }

    for i in 0..STRAY_STRUCTURES {
        let anchor = Vec2::new(
            -half_w + (i as f32 + 0.5) * (2.0 * half_w / STRAY_STRUCTURES as f32),
            half_h * 0.8,
        );
        spawn_structure(&mut commands, &mut rng, anchor);
    }
}

pub fn demo_keybinds(
    mut commands: Commands,
    keyboard: Res<ButtonInput<KeyCode>>,
    mut modifiers: ResMut<AreaModifiers>,
    mut area_changes: EventWriter<AreaChangeEvent>,
    mut reloads: EventWriter<ReloadPricesEvent>,
    structures: Query<Entity, With<DemoStructure>>,
) {
    if keyboard.just_pressed(KeyCode::KeyR) {
        info!("[Demo] Regenerating field");
        for entity in structures.iter() {
            commands.entity(entity).despawn();
        }
        spawn_field(commands.reborrow());
        area_changes.send(AreaChangeEvent);
    }

    if keyboard.just_pressed(KeyCode::KeyT) {
        modifiers.cross_color_upgrade = !modifiers.cross_color_upgrade;
        info!(
            "[Demo] Crop rotation modifier: {}",
            if modifiers.cross_color_upgrade { "on" } else { "off" }
        );
    }

    if keyboard.just_pressed(KeyCode::F5) {
        reloads.send(ReloadPricesEvent);
    }
}
