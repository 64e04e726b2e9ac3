//! Overlay rendering: world-anchored value labels over harvest structures.
//!
//! Labels are plain `Text2d` entities kept in sync with the derived pair set
//! and the rotation plan every frame. Each sync system diffs the labels it
//! owns against what should exist, updating in place where it can and
//! spawning or despawning at the edges.

use bevy::prelude::*;
use std::collections::HashMap;

use crate::shared::*;

pub struct OverlayPlugin;

impl Plugin for OverlayPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            (sync_value_labels, sync_rotation_labels).in_set(OverlayStep::Render),
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Components
// ─────────────────────────────────────────────────────────────────────────────

/// Per-structure yield estimate, anchored above its target.
#[derive(Component)]
pub struct ValueLabel {
    pub target: Entity,
}

/// Rotation-order annotation for one structure in the recommended plan.
#[derive(Component)]
pub struct RotationLabel {
    pub target: Entity,
}

const VALUE_LABEL_OFFSET: Vec3 = Vec3::new(0.0, 26.0, 5.0);
const ROTATION_LABEL_OFFSET: Vec3 = Vec3::new(0.0, 40.0, 5.0);
const LABEL_FONT_SIZE: f32 = 11.0;

// ─────────────────────────────────────────────────────────────────────────────
// Value labels
// ─────────────────────────────────────────────────────────────────────────────

/// Higher-valued side of a pair reads in the good color, lower in the bad,
/// equal values and unpaired structures in the neutral color.
fn pair_side_color(own: f64, other: Option<f64>, settings: &OverlaySettings) -> Color {
    match other {
        Some(other) if own > other => settings_color(settings.good_color),
        Some(other) if own < other => settings_color(settings.bad_color),
        _ => settings_color(settings.neutral_color),
    }
}

pub fn sync_value_labels(
    mut commands: Commands,
    pairs: Res<PairSet>,
    settings: Res<OverlaySettings>,
    structures: Query<&Transform, With<HarvestStructure>>,
    mut labels: Query<
        (Entity, &ValueLabel, &mut Text2d, &mut TextColor, &mut Transform),
        Without<HarvestStructure>,
    >,
) {
    let mut desired: HashMap<Entity, (Vec3, String, Color)> = HashMap::new();
    for pair in &pairs.pairs {
        let secondary_value = pair.secondary.map(|(_, value)| value);
        if let Ok(transform) = structures.get(pair.primary) {
            desired.insert(
                pair.primary,
                (
                    transform.translation + VALUE_LABEL_OFFSET,
                    format!("{:.1}", pair.primary_value),
                    pair_side_color(pair.primary_value, secondary_value, &settings),
                ),
            );
        }
        if let Some((secondary, value)) = pair.secondary {
            if let Ok(transform) = structures.get(secondary) {
                desired.insert(
                    secondary,
                    (
                        transform.translation + VALUE_LABEL_OFFSET,
                        format!("{:.1}", value),
                        pair_side_color(value, Some(pair.primary_value), &settings),
                    ),
                );
            }
        }
    }

    for (label_entity, label, mut text, mut color, mut transform) in labels.iter_mut() {
        match desired.remove(&label.target) {
            Some((position, value_text, value_color)) => {
                if text.0 != value_text {
                    text.0 = value_text;
                }
                color.0 = value_color;
                transform.translation = position;
            }
            None => commands.entity(label_entity).despawn(),
        }
    }

    for (target, (position, value_text, value_color)) in desired {
        commands.spawn((
            ValueLabel { target },
            Text2d::new(value_text),
            TextFont {
                font_size: LABEL_FONT_SIZE,
                ..default()
            },
            TextColor(value_color),
            Transform::from_translation(position),
            GlobalTransform::default(),
            Visibility::default(),
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rotation labels
// ─────────────────────────────────────────────────────────────────────────────

/// Completion indices are zero-based: the call-to-action stop reads "CR #0".
fn rotation_label_text(index: usize, total_value: f64) -> String {
    format!("CR #{}: total EV {:.1}", index, total_value)
}

pub fn sync_rotation_labels(
    mut commands: Commands,
    plan: Res<RotationPlan>,
    settings: Res<OverlaySettings>,
    structures: Query<&Transform, With<HarvestStructure>>,
    mut labels: Query<
        (Entity, &RotationLabel, &mut Text2d, &mut TextColor, &mut Transform),
        Without<HarvestStructure>,
    >,
) {
    let mut desired: HashMap<Entity, (Vec3, String, Color)> = HashMap::new();
    for (index, &target) in plan.order.iter().enumerate() {
        if let Ok(transform) = structures.get(target) {
            // The first stop in the rotation is the call to action.
            let color = if index == 0 {
                settings_color(settings.good_color)
            } else {
                settings_color(settings.neutral_color)
            };
            desired.insert(
                target,
                (
                    transform.translation + ROTATION_LABEL_OFFSET,
                    rotation_label_text(index, plan.total_value),
                    color,
                ),
            );
        }
    }

    for (label_entity, label, mut text, mut color, mut transform) in labels.iter_mut() {
        match desired.remove(&label.target) {
            Some((position, label_text, label_color)) => {
                if text.0 != label_text {
                    text.0 = label_text;
                }
                color.0 = label_color;
                transform.translation = position;
            }
            None => commands.entity(label_entity).despawn(),
        }
    }

    for (target, (position, label_text, label_color)) in desired {
        commands.spawn((
            RotationLabel { target },
            Text2d::new(label_text),
            TextFont {
                font_size: LABEL_FONT_SIZE,
                ..default()
            },
            TextColor(label_color),
            Transform::from_translation(position),
            GlobalTransform::default(),
            Visibility::default(),
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
