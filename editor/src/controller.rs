use bevy::input::mouse::{MouseMotion, MouseScrollUnit, MouseWheel};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;
use bevy_egui::EguiContexts;
use terrain_engine::PointerEvent;

use crate::rendering::frame::PaintSession;

/// 右键拖动旋转、滚轮缩放的环绕相机
#[derive(Component, Debug, Clone, Copy)]
pub struct OrbitCamera {
    pub focus: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub distance: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self { focus: Vec3::ZERO, yaw: 0.6, pitch: 0.7, distance: 14.0 }
    }
}

impl OrbitCamera {
    const MIN_PITCH: f32 = 0.05;
    const MAX_PITCH: f32 = 1.5;

    pub fn transform(&self) -> Transform {
        let rotation = Quat::from_euler(EulerRot::YXZ, self.yaw, -self.pitch, 0.0);
        let eye = self.focus + rotation * Vec3::new(0.0, 0.0, self.distance);
        Transform::from_translation(eye).looking_at(self.focus, Vec3::Y)
    }

    pub fn rotate(&mut self, delta: Vec2) {
        self.yaw -= delta.x * 0.005;
        self.pitch = (self.pitch + delta.y * 0.005).clamp(Self::MIN_PITCH, Self::MAX_PITCH);
    }

    pub fn zoom(&mut self, lines: f32) {
        self.distance = (self.distance * (1.0 - lines * 0.1)).clamp(1.0, 500.0);
    }
}

/// The UV-id camera copies the main camera's view every frame.
#[derive(Component)]
pub struct UvCamera;

pub struct ControllerPlugin;

impl Plugin for ControllerPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, (orbit_camera, mirror_uv_camera).chain())
            .add_systems(Update, paint_input);
    }
}

fn pointer_over_panel(contexts: &mut EguiContexts) -> bool {
    contexts.try_ctx_mut().is_some_and(|ctx| ctx.wants_pointer_input() || ctx.is_pointer_over_area())
}

fn orbit_camera(
    buttons: Res<ButtonInput<MouseButton>>,
    mut motion: EventReader<MouseMotion>,
    mut wheel: EventReader<MouseWheel>,
    mut contexts: EguiContexts,
    mut cameras: Query<(&mut OrbitCamera, &mut Transform)>,
) {
    let drag: Vec2 = motion.read().map(|m| m.delta).sum();
    let scroll: f32 = wheel
        .read()
        .map(|w| match w.unit {
            MouseScrollUnit::Line => w.y,
            MouseScrollUnit::Pixel => w.y / 40.0,
        })
        .sum();
    if pointer_over_panel(&mut contexts) {
        return;
    }
    for (mut orbit, mut transform) in &mut cameras {
        if buttons.pressed(MouseButton::Right) && drag != Vec2::ZERO {
            orbit.rotate(drag);
        }
        if scroll != 0.0 {
            orbit.zoom(scroll);
        }
        *transform = orbit.transform();
    }
}

fn mirror_uv_camera(
    main: Query<&Transform, (With<OrbitCamera>, Without<UvCamera>)>,
    mut uv: Query<&mut Transform, With<UvCamera>>,
) {
    let Ok(main) = main.get_single() else {
        return;
    };
    for mut transform in &mut uv {
        *transform = *main;
    }
}

/// Feed the paint controller. Positions are physical pixels, matching the UV-id target.
fn paint_input(
    windows: Query<&Window, With<PrimaryWindow>>,
    buttons: Res<ButtonInput<MouseButton>>,
    mut contexts: EguiContexts,
    mut paint: ResMut<PaintSession>,
) {
    let Ok(window) = windows.get_single() else {
        return;
    };
    if let Some(cursor) = window.physical_cursor_position() {
        if paint.controller.pointer() != Some((cursor.x, cursor.y)) {
            paint.controller.handle_event(PointerEvent::Move { x: cursor.x, y: cursor.y });
        }
    }
    if buttons.just_pressed(MouseButton::Left) && !pointer_over_panel(&mut contexts) {
        paint.controller.handle_event(PointerEvent::Down);
    }
    if buttons.just_released(MouseButton::Left) {
        paint.controller.handle_event(PointerEvent::Up);
    }
}
