//! Keyboard state and its mapping onto render loop input.

use std::collections::HashSet;

use lumen_core::EFFECT_COUNT;
use lumen_math::{Vec2, Vec3};
use lumen_render::FrameInput;
use winit::keyboard::KeyCode;

/// Brightness change per `+`/`-` press.
const BRIGHTNESS_STEP: f32 = 0.1;

const EFFECT_KEYS: [KeyCode; EFFECT_COUNT as usize] = [
    KeyCode::Digit1,
    KeyCode::Digit2,
    KeyCode::Digit3,
    KeyCode::Digit4,
    KeyCode::Digit5,
    KeyCode::Digit6,
    KeyCode::Digit7,
    KeyCode::Digit8,
    KeyCode::Digit9,
];

/// Held keys plus one-shot requests collected between frames.
#[derive(Debug, Default)]
pub struct InputState {
    keys_pressed: HashSet<KeyCode>,
    pending: FrameInput,
    brightness_steps: i32,
    screenshot: bool,
    toggle_overlay: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key transition. Repeats only matter for held keys.
    pub fn key(&mut self, code: KeyCode, pressed: bool, repeat: bool) {
        if !pressed {
            self.keys_pressed.remove(&code);
            return;
        }
        self.keys_pressed.insert(code);
        if repeat {
            return;
        }

        match code {
            KeyCode::Escape => self.pending.quit = true,
            KeyCode::Tab => self.pending.next_camera = true,
            KeyCode::F5 => self.pending.reload = true,
            KeyCode::KeyR => self.pending.toggle_modifier = !self.pending.toggle_modifier,
            KeyCode::KeyP => self.screenshot = true,
            KeyCode::KeyH => self.toggle_overlay = !self.toggle_overlay,
            KeyCode::Equal | KeyCode::NumpadAdd => self.brightness_steps += 1,
            KeyCode::Minus | KeyCode::NumpadSubtract => self.brightness_steps -= 1,
            _ => {
                if let Some(effect) = EFFECT_KEYS.iter().position(|key| *key == code) {
                    self.pending.effect = Some(effect as u32);
                }
            }
        }
    }

    pub fn request_quit(&mut self) {
        self.pending.quit = true;
    }

    pub fn request_redraw(&mut self) {
        self.pending.redraw = true;
    }

    pub fn request_screenshot(&mut self) {
        self.screenshot = true;
    }

    /// Overlay edits land here and are applied on the next frame.
    pub fn set_effect(&mut self, effect: u32) {
        self.pending.effect = Some(effect);
    }

    pub fn set_brightness(&mut self, brightness: f32) {
        self.brightness_steps = 0;
        self.pending.brightness = Some(brightness);
    }

    /// Drop held keys, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.keys_pressed.clear();
    }

    pub fn is_moving(&self) -> bool {
        self.movement() != Vec3::ZERO || self.rotation() != Vec2::ZERO
    }

    /// Build this frame's input and clear the one-shot requests.
    pub fn take_frame_input(&mut self, current_brightness: f32) -> FrameInput {
        let mut input = std::mem::take(&mut self.pending);
        input.movement = self.movement();
        input.rotation = self.rotation();

        if self.brightness_steps != 0 {
            let base = input.brightness.unwrap_or(current_brightness);
            let adjusted = base + self.brightness_steps as f32 * BRIGHTNESS_STEP;
            input.brightness = Some(adjusted.max(0.0));
            self.brightness_steps = 0;
        }
        input
    }

    pub fn take_screenshot_request(&mut self) -> bool {
        std::mem::take(&mut self.screenshot)
    }

    pub fn take_overlay_toggle(&mut self) -> bool {
        std::mem::take(&mut self.toggle_overlay)
    }

    fn axis(&self, positive: KeyCode, negative: KeyCode) -> f32 {
        let mut value = 0.0;
        if self.keys_pressed.contains(&positive) {
            value += 1.0;
        }
        if self.keys_pressed.contains(&negative) {
            value -= 1.0;
        }
        value
    }

    /// (right, up, forward)
    fn movement(&self) -> Vec3 {
        Vec3::new(
            self.axis(KeyCode::KeyD, KeyCode::KeyA),
            self.axis(KeyCode::KeyE, KeyCode::KeyQ),
            self.axis(KeyCode::KeyW, KeyCode::KeyS),
        )
    }

    /// (yaw, pitch)
    fn rotation(&self) -> Vec2 {
        Vec2::new(
            self.axis(KeyCode::ArrowLeft, KeyCode::ArrowRight),
            self.axis(KeyCode::ArrowUp, KeyCode::ArrowDown),
        )
    }
}
