//! Input handling for keyboard and mouse.
//!
//! Bindings:
//! - `WASD` move, `Space` jump (ascend in flight), `Ctrl` descend in flight
//! - `E` grab / release the hovered object, left click launches a held object
//! - `F` throws a projectile, `G` toggles flight, `F3` toggles collider overlay
//! - arrow keys pitch/yaw a held object, `Z`/`X` roll it

use glam::{Vec2, Vec3};
use std::collections::HashSet;

/// Manages input state for the current frame.
#[derive(Debug, Default)]
pub struct InputState {
    /// Keys currently held down.
    keys_held: HashSet<KeyCode>,
    /// Keys pressed this frame.
    keys_pressed: HashSet<KeyCode>,

    /// Mouse buttons currently held.
    mouse_held: HashSet<MouseButton>,
    /// Mouse buttons pressed this frame.
    mouse_pressed: HashSet<MouseButton>,

    /// Mouse movement delta this frame.
    mouse_delta: Vec2,
    /// Accumulated mouse delta (for when cursor is locked).
    accumulated_delta: Vec2,

    /// Whether the cursor is captured/locked (the aim is active).
    cursor_locked: bool,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear per-frame state. Call at the start of each frame.
    pub fn begin_frame(&mut self) {
        self.keys_pressed.clear();
        self.mouse_pressed.clear();
        self.mouse_delta = self.accumulated_delta;
        self.accumulated_delta = Vec2::ZERO;
    }

    /// Process a keyboard event.
    pub fn process_keyboard(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if !self.keys_held.contains(&key) {
                    self.keys_pressed.insert(key);
                }
                self.keys_held.insert(key);
            }
            ElementState::Released => {
                self.keys_held.remove(&key);
            }
        }
    }

    /// Process a mouse button event.
    pub fn process_mouse_button(&mut self, button: MouseButton, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if !self.mouse_held.contains(&button) {
                    self.mouse_pressed.insert(button);
                }
                self.mouse_held.insert(button);
            }
            ElementState::Released => {
                self.mouse_held.remove(&button);
            }
        }
    }

    /// Process mouse movement.
    pub fn process_mouse_motion(&mut self, delta: (f64, f64)) {
        self.accumulated_delta.x += delta.0 as f32;
        self.accumulated_delta.y += delta.1 as f32;
    }

    // Query methods

    /// Check if a key is currently held.
    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    /// Check if a key was pressed this frame.
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }

    /// Check if a mouse button was pressed this frame.
    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.mouse_pressed.contains(&button)
    }

    /// Get the mouse movement delta for this frame.
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    /// Check if the cursor is locked (aim active).
    pub fn is_cursor_locked(&self) -> bool {
        self.cursor_locked
    }

    /// Set cursor lock state.
    pub fn set_cursor_locked(&mut self, locked: bool) {
        if locked != self.cursor_locked {
            log::debug!("aim {}", if locked { "locked" } else { "released" });
        }
        self.cursor_locked = locked;
    }

    /// Get movement input as a normalized vector (WASD): x = strafe, y = forward.
    pub fn get_movement_input(&self) -> Vec2 {
        let mut movement = Vec2::ZERO;

        if self.is_key_held(KeyCode::KeyW) {
            movement.y += 1.0;
        }
        if self.is_key_held(KeyCode::KeyS) {
            movement.y -= 1.0;
        }
        if self.is_key_held(KeyCode::KeyA) {
            movement.x -= 1.0;
        }
        if self.is_key_held(KeyCode::KeyD) {
            movement.x += 1.0;
        }

        movement.normalize_or_zero()
    }

    /// Vertical drive for flight: +1 ascend (Space), -1 descend (Ctrl).
    pub fn get_vertical_input(&self) -> f32 {
        let mut vertical = 0.0;
        if self.is_key_held(KeyCode::Space) {
            vertical += 1.0;
        }
        if self.is_key_held(KeyCode::ControlLeft) || self.is_key_held(KeyCode::ControlRight) {
            vertical -= 1.0;
        }
        vertical
    }

    /// In-hand rotation drive: x = pitch (Up/Down), y = yaw (Left/Right), z = roll (Z/X).
    pub fn get_rotate_input(&self) -> Vec3 {
        let axis = |pos: KeyCode, neg: KeyCode| {
            (self.is_key_held(pos) as i32 - self.is_key_held(neg) as i32) as f32
        };
        Vec3::new(
            axis(KeyCode::ArrowUp, KeyCode::ArrowDown),
            axis(KeyCode::ArrowLeft, KeyCode::ArrowRight),
            axis(KeyCode::KeyZ, KeyCode::KeyX),
        )
    }

    /// Check if jump was pressed (Space).
    pub fn is_jump_pressed(&self) -> bool {
        self.is_key_pressed(KeyCode::Space)
    }

    /// Grab/release trigger (E).
    pub fn is_grab_pressed(&self) -> bool {
        self.is_key_pressed(KeyCode::KeyE)
    }

    /// Launch trigger (left mouse, one-shot per click).
    pub fn is_launch_pressed(&self) -> bool {
        self.is_mouse_pressed(MouseButton::Left)
    }

    /// Throw a projectile (F).
    pub fn is_throw_pressed(&self) -> bool {
        self.is_key_pressed(KeyCode::KeyF)
    }

    /// Toggle flight (G).
    pub fn is_flight_toggle_pressed(&self) -> bool {
        self.is_key_pressed(KeyCode::KeyG)
    }

    /// Toggle the collider overlay (F3).
    pub fn is_debug_toggle_pressed(&self) -> bool {
        self.is_key_pressed(KeyCode::F3)
    }
}

// Re-export for convenience
pub use winit::event::{ElementState, MouseButton};
pub use winit::keyboard::KeyCode;
