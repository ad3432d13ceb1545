//! First-person camera that follows the player body.

use engine_core::Transform;
use glam::{Mat4, Quat, Vec3};

/// FPS camera with configurable FOV and clipping planes.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera transform (position and rotation).
    pub transform: Transform,
    /// Field of view in degrees.
    pub fov_degrees: f32,
    /// Near clipping plane.
    pub near: f32,
    /// Far clipping plane.
    pub far: f32,
    /// Aspect ratio (width / height).
    pub aspect: f32,
    /// Mouse sensitivity for look controls.
    pub sensitivity: f32,
    /// Current pitch (up/down rotation) in radians.
    pitch: f32,
    /// Current yaw (left/right rotation) in radians.
    yaw: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            fov_degrees: 70.0,
            near: 0.05,
            far: 500.0,
            aspect: 16.0 / 9.0,
            sensitivity: 0.002,
            pitch: 0.0,
            yaw: 0.0,
        }
    }
}

impl Camera {
    /// Create a new camera at the given position.
    pub fn new(position: Vec3) -> Self {
        Self {
            transform: Transform::from_position(position),
            ..Default::default()
        }
    }

    /// Process mouse movement for FPS look controls.
    pub fn process_mouse(&mut self, delta_x: f32, delta_y: f32) {
        self.set_yaw_pitch(
            self.yaw - delta_x * self.sensitivity,
            self.pitch - delta_y * self.sensitivity,
        );
    }

    /// Set yaw and pitch directly (in radians) and rebuild rotation.
    pub fn set_yaw_pitch(&mut self, yaw: f32, pitch: f32) {
        self.yaw = yaw;
        // Clamp pitch to prevent flipping
        let max_pitch = std::f32::consts::FRAC_PI_2 - 0.01;
        self.pitch = pitch.clamp(-max_pitch, max_pitch);
        self.transform.rotation = Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch);
    }

    /// Place the camera (the player body is authoritative for position).
    pub fn set_position(&mut self, position: Vec3) {
        self.transform.position = position;
    }

    /// Forward and right projected onto the horizontal plane.
    pub fn flat_basis(&self) -> (Vec3, Vec3) {
        let forward = self.transform.forward();
        let right = self.transform.right();
        (
            Vec3::new(forward.x, 0.0, forward.z).normalize_or_zero(),
            Vec3::new(right.x, 0.0, right.z).normalize_or_zero(),
        )
    }

    /// Get the view matrix.
    pub fn view_matrix(&self) -> Mat4 {
        let eye = self.transform.position;
        let target = eye + self.transform.forward();
        Mat4::look_at_rh(eye, target, Vec3::Y)
    }

    /// Get the projection matrix.
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }

    /// Get the combined view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get camera position.
    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    /// Get camera forward direction.
    pub fn forward(&self) -> Vec3 {
        self.transform.forward()
    }

    /// Get camera right direction.
    pub fn right(&self) -> Vec3 {
        self.transform.right()
    }

    /// Get current yaw (left/right rotation) in radians.
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Get current pitch (up/down rotation) in radians.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }
}
