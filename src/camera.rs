use std::f32::consts::{PI, TAU};

use glam::{Mat4, Vec2, Vec3};

/// Perspective camera whose projection is rebuilt lazily after changes.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    fov_degrees: f32,
    aspect: f32,
    near: f32,
    far: f32,
    projection: Mat4,
    projection_dirty: bool,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new(45.0, 1280.0 / 720.0, 0.1, 100.0)
    }
}

impl PerspectiveCamera {
    pub fn new(fov_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position: Vec3::new(4.0, 2.0, 4.0),
            target: Vec3::ZERO,
            fov_degrees,
            aspect,
            near,
            far,
            projection: Mat4::IDENTITY,
            projection_dirty: true,
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn fov_degrees(&self) -> f32 {
        self.fov_degrees
    }

    /// Changes the aspect ratio and marks the projection for recomputation.
    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
        self.projection_dirty = true;
    }

    pub fn set_fov_degrees(&mut self, fov_degrees: f32) {
        self.fov_degrees = fov_degrees;
        self.projection_dirty = true;
    }

    pub fn projection_dirty(&self) -> bool {
        self.projection_dirty
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection = Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            self.aspect.max(0.01),
            self.near,
            self.far,
        );
        self.projection_dirty = false;
    }

    /// Returns the projection, rebuilding it first when it is stale.
    pub fn projection_matrix(&mut self) -> Mat4 {
        if self.projection_dirty {
            self.update_projection_matrix();
        }
        self.projection
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }
}

/// Orbit controls with optional damping.
///
/// Pointer input accumulates rotation and zoom deltas; [`OrbitControls::update`]
/// applies them to the camera, one step per frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    theta_delta: f32,
    phi_delta: f32,
    scale: f32,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.5,
            max_distance: 50.0,
            theta_delta: 0.0,
            phi_delta: 0.0,
            scale: 1.0,
        }
    }
}

const MIN_POLAR: f32 = 1.0e-6;

impl OrbitControls {
    /// Queues a rotation from a pointer drag of `delta` pixels on a surface
    /// `surface_height` pixels tall.
    pub fn rotate(&mut self, delta: Vec2, surface_height: f32) {
        let height = surface_height.max(1.0);
        self.theta_delta -= TAU * delta.x / height * self.rotate_speed;
        self.phi_delta -= TAU * delta.y / height * self.rotate_speed;
    }

    /// Queues a zoom step; positive `steps` move towards the target.
    pub fn zoom(&mut self, steps: f32) {
        let factor = 0.95_f32.powf(self.zoom_speed * steps.abs());
        if steps > 0.0 {
            self.scale *= factor;
        } else if steps < 0.0 {
            self.scale /= factor;
        }
    }

    /// Advances the controls by one step and moves the camera.
    ///
    /// Returns true when the camera position changed.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let offset = camera.position - self.target;
        let radius = offset.length();
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = if radius > 0.0 {
            (offset.y / radius).clamp(-1.0, 1.0).acos()
        } else {
            0.0
        };

        if self.enable_damping {
            theta += self.theta_delta * self.damping_factor;
            phi += self.phi_delta * self.damping_factor;
        } else {
            theta += self.theta_delta;
            phi += self.phi_delta;
        }
        phi = phi.clamp(MIN_POLAR, PI - MIN_POLAR);
        let radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);

        let sin_phi = phi.sin();
        let offset = Vec3::new(
            radius * sin_phi * theta.sin(),
            radius * phi.cos(),
            radius * sin_phi * theta.cos(),
        );
        let previous = camera.position;
        camera.position = self.target + offset;
        camera.target = self.target;

        if self.enable_damping {
            self.theta_delta *= 1.0 - self.damping_factor;
            self.phi_delta *= 1.0 - self.damping_factor;
        } else {
            self.theta_delta = 0.0;
            self.phi_delta = 0.0;
        }
        self.scale = 1.0;

        previous.distance_squared(camera.position) > f32::EPSILON
    }

    /// Rotation still waiting to be applied.
    pub fn pending_rotation(&self) -> Vec2 {
        Vec2::new(self.theta_delta, self.phi_delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_change_marks_projection_dirty() {
        let mut camera = PerspectiveCamera::default();
        assert!(!camera.projection_dirty());
        camera.set_aspect(2.0);
        assert!(camera.projection_dirty());
        let projection = camera.projection_matrix();
        assert!(!camera.projection_dirty());
        assert_eq!(
            projection,
            Mat4::perspective_rh(45f32.to_radians(), 2.0, 0.1, 100.0)
        );
    }

    #[test]
    fn idle_controls_keep_camera_in_place() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::default();
        let start = camera.position;
        assert!(!controls.update(&mut camera));
        assert!(camera.position.abs_diff_eq(start, 1e-5));
        assert_eq!(camera.target, Vec3::ZERO);
    }

    #[test]
    fn damping_spreads_rotation_over_frames() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::default();
        controls.rotate(Vec2::new(100.0, 0.0), 720.0);
        let queued = controls.pending_rotation().x;
        assert!(controls.update(&mut camera));
        let remaining = controls.pending_rotation().x;
        assert!((remaining - queued * 0.95).abs() < 1e-6);
        let distance = camera.position.length();
        assert!((distance - Vec3::new(4.0, 2.0, 4.0).length()).abs() < 1e-4);
    }

    #[test]
    fn zoom_is_clamped_to_distance_limits() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls::default();
        controls.zoom(500.0);
        controls.update(&mut camera);
        assert!((camera.position.length() - controls.min_distance).abs() < 1e-4);
    }

    #[test]
    fn undamped_controls_apply_rotation_at_once() {
        let mut camera = PerspectiveCamera::default();
        let mut controls = OrbitControls {
            enable_damping: false,
            ..OrbitControls::default()
        };
        controls.rotate(Vec2::new(0.0, 50.0), 720.0);
        controls.update(&mut camera);
        assert_eq!(controls.pending_rotation(), Vec2::ZERO);
    }
}
