use std::sync::Arc;

use log::debug;
use parking_lot::RwLock;

use crate::camera::PerspectiveCamera;
use crate::render::FrameRenderer;
use crate::uniforms::{clamp_pixel_ratio, UniformSet};

/// Logical size and device pixel density of the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    /// Pixel density the renderer draws at.
    pub fn pixel_ratio(&self) -> f32 {
        clamp_pixel_ratio(self.device_pixel_ratio)
    }
}

/// Source of the current viewport, queried again on every resize signal.
pub trait ViewportProvider: Send + Sync {
    fn viewport(&self) -> Viewport;
}

/// Viewport that always reports the same values.
#[derive(Debug, Clone, Copy)]
pub struct StaticViewport(pub Viewport);

impl ViewportProvider for StaticViewport {
    fn viewport(&self) -> Viewport {
        self.0
    }
}

/// Viewport fed by window events.
#[derive(Debug)]
pub struct WindowViewport {
    state: RwLock<Viewport>,
}

impl WindowViewport {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            state: RwLock::new(viewport),
        }
    }

    pub fn update(&self, width: u32, height: u32, device_pixel_ratio: f32) {
        *self.state.write() = Viewport::new(width.max(1), height.max(1), device_pixel_ratio);
    }
}

impl ViewportProvider for WindowViewport {
    fn viewport(&self) -> Viewport {
        *self.state.read()
    }
}

impl<T> ViewportProvider for Arc<T>
where
    T: ViewportProvider + ?Sized,
{
    fn viewport(&self) -> Viewport {
        (**self).viewport()
    }
}

/// Applies a viewport change to the camera, the renderer surface and the
/// firefly pixel ratio. Every signal is handled on its own, without
/// debouncing.
pub fn reflow(
    viewport: Viewport,
    camera: &mut PerspectiveCamera,
    renderer: &mut dyn FrameRenderer,
    uniforms: &mut UniformSet,
) {
    debug!(
        "viewport reflow to {}x{} @ {}",
        viewport.width, viewport.height, viewport.device_pixel_ratio
    );
    camera.set_aspect(viewport.aspect());
    renderer.set_size(viewport.width, viewport.height);
    renderer.set_pixel_ratio(viewport.pixel_ratio());
    uniforms.set_device_pixel_ratio(viewport.device_pixel_ratio);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessRenderer;

    #[test]
    fn reflow_updates_camera_surface_and_uniform() {
        let mut camera = PerspectiveCamera::default();
        camera.update_projection_matrix();
        let mut renderer = HeadlessRenderer::new(800, 600, 1.0);
        let mut uniforms = UniformSet::new(1.0);

        reflow(Viewport::new(1920, 1080, 3.0), &mut camera, &mut renderer, &mut uniforms);

        assert_eq!(camera.aspect(), 1920.0 / 1080.0);
        assert!(camera.projection_dirty());
        assert_eq!(renderer.size(), (1920, 1080));
        assert_eq!(renderer.pixel_ratio(), 2.0);
        assert_eq!(uniforms.fireflies.pixel_ratio, 2.0);
    }

    #[test]
    fn low_density_is_not_clamped() {
        let mut camera = PerspectiveCamera::default();
        let mut renderer = HeadlessRenderer::new(800, 600, 1.0);
        let mut uniforms = UniformSet::new(2.0);
        reflow(Viewport::new(640, 480, 1.25), &mut camera, &mut renderer, &mut uniforms);
        assert_eq!(uniforms.fireflies.pixel_ratio, 1.25);
    }

    #[test]
    fn window_viewport_reports_latest_update() {
        let viewport = Arc::new(WindowViewport::new(Viewport::new(800, 600, 1.0)));
        let provider: Arc<dyn ViewportProvider> = viewport.clone();
        viewport.update(0, 300, 2.0);
        assert_eq!(provider.viewport(), Viewport::new(1, 300, 2.0));
    }
}
