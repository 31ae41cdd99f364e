mod headless;
pub mod native;

use glam::{Mat4, Vec3};

use crate::debug_panel::DebugSettings;
use crate::error::RenderError;
use crate::scene::RenderScene;
use crate::uniforms::UniformSet;

pub use headless::{FrameRecord, HeadlessRenderer};
pub use native::Renderer;

/// Camera state for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
}

impl CameraParams {
    pub fn view_proj(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Everything needed to draw one frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub scene: &'a RenderScene,
    pub camera: CameraParams,
    pub uniforms: &'a UniformSet,
    pub settings: &'a DebugSettings,
}

/// Drawing surface the render loop presents frames to.
pub trait FrameRenderer {
    /// Resizes the surface to the given logical size.
    fn set_size(&mut self, width: u32, height: u32);

    fn set_pixel_ratio(&mut self, pixel_ratio: f32);

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), RenderError>;

    /// Rebuilds the surface after it was lost or went stale.
    fn reconfigure(&mut self);
}
