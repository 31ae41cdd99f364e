use std::collections::VecDeque;

use glam::Vec3;

use crate::error::RenderError;

use super::{Frame, FrameRenderer};

/// What a headless frame would have drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub renderables: usize,
    pub fireflies: usize,
    pub portal_time: f32,
    pub firefly_time: f32,
    pub firefly_pixel_ratio: f32,
    pub firefly_point_size: f32,
    pub clear_color: Vec3,
    pub camera_position: Vec3,
}

/// Renderer without a GPU that records each frame instead of drawing it.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    size: (u32, u32),
    pixel_ratio: f32,
    frames: Vec<FrameRecord>,
    reconfigures: usize,
    scripted_failures: VecDeque<RenderError>,
}

impl HeadlessRenderer {
    pub fn new(width: u32, height: u32, pixel_ratio: f32) -> Self {
        Self {
            size: (width, height),
            pixel_ratio,
            ..Self::default()
        }
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn frames(&self) -> &[FrameRecord] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&FrameRecord> {
        self.frames.last()
    }

    pub fn reconfigure_count(&self) -> usize {
        self.reconfigures
    }

    /// Makes the next render call fail with `error` instead of recording.
    pub fn fail_next(&mut self, error: RenderError) {
        self.scripted_failures.push_back(error);
    }
}

impl FrameRenderer for HeadlessRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn set_pixel_ratio(&mut self, pixel_ratio: f32) {
        self.pixel_ratio = pixel_ratio;
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), RenderError> {
        if let Some(error) = self.scripted_failures.pop_front() {
            return Err(error);
        }
        self.frames.push(FrameRecord {
            renderables: frame.scene.renderable_count(),
            fireflies: frame.scene.fireflies().map_or(0, |field| field.len()),
            portal_time: frame.uniforms.portal.elapsed_time,
            firefly_time: frame.uniforms.fireflies.elapsed_time,
            firefly_pixel_ratio: frame.uniforms.fireflies.pixel_ratio,
            firefly_point_size: frame.uniforms.fireflies.base_point_size,
            clear_color: frame.settings.clear_color,
            camera_position: frame.camera.position,
        });
        Ok(())
    }

    fn reconfigure(&mut self) {
        self.reconfigures += 1;
    }
}
