use glam::Vec3;
use log::debug;

use crate::error::SceneError;
use crate::material::{hex_color, parse_hex_color, to_hex_color};
use crate::uniforms::UniformSet;

/// Live-tunable values shared by the debug controls and the render loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebugSettings {
    /// Background colour the renderer clears each frame to, linear RGB.
    pub clear_color: Vec3,
}

impl Default for DebugSettings {
    fn default() -> Self {
        Self {
            clear_color: hex_color(0x201919),
        }
    }
}

/// Numeric slider description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumberControl {
    pub label: &'static str,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl NumberControl {
    /// Clamps `value` into the slider domain and snaps it to the step grid.
    pub fn constrain(&self, value: f32) -> f32 {
        let clamped = value.clamp(self.min, self.max);
        if self.step > 0.0 {
            let snapped = self.min + ((clamped - self.min) / self.step).round() * self.step;
            snapped.clamp(self.min, self.max)
        } else {
            clamped
        }
    }
}

/// Slider bound to the firefly `basePointSize` uniform.
///
/// The uniform starts at 150, outside this domain; the default is kept
/// until the slider is first moved.
pub const POINT_SIZE_CONTROL: NumberControl = NumberControl {
    label: "FireFliesSize",
    min: 0.0,
    max: 50.0,
    step: 1.0,
};

/// Bindings between the debug controls and the values they drive.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugPanel;

impl DebugPanel {
    /// Moves the point size slider to `value` and writes the result into the
    /// firefly uniform. Returns the applied value.
    pub fn set_point_size(&self, value: f32, uniforms: &mut UniformSet) -> f32 {
        let applied = POINT_SIZE_CONTROL.constrain(value);
        uniforms.fireflies.base_point_size = applied;
        debug!("{} = {applied}", POINT_SIZE_CONTROL.label);
        applied
    }

    /// Moves the point size slider by a number of steps from its current value.
    pub fn nudge_point_size(&self, steps: i32, uniforms: &mut UniformSet) -> f32 {
        let current = POINT_SIZE_CONTROL.constrain(uniforms.fireflies.base_point_size);
        self.set_point_size(current + steps as f32 * POINT_SIZE_CONTROL.step, uniforms)
    }

    /// Colour picker bound to the clear colour; applies on every change.
    pub fn set_clear_color(
        &self,
        value: &str,
        settings: &mut DebugSettings,
    ) -> Result<(), SceneError> {
        settings.clear_color = parse_hex_color(value)?;
        debug!("clearColor = {}", to_hex_color(settings.clear_color));
        Ok(())
    }
}
