//! Time- and viewport-varying parameters of the two shader materials.

use glam::Vec3;

use crate::error::SceneError;
use crate::material::hex_color;

pub const DEFAULT_BASE_POINT_SIZE: f32 = 150.0;
pub const MAX_PIXEL_RATIO: f32 = 2.0;

/// Value stored in a named uniform slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Color(Vec3),
}

impl UniformValue {
    fn as_float(self, name: &str) -> Result<f32, SceneError> {
        match self {
            UniformValue::Float(value) => Ok(value),
            UniformValue::Color(_) => Err(SceneError::UniformType {
                name: name.to_string(),
                expected: "float",
            }),
        }
    }

    fn as_color(self, name: &str) -> Result<Vec3, SceneError> {
        match self {
            UniformValue::Color(value) => Ok(value),
            UniformValue::Float(_) => Err(SceneError::UniformType {
                name: name.to_string(),
                expected: "color",
            }),
        }
    }
}

/// Uniforms of the portal surface gradient.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalUniforms {
    pub elapsed_time: f32,
    pub color_start: Vec3,
    pub color_end: Vec3,
}

impl Default for PortalUniforms {
    fn default() -> Self {
        Self {
            elapsed_time: 0.0,
            color_start: hex_color(0xff6bee),
            color_end: hex_color(0xffffff),
        }
    }
}

impl PortalUniforms {
    const MATERIAL: &'static str = "portal";

    pub fn get(&self, name: &str) -> Result<UniformValue, SceneError> {
        match name {
            "elapsedTime" => Ok(UniformValue::Float(self.elapsed_time)),
            "colorStart" => Ok(UniformValue::Color(self.color_start)),
            "colorEnd" => Ok(UniformValue::Color(self.color_end)),
            _ => Err(unknown(Self::MATERIAL, name)),
        }
    }

    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<(), SceneError> {
        match name {
            "elapsedTime" => self.elapsed_time = value.as_float(name)?,
            "colorStart" => self.color_start = value.as_color(name)?,
            "colorEnd" => self.color_end = value.as_color(name)?,
            _ => return Err(unknown(Self::MATERIAL, name)),
        }
        Ok(())
    }
}

/// Uniforms of the firefly point sprites.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FireflyUniforms {
    pub elapsed_time: f32,
    pub pixel_ratio: f32,
    pub base_point_size: f32,
}

impl FireflyUniforms {
    const MATERIAL: &'static str = "firefly";

    pub fn new(device_pixel_ratio: f32) -> Self {
        Self {
            elapsed_time: 0.0,
            pixel_ratio: clamp_pixel_ratio(device_pixel_ratio),
            base_point_size: DEFAULT_BASE_POINT_SIZE,
        }
    }

    pub fn get(&self, name: &str) -> Result<UniformValue, SceneError> {
        match name {
            "elapsedTime" => Ok(UniformValue::Float(self.elapsed_time)),
            "pixelRatio" => Ok(UniformValue::Float(self.pixel_ratio)),
            "basePointSize" => Ok(UniformValue::Float(self.base_point_size)),
            _ => Err(unknown(Self::MATERIAL, name)),
        }
    }

    pub fn set(&mut self, name: &str, value: UniformValue) -> Result<(), SceneError> {
        let value = value.as_float(name)?;
        match name {
            "elapsedTime" => self.elapsed_time = value,
            "pixelRatio" => self.pixel_ratio = value,
            "basePointSize" => self.base_point_size = value,
            _ => return Err(unknown(Self::MATERIAL, name)),
        }
        Ok(())
    }
}

/// Both animated materials' uniforms, kept side by side so a single clock
/// reading always reaches both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformSet {
    pub portal: PortalUniforms,
    pub fireflies: FireflyUniforms,
}

impl UniformSet {
    pub fn new(device_pixel_ratio: f32) -> Self {
        Self {
            portal: PortalUniforms::default(),
            fireflies: FireflyUniforms::new(device_pixel_ratio),
        }
    }

    /// Writes the same clock reading into both materials.
    pub fn set_elapsed_time(&mut self, seconds: f32) {
        self.portal.elapsed_time = seconds;
        self.fireflies.elapsed_time = seconds;
    }

    pub fn set_device_pixel_ratio(&mut self, device_pixel_ratio: f32) {
        self.fireflies.pixel_ratio = clamp_pixel_ratio(device_pixel_ratio);
    }
}

/// Device pixel density capped at [`MAX_PIXEL_RATIO`].
pub fn clamp_pixel_ratio(device_pixel_ratio: f32) -> f32 {
    device_pixel_ratio.min(MAX_PIXEL_RATIO)
}

fn unknown(material: &'static str, name: &str) -> SceneError {
    SceneError::UnknownUniform {
        material,
        name: name.to_string(),
    }
}
