use std::sync::Arc;

use glam::Vec3;

use crate::assets::TextureData;
use crate::error::SceneError;

/// Surface description assigned to a scene node.
///
/// Only the portal shader animates; its uniforms live in
/// [`crate::uniforms::UniformSet`] so the render loop can update them without
/// walking the scene graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Material {
    /// Samples pre-lit colour from the baked lighting texture.
    Baked { texture: Arc<TextureData> },
    /// Constant colour, used for the pole lights.
    FlatTint { color: Vec3 },
    /// Animated gradient driven by the portal uniforms.
    PortalShader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Baked,
    FlatTint,
    PortalShader,
}

impl Material {
    pub fn kind(&self) -> MaterialKind {
        match self {
            Material::Baked { .. } => MaterialKind::Baked,
            Material::FlatTint { .. } => MaterialKind::FlatTint,
            Material::PortalShader => MaterialKind::PortalShader,
        }
    }
}

/// Materials handed to the bindings once the model arrives.
#[derive(Debug, Clone)]
pub struct MaterialSet {
    pub baked: Material,
    pub pole_light: Material,
    pub portal: Material,
}

impl MaterialSet {
    pub fn new(baked_texture: Arc<TextureData>, pole_light_color: Vec3) -> Self {
        Self {
            baked: Material::Baked {
                texture: baked_texture,
            },
            pole_light: Material::FlatTint {
                color: pole_light_color,
            },
            portal: Material::PortalShader,
        }
    }
}

/// Parses a `#rrggbb` colour into linear RGB.
pub fn parse_hex_color(value: &str) -> Result<Vec3, SceneError> {
    let digits = value
        .trim()
        .strip_prefix('#')
        .ok_or_else(|| SceneError::InvalidColor(value.to_string()))?;
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(SceneError::InvalidColor(value.to_string()));
    }
    let packed = u32::from_str_radix(digits, 16)
        .map_err(|_| SceneError::InvalidColor(value.to_string()))?;
    Ok(hex_color(packed))
}

/// Converts a packed `0xrrggbb` sRGB colour into linear RGB.
pub fn hex_color(packed: u32) -> Vec3 {
    let channel = |shift: u32| srgb_to_linear(((packed >> shift) & 0xff) as f32 / 255.0);
    Vec3::new(channel(16), channel(8), channel(0))
}

/// Formats a linear RGB colour back to `#rrggbb`.
pub fn to_hex_color(color: Vec3) -> String {
    let channel = |value: f32| (linear_to_srgb(value.clamp(0.0, 1.0)) * 255.0).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        channel(color.x),
        channel(color.y),
        channel(color.z)
    )
}

fn srgb_to_linear(value: f32) -> f32 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(value: f32) -> f32 {
    if value <= 0.003_130_8 {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_white_and_black() {
        assert!(parse_hex_color("#ffffff").unwrap().abs_diff_eq(Vec3::ONE, 1e-6));
        assert_eq!(parse_hex_color("#000000").unwrap(), Vec3::ZERO);
    }

    #[test]
    fn hex_round_trips_through_linear() {
        for value in ["#201919", "#ff6bee", "#ffffe5"] {
            let color = parse_hex_color(value).unwrap();
            assert_eq!(to_hex_color(color), value);
        }
    }

    #[test]
    fn rejects_malformed_colors() {
        assert!(parse_hex_color("201919").is_err());
        assert!(parse_hex_color("#2019").is_err());
        assert!(parse_hex_color("#zzzzzz").is_err());
    }

    #[test]
    fn pole_light_material_is_flat_tint() {
        let texture = Arc::new(TextureData::solid("baked", [255, 255, 255, 255]));
        let set = MaterialSet::new(texture, hex_color(0xffffe5));
        assert_eq!(set.pole_light.kind(), MaterialKind::FlatTint);
        assert_eq!(set.portal.kind(), MaterialKind::PortalShader);
        assert_eq!(set.baked.kind(), MaterialKind::Baked);
    }
}
