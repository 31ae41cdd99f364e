use std::path::Path;

use anyhow::{anyhow, Context, Result};
use glam::Vec3;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::material::{hex_color, parse_hex_color};
use crate::particles::DEFAULT_FIREFLY_COUNT;
use crate::uniforms::DEFAULT_BASE_POINT_SIZE;

/// Scene settings, optionally read from an XML file.
///
/// ```xml
/// <scene>
///   <model>portal.obj</model>
///   <texture>baked.png</texture>
///   <fireflies><count>30</count><size>150</size></fireflies>
///   <clearColor>#201919</clearColor>
///   <portal><colorStart>#ff6bee</colorStart><colorEnd>#ffffff</colorEnd></portal>
///   <poleLight><color>#ffffe5</color></poleLight>
///   <camera><position>4 2 4</position><fov>45</fov></camera>
/// </scene>
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSettings {
    pub model_path: String,
    pub texture_path: String,
    pub firefly_count: usize,
    pub firefly_size: f32,
    pub clear_color: Vec3,
    pub portal_color_start: Vec3,
    pub portal_color_end: Vec3,
    pub pole_light_color: Vec3,
    pub camera_position: Vec3,
    pub camera_fov: f32,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            model_path: "portal.obj".to_string(),
            texture_path: "baked.png".to_string(),
            firefly_count: DEFAULT_FIREFLY_COUNT,
            firefly_size: DEFAULT_BASE_POINT_SIZE,
            clear_color: hex_color(0x201919),
            portal_color_start: hex_color(0xff6bee),
            portal_color_end: hex_color(0xffffff),
            pole_light_color: hex_color(0xffffe5),
            camera_position: Vec3::new(4.0, 2.0, 4.0),
            camera_fov: 45.0,
        }
    }
}

impl SceneSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read settings {}", path.display()))?;
        Self::from_xml(&xml).with_context(|| format!("invalid settings {}", path.display()))
    }

    /// Parses settings XML; absent elements keep their defaults.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid settings XML")?;
        let root = document.root_element();
        let mut settings = Self::default();

        if let Some(model) = text(&root, &["model"]) {
            settings.model_path = model;
        }
        if let Some(texture) = text(&root, &["texture"]) {
            settings.texture_path = texture;
        }
        if let Some(count) = text(&root, &["fireflies", "count"]) {
            settings.firefly_count = count
                .parse()
                .map_err(|err| anyhow!("failed to parse firefly count: {err}"))?;
        }
        settings.firefly_size =
            parse_f32(text(&root, &["fireflies", "size"]), settings.firefly_size)?;
        settings.clear_color = parse_color(text(&root, &["clearColor"]), settings.clear_color)?;
        settings.portal_color_start = parse_color(
            text(&root, &["portal", "colorStart"]),
            settings.portal_color_start,
        )?;
        settings.portal_color_end =
            parse_color(text(&root, &["portal", "colorEnd"]), settings.portal_color_end)?;
        settings.pole_light_color =
            parse_color(text(&root, &["poleLight", "color"]), settings.pole_light_color)?;
        settings.camera_position = parse_vec3(
            text(&root, &["camera", "position"]),
            settings.camera_position,
        )?;
        settings.camera_fov = parse_f32(text(&root, &["camera", "fov"]), settings.camera_fov)?;
        Ok(settings)
    }
}

fn text(node: &Node<'_, '_>, path: &[&str]) -> Option<String> {
    let mut current = *node;
    for tag in path {
        current = current.children().find(|child| child.has_tag_name(*tag))?;
    }
    current
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}

fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => Ok(parse_hex_color(&value)?),
        None => Ok(default),
    }
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    let components = value
        .split_whitespace()
        .map(|component| component.parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| anyhow!("failed to parse vector: {err}"))?;
    match components.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(anyhow!("vector needs 3 components, found {}", components.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::to_hex_color;

    #[test]
    fn empty_document_keeps_defaults() {
        let settings = SceneSettings::from_xml("<scene/>").unwrap();
        assert_eq!(settings, SceneSettings::default());
        assert_eq!(settings.firefly_count, 30);
        assert_eq!(settings.firefly_size, 150.0);
    }

    #[test]
    fn overrides_are_applied() {
        let xml = r#"
        <scene>
            <model>scene/portal.obj</model>
            <fireflies><count>64</count><size>20</size></fireflies>
            <clearColor>#102030</clearColor>
            <camera><position>1 2 3</position><fov>60</fov></camera>
        </scene>
        "#;
        let settings = SceneSettings::from_xml(xml).unwrap();
        assert_eq!(settings.model_path, "scene/portal.obj");
        assert_eq!(settings.texture_path, "baked.png");
        assert_eq!(settings.firefly_count, 64);
        assert_eq!(settings.firefly_size, 20.0);
        assert_eq!(to_hex_color(settings.clear_color), "#102030");
        assert_eq!(settings.camera_position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(settings.camera_fov, 60.0);
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(SceneSettings::from_xml(
            "<scene><fireflies><count>many</count></fireflies></scene>"
        )
        .is_err());
        assert!(SceneSettings::from_xml("<scene><clearColor>red</clearColor></scene>").is_err());
        assert!(SceneSettings::from_xml(
            "<scene><camera><position>1 2</position></camera></scene>"
        )
        .is_err());
        assert!(SceneSettings::from_xml("<scene>").is_err());
    }
}
