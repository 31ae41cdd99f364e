use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Number of floats per vertex: `position.xyz` followed by `uv.xy`.
pub const VERTEX_STRIDE: usize = 5;

/// GPU ready mesh buffers for one OBJ object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjMesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl ObjMesh {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.vertices
            .chunks_exact(VERTEX_STRIDE)
            .map(|chunk| Vec3::new(chunk[0], chunk[1], chunk[2]))
    }
}

/// A named object (`o` or `g` statement) and its geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjObject {
    pub name: String,
    pub mesh: ObjMesh,
}

/// Parses an OBJ file from memory into its named objects, in file order.
///
/// Faces that appear before any `o`/`g` statement are collected into an
/// object with an empty name. Texture coordinates are flipped vertically so
/// that `uv.y` follows image row order.
pub fn load_obj_from_str(data: &str) -> Result<Vec<ObjObject>> {
    let mut positions = Vec::new();
    let mut uvs = Vec::new();
    let mut groups: Vec<(String, Vec<[FaceIndex; 3]>)> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vt" => uvs.push(parse_vec2(parts).with_context(|| {
                format!("invalid texture coordinate on line {}", line_no + 1)
            })?),
            // Lighting is baked into the texture, so normals are checked and dropped.
            "vn" => {
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?;
            }
            "o" | "g" => {
                let name = parts.collect::<Vec<_>>().join(" ");
                groups.push((name, Vec::new()));
            }
            "f" => {
                let polygon = parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                if groups.is_empty() {
                    groups.push((String::new(), Vec::new()));
                }
                if let Some((_, faces)) = groups.last_mut() {
                    triangulate_face(&polygon, faces);
                }
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ file does not define any vertices"));
    }

    groups
        .into_iter()
        .filter(|(_, faces)| !faces.is_empty())
        .map(|(name, faces)| {
            let mesh = build_mesh(&positions, &uvs, &faces)
                .with_context(|| format!("failed to build object {name:?}"))?;
            Ok(ObjObject { name, mesh })
        })
        .collect()
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut next = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()?)
    };
    Ok(Vec3::new(next()?, next()?, next()?))
}

fn parse_vec2<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec2> {
    let mut next = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing texture coordinate component"))?
            .parse::<f32>()?)
    };
    Ok(Vec2::new(next()?, next()?))
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<FaceIndex>> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let v = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        let vt = match segments.next() {
            Some(s) if !s.is_empty() => s.parse::<i32>()?,
            _ => 0,
        };
        indices.push(FaceIndex { v, vt });
    }
    if indices.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(indices)
}

fn triangulate_face(polygon: &[FaceIndex], faces: &mut Vec<[FaceIndex; 3]>) {
    for i in 1..polygon.len().saturating_sub(1) {
        faces.push([polygon[0], polygon[i], polygon[i + 1]]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    position: usize,
    uv: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct FaceIndex {
    v: i32,
    vt: i32,
}

fn build_mesh(positions: &[Vec3], uvs: &[Vec2], faces: &[[FaceIndex; 3]]) -> Result<ObjMesh> {
    let mut lookup: HashMap<Key, u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for face in faces {
        for idx in face {
            let position =
                fix_index(idx.v, positions.len()).ok_or_else(|| anyhow!("invalid vertex index"))?;
            let uv = fix_index(idx.vt, uvs.len());
            let key = Key { position, uv };
            let next_index = (vertices.len() / VERTEX_STRIDE) as u32;
            let entry = lookup.entry(key).or_insert_with(|| {
                let p = positions[position];
                let t = uv.map(|i| uvs[i]).unwrap_or(Vec2::ZERO);
                vertices.extend_from_slice(&[p.x, p.y, p.z, t.x, 1.0 - t.y]);
                next_index
            });
            indices.push(*entry);
        }
    }

    Ok(ObjMesh { vertices, indices })
}

fn fix_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let abs = index.unsigned_abs() as usize;
        (abs <= len).then_some(len - abs)
    } else {
        None
    }
}
