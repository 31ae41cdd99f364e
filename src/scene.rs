use crate::material::Material;
use crate::obj::{ObjMesh, ObjObject};
use crate::particles::FireflyField;

/// Mesh node of a loaded model. The name is the lookup key used by the
/// material bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: String,
    pub mesh: ObjMesh,
    pub material: Option<Material>,
}

/// Scene graph delivered by the asset provider: a flat list of direct
/// children, in model order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadedScene {
    pub children: Vec<SceneNode>,
}

impl LoadedScene {
    pub fn from_objects(objects: Vec<ObjObject>) -> Self {
        let children = objects
            .into_iter()
            .map(|object| SceneNode {
                name: object.name,
                mesh: object.mesh,
                material: None,
            })
            .collect();
        Self { children }
    }

    /// Position of the first direct child with exactly this name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.children.iter().position(|child| child.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&SceneNode> {
        self.children.iter().find(|child| child.name == name)
    }
}

/// Position of a mesh node in a [`RenderScene`]: subtree index, then child
/// index. Stable once the subtree has been added.
pub type MeshKey = (usize, usize);

/// Everything the render loop draws each frame.
#[derive(Debug, Default)]
pub struct RenderScene {
    subtrees: Vec<LoadedScene>,
    fireflies: Option<FireflyField>,
}

impl RenderScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subtree(&mut self, subtree: LoadedScene) {
        self.subtrees.push(subtree);
    }

    pub fn set_fireflies(&mut self, field: FireflyField) {
        self.fireflies = Some(field);
    }

    pub fn subtree_count(&self) -> usize {
        self.subtrees.len()
    }

    /// Every mesh node across all added subtrees.
    pub fn meshes(&self) -> impl Iterator<Item = &SceneNode> {
        self.subtrees.iter().flat_map(|subtree| subtree.children.iter())
    }

    /// Mesh nodes paired with their [`MeshKey`]; names need not be unique.
    pub fn indexed_meshes(&self) -> impl Iterator<Item = (MeshKey, &SceneNode)> {
        self.subtrees
            .iter()
            .enumerate()
            .flat_map(|(subtree, loaded)| {
                loaded
                    .children
                    .iter()
                    .enumerate()
                    .map(move |(child, node)| ((subtree, child), node))
            })
    }

    pub fn mesh(&self, name: &str) -> Option<&SceneNode> {
        self.meshes().find(|node| node.name == name)
    }

    pub fn fireflies(&self) -> Option<&FireflyField> {
        self.fireflies.as_ref()
    }

    /// Meshes plus the firefly point cloud.
    pub fn renderable_count(&self) -> usize {
        self.meshes().count() + usize::from(self.fireflies.is_some())
    }
}
