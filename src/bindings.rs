use log::info;

use crate::error::SceneError;
use crate::material::{Material, MaterialSet};
use crate::scene::{LoadedScene, RenderScene};

pub const BAKED_NODE: &str = "baked";
pub const PORTAL_LIGHT_NODE: &str = "portalLight";
pub const POLE_LIGHT_A_NODE: &str = "poleLightA";
pub const POLE_LIGHT_B_NODE: &str = "poleLightB";

/// Assigns materials to the four named meshes of the loaded model and adds
/// the model to the render scene.
///
/// Every name is resolved before anything is mutated, so a model missing one
/// of them leaves both the model and the render scene untouched.
pub fn bind_materials(
    mut loaded: LoadedScene,
    materials: &MaterialSet,
    scene: &mut RenderScene,
) -> Result<(), SceneError> {
    let assignments = [
        (BAKED_NODE, &materials.baked),
        (PORTAL_LIGHT_NODE, &materials.portal),
        (POLE_LIGHT_A_NODE, &materials.pole_light),
        (POLE_LIGHT_B_NODE, &materials.pole_light),
    ];

    let resolved = assignments
        .iter()
        .map(|(name, material)| {
            loaded
                .position(name)
                .map(|index| (index, *material))
                .ok_or_else(|| SceneError::MissingSceneNode((*name).to_string()))
        })
        .collect::<Result<Vec<(usize, &Material)>, _>>()?;

    for (index, material) in resolved {
        loaded.children[index].material = Some(material.clone());
    }

    info!(
        "Bound materials to {} of {} model nodes",
        assignments.len(),
        loaded.children.len()
    );
    scene.add_subtree(loaded);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use glam::Vec3;

    use super::*;
    use crate::assets::TextureData;
    use crate::material::MaterialKind;
    use crate::obj::{ObjMesh, ObjObject};

    fn materials() -> MaterialSet {
        MaterialSet::new(
            Arc::new(TextureData::solid("baked", [255, 255, 255, 255])),
            Vec3::ONE,
        )
    }

    fn model(names: &[&str]) -> LoadedScene {
        LoadedScene::from_objects(
            names
                .iter()
                .map(|name| ObjObject {
                    name: name.to_string(),
                    mesh: ObjMesh::default(),
                })
                .collect(),
        )
    }

    fn kind_of(scene: &RenderScene, name: &str) -> Option<MaterialKind> {
        scene.mesh(name)?.material.as_ref().map(Material::kind)
    }

    #[test]
    fn assigns_each_named_node() {
        let mut scene = RenderScene::new();
        let loaded = model(&["baked", "portalLight", "poleLightA", "poleLightB"]);
        bind_materials(loaded, &materials(), &mut scene).unwrap();

        assert_eq!(scene.subtree_count(), 1);
        assert_eq!(kind_of(&scene, "baked"), Some(MaterialKind::Baked));
        assert_eq!(kind_of(&scene, "portalLight"), Some(MaterialKind::PortalShader));
        assert_eq!(kind_of(&scene, "poleLightA"), Some(MaterialKind::FlatTint));
        assert_eq!(kind_of(&scene, "poleLightB"), Some(MaterialKind::FlatTint));
    }

    #[test]
    fn extra_nodes_are_kept_without_material() {
        let mut scene = RenderScene::new();
        let loaded = model(&["ground", "baked", "portalLight", "poleLightA", "poleLightB"]);
        bind_materials(loaded, &materials(), &mut scene).unwrap();
        assert_eq!(scene.renderable_count(), 5);
        assert!(scene.mesh("ground").unwrap().material.is_none());
    }

    #[test]
    fn each_missing_name_is_fatal_and_adds_nothing() {
        let all = ["baked", "portalLight", "poleLightA", "poleLightB"];
        for missing in all {
            let names: Vec<&str> = all.iter().copied().filter(|n| *n != missing).collect();
            let mut scene = RenderScene::new();
            let err = bind_materials(model(&names), &materials(), &mut scene).unwrap_err();
            assert_eq!(err, SceneError::MissingSceneNode(missing.to_string()));
            assert_eq!(
                err.to_string(),
                format!("missing expected scene node {missing}")
            );
            assert_eq!(scene.subtree_count(), 0);
        }
    }
}
