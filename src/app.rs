use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{error, info};
use rand::Rng;

use crate::assets::{PendingModel, TextureData};
use crate::bindings::bind_materials;
use crate::camera::{OrbitControls, PerspectiveCamera};
use crate::config::SceneSettings;
use crate::debug_panel::{DebugPanel, DebugSettings};
use crate::material::MaterialSet;
use crate::particles::FireflyField;
use crate::render::{CameraParams, FrameRenderer};
use crate::scene::{LoadedScene, RenderScene};
use crate::uniforms::UniformSet;
use crate::viewport::{reflow, Viewport};

/// State of the model load, as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelStatus {
    NotRequested,
    Loading(String),
    Loaded,
    /// The load failed; the scene keeps rendering without the model.
    Failed(String),
}

/// The composed portal scene: render scene, animated uniforms, camera and
/// debug settings, all owned by the control thread.
pub struct PortalApp {
    pub scene: RenderScene,
    pub uniforms: UniformSet,
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    pub settings: DebugSettings,
    pub panel: DebugPanel,
    viewport: Viewport,
    materials: MaterialSet,
    pending_model: Option<PendingModel>,
    model_status: ModelStatus,
}

impl PortalApp {
    /// Builds the scene that exists before the model arrives: the firefly
    /// field, the materials waiting for their meshes and the camera.
    pub fn new<R: Rng + ?Sized>(
        settings: &SceneSettings,
        viewport: Viewport,
        baked_texture: TextureData,
        rng: &mut R,
    ) -> Self {
        let mut scene = RenderScene::new();
        scene.set_fireflies(FireflyField::generate(settings.firefly_count, rng));

        let mut uniforms = UniformSet::new(viewport.device_pixel_ratio);
        uniforms.portal.color_start = settings.portal_color_start;
        uniforms.portal.color_end = settings.portal_color_end;
        uniforms.fireflies.base_point_size = settings.firefly_size;

        let mut camera = PerspectiveCamera::new(settings.camera_fov, viewport.aspect(), 0.1, 100.0);
        camera.position = settings.camera_position;

        Self {
            scene,
            uniforms,
            camera,
            controls: OrbitControls::default(),
            settings: DebugSettings {
                clear_color: settings.clear_color,
            },
            panel: DebugPanel,
            viewport,
            materials: MaterialSet::new(Arc::new(baked_texture), settings.pole_light_color),
            pending_model: None,
            model_status: ModelStatus::NotRequested,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn model_status(&self) -> &ModelStatus {
        &self.model_status
    }

    pub fn start_model_load(&mut self, pending: PendingModel) {
        self.model_status = ModelStatus::Loading(pending.path().to_string());
        self.pending_model = Some(pending);
    }

    /// Consumes a finished model load, binding materials exactly once.
    ///
    /// A failed load is logged and leaves the scene as it was. A model that
    /// lacks one of the expected meshes is an error.
    pub fn poll_model(&mut self) -> Result<bool> {
        let Some(pending) = self.pending_model.as_mut() else {
            return Ok(false);
        };
        let Some(result) = pending.poll() else {
            return Ok(false);
        };
        let path = pending.path().to_string();
        self.pending_model = None;
        self.apply_model(&path, result)
    }

    /// Waits up to `timeout` for the pending model load and applies it.
    ///
    /// A load still running afterwards stays pending and is picked up later
    /// by [`PortalApp::poll_model`].
    pub fn wait_for_model(&mut self, timeout: Duration) -> Result<bool> {
        let Some(pending) = self.pending_model.as_mut() else {
            return Ok(false);
        };
        let Some(result) = pending.wait_timeout(timeout) else {
            return Ok(false);
        };
        let path = pending.path().to_string();
        self.pending_model = None;
        self.apply_model(&path, result)
    }

    fn apply_model(&mut self, path: &str, result: Result<LoadedScene>) -> Result<bool> {
        match result {
            Ok(loaded) => {
                info!("Loaded model {path} with {} nodes", loaded.children.len());
                bind_materials(loaded, &self.materials, &mut self.scene)?;
                self.model_status = ModelStatus::Loaded;
                Ok(true)
            }
            Err(err) => {
                error!("failed to load model {path}: {err:?}");
                self.model_status = ModelStatus::Failed(format!("{err:#}"));
                Ok(false)
            }
        }
    }

    /// Reacts to a viewport change signal.
    pub fn on_resize(&mut self, viewport: Viewport, renderer: &mut dyn FrameRenderer) {
        self.viewport = viewport;
        reflow(viewport, &mut self.camera, renderer, &mut self.uniforms);
    }

    pub fn camera_params(&mut self) -> CameraParams {
        CameraParams {
            view: self.camera.view_matrix(),
            projection: self.camera.projection_matrix(),
            position: self.camera.position,
        }
    }

    /// One line per scene element, for the headless summary.
    pub fn summary(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for node in self.scene.meshes() {
            let material = node
                .material
                .as_ref()
                .map(|material| format!("{:?}", material.kind()))
                .unwrap_or_else(|| "Unassigned".to_string());
            lines.push(format!(" - {} ({material})", node.name));
        }
        if let Some(field) = self.scene.fireflies() {
            lines.push(format!(" - fireflies ({} points)", field.len()));
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::assets::{AssetProvider, TextureOptions};
    use crate::obj::{ObjMesh, ObjObject};
    use crate::render::HeadlessRenderer;

    /// Serves the portal model once the gate is released.
    struct GatedAssets {
        gate: Arc<Mutex<()>>,
    }

    impl AssetProvider for GatedAssets {
        fn load_model(&self, _path: &str) -> Result<LoadedScene> {
            let _open = self.gate.lock();
            Ok(model(&["baked", "portalLight", "poleLightA", "poleLightB"]))
        }

        fn load_texture(&self, path: &str, _options: TextureOptions) -> Result<TextureData> {
            Err(anyhow::anyhow!("no texture {path}"))
        }
    }

    fn app(viewport: Viewport) -> PortalApp {
        PortalApp::new(
            &SceneSettings::default(),
            viewport,
            TextureData::solid("baked.png", [255, 255, 255, 255]),
            &mut StdRng::seed_from_u64(1),
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

    #[test]
    fn starts_with_fireflies_only() {
        let app = app(Viewport::new(800, 600, 3.0));
        assert_eq!(app.scene.renderable_count(), 1);
        assert_eq!(app.uniforms.fireflies.pixel_ratio, 2.0);
        assert_eq!(app.camera.aspect(), 800.0 / 600.0);
        assert_eq!(app.model_status(), &ModelStatus::NotRequested);
    }

    #[test]
    fn model_is_bound_once_when_ready() {
        let mut app = app(Viewport::new(800, 600, 1.0));
        let names = ["baked", "portalLight", "poleLightA", "poleLightB"];
        app.start_model_load(PendingModel::ready("portal.obj", Ok(model(&names))));
        assert!(app.poll_model().unwrap());
        assert!(!app.poll_model().unwrap());
        assert_eq!(app.scene.subtree_count(), 1);
        assert_eq!(app.scene.renderable_count(), 5);
        assert_eq!(app.model_status(), &ModelStatus::Loaded);
    }

    #[test]
    fn failed_load_keeps_scene_unchanged() {
        let mut app = app(Viewport::new(800, 600, 1.0));
        app.start_model_load(PendingModel::ready(
            "portal.obj",
            Err(anyhow::anyhow!("file not found")),
        ));
        assert!(!app.poll_model().unwrap());
        assert_eq!(app.scene.renderable_count(), 1);
        assert!(matches!(app.model_status(), ModelStatus::Failed(_)));
    }

    #[test]
    fn incomplete_model_is_an_error() {
        let mut app = app(Viewport::new(800, 600, 1.0));
        app.start_model_load(PendingModel::ready(
            "portal.obj",
            Ok(model(&["baked", "portalLight", "poleLightA"])),
        ));
        let err = app.poll_model().unwrap_err();
        assert_eq!(err.to_string(), "missing expected scene node poleLightB");
        assert_eq!(app.scene.subtree_count(), 0);
    }

    #[test]
    fn resize_reflows_camera_and_renderer() {
        let mut app = app(Viewport::new(800, 600, 1.0));
        let mut renderer = HeadlessRenderer::new(800, 600, 1.0);
        app.on_resize(Viewport::new(1000, 500, 2.5), &mut renderer);
        assert_eq!(app.camera.aspect(), 2.0);
        assert_eq!(renderer.size(), (1000, 500));
        assert_eq!(app.uniforms.fireflies.pixel_ratio, 2.0);
        assert_eq!(app.viewport(), Viewport::new(1000, 500, 2.5));
    }

    #[test]
    fn bounded_wait_leaves_a_stalled_load_pending() {
        let mut app = app(Viewport::new(800, 600, 1.0));
        let gate = Arc::new(Mutex::new(()));
        let closed = gate.lock();
        let pending = PendingModel::spawn(
            GatedAssets {
                gate: Arc::clone(&gate),
            },
            "portal.obj",
        )
        .unwrap();
        app.start_model_load(pending);

        assert!(!app.wait_for_model(Duration::from_millis(20)).unwrap());
        assert_eq!(app.model_status(), &ModelStatus::Loading("portal.obj".into()));
        assert_eq!(app.scene.renderable_count(), 1);

        drop(closed);
        assert!(app.wait_for_model(Duration::from_secs(10)).unwrap());
        assert_eq!(app.model_status(), &ModelStatus::Loaded);
        assert_eq!(app.scene.renderable_count(), 5);
    }
}
