//! Baked portal scene viewer.
//!
//! The crate loads a baked model, binds its named meshes to the scene
//! materials, scatters a field of fireflies and keeps the portal and firefly
//! shaders animated from a single clock. Everything except the wgpu
//! [`Renderer`] runs headless, so scenes can be composed and inspected in
//! tests or from the `--summary-only` command line mode.

pub mod app;
pub mod assets;
pub mod bindings;
pub mod camera;
pub mod clock;
pub mod config;
pub mod debug_panel;
pub mod error;
pub mod input;
pub mod material;
pub mod obj;
pub mod particles;
pub mod render;
pub mod render_loop;
pub mod scene;
pub mod uniforms;
pub mod viewport;

pub use app::{ModelStatus, PortalApp};
pub use assets::{
    load_texture_or_blank, AssetProvider, ColorSpace, DirectoryAssets, PendingModel,
    TextureData, TextureOptions,
};
pub use bindings::bind_materials;
pub use camera::{OrbitControls, PerspectiveCamera};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SceneSettings;
pub use debug_panel::{DebugPanel, DebugSettings};
pub use error::{RenderError, SceneError};
pub use input::{InputState, KeyCode, MouseButton, NamedKey, PanelAction};
pub use material::{Material, MaterialKind, MaterialSet};
pub use obj::{load_obj_from_str, ObjMesh, ObjObject};
pub use particles::FireflyField;
pub use render::{CameraParams, Frame, FrameRenderer, HeadlessRenderer, Renderer};
pub use render_loop::{FixedTimestep, FrameScheduler, RenderLoop};
pub use scene::{LoadedScene, RenderScene, SceneNode};
pub use uniforms::UniformSet;
pub use viewport::{StaticViewport, Viewport, ViewportProvider, WindowViewport};
