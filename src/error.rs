use thiserror::Error;

/// Domain errors raised while composing the portal scene.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SceneError {
    /// The loaded model does not contain a node the material bindings rely on.
    #[error("missing expected scene node {0}")]
    MissingSceneNode(String),
    #[error("unknown uniform {name} on {material} material")]
    UnknownUniform {
        material: &'static str,
        name: String,
    },
    #[error("uniform {name} expects a {expected} value")]
    UniformType {
        name: String,
        expected: &'static str,
    },
    #[error("invalid color {0:?}, expected #rrggbb")]
    InvalidColor(String),
}

/// Failure to present a frame.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RenderError {
    #[error("render surface was lost")]
    SurfaceLost,
    #[error("render surface is outdated")]
    SurfaceOutdated,
    #[error("timed out acquiring the next surface texture")]
    Timeout,
    #[error("GPU is out of memory")]
    OutOfMemory,
}
