use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use image::imageops;
use log::{info, warn};

use crate::obj::load_obj_from_str;
use crate::scene::LoadedScene;

/// Colour space the texels are encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    /// Gamma encoded; sampled through an sRGB texture format.
    #[default]
    Srgb,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureOptions {
    /// Flip rows so the first row is the bottom of the image.
    pub flip_y: bool,
    pub color_space: ColorSpace,
}

impl TextureOptions {
    /// Options for the baked lighting texture: stored row order, sRGB.
    pub const BAKED: Self = Self {
        flip_y: false,
        color_space: ColorSpace::Srgb,
    };
}

/// Decoded RGBA8 image ready for GPU upload.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub rgba: Vec<u8>,
}

impl TextureData {
    /// Single texel texture, used in place of a texture that failed to load.
    pub fn solid(label: impl Into<String>, rgba: [u8; 4]) -> Self {
        Self {
            label: label.into(),
            width: 1,
            height: 1,
            color_space: ColorSpace::Srgb,
            rgba: rgba.to_vec(),
        }
    }

    /// Decodes an encoded PNG or JPEG image.
    pub fn decode(label: impl Into<String>, bytes: &[u8], options: TextureOptions) -> Result<Self> {
        let label = label.into();
        let mut image = image::load_from_memory(bytes)
            .with_context(|| format!("failed to decode texture {label}"))?
            .to_rgba8();
        if options.flip_y {
            imageops::flip_vertical_in_place(&mut image);
        }
        let (width, height) = image.dimensions();
        Ok(Self {
            label,
            width,
            height,
            color_space: options.color_space,
            rgba: image.into_raw(),
        })
    }
}

/// Source of the model and texture the scene is built from.
pub trait AssetProvider: Send + Sync {
    /// Resolves a model file into a scene graph of named meshes.
    fn load_model(&self, path: &str) -> Result<LoadedScene>;

    fn load_texture(&self, path: &str, options: TextureOptions) -> Result<TextureData>;
}

/// Loads assets from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.root.join(path);
        fs::read(&full).with_context(|| format!("unable to read {}", full.display()))
    }
}

impl AssetProvider for DirectoryAssets {
    fn load_model(&self, path: &str) -> Result<LoadedScene> {
        let bytes = self.read(path)?;
        let contents =
            String::from_utf8(bytes).with_context(|| format!("{path} is not valid UTF-8"))?;
        let objects = load_obj_from_str(&contents)
            .with_context(|| format!("failed to parse OBJ model {path}"))?;
        Ok(LoadedScene::from_objects(objects))
    }

    fn load_texture(&self, path: &str, options: TextureOptions) -> Result<TextureData> {
        let bytes = self.read(path)?;
        TextureData::decode(path, &bytes, options)
    }
}

/// Loads the baked texture, falling back to plain white when it is missing
/// or unreadable so the scene can still be drawn.
pub fn load_texture_or_blank(
    provider: &dyn AssetProvider,
    path: &str,
    options: TextureOptions,
) -> TextureData {
    match provider.load_texture(path, options) {
        Ok(texture) => {
            info!("Loaded texture {path} ({}x{})", texture.width, texture.height);
            texture
        }
        Err(err) => {
            warn!("failed to load texture {path}: {err:?}");
            TextureData::solid(path, [255, 255, 255, 255])
        }
    }
}

/// Single-shot model load running on a loader thread.
///
/// The result is only observed through [`PendingModel::poll`], which the
/// control thread calls between frames.
pub struct PendingModel {
    path: String,
    receiver: Option<Receiver<Result<LoadedScene>>>,
}

impl PendingModel {
    pub fn spawn<P>(provider: P, path: impl Into<String>) -> Result<Self>
    where
        P: AssetProvider + 'static,
    {
        let path = path.into();
        let (sender, receiver) = mpsc::channel();
        let worker_path = path.clone();
        thread::Builder::new()
            .name("model-loader".into())
            .spawn(move || {
                let result = provider.load_model(&worker_path);
                // The receiver is gone when the app shut down first.
                let _ = sender.send(result);
            })
            .context("failed to start model loader thread")?;
        Ok(Self {
            path,
            receiver: Some(receiver),
        })
    }

    /// A load that has already finished with the given result.
    pub fn ready(path: impl Into<String>, result: Result<LoadedScene>) -> Self {
        let (sender, receiver) = mpsc::channel();
        let _ = sender.send(result);
        Self {
            path: path.into(),
            receiver: Some(receiver),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// True until the result has been handed out.
    pub fn is_pending(&self) -> bool {
        self.receiver.is_some()
    }

    /// Returns the result once, the first time it is available.
    pub fn poll(&mut self) -> Option<Result<LoadedScene>> {
        let receiver = self.receiver.as_ref()?;
        let outcome = match receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                Err(anyhow!("model loader for {} exited without a result", self.path))
            }
        };
        self.receiver = None;
        Some(outcome)
    }

    /// Blocks for at most `timeout` waiting for the load. Returns `None`
    /// and stays pending when the loader has not finished by then.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<Result<LoadedScene>> {
        let receiver = self.receiver.as_ref()?;
        let outcome = match receiver.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => {
                Err(anyhow!("model loader for {} exited without a result", self.path))
            }
        };
        self.receiver = None;
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;

    use parking_lot::Mutex;

    const WAIT: Duration = Duration::from_secs(10);

    /// Provider whose model load blocks until the gate is released.
    struct GatedAssets {
        gate: Arc<Mutex<()>>,
    }

    impl AssetProvider for GatedAssets {
        fn load_model(&self, _path: &str) -> Result<LoadedScene> {
            let _open = self.gate.lock();
            Ok(LoadedScene::default())
        }

        fn load_texture(&self, path: &str, _options: TextureOptions) -> Result<TextureData> {
            Err(anyhow!("no texture {path}"))
        }
    }

    const MODEL: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\no baked\nf 1 2 3\n";

    fn write_file(dir: &Path, name: &str, contents: &[u8]) {
        let mut file = fs::File::create(dir.join(name)).unwrap();
        file.write_all(contents).unwrap();
    }

    fn png_bytes() -> Vec<u8> {
        let mut image = image::RgbaImage::new(1, 2);
        image.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        image.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn loads_model_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "portal.obj", MODEL.as_bytes());
        let assets = DirectoryAssets::new(dir.path());
        let scene = assets.load_model("portal.obj").unwrap();
        assert_eq!(scene.children.len(), 1);
        assert_eq!(scene.children[0].name, "baked");
    }

    #[test]
    fn texture_rows_keep_stored_order_unless_flipped() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "baked.png", &png_bytes());
        let assets = DirectoryAssets::new(dir.path());

        let texture = assets.load_texture("baked.png", TextureOptions::BAKED).unwrap();
        assert_eq!((texture.width, texture.height), (1, 2));
        assert_eq!(&texture.rgba[..4], &[255, 0, 0, 255]);
        assert_eq!(texture.color_space, ColorSpace::Srgb);

        let flipped = TextureOptions {
            flip_y: true,
            color_space: ColorSpace::Linear,
        };
        let texture = assets.load_texture("baked.png", flipped).unwrap();
        assert_eq!(&texture.rgba[..4], &[0, 0, 255, 255]);
    }

    #[test]
    fn missing_texture_falls_back_to_white() {
        let dir = tempfile::tempdir().unwrap();
        let assets = DirectoryAssets::new(dir.path());
        let texture = load_texture_or_blank(&assets, "baked.png", TextureOptions::BAKED);
        assert_eq!(texture.rgba, vec![255, 255, 255, 255]);
    }

    #[test]
    fn pending_model_resolves_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "portal.obj", MODEL.as_bytes());
        let mut pending =
            PendingModel::spawn(DirectoryAssets::new(dir.path()), "portal.obj").unwrap();
        let scene = pending.wait_timeout(WAIT).unwrap().unwrap();
        assert_eq!(scene.children.len(), 1);
        assert!(!pending.is_pending());
        assert!(pending.poll().is_none());
    }

    #[test]
    fn missing_model_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut pending =
            PendingModel::spawn(DirectoryAssets::new(dir.path()), "portal.obj").unwrap();
        assert!(pending.wait_timeout(WAIT).unwrap().is_err());
    }

    #[test]
    fn stalled_load_times_out_and_stays_pending() {
        let gate = Arc::new(Mutex::new(()));
        let closed = gate.lock();
        let mut pending = PendingModel::spawn(
            GatedAssets {
                gate: Arc::clone(&gate),
            },
            "portal.obj",
        )
        .unwrap();

        assert!(pending.wait_timeout(Duration::from_millis(20)).is_none());
        assert!(pending.is_pending());
        assert!(pending.poll().is_none());

        drop(closed);
        let scene = pending.wait_timeout(WAIT).unwrap().unwrap();
        assert!(scene.children.is_empty());
        assert!(!pending.is_pending());
    }
}
