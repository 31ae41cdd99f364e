use std::any::Any;
use std::env;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::info;
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{
    ElementState, Event, KeyboardInput, MouseButton as WinitMouseButton, MouseScrollDelta,
    WindowEvent,
};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::platform::run_return::EventLoopExtRunReturn;
use winit::window::{Window, WindowBuilder};

use portal_scene::{
    load_texture_or_blank, DirectoryAssets, FixedTimestep, HeadlessRenderer, InputState, KeyCode,
    ManualClock, ModelStatus, MouseButton, NamedKey, PendingModel, PortalApp, RenderLoop,
    Renderer, SceneSettings, StaticViewport, SystemClock, TextureOptions, Viewport,
    ViewportProvider, WindowViewport,
};

const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 720;
const HEADLESS_STEP: f32 = 1.0 / 60.0;
const MODEL_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let settings = match &options.settings {
        Some(path) => SceneSettings::load(path)
            .with_context(|| format!("failed to load settings {}", path.display()))?,
        None => SceneSettings::default(),
    };
    let assets = DirectoryAssets::new(&options.asset_dir);
    info!("Serving assets from {}", assets.root().display());

    if options.summary_only {
        return run_headless(&settings, assets, options.frames);
    }
    match run_interactive(&settings, assets.clone()) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --summary-only mode \
                     (set DISPLAY or install X11 libs to enable rendering)."
                );
                run_headless(&settings, assets, options.frames)
            } else {
                Err(err)
            }
        }
    }
}

fn run_headless(settings: &SceneSettings, assets: DirectoryAssets, frames: u64) -> Result<()> {
    let viewport = StaticViewport(Viewport::new(WINDOW_WIDTH, WINDOW_HEIGHT, 1.0));
    let texture = load_texture_or_blank(&assets, &settings.texture_path, TextureOptions::BAKED);
    let mut app = PortalApp::new(
        settings,
        viewport.viewport(),
        texture,
        &mut rand::thread_rng(),
    );
    app.start_model_load(PendingModel::spawn(assets, settings.model_path.clone())?);
    app.wait_for_model(MODEL_LOAD_TIMEOUT)?;

    match app.model_status() {
        ModelStatus::Loaded => println!(
            "Loaded model {} with {} nodes",
            settings.model_path,
            app.scene.meshes().count()
        ),
        ModelStatus::Failed(reason) => {
            println!("Model {} unavailable: {reason}", settings.model_path)
        }
        ModelStatus::Loading(path) => {
            println!("Model {path} still loading; rendering without it")
        }
        ModelStatus::NotRequested => {}
    }

    let mut renderer = HeadlessRenderer::new(WINDOW_WIDTH, WINDOW_HEIGHT, 1.0);
    app.on_resize(viewport.viewport(), &mut renderer);

    let mut render_loop = RenderLoop::new(ManualClock::new());
    let mut scheduler = FixedTimestep {
        remaining: frames,
        step: HEADLESS_STEP,
    };
    render_loop.run(&mut app, &mut renderer, &mut scheduler)?;

    println!("Scene contents ({} renderables):", app.scene.renderable_count());
    for line in app.summary() {
        println!("{line}");
    }
    println!("Rendered {} frames", render_loop.frame_count());
    let uniforms = &app.uniforms;
    println!(
        "elapsedTime={:.3} pixelRatio={} basePointSize={}",
        uniforms.portal.elapsed_time,
        uniforms.fireflies.pixel_ratio,
        uniforms.fireflies.base_point_size
    );
    Ok(())
}

fn run_interactive(settings: &SceneSettings, assets: DirectoryAssets) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop =
        event_loop.map_err(|panic| WindowInitError::from_panic("event loop", panic))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Portal Scene")
            .with_inner_size(LogicalSize::new(WINDOW_WIDTH as f64, WINDOW_HEIGHT as f64))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );

    let viewport = Arc::new(WindowViewport::new(window_viewport(&window)));
    let texture = load_texture_or_blank(&assets, &settings.texture_path, TextureOptions::BAKED);
    let mut app = PortalApp::new(
        settings,
        viewport.viewport(),
        texture,
        &mut rand::thread_rng(),
    );
    app.start_model_load(PendingModel::spawn(assets, settings.model_path.clone())?);

    let mut renderer = block_on(Renderer::new(
        Arc::clone(&window),
        viewport.viewport().pixel_ratio(),
    ))?;
    app.on_resize(viewport.viewport(), &mut renderer);

    let mut state = ViewerState {
        app,
        renderer,
        render_loop: RenderLoop::new(SystemClock::start()),
        input: InputState::new(),
        viewport,
        shown_status: None,
        last_error: None,
    };

    let mut event_loop = event_loop;
    event_loop.run_return(|event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        if let Err(err) = state.process_event(&event, control_flow) {
            state.last_error = Some(err);
            control_flow.set_exit();
        }
    });

    println!("Rendered {} frames", state.render_loop.frame_count());
    if let Some(err) = state.last_error {
        return Err(err);
    }
    Ok(())
}

/// Logical window size plus the display's pixel density.
fn window_viewport(window: &Window) -> Viewport {
    let scale = window.scale_factor();
    let size: LogicalSize<u32> = window.inner_size().to_logical(scale);
    Viewport::new(size.width, size.height, scale as f32)
}

struct ViewerState {
    app: PortalApp,
    renderer: Renderer,
    render_loop: RenderLoop<SystemClock>,
    input: InputState,
    viewport: Arc<WindowViewport>,
    shown_status: Option<ModelStatus>,
    last_error: Option<anyhow::Error>,
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

impl ViewerState {
    fn process_event(&mut self, event: &Event<()>, control_flow: &mut ControlFlow) -> Result<()> {
        match event {
            Event::WindowEvent { event, window_id } if *window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => {
                        control_flow.set_exit();
                    }
                    WindowEvent::Resized(_) => {
                        self.reflow(self.renderer.window().scale_factor());
                    }
                    WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                        self.reflow(*scale_factor);
                    }
                    WindowEvent::KeyboardInput { input, .. } => {
                        self.handle_keyboard(input, control_flow)?;
                    }
                    WindowEvent::MouseInput { state, button, .. } => {
                        self.handle_mouse_button(*state, *button);
                    }
                    WindowEvent::CursorMoved { position, .. } => {
                        let scale = self.renderer.window().scale_factor();
                        let logical = position.to_logical::<f32>(scale);
                        let height = self.viewport.viewport().height as f32;
                        self.input.set_mouse_position(
                            Vec2::new(logical.x, logical.y),
                            height,
                            &mut self.app.controls,
                        );
                    }
                    WindowEvent::MouseWheel { delta, .. } => {
                        let lines = match delta {
                            MouseScrollDelta::LineDelta(_, y) => *y,
                            MouseScrollDelta::PixelDelta(position) => position.y as f32 / 50.0,
                        };
                        self.input.scroll(lines, &mut self.app.controls);
                    }
                    _ => {}
                }
            }
            Event::RedrawRequested(window_id) if *window_id == self.renderer.window_id() => {
                self.app.poll_model()?;
                self.update_title();
                self.render_loop.tick(&mut self.app, &mut self.renderer)?;
            }
            Event::MainEventsCleared => {
                self.renderer.window().request_redraw();
            }
            _ => {}
        }
        Ok(())
    }

    fn reflow(&mut self, scale_factor: f64) {
        let size: LogicalSize<u32> = self.renderer.window().inner_size().to_logical(scale_factor);
        self.viewport
            .update(size.width, size.height, scale_factor as f32);
        self.app
            .on_resize(self.viewport.viewport(), &mut self.renderer);
    }

    fn update_title(&mut self) {
        let status = self.app.model_status();
        if self.shown_status.as_ref() == Some(status) {
            return;
        }
        let title = match status {
            ModelStatus::NotRequested | ModelStatus::Loaded => "Portal Scene".to_string(),
            ModelStatus::Loading(path) => format!("Portal Scene - loading {path}"),
            ModelStatus::Failed(_) => "Portal Scene - model unavailable".to_string(),
        };
        self.renderer.window().set_title(&title);
        self.shown_status = Some(status.clone());
    }

    fn handle_keyboard(
        &mut self,
        input: &KeyboardInput,
        control_flow: &mut ControlFlow,
    ) -> Result<()> {
        if input.state != ElementState::Pressed {
            return Ok(());
        }
        let Some(keycode) = input.virtual_keycode.and_then(map_keycode) else {
            return Ok(());
        };
        if keycode == KeyCode::Named(NamedKey::Escape) {
            control_flow.set_exit();
            return Ok(());
        }
        self.input.handle_key(
            keycode,
            &self.app.panel,
            &mut self.app.uniforms,
            &mut self.app.settings,
        )?;
        Ok(())
    }

    fn handle_mouse_button(&mut self, state: ElementState, button: WinitMouseButton) {
        let Some(button) = MouseButton::from_winit(button) else {
            return;
        };
        match state {
            ElementState::Pressed => self.input.set_mouse_button_down(button),
            ElementState::Released => self.input.set_mouse_button_up(button),
        }
    }
}

fn map_keycode(code: winit::event::VirtualKeyCode) -> Option<KeyCode> {
    use winit::event::VirtualKeyCode as Key;
    Some(match code {
        Key::Up => KeyCode::Named(NamedKey::Up),
        Key::Down => KeyCode::Named(NamedKey::Down),
        Key::PageUp => KeyCode::Named(NamedKey::PageUp),
        Key::PageDown => KeyCode::Named(NamedKey::PageDown),
        Key::Escape => KeyCode::Named(NamedKey::Escape),
        Key::B => KeyCode::Character('B'),
        _ => return None,
    })
}

struct CliOptions {
    asset_dir: PathBuf,
    summary_only: bool,
    frames: u64,
    settings: Option<PathBuf>,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args().skip(1);
        let Some(asset_dir) = args.next() else {
            return Err(anyhow!(
                "Usage: portal-scene <asset-dir> [--summary-only] [--frames N] [--settings FILE]"
            ));
        };
        let mut summary_only = false;
        let mut frames = 1;
        let mut settings = None;
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                "--frames" => {
                    let value = args.next().context("--frames expects a frame count")?;
                    frames = value
                        .parse::<u64>()
                        .with_context(|| format!("invalid frame count {value}"))?;
                    if frames == 0 {
                        return Err(anyhow!("--frames must be at least 1"));
                    }
                }
                "--settings" => {
                    let value = args.next().context("--settings expects a file path")?;
                    settings = Some(PathBuf::from(value));
                }
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --summary-only, --frames or --settings"
                    ));
                }
            }
        }
        Ok(Self {
            asset_dir: PathBuf::from(asset_dir),
            summary_only,
            frames,
            settings,
        })
    }
}
