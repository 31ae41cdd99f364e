use anyhow::{anyhow, Result};
use log::{error, warn};

use crate::app::PortalApp;
use crate::clock::{Clock, ManualClock};
use crate::error::RenderError;
use crate::render::{Frame, FrameRenderer};

/// Suspension point between loop iterations.
///
/// Returns false once no further frame should run. The clock is handed over
/// so simulated schedulers can advance time while they "wait".
pub trait FrameScheduler<C> {
    fn wait_for_next_frame(&mut self, clock: &mut C) -> bool;
}

impl<C, F> FrameScheduler<C> for F
where
    F: FnMut(&mut C) -> bool,
{
    fn wait_for_next_frame(&mut self, clock: &mut C) -> bool {
        self(clock)
    }
}

/// Runs a fixed number of frames, advancing a manual clock by `step`
/// seconds between them.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimestep {
    pub remaining: u64,
    pub step: f32,
}

impl FrameScheduler<ManualClock> for FixedTimestep {
    fn wait_for_next_frame(&mut self, clock: &mut ManualClock) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            return false;
        }
        clock.advance(self.step);
        true
    }
}

/// Per-frame driver: reads the clock, updates the animated uniforms and the
/// camera controls, then renders one frame.
#[derive(Debug)]
pub struct RenderLoop<C> {
    clock: C,
    frames: u64,
}

impl<C: Clock> RenderLoop<C> {
    pub fn new(clock: C) -> Self {
        Self { clock, frames: 0 }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Frames rendered so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// One loop iteration. Fails only on unrecoverable render errors.
    pub fn tick(&mut self, app: &mut PortalApp, renderer: &mut dyn FrameRenderer) -> Result<()> {
        let elapsed = self.clock.elapsed_seconds();
        app.uniforms.set_elapsed_time(elapsed);
        app.controls.update(&mut app.camera);

        let frame = Frame {
            camera: app.camera_params(),
            scene: &app.scene,
            uniforms: &app.uniforms,
            settings: &app.settings,
        };
        match renderer.render(&frame) {
            Ok(()) => {}
            Err(RenderError::SurfaceLost | RenderError::SurfaceOutdated) => {
                renderer.reconfigure();
            }
            Err(RenderError::Timeout) => {
                warn!("Surface timeout; retrying next frame");
            }
            Err(err) => {
                error!("frame {} failed: {err}", self.frames);
                return Err(anyhow!(err));
            }
        }
        self.frames += 1;
        Ok(())
    }

    /// Runs iterations until the scheduler stops or a fatal error occurs.
    ///
    /// A finished model load is applied in the gap before each iteration,
    /// never during one.
    pub fn run<S>(
        &mut self,
        app: &mut PortalApp,
        renderer: &mut dyn FrameRenderer,
        scheduler: &mut S,
    ) -> Result<()>
    where
        S: FrameScheduler<C>,
    {
        loop {
            app.poll_model()?;
            self.tick(app, renderer)?;
            if !scheduler.wait_for_next_frame(&mut self.clock) {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::assets::{PendingModel, TextureData};
    use crate::config::SceneSettings;
    use crate::debug_panel::DebugPanel;
    use crate::obj::{ObjMesh, ObjObject};
    use crate::render::HeadlessRenderer;
    use crate::scene::LoadedScene;
    use crate::viewport::Viewport;

    fn portal_model() -> LoadedScene {
        LoadedScene::from_objects(
            ["baked", "portalLight", "poleLightA", "poleLightB"]
                .iter()
                .map(|name| ObjObject {
                    name: name.to_string(),
                    mesh: ObjMesh::default(),
                })
                .collect(),
        )
    }

    fn app(viewport: Viewport) -> PortalApp {
        PortalApp::new(
            &SceneSettings::default(),
            viewport,
            TextureData::solid("baked.png", [255, 255, 255, 255]),
            &mut StdRng::seed_from_u64(3),
        )
    }

    #[test]
    fn tick_synchronizes_both_shader_clocks() {
        let mut app = app(Viewport::new(800, 600, 1.0));
        let mut renderer = HeadlessRenderer::new(800, 600, 1.0);
        let mut render_loop = RenderLoop::new(ManualClock::new());

        render_loop.clock_mut().advance(0.5);
        render_loop.tick(&mut app, &mut renderer).unwrap();
        render_loop.clock_mut().advance(0.25);
        render_loop.tick(&mut app, &mut renderer).unwrap();

        assert_eq!(app.uniforms.portal.elapsed_time, 0.75);
        assert_eq!(app.uniforms.fireflies.elapsed_time, 0.75);
        for frame in renderer.frames() {
            assert_eq!(frame.portal_time, frame.firefly_time);
        }
        assert_eq!(render_loop.frame_count(), 2);
    }

    #[test]
    fn tick_advances_damped_orbit_and_uses_current_clear_color() {
        let mut app = app(Viewport::new(800, 600, 1.0));
        let mut renderer = HeadlessRenderer::new(800, 600, 1.0);
        let mut render_loop = RenderLoop::new(ManualClock::new());
        let start = app.camera.position;

        app.controls.rotate(Vec2::new(60.0, 0.0), 600.0);
        let queued = app.controls.pending_rotation();
        render_loop.tick(&mut app, &mut renderer).unwrap();

        let remaining = queued * (1.0 - app.controls.damping_factor);
        assert!(app.controls.pending_rotation().abs_diff_eq(remaining, 1e-6));
        let frame = renderer.last_frame().unwrap();
        assert!(!frame.camera_position.abs_diff_eq(start, 1e-4));
        assert_eq!(frame.camera_position, app.camera.position);

        DebugPanel
            .set_clear_color("#000000", &mut app.settings)
            .unwrap();
        render_loop.tick(&mut app, &mut renderer).unwrap();
        assert_eq!(renderer.last_frame().unwrap().clear_color, Vec3::ZERO);
        assert!(app
            .controls
            .pending_rotation()
            .abs_diff_eq(remaining * (1.0 - app.controls.damping_factor), 1e-6));
    }

    #[test]
    fn end_to_end_scene_composition() {
        let mut app = app(Viewport::new(800, 600, 3.0));
        let mut renderer = HeadlessRenderer::new(800, 600, 2.0);
        let mut render_loop = RenderLoop::new(ManualClock::new());
        assert_eq!(app.uniforms.fireflies.pixel_ratio, 2.0);
        assert_eq!(app.scene.renderable_count(), 1);

        app.start_model_load(PendingModel::ready("portal.obj", Ok(portal_model())));
        let mut scheduler = |clock: &mut ManualClock| {
            clock.set(1.23);
            false
        };
        render_loop.run(&mut app, &mut renderer, &mut scheduler).unwrap();
        assert_eq!(app.scene.renderable_count(), 5);

        render_loop.tick(&mut app, &mut renderer).unwrap();
        assert_eq!(app.uniforms.portal.elapsed_time, 1.23);
        assert_eq!(app.uniforms.fireflies.elapsed_time, 1.23);
        let last = renderer.last_frame().unwrap();
        assert_eq!(last.renderables, 5);
        assert_eq!(last.fireflies, 30);
    }

    #[test]
    fn fixed_timestep_runs_requested_frames() {
        let mut app = app(Viewport::new(800, 600, 1.0));
        let mut renderer = HeadlessRenderer::new(800, 600, 1.0);
        let mut render_loop = RenderLoop::new(ManualClock::new());
        let mut scheduler = FixedTimestep {
            remaining: 4,
            step: 0.5,
        };
        render_loop.run(&mut app, &mut renderer, &mut scheduler).unwrap();
        assert_eq!(render_loop.frame_count(), 4);
        let times: Vec<f32> = renderer.frames().iter().map(|f| f.portal_time).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.0, 1.5]);
    }

    #[test]
    fn lost_surface_is_reconfigured_and_loop_continues() {
        let mut app = app(Viewport::new(800, 600, 1.0));
        let mut renderer = HeadlessRenderer::new(800, 600, 1.0);
        renderer.fail_next(RenderError::SurfaceLost);
        renderer.fail_next(RenderError::Timeout);
        let mut render_loop = RenderLoop::new(ManualClock::new());
        let mut scheduler = FixedTimestep {
            remaining: 3,
            step: 0.1,
        };
        render_loop.run(&mut app, &mut renderer, &mut scheduler).unwrap();
        assert_eq!(renderer.reconfigure_count(), 1);
        assert_eq!(renderer.frames().len(), 1);
    }

    #[test]
    fn out_of_memory_halts_the_loop() {
        let mut app = app(Viewport::new(800, 600, 1.0));
        let mut renderer = HeadlessRenderer::new(800, 600, 1.0);
        renderer.fail_next(RenderError::OutOfMemory);
        let mut render_loop = RenderLoop::new(ManualClock::new());
        let mut scheduler = FixedTimestep {
            remaining: 10,
            step: 0.1,
        };
        let err = render_loop
            .run(&mut app, &mut renderer, &mut scheduler)
            .unwrap_err();
        assert_eq!(err.to_string(), "GPU is out of memory");
        assert_eq!(render_loop.frame_count(), 0);
    }

    #[test]
    fn incomplete_model_stops_the_loop() {
        let mut app = app(Viewport::new(800, 600, 1.0));
        let mut renderer = HeadlessRenderer::new(800, 600, 1.0);
        app.start_model_load(PendingModel::ready("portal.obj", Ok(LoadedScene::default())));
        let mut render_loop = RenderLoop::new(ManualClock::new());
        let mut scheduler = FixedTimestep {
            remaining: 10,
            step: 0.1,
        };
        let err = render_loop
            .run(&mut app, &mut renderer, &mut scheduler)
            .unwrap_err();
        assert_eq!(err.to_string(), "missing expected scene node baked");
        assert!(renderer.frames().is_empty());
    }
}
