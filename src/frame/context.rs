//! Application Context
//!
//! State shared by every frame slot: settings, the scene handle, the main
//! camera, the timer, the renderer and the game states.
//!
//! # Locking
//!
//! Locks are always taken in this order, and any prefix may be skipped:
//!
//! ```text
//! renderer ──► game_states ──► scene
//! ```
//!
//! The small `inputs` lock is only held for snapshots and never nests.

use std::sync::Arc;
use std::time::Duration;

use log::{info, trace};
use parking_lot::{Mutex, RwLock};

use crate::errors::Result;
use crate::frame::game_state::GameState;
use crate::renderer::Renderer;
use crate::scene::Scene;
use crate::scene::camera::Camera;
use crate::settings::EngineSettings;
use crate::utils::Timer;

/// Time information handed to the scene update.
#[derive(Debug, Clone, Copy)]
pub struct UpdateContext {
    pub delta: Duration,
    pub elapsed: Duration,
    pub frame_count: u64,
    /// Frame slot being updated.
    pub slot: usize,
}

impl UpdateContext {
    #[must_use]
    pub fn dt(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

#[derive(Debug)]
struct SharedInputs {
    scene: Arc<RwLock<Scene>>,
    camera: Camera,
    timer: Timer,
    paused: bool,
    single_step: bool,
    fixed_step: Option<Duration>,
}

/// What a frame copies out of the context when it starts.
#[derive(Debug, Clone)]
pub(crate) struct FrameInputs {
    pub scene: Arc<RwLock<Scene>>,
    pub camera: Camera,
}

pub struct AppContext {
    settings: EngineSettings,
    inputs: Mutex<SharedInputs>,
    pub renderer: Mutex<Box<dyn Renderer>>,
    pub game_states: Mutex<Vec<Box<dyn GameState>>>,
}

impl AppContext {
    /// Validates `settings` and builds the shared context.
    ///
    /// The main camera is a 45° perspective matching the display aspect.
    pub fn new(
        settings: EngineSettings,
        renderer: Box<dyn Renderer>,
        scene: Scene,
    ) -> Result<Arc<Self>> {
        settings.validate()?;
        let camera = Camera::new_perspective(45.0, settings.display.aspect(), 1.0, 1000.0)
            .with_name("MainCamera");
        info!(
            "Engine context: {}x{}, {:?}, {} shadow splits",
            settings.display.width,
            settings.display.height,
            settings.threading,
            settings.shadowmap_splits
        );
        Ok(Arc::new(Self {
            settings,
            inputs: Mutex::new(SharedInputs {
                scene: Arc::new(RwLock::new(scene)),
                camera,
                timer: Timer::new(),
                paused: false,
                single_step: false,
                fixed_step: None,
            }),
            renderer: Mutex::new(renderer),
            game_states: Mutex::new(Vec::new()),
        }))
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn add_game_state(&self, state: impl GameState + 'static) {
        self.game_states.lock().push(Box::new(state));
    }

    #[must_use]
    pub fn scene(&self) -> Arc<RwLock<Scene>> {
        Arc::clone(&self.inputs.lock().scene)
    }

    /// Replaces the scene. Frames pick it up at their next start.
    pub fn set_scene(&self, scene: Scene) {
        self.inputs.lock().scene = Arc::new(RwLock::new(scene));
    }

    #[must_use]
    pub fn camera(&self) -> Camera {
        self.inputs.lock().camera.clone()
    }

    pub fn set_camera(&self, camera: Camera) {
        self.inputs.lock().camera = camera;
    }

    pub fn update_camera(&self, f: impl FnOnce(&mut Camera)) {
        f(&mut self.inputs.lock().camera);
    }

    pub fn set_paused(&self, paused: bool) {
        self.inputs.lock().paused = paused;
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.inputs.lock().paused
    }

    /// Lets exactly one update through while paused.
    pub fn single_step(&self) {
        self.inputs.lock().single_step = true;
    }

    /// Advances the timer by a fixed step per frame instead of wall time.
    pub fn set_fixed_step(&self, step: Option<Duration>) {
        self.inputs.lock().fixed_step = step;
    }

    pub(crate) fn snapshot(&self) -> FrameInputs {
        let inputs = self.inputs.lock();
        FrameInputs {
            scene: Arc::clone(&inputs.scene),
            camera: inputs.camera.clone(),
        }
    }

    /// Ticks the shared timer for `slot`. Returns `None` when the update
    /// should be skipped (paused without a pending single step).
    pub(crate) fn tick(&self, slot: usize) -> Option<UpdateContext> {
        let mut inputs = self.inputs.lock();
        match inputs.fixed_step {
            Some(step) => inputs.timer.advance(step),
            None => inputs.timer.tick(),
        }
        if inputs.paused {
            if !inputs.single_step {
                trace!("Frame {slot}: paused, update skipped");
                return None;
            }
            inputs.single_step = false;
        }
        Some(UpdateContext {
            delta: inputs.timer.delta,
            elapsed: inputs.timer.elapsed,
            frame_count: inputs.timer.frame_count,
            slot,
        })
    }

    /// Calls every game state's `cleanup` with the renderer.
    pub fn cleanup(&self) {
        let mut renderer = self.renderer.lock();
        let mut states = self.game_states.lock();
        for state in states.iter_mut() {
            state.cleanup(renderer.as_mut());
        }
        info!("Engine context cleaned up");
    }
}
