//! The Frame
//!
//! One [`Frame`] per slot runs the whole pipeline of a logical frame:
//!
//! ```text
//! start_frame ─► update ─► cull_scene ─► (sort) ─► render ─► end_frame
//! ```
//!
//! Culling loops over a camera list: the main camera and every distinct
//! pass camera seed it, and `post_cull` hooks may append more (shadow
//! cameras) through [`Frame::add_camera_to_cull`]. The loop ends when no
//! camera is pending, which hooks detect with
//! [`Frame::has_camera_to_cull`].
//!
//! Rendering walks the sorted pass list under the renderer lock, switching
//! target and camera only when they change. Targets used in a frame are
//! marked dirty and cleared the next time a pass switches onto them.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;

use log::{debug, error, trace};
use parking_lot::RwLock;
use rustc_hash::FxHashSet;

use crate::errors::{LumenError, Result};
use crate::frame::MAX_FRAMES;
use crate::frame::context::AppContext;
use crate::frame::cull::{CullContext, CullContextPool, CullJob, CullTarget};
use crate::frame::game_state::Hook;
use crate::frame::state::{FrameSignal, FrameState};
use crate::renderer::{
    ClearFlags, LightStateCache, MaterialId, PassContext, PassManager, PassStage, QueueId,
    RenderPass, RenderQueueManager, RenderTarget, Renderer, Screenshot, StateKind,
};
use crate::scene::camera::{Camera, CameraId};
use crate::scene::{RenderableKey, Scene};

/// A camera waiting to be culled (or already culled) this frame.
#[derive(Debug, Clone)]
pub struct CameraEntry {
    pub camera: Camera,
    /// `None` culls into the material buckets, `Some` into one queue.
    pub target: Option<QueueId>,
}

pub struct Frame {
    id: usize,
    app: Arc<AppContext>,
    signal: Arc<FrameSignal>,

    scene: Arc<RwLock<Scene>>,
    camera: Camera,

    queues: RenderQueueManager,
    passes: PassManager,
    cull_pool: CullContextPool,
    local: CullContext,

    pending_cameras: VecDeque<CameraEntry>,
    processed_cameras: Vec<CameraEntry>,
    pending_materials: Vec<RenderableKey>,

    light_states: LightStateCache,
    dirty_targets: FxHashSet<RenderTarget>,
    forced_material: Option<MaterialId>,

    screenshot_requested: bool,
    screenshot: Option<Screenshot>,
    updated: bool,
}

impl Frame {
    /// Builds the frame for `slot` with the default opaque and transparent
    /// scene passes registered as persistent passes.
    pub fn new(slot: usize, app: Arc<AppContext>) -> Result<Self> {
        if slot >= MAX_FRAMES {
            return Err(LumenError::FrameSlotOutOfRange(slot));
        }
        let inputs = app.snapshot();
        let mut passes = PassManager::new();
        passes.add(
            RenderPass::scene(
                "Opaque",
                &[QueueId::OPAQUE, QueueId::TRANSPARENT],
                PassStage::Opaque,
            )
            .persistent(),
        );
        passes.add(
            RenderPass::scene("Transparent", &[QueueId::TWO_SIDED], PassStage::Transparent)
                .persistent(),
        );

        Ok(Self {
            id: slot,
            cull_pool: CullContextPool::new(app.settings().max_cull_threads),
            app,
            signal: Arc::new(FrameSignal::new(slot)),
            scene: inputs.scene,
            camera: inputs.camera,
            queues: RenderQueueManager::new(),
            passes,
            local: CullContext::new(0),
            pending_cameras: VecDeque::new(),
            processed_cameras: Vec::new(),
            pending_materials: Vec::new(),
            light_states: LightStateCache::new(),
            dirty_targets: FxHashSet::default(),
            forced_material: None,
            screenshot_requested: false,
            screenshot: None,
            updated: false,
        })
    }

    // === Accessors ===

    #[inline]
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> FrameState {
        self.signal.get()
    }

    #[must_use]
    pub fn signal(&self) -> Arc<FrameSignal> {
        Arc::clone(&self.signal)
    }

    #[must_use]
    pub fn app(&self) -> &Arc<AppContext> {
        &self.app
    }

    /// Main camera snapshot of this frame.
    #[inline]
    #[must_use]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[must_use]
    pub fn scene(&self) -> &Arc<RwLock<Scene>> {
        &self.scene
    }

    #[inline]
    #[must_use]
    pub fn queues(&self) -> &RenderQueueManager {
        &self.queues
    }

    #[inline]
    pub fn queues_mut(&mut self) -> &mut RenderQueueManager {
        &mut self.queues
    }

    #[inline]
    #[must_use]
    pub fn passes(&self) -> &PassManager {
        &self.passes
    }

    #[inline]
    pub fn passes_mut(&mut self) -> &mut PassManager {
        &mut self.passes
    }

    #[must_use]
    pub fn light_states(&self) -> &LightStateCache {
        &self.light_states
    }

    pub fn light_states_mut(&mut self) -> &mut LightStateCache {
        &mut self.light_states
    }

    /// Queues and light states together, for code that fills one from the
    /// other.
    pub fn queues_and_light_states(&mut self) -> (&RenderQueueManager, &mut LightStateCache) {
        (&self.queues, &mut self.light_states)
    }

    #[must_use]
    pub fn cull_pool(&self) -> &CullContextPool {
        &self.cull_pool
    }

    #[must_use]
    pub fn pending_materials(&self) -> &[RenderableKey] {
        &self.pending_materials
    }

    #[must_use]
    pub fn processed_cameras(&self) -> &[CameraEntry] {
        &self.processed_cameras
    }

    /// `false` when the update stage was skipped (paused).
    #[must_use]
    pub fn was_updated(&self) -> bool {
        self.updated
    }

    pub fn set_forced_material(&mut self, material: Option<MaterialId>) {
        self.forced_material = material;
    }

    /// Captures the main target after this frame's passes.
    pub fn request_screenshot(&mut self) {
        self.screenshot_requested = true;
    }

    pub fn take_screenshot(&mut self) -> Option<Screenshot> {
        self.screenshot.take()
    }

    // === Camera list ===

    /// `true` while cameras are still waiting to be culled this frame.
    #[must_use]
    pub fn has_camera_to_cull(&self) -> bool {
        !self.pending_cameras.is_empty()
    }

    /// Schedules `camera` for culling in this frame. `target` redirects the
    /// culled shadow casters into a single queue. A camera already pending
    /// or processed this frame is ignored.
    pub fn add_camera_to_cull(&mut self, camera: Camera, target: Option<QueueId>) {
        let id = camera.id();
        if self.knows_camera(id) {
            return;
        }
        trace!("Frame {}: camera {:?} queued for culling", self.id, camera.name);
        self.pending_cameras.push_back(CameraEntry { camera, target });
    }

    fn knows_camera(&self, id: CameraId) -> bool {
        self.pending_cameras
            .iter()
            .chain(&self.processed_cameras)
            .any(|e| e.camera.id() == id)
    }

    // === Lifecycle ===

    fn transition(&self, to: FrameState) -> Result<()> {
        self.signal.transition(to)
    }

    /// Resets the per-frame collections and snapshots the shared inputs.
    pub fn start_frame(&mut self) -> Result<()> {
        if self.state() != FrameState::Starting {
            self.transition(FrameState::Starting)?;
        }

        let inputs = self.app.snapshot();
        self.scene = inputs.scene;
        self.camera = inputs.camera;

        self.cull_pool.reset();
        self.local.reset();
        self.queues.reset();
        self.passes.reset();
        self.pending_cameras.clear();
        self.processed_cameras.clear();
        self.pending_materials.clear();
        self.screenshot = None;

        self.notify(Hook::PreFrame)
    }

    /// Advances time and updates the scene's world data for this slot.
    pub fn update(&mut self) -> Result<()> {
        self.transition(FrameState::Update)?;

        let Some(ctx) = self.app.tick(self.id) else {
            self.updated = false;
            return Ok(());
        };
        self.notify(Hook::PreUpdate)?;
        self.scene.write().update_geometric_state(&ctx, true);
        self.updated = true;
        Ok(())
    }

    /// Culls every camera of the frame, then sorts the queues.
    pub fn cull_scene(&mut self) -> Result<()> {
        self.transition(FrameState::Cull)?;
        self.notify(Hook::PreCull)?;

        self.add_camera_to_cull(self.camera.clone(), None);
        let pass_cameras: Vec<Camera> = self.passes.cameras().into_iter().cloned().collect();
        for camera in pass_cameras {
            self.add_camera_to_cull(camera, None);
        }

        while let Some(entry) = self.pending_cameras.pop_front() {
            self.cull_camera(&entry)?;
            self.processed_cameras.push(entry);
            self.notify(Hook::PostCull)?;
        }

        let scene = Arc::clone(&self.scene);
        self.queues.sort_all(&scene.read(), &self.camera, self.id);
        debug!(
            "Frame {}: culled {} cameras, {} queued entries, {} passes",
            self.id,
            self.processed_cameras.len(),
            self.queues.len(),
            self.passes.len()
        );
        self.transition(FrameState::Ready)
    }

    fn cull_camera(&mut self, entry: &CameraEntry) -> Result<()> {
        let scene = Arc::clone(&self.scene);
        let scene = scene.read();
        let job = CullJob {
            camera: &entry.camera,
            target: CullTarget::from(entry.target),
            slot: self.id,
        };

        if job.target == CullTarget::Main {
            scene.queue_lights(&job, &mut self.local);
        }

        let keys = scene.renderable_keys();
        let workers = if self.app.settings().is_multithreaded() {
            self.cull_pool.max()
        } else {
            1
        };

        if workers < 2 || keys.len() < 2 {
            scene.queue(&job, &keys, &mut self.local);
        } else {
            let chunk_size = keys.len().div_ceil(workers);
            let (tx, rx) = flume::unbounded::<CullContext>();
            let scene_ref: &Scene = &scene;
            let job_ref = &job;
            let pool = &mut self.cull_pool;
            let local = &mut self.local;

            let finished: Vec<CullContext> = thread::scope(|s| {
                for chunk in keys.chunks(chunk_size) {
                    match pool.acquire() {
                        Some(mut ctx) => {
                            let tx = tx.clone();
                            s.spawn(move || {
                                scene_ref.queue(job_ref, chunk, &mut ctx);
                                // The receiver outlives the scope.
                                let _ = tx.send(ctx);
                            });
                        }
                        None => scene_ref.queue(job_ref, chunk, local),
                    }
                }
                drop(tx);
                rx.iter().collect()
            });

            for mut ctx in finished {
                self.merge(&mut ctx);
                self.cull_pool.work_finished(ctx)?;
            }
        }

        let mut local = std::mem::replace(&mut self.local, CullContext::new(0));
        self.merge(&mut local);
        self.local = local;
        Ok(())
    }

    /// Moves a cull context's queues, passes and pending materials into the
    /// frame, leaving the context empty.
    pub fn merge(&mut self, ctx: &mut CullContext) {
        self.queues.merge(&mut ctx.queues);
        self.passes.merge(&mut ctx.passes);
        for key in ctx.pending_materials.drain(..) {
            if !self.pending_materials.contains(&key) {
                self.pending_materials.push(key);
            }
        }
    }

    /// Renders the sorted passes. Any failure ends the frame.
    pub fn render(&mut self) -> Result<()> {
        self.transition(FrameState::Material)?;

        if let Err(err) = self.render_locked() {
            error!("Frame {} render failed: {err}", self.id);
            self.signal.end();
            return Err(err);
        }

        self.notify(Hook::PostRender)?;
        self.notify(Hook::AfterRender)
    }

    fn render_locked(&mut self) -> Result<()> {
        let app = Arc::clone(&self.app);
        let mut guard = app.renderer.lock();
        let renderer: &mut dyn Renderer = &mut **guard;

        renderer.set_render_target(RenderTarget::Main)?;
        if self.dirty_targets.remove(&RenderTarget::Main) {
            renderer.clear_buffers(ClearFlags::COLOR | ClearFlags::DEPTH);
        }

        self.notify(Hook::PreMaterial)?;
        self.prepare_materials(renderer)?;
        self.notify(Hook::PreRender)?;

        self.transition(FrameState::Rendering)?;

        let order = self.passes.sorted()?;
        let scene = Arc::clone(&self.scene);
        let scene = scene.read();

        let mut current_target = RenderTarget::Main;
        let mut current_camera: Option<CameraId> = None;
        let mut used_targets: FxHashSet<RenderTarget> = FxHashSet::default();
        used_targets.insert(RenderTarget::Main);

        for id in order {
            let Some(pass) = self.passes.get_mut(id) else {
                continue;
            };
            if !pass.enabled {
                continue;
            }

            if pass.target != current_target {
                renderer.set_render_target(pass.target)?;
                current_target = pass.target;
                if self.dirty_targets.remove(&pass.target) {
                    renderer.clear_buffers(pass.clear);
                }
            }

            let camera = pass.camera.as_ref().unwrap_or(&self.camera);
            if current_camera != Some(camera.id()) {
                renderer.set_camera(camera);
                current_camera = Some(camera.id());
            }

            renderer.set_forced_material(pass.forced_material.or(self.forced_material));
            used_targets.insert(pass.target);

            let mut ctx = PassContext {
                renderer: &mut *renderer,
                scene: &scene,
                queues: &self.queues,
                light_states: &self.light_states,
                slot: self.id,
            };
            pass.render(&mut ctx).map_err(|err| LumenError::PassFailed {
                pass: pass.name.clone(),
                reason: err.to_string(),
            })?;
        }

        if current_target != RenderTarget::Main {
            renderer.set_render_target(RenderTarget::Main)?;
        }
        if self.screenshot_requested {
            self.screenshot = Some(renderer.take_screenshot()?);
            self.screenshot_requested = false;
        }
        renderer.display_back_buffer()?;
        self.dirty_targets.extend(used_targets);
        Ok(())
    }

    /// Creates the render states of newly visible materials and of light
    /// states that have none yet.
    fn prepare_materials(&mut self, renderer: &mut dyn Renderer) -> Result<()> {
        let scene = Arc::clone(&self.scene);
        let mut scene = scene.write();
        for key in self.pending_materials.drain(..) {
            let Some(renderable) = scene.renderable_mut(key) else {
                continue;
            };
            if renderable.material.render_state().is_none() {
                let state = renderer.create_state(StateKind::Material(renderable.material.material))?;
                renderable.material.set_render_state(state);
            }
        }
        for light_state in self.light_states.unprepared_mut() {
            light_state.render_state = Some(renderer.create_state(StateKind::LightCombination)?);
        }
        Ok(())
    }

    pub fn end_frame(&mut self) -> Result<()> {
        self.transition(FrameState::Finished)
    }

    /// Runs one full cycle. Any error ends the frame.
    pub fn execute(&mut self) -> Result<()> {
        let result = self.run_cycle();
        if result.is_err() {
            self.signal.end();
        }
        result
    }

    fn run_cycle(&mut self) -> Result<()> {
        self.start_frame()?;
        self.update()?;
        self.cull_scene()?;
        self.render()?;
        self.end_frame()
    }

    /// Blocks until the frame is released (`true`) or ended (`false`).
    pub fn wait_restart(&self) -> bool {
        let state = self
            .signal
            .wait_until(|s| matches!(s, FrameState::Starting | FrameState::Ended));
        state == FrameState::Starting
    }

    /// Frame thread body: run a cycle every time the frame is released,
    /// until it ends. Hands the frame back to the joiner.
    pub fn run(mut self) -> (Self, Result<()>) {
        debug!("Frame {} thread started", self.id);
        let result = loop {
            if !self.wait_restart() {
                break Ok(());
            }
            if let Err(err) = self.execute() {
                break Err(err);
            }
        };
        debug!("Frame {} thread exiting", self.id);
        (self, result)
    }

    fn notify(&mut self, hook: Hook) -> Result<()> {
        let app = Arc::clone(&self.app);
        let scene = Arc::clone(&self.scene);
        let mut states = app.game_states.lock();
        if states.is_empty() {
            return Ok(());
        }
        let mut scene = scene.write();
        for state in states.iter_mut() {
            hook.call(state.as_mut(), self, &mut scene)?;
        }
        Ok(())
    }
}
