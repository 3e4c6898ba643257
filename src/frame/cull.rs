//! Cull Contexts
//!
//! A [`CullContext`] collects the output of culling one chunk of the scene
//! against one camera: its own queues, passes and pending-material list.
//! Contexts are pooled per frame:
//!
//! ```text
//! acquire()        free ──► used     (new context while used < max)
//! work_finished()  used ──► free     (after the frame merged it)
//! ```
//!
//! A context is in exactly one of the two lists. When the pool is
//! exhausted `acquire` returns `None` and the caller culls on its own
//! thread.

use log::{debug, warn};

use crate::errors::{LumenError, Result};
use crate::renderer::{PassManager, QueueId, RenderQueueManager};
use crate::scene::RenderableKey;
use crate::scene::camera::Camera;

/// Where culled renderables go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullTarget {
    /// Material buckets and the light list.
    Main,
    /// A single pass-private queue (shadow casters only).
    Redirect(QueueId),
}

impl From<Option<QueueId>> for CullTarget {
    fn from(queue: Option<QueueId>) -> Self {
        queue.map_or(CullTarget::Main, CullTarget::Redirect)
    }
}

/// One camera's culling request.
#[derive(Debug, Clone, Copy)]
pub struct CullJob<'a> {
    pub camera: &'a Camera,
    pub target: CullTarget,
    /// Frame slot whose world data is read.
    pub slot: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CullContextId(u32);

#[derive(Debug)]
pub struct CullContext {
    id: CullContextId,
    pub queues: RenderQueueManager,
    pub passes: PassManager,
    pub pending_materials: Vec<RenderableKey>,
}

impl CullContext {
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self {
            id: CullContextId(id),
            queues: RenderQueueManager::new(),
            passes: PassManager::new(),
            pending_materials: Vec::new(),
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> CullContextId {
        self.id
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty() && self.passes.is_empty() && self.pending_materials.is_empty()
    }

    pub fn reset(&mut self) {
        self.queues.reset();
        self.passes = PassManager::new();
        self.pending_materials.clear();
    }
}

#[derive(Debug)]
pub struct CullContextPool {
    free: Vec<CullContext>,
    used: Vec<CullContextId>,
    max: usize,
    next_id: u32,
}

impl CullContextPool {
    #[must_use]
    pub fn new(max: usize) -> Self {
        Self {
            free: Vec::new(),
            used: Vec::new(),
            max,
            next_id: 1,
        }
    }

    /// A context for one worker, or `None` when `max` are already in use.
    pub fn acquire(&mut self) -> Option<CullContext> {
        if self.used.len() >= self.max {
            return None;
        }
        let ctx = self.free.pop().unwrap_or_else(|| {
            let ctx = CullContext::new(self.next_id);
            self.next_id += 1;
            debug!("Allocated cull context {:?}", ctx.id());
            ctx
        });
        self.used.push(ctx.id());
        Some(ctx)
    }

    /// Returns a context whose work has been merged.
    pub fn work_finished(&mut self, mut ctx: CullContext) -> Result<()> {
        let index = self
            .used
            .iter()
            .position(|id| *id == ctx.id())
            .ok_or(LumenError::UnknownCullContext(ctx.id().0))?;
        self.used.swap_remove(index);
        ctx.reset();
        self.free.push(ctx);
        Ok(())
    }

    /// Prepares the pool for a new frame.
    pub fn reset(&mut self) {
        if !self.used.is_empty() {
            warn!("{} cull contexts were never returned", self.used.len());
            self.used.clear();
        }
        for ctx in &mut self.free {
            ctx.reset();
        }
    }

    #[must_use]
    pub fn max(&self) -> usize {
        self.max
    }

    #[must_use]
    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    #[must_use]
    pub fn used_len(&self) -> usize {
        self.used.len()
    }
}
