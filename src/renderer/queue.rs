//! Render Queues
//!
//! Per-frame buckets of renderables keyed by [`QueueId`]. Culling appends to
//! the buckets in discovery order; after every camera of the frame has been
//! culled the buckets are sorted once.
//!
//! | Queue                    | Contents                           | Sort order                     |
//! |--------------------------|------------------------------------|--------------------------------|
//! | [`QueueId::OPAQUE`]      | Opaque geometry                    | material, then front-to-back   |
//! | [`QueueId::TRANSPARENT`] | Alpha-tested geometry              | material, then front-to-back   |
//! | [`QueueId::TWO_SIDED`]   | Alpha-blended, two-sided geometry  | back-to-front                  |
//! | [`QueueId::LIGHT`]       | Lights (kept in a separate list)   | discovery order                |
//! | user (`>= 16`)           | Pass-private queues                | front-to-back                  |

use rustc_hash::{FxHashMap, FxHashSet};

use crate::scene::camera::Camera;
use crate::scene::{LightKey, RenderableKey, Scene};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueId(pub u32);

impl QueueId {
    pub const OPAQUE: Self = Self(0);
    /// Alpha-tested geometry.
    pub const TRANSPARENT: Self = Self(1);
    /// Alpha-blended geometry drawn with both faces.
    pub const TWO_SIDED: Self = Self(2);
    pub const LIGHT: Self = Self(3);

    /// First id handed out by [`RenderQueueManager::create_queue`].
    pub const FIRST_USER: u32 = 16;

    /// The three queues light selection runs over.
    pub const GEOMETRY: [Self; 3] = [Self::OPAQUE, Self::TRANSPARENT, Self::TWO_SIDED];

    #[inline]
    #[must_use]
    pub fn is_user(self) -> bool {
        self.0 >= Self::FIRST_USER
    }
}

/// Per-frame queue buckets.
#[derive(Debug)]
pub struct RenderQueueManager {
    buckets: FxHashMap<QueueId, Vec<RenderableKey>>,
    lights: Vec<LightKey>,
    next_user: u32,
}

impl Default for RenderQueueManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderQueueManager {
    #[must_use]
    pub fn new() -> Self {
        let mut buckets = FxHashMap::default();
        for queue in QueueId::GEOMETRY {
            buckets.insert(queue, Vec::new());
        }
        Self {
            buckets,
            lights: Vec::new(),
            next_user: QueueId::FIRST_USER,
        }
    }

    /// Empties every bucket, keeping allocations. User queue ids restart.
    pub fn reset(&mut self) {
        for bucket in self.buckets.values_mut() {
            bucket.clear();
        }
        self.lights.clear();
        self.next_user = QueueId::FIRST_USER;
    }

    /// Allocates a fresh user queue for this frame.
    pub fn create_queue(&mut self) -> QueueId {
        let id = QueueId(self.next_user);
        self.next_user += 1;
        self.buckets.entry(id).or_default();
        id
    }

    pub fn push(&mut self, queue: QueueId, renderable: RenderableKey) {
        self.buckets.entry(queue).or_default().push(renderable);
    }

    /// Adds a light to the light list; a light queued by several cameras
    /// appears once.
    pub fn push_light(&mut self, light: LightKey) {
        if !self.lights.contains(&light) {
            self.lights.push(light);
        }
    }

    #[must_use]
    pub fn queue(&self, queue: QueueId) -> &[RenderableKey] {
        self.buckets.get(&queue).map_or(&[][..], Vec::as_slice)
    }

    #[must_use]
    pub fn lights(&self) -> &[LightKey] {
        &self.lights
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum::<usize>() + self.lights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves every entry of `other` into `self` and leaves `other` empty.
    ///
    /// A renderable already in the target bucket is not added again, so a
    /// bucket holds each renderable once however many cameras saw it.
    /// User queue ids are frame-global, so `other`'s id counter is folded
    /// into ours.
    pub fn merge(&mut self, other: &mut RenderQueueManager) {
        for (queue, bucket) in &mut other.buckets {
            if bucket.is_empty() {
                continue;
            }
            let target = self.buckets.entry(*queue).or_default();
            let mut present: FxHashSet<RenderableKey> = target.iter().copied().collect();
            target.extend(bucket.drain(..).filter(|key| present.insert(*key)));
        }
        for light in other.lights.drain(..) {
            self.push_light(light);
        }
        self.next_user = self.next_user.max(other.next_user);
    }

    /// Sorts every bucket for submission and drops duplicates pushed
    /// directly with [`RenderQueueManager::push`].
    pub fn sort_all(&mut self, scene: &Scene, camera: &Camera, slot: usize) {
        let eye = camera.location();
        let depth = |key: &RenderableKey| {
            scene
                .renderable(*key)
                .map_or(f32::MAX, |r| r.world_bound(slot).center().distance_squared(eye))
        };
        let material = |key: &RenderableKey| scene.renderable(*key).map(|r| r.material.material);

        for (queue, bucket) in &mut self.buckets {
            match *queue {
                QueueId::OPAQUE | QueueId::TRANSPARENT => bucket.sort_by(|a, b| {
                    material(a)
                        .cmp(&material(b))
                        .then_with(|| depth(a).total_cmp(&depth(b)))
                        .then_with(|| a.cmp(b))
                }),
                QueueId::TWO_SIDED => bucket.sort_by(|a, b| {
                    depth(b).total_cmp(&depth(a)).then_with(|| a.cmp(b))
                }),
                _ => bucket.sort_by(|a, b| depth(a).total_cmp(&depth(b)).then_with(|| a.cmp(b))),
            }
            bucket.dedup();
        }
    }
}
