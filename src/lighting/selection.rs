//! Per-Renderable Light Selection
//!
//! After the last camera of a frame is culled, every lit renderable in the
//! geometry queues gets its `LOWPROFILE_LIGHTS` strongest lights, and
//! renderables lit by the same set of lights share one [`LightState`].
//!
//! ```text
//! light queue ──► value_for(light, renderable) ──► top-K slots
//!                                                    │
//!                     canonical (sorted by id) ◄─────┘
//!                               │
//!                LightStateCache::get_or_create ──► renderable.light_state
//! ```
//!
//! [`LightState`]: crate::renderer::LightState

use log::{debug, trace};

use crate::errors::Result;
use crate::frame::{Frame, GameState, MAX_FRAMES};
use crate::lighting::registry::LightIdRegistry;
use crate::lighting::slots::LightSlot;
use crate::lighting::sorter::LightSorter;
use crate::renderer::{LightStateCache, QueueId, RenderQueueManager};
use crate::scene::Scene;

/// Counters of one selection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionStats {
    pub renderables: usize,
    pub lit: usize,
    pub new_states: usize,
}

#[derive(Debug, Default)]
pub struct LightSelectionState {
    registry: LightIdRegistry,
    processed: [bool; MAX_FRAMES],
    last: SelectionStats,
}

impl LightSelectionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn registry(&self) -> &LightIdRegistry {
        &self.registry
    }

    /// Stats of the most recent run.
    #[must_use]
    pub fn last_stats(&self) -> SelectionStats {
        self.last
    }

    /// Assigns the top lights and a shared light state to every renderable
    /// in the geometry queues of `slot`.
    pub fn select(
        scene: &mut Scene,
        queues: &RenderQueueManager,
        light_states: &mut LightStateCache,
        registry: &mut LightIdRegistry,
        slot: usize,
    ) -> SelectionStats {
        let mut stats = SelectionStats::default();

        for queue in QueueId::GEOMETRY {
            for key in queues.queue(queue) {
                if let Some(renderable) = scene.renderables.get_mut(*key) {
                    renderable.clear_lights(slot);
                }
            }
        }

        let Scene {
            renderables, lights, ..
        } = scene;

        for &light_key in queues.lights() {
            let Some(batch) = lights.get(light_key) else {
                continue;
            };
            if !batch.light.enabled {
                continue;
            }
            let id = registry.id_for(light_key);

            for queue in QueueId::GEOMETRY {
                for key in queues.queue(queue) {
                    let Some(renderable) = renderables.get_mut(*key) else {
                        continue;
                    };
                    if !renderable.material.is_lit() {
                        continue;
                    }
                    let priority = LightSorter::value_for(batch, slot, renderable.world_bound(slot));
                    renderable.frame_data_mut(slot).lights.insert(LightSlot {
                        light: light_key,
                        id,
                        priority,
                    });
                }
            }
        }

        for queue in QueueId::GEOMETRY {
            for key in queues.queue(queue) {
                let Some(renderable) = renderables.get_mut(*key) else {
                    continue;
                };
                stats.renderables += 1;
                let data = renderable.frame_data_mut(slot);
                if data.lights.is_empty() {
                    continue;
                }
                let canonical = data.lights.canonical();
                let (state, created) = light_states.get_or_create(canonical.as_slice());
                data.light_state = Some(state);
                stats.lit += 1;
                if created {
                    stats.new_states += 1;
                }
            }
        }
        stats
    }
}

impl GameState for LightSelectionState {
    fn pre_frame(&mut self, frame: &mut Frame, _scene: &mut Scene) -> Result<()> {
        self.processed[frame.id()] = false;
        Ok(())
    }

    fn post_cull(&mut self, frame: &mut Frame, scene: &mut Scene) -> Result<()> {
        let slot = frame.id();
        if frame.has_camera_to_cull() || self.processed[slot] {
            return Ok(());
        }
        self.processed[slot] = true;

        let (queues, light_states) = frame.queues_and_light_states();
        let stats = Self::select(scene, queues, light_states, &mut self.registry, slot);
        if stats.new_states > 0 {
            debug!(
                "Frame {slot}: {} new light states ({} cached)",
                stats.new_states,
                light_states.len()
            );
        }
        trace!(
            "Frame {slot}: {}/{} renderables lit",
            stats.lit, stats.renderables
        );
        self.last = stats;
        Ok(())
    }
}
