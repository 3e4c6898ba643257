//! Light Combination States
//!
//! A [`LightState`] is the render state for "draw with exactly these
//! lights". Its identity is the light combination in canonical order
//! (ascending stable light id), so every renderable lit by the same set of
//! lights shares one state regardless of how each ranked them.
//!
//! The [`LightStateCache`] indexes every state under each of its member
//! lights; lookups go through the last (highest id) member.

use log::debug;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::lighting::registry::LightId;
use crate::lighting::slots::{LOWPROFILE_LIGHTS, LightSlot};
use crate::renderer::backend::RenderStateId;
use crate::scene::LightKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightStateId(u32);

impl LightStateId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
pub struct LightState {
    id: LightStateId,
    lights: SmallVec<[LightId; LOWPROFILE_LIGHTS]>,
    keys: SmallVec<[LightKey; LOWPROFILE_LIGHTS]>,
    pub ambient: bool,
    pub two_sided: bool,
    /// Renderer object, created when the frame prepares materials.
    pub render_state: Option<RenderStateId>,
}

impl LightState {
    #[inline]
    #[must_use]
    pub fn id(&self) -> LightStateId {
        self.id
    }

    /// Member light ids in canonical order.
    #[must_use]
    pub fn lights(&self) -> &[LightId] {
        &self.lights
    }

    #[must_use]
    pub fn light_keys(&self) -> &[LightKey] {
        &self.keys
    }
}

/// Per-frame-slot pool of light states.
#[derive(Debug, Default)]
pub struct LightStateCache {
    states: Vec<LightState>,
    by_light: FxHashMap<LightId, SmallVec<[LightStateId; 4]>>,
}

impl LightStateCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing state for exactly this canonical id sequence.
    #[must_use]
    pub fn find(&self, canonical: &[LightId]) -> Option<LightStateId> {
        let last = canonical.last()?;
        self.by_light
            .get(last)?
            .iter()
            .copied()
            .find(|id| self.states[id.index()].lights.as_slice() == canonical)
    }

    /// Returns the state for `canonical` (slots sorted by light id),
    /// creating it on first use. The flag is `true` when a state was
    /// created.
    pub fn get_or_create(&mut self, canonical: &[LightSlot]) -> (LightStateId, bool) {
        let ids: SmallVec<[LightId; LOWPROFILE_LIGHTS]> = canonical.iter().map(|s| s.id).collect();
        if let Some(existing) = self.find(&ids) {
            return (existing, false);
        }

        let id = LightStateId(self.states.len() as u32);
        for light in &ids {
            self.by_light.entry(*light).or_default().push(id);
        }
        debug!("New light state {id:?} for lights {ids:?}");
        self.states.push(LightState {
            id,
            keys: canonical.iter().map(|s| s.light).collect(),
            lights: ids,
            ambient: true,
            two_sided: false,
            render_state: None,
        });
        (id, true)
    }

    #[must_use]
    pub fn get(&self, id: LightStateId) -> Option<&LightState> {
        self.states.get(id.index())
    }

    /// States that still need a renderer object.
    pub fn unprepared_mut(&mut self) -> impl Iterator<Item = &mut LightState> {
        self.states.iter_mut().filter(|s| s.render_state.is_none())
    }

    /// States containing `light`.
    #[must_use]
    pub fn states_with(&self, light: LightId) -> &[LightStateId] {
        self.by_light.get(&light).map_or(&[][..], SmallVec::as_slice)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn clear(&mut self) {
        self.states.clear();
        self.by_light.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighting::registry::LightIdRegistry;
    use slotmap::SlotMap;

    #[test]
    fn equal_sequences_share_a_state() {
        let mut keys: SlotMap<LightKey, ()> = SlotMap::with_key();
        let mut registry = LightIdRegistry::new();
        let (a, b, c) = (keys.insert(()), keys.insert(()), keys.insert(()));
        let mut slot = |key| LightSlot {
            light: key,
            id: registry.id_for(key),
            priority: 1.0,
        };
        let (sa, sb, sc) = (slot(a), slot(b), slot(c));

        let mut cache = LightStateCache::new();
        let (ab, created) = cache.get_or_create(&[sa, sb]);
        assert!(created);
        let (again, created) = cache.get_or_create(&[sa, sb]);
        assert!(!created);
        assert_eq!(ab, again);

        let (bc, _) = cache.get_or_create(&[sb, sc]);
        let (b_only, _) = cache.get_or_create(&[sb]);
        assert_ne!(ab, bc);
        assert_ne!(ab, b_only);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.states_with(sb.id).len(), 3);
    }
}
