//! Stable light ids.
//!
//! Light selection orders combinations by a small integer per light. Ids are
//! handed out on first encounter, increase monotonically and are never
//! reused for the lifetime of the registry, even after the light is removed
//! from the scene.

use rustc_hash::FxHashMap;

use crate::scene::LightKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct LightId(pub u32);

/// Session-scoped id table (`LightKey <-> LightId`).
#[derive(Debug, Default)]
pub struct LightIdRegistry {
    by_key: FxHashMap<LightKey, LightId>,
    by_id: Vec<LightKey>,
}

impl LightIdRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `light`, assigning the next one on first encounter.
    pub fn id_for(&mut self, light: LightKey) -> LightId {
        if let Some(id) = self.by_key.get(&light) {
            return *id;
        }
        let id = LightId(self.by_id.len() as u32);
        self.by_id.push(light);
        self.by_key.insert(light, id);
        id
    }

    #[must_use]
    pub fn get(&self, light: LightKey) -> Option<LightId> {
        self.by_key.get(&light).copied()
    }

    #[must_use]
    pub fn light(&self, id: LightId) -> Option<LightKey> {
        self.by_id.get(id.0 as usize).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
