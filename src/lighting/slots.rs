//! Fixed-capacity per-renderable light slots.

use crate::lighting::registry::LightId;
use crate::scene::LightKey;

/// Number of lights a renderable is lit by in one draw.
pub const LOWPROFILE_LIGHTS: usize = 2;

/// One assigned light.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightSlot {
    pub light: LightKey,
    pub id: LightId,
    pub priority: f32,
}

/// The top-`K` lights of a renderable, highest priority first.
///
/// Entries past `len` are stale and never read.
#[derive(Debug, Clone, Copy)]
pub struct LightSlots<const K: usize> {
    entries: [LightSlot; K],
    len: usize,
}

impl<const K: usize> Default for LightSlots<K> {
    fn default() -> Self {
        Self {
            entries: [LightSlot::default(); K],
            len: 0,
        }
    }
}

impl<const K: usize> LightSlots<K> {
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[LightSlot] {
        &self.entries[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Insertion-sorts `candidate` by descending priority. Lower entries
    /// shift down and the last one falls off when full. Ties keep the
    /// earlier entry first. Returns `false` when the candidate was not kept
    /// (zero priority, or lower than every entry of a full array).
    pub fn insert(&mut self, candidate: LightSlot) -> bool {
        if K == 0 || candidate.priority <= 0.0 || candidate.priority.is_nan() {
            return false;
        }

        let mut pos = self.len;
        while pos > 0 && self.entries[pos - 1].priority < candidate.priority {
            pos -= 1;
        }
        if pos >= K {
            return false;
        }

        let end = self.len.min(K - 1);
        for i in (pos..end).rev() {
            self.entries[i + 1] = self.entries[i];
        }
        self.entries[pos] = candidate;
        self.len = (self.len + 1).min(K);
        true
    }

    /// Copy of the assigned lights sorted by stable id: the combination's
    /// identity.
    #[must_use]
    pub fn canonical(&self) -> Self {
        let mut sorted = *self;
        sorted.entries[..sorted.len].sort_by_key(|slot| slot.id);
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: u32, priority: f32) -> LightSlot {
        LightSlot {
            light: LightKey::default(),
            id: LightId(id),
            priority,
        }
    }

    #[test]
    fn keeps_highest_and_drops_lowest() {
        let mut slots = LightSlots::<2>::default();
        assert!(slots.insert(slot(0, 0.2)));
        assert!(slots.insert(slot(1, 0.5)));
        assert!(slots.insert(slot(2, 0.3)));
        assert!(!slots.insert(slot(3, 0.1)));

        let ids: Vec<u32> = slots.as_slice().iter().map(|s| s.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn zero_priority_is_never_inserted() {
        let mut slots = LightSlots::<2>::default();
        assert!(!slots.insert(slot(0, 0.0)));
        assert!(slots.is_empty());
    }

    #[test]
    fn canonical_order_is_by_id() {
        let mut slots = LightSlots::<2>::default();
        slots.insert(slot(7, 0.9));
        slots.insert(slot(3, 0.4));
        let canonical: Vec<u32> = slots.canonical().as_slice().iter().map(|s| s.id.0).collect();
        assert_eq!(canonical, vec![3, 7]);
    }
}
