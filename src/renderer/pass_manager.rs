//! Pass Manager
//!
//! Holds the render passes of one frame and produces their execution order.
//!
//! # Ordering
//!
//! Explicit dependencies always win: a pass runs after every pass it
//! depends on. Among passes whose dependencies are satisfied, the one with
//! the lowest `(stage, priority, registration index)` runs next. A cycle is
//! reported as [`LumenError::PassDependencyCycle`].
//!
//! # Lifetime
//!
//! Persistent passes survive [`PassManager::reset`]; transient passes are
//! dropped by it, or taken back by their owner with
//! [`PassManager::take_transient`] once the frame has rendered.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::errors::{LumenError, Result};
use crate::renderer::pass::{PassId, RenderPass};
use crate::scene::camera::{Camera, CameraId};

#[derive(Debug, Default)]
pub struct PassManager {
    passes: Vec<RenderPass>,
    /// pass -> passes it must run after
    dependencies: FxHashMap<PassId, SmallVec<[PassId; 2]>>,
}

impl PassManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, pass: RenderPass) -> PassId {
        let id = pass.id();
        self.passes.push(pass);
        id
    }

    /// Declares that `pass` must render after `depends_on`.
    pub fn add_dependency(&mut self, pass: PassId, depends_on: PassId) -> Result<()> {
        for id in [pass, depends_on] {
            if self.get(id).is_none() {
                return Err(LumenError::UnknownPass(id));
            }
        }
        let deps = self.dependencies.entry(pass).or_default();
        if !deps.contains(&depends_on) {
            deps.push(depends_on);
        }
        Ok(())
    }

    #[must_use]
    pub fn dependencies_of(&self, pass: PassId) -> &[PassId] {
        self.dependencies.get(&pass).map_or(&[][..], SmallVec::as_slice)
    }

    #[must_use]
    pub fn get(&self, id: PassId) -> Option<&RenderPass> {
        self.passes.iter().find(|p| p.id() == id)
    }

    #[must_use]
    pub fn get_mut(&mut self, id: PassId) -> Option<&mut RenderPass> {
        self.passes.iter_mut().find(|p| p.id() == id)
    }

    pub fn remove(&mut self, id: PassId) -> Option<RenderPass> {
        let index = self.passes.iter().position(|p| p.id() == id)?;
        let pass = self.passes.remove(index);
        self.forget_dependencies(&[id]);
        Some(pass)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderPass> {
        self.passes.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Distinct explicit cameras of the enabled passes, in registration
    /// order. Passes on the main camera contribute nothing.
    #[must_use]
    pub fn cameras(&self) -> Vec<&Camera> {
        let mut seen: FxHashSet<CameraId> = FxHashSet::default();
        self.passes
            .iter()
            .filter(|p| p.enabled)
            .filter_map(|p| p.camera.as_ref())
            .filter(|c| seen.insert(c.id()))
            .collect()
    }

    /// Drops every transient pass, keeping persistent ones.
    pub fn reset(&mut self) {
        drop(self.take_transient());
    }

    /// Removes and returns every transient pass.
    pub fn take_transient(&mut self) -> Vec<RenderPass> {
        let (persistent, transient): (Vec<_>, Vec<_>) =
            self.passes.drain(..).partition(|p| p.persistent);
        self.passes = persistent;
        let removed: Vec<PassId> = transient.iter().map(RenderPass::id).collect();
        self.forget_dependencies(&removed);
        transient
    }

    /// Moves every pass and dependency of `other` into `self`.
    pub fn merge(&mut self, other: &mut PassManager) {
        self.passes.append(&mut other.passes);
        for (pass, deps) in other.dependencies.drain() {
            let ours = self.dependencies.entry(pass).or_default();
            for dep in deps {
                if !ours.contains(&dep) {
                    ours.push(dep);
                }
            }
        }
    }

    /// Execution order of the registered passes.
    pub fn sorted(&self) -> Result<Vec<PassId>> {
        let index_of: FxHashMap<PassId, usize> = self
            .passes
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id(), i))
            .collect();

        let mut pending = vec![0usize; self.passes.len()];
        let mut dependents: Vec<SmallVec<[usize; 2]>> = vec![SmallVec::new(); self.passes.len()];
        for (pass, deps) in &self.dependencies {
            let Some(&after) = index_of.get(pass) else {
                continue;
            };
            for dep in deps {
                if let Some(&before) = index_of.get(dep) {
                    pending[after] += 1;
                    dependents[before].push(after);
                }
            }
        }

        let key = |i: usize| {
            let pass = &self.passes[i];
            (pass.stage, pass.priority, i)
        };

        let mut ready: Vec<usize> = (0..self.passes.len()).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(self.passes.len());

        while let Some(pos) = ready
            .iter()
            .enumerate()
            .min_by_key(|(_, i)| key(**i))
            .map(|(pos, _)| pos)
        {
            let next = ready.swap_remove(pos);
            order.push(self.passes[next].id());
            for &after in &dependents[next] {
                pending[after] -= 1;
                if pending[after] == 0 {
                    ready.push(after);
                }
            }
        }

        if order.len() != self.passes.len() {
            return Err(LumenError::PassDependencyCycle(
                self.passes.len() - order.len(),
            ));
        }
        Ok(order)
    }

    fn forget_dependencies(&mut self, removed: &[PassId]) {
        if removed.is_empty() {
            return;
        }
        self.dependencies.retain(|pass, deps| {
            deps.retain(|d| !removed.contains(d));
            !removed.contains(pass) && !deps.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::queue::QueueId;
    use crate::renderer::stage::PassStage;

    fn pass(name: &str, stage: PassStage) -> RenderPass {
        RenderPass::scene(name, &[QueueId::OPAQUE], stage)
    }

    #[test]
    fn stage_then_priority_then_insertion() {
        let mut passes = PassManager::new();
        let overlay = passes.add(pass("overlay", PassStage::Overlay));
        let late = passes.add(pass("late", PassStage::Opaque).with_priority(5));
        let early = passes.add(pass("early", PassStage::Opaque).with_priority(-1));
        let shadow = passes.add(pass("shadow", PassStage::ShadowMap));

        assert_eq!(passes.sorted().unwrap(), vec![shadow, early, late, overlay]);
    }

    #[test]
    fn dependency_overrides_stage() {
        let mut passes = PassManager::new();
        let first = passes.add(pass("a", PassStage::PreProcess));
        let second = passes.add(pass("b", PassStage::Overlay));
        passes.add_dependency(first, second).unwrap();

        assert_eq!(passes.sorted().unwrap(), vec![second, first]);
    }

    #[test]
    fn cycle_is_reported() {
        let mut passes = PassManager::new();
        let a = passes.add(pass("a", PassStage::Opaque));
        let b = passes.add(pass("b", PassStage::Opaque));
        passes.add_dependency(a, b).unwrap();
        passes.add_dependency(b, a).unwrap();

        assert!(matches!(
            passes.sorted(),
            Err(LumenError::PassDependencyCycle(2))
        ));
    }

    #[test]
    fn reset_keeps_persistent_passes() {
        let mut passes = PassManager::new();
        let kept = passes.add(pass("main", PassStage::Opaque).persistent());
        let dropped = passes.add(pass("tmp", PassStage::Opaque));
        passes.add_dependency(dropped, kept).unwrap();

        passes.reset();

        assert_eq!(passes.len(), 1);
        assert!(passes.get(kept).is_some());
        assert!(passes.dependencies_of(dropped).is_empty());
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut passes = PassManager::new();
        let a = passes.add(pass("a", PassStage::Opaque));
        let mut other = PassManager::new();
        let b = other.add(pass("b", PassStage::Opaque));

        assert!(matches!(
            passes.add_dependency(a, b),
            Err(LumenError::UnknownPass(_))
        ));

        passes.merge(&mut other);
        assert!(other.is_empty());
        assert!(passes.add_dependency(a, b).is_ok());
    }
}
