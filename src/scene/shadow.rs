//! Shadow data owned by a light.
//!
//! A [`Shadow`] belongs to exactly one light. It stores either a list of
//! cascade slices ([`ShadowMode::Perspective`]) or a sparse set of
//! world-space blocks keyed by quantized position ([`ShadowMode::Scene`]).
//! Parts are reused across frames: the perspective list only grows.

use glam::{IVec3, Mat4, Vec3};
use log::debug;
use rustc_hash::FxHashMap;

use crate::errors::{LumenError, Result};
use crate::renderer::TextureId;
use crate::scene::LightKey;
use crate::scene::camera::Camera;

/// One cascade slice (or one scene block) of a shadow.
#[derive(Debug, Clone)]
pub struct ShadowPart {
    pub camera: Camera,
    pub projection: Mat4,
    pub view: Mat4,
    /// `projection * view`, used for shadow lookups in the lighting pass.
    pub light_space: Mat4,
    pub texture: TextureId,
    pub dimension: u32,
}

impl ShadowPart {
    #[must_use]
    pub fn new(dimension: u32) -> Self {
        let camera = Camera::new_perspective(45.0, 1.0, 1.8, 50.0).with_name("ShadowCamera");
        Self {
            projection: camera.projection_matrix(),
            view: camera.view_matrix(),
            light_space: camera.view_projection_matrix(),
            camera,
            texture: TextureId::allocate(),
            dimension,
        }
    }

    /// Copies the matrices out of the part's camera after it was placed.
    pub fn sync_matrices(&mut self) {
        self.projection = self.camera.projection_matrix();
        self.view = self.camera.view_matrix();
        self.light_space = self.camera.view_projection_matrix();
    }
}

#[derive(Debug, Clone)]
pub enum ShadowMode {
    /// Cascaded slices of the view frustum, index = split.
    Perspective(Vec<ShadowPart>),
    /// Static world blocks of edge length `block_size`.
    Scene {
        block_size: f32,
        blocks: FxHashMap<IVec3, ShadowPart>,
    },
}

#[derive(Debug, Clone)]
pub struct Shadow {
    parent: Option<LightKey>,
    mode: ShadowMode,
}

impl Shadow {
    #[must_use]
    pub fn perspective() -> Self {
        Self {
            parent: None,
            mode: ShadowMode::Perspective(Vec::new()),
        }
    }

    #[must_use]
    pub fn scene(block_size: f32) -> Self {
        Self {
            parent: None,
            mode: ShadowMode::Scene {
                block_size,
                blocks: FxHashMap::default(),
            },
        }
    }

    #[must_use]
    pub fn parent(&self) -> Option<LightKey> {
        self.parent
    }

    /// Binds the shadow to its light. A shadow has exactly one parent; a
    /// second call fails and keeps the original parent.
    pub fn set_parent(&mut self, light: LightKey) -> Result<()> {
        if let Some(existing) = self.parent {
            return Err(LumenError::ShadowAlreadyParented { existing });
        }
        self.parent = Some(light);
        Ok(())
    }

    #[must_use]
    pub fn mode(&self) -> &ShadowMode {
        &self.mode
    }

    /// Number of cascade slices allocated so far (0 in scene mode).
    #[must_use]
    pub fn split_count(&self) -> usize {
        match &self.mode {
            ShadowMode::Perspective(parts) => parts.len(),
            ShadowMode::Scene { .. } => 0,
        }
    }

    /// Grows the cascade list to at least `count` slices, keeping every
    /// existing slice. No-op in scene mode.
    pub fn ensure_perspective_splits(&mut self, count: usize, base_dimension: u32) {
        if let ShadowMode::Perspective(parts) = &mut self.mode {
            while parts.len() < count {
                let dimension = base_dimension >> parts.len();
                debug!("Allocating shadow split {} ({dimension} texels)", parts.len());
                parts.push(ShadowPart::new(dimension));
            }
        }
    }

    #[must_use]
    pub fn part(&self, split: usize) -> Option<&ShadowPart> {
        match &self.mode {
            ShadowMode::Perspective(parts) => parts.get(split),
            ShadowMode::Scene { .. } => None,
        }
    }

    #[must_use]
    pub fn part_mut(&mut self, split: usize) -> Option<&mut ShadowPart> {
        match &mut self.mode {
            ShadowMode::Perspective(parts) => parts.get_mut(split),
            ShadowMode::Scene { .. } => None,
        }
    }

    /// The scene-mode block containing `position`, created on first use.
    /// Returns `None` in perspective mode.
    pub fn block_at(&mut self, position: Vec3, dimension: u32) -> Option<&mut ShadowPart> {
        match &mut self.mode {
            ShadowMode::Scene { block_size, blocks } => {
                let key = (position / *block_size).floor().as_ivec3();
                Some(blocks.entry(key).or_insert_with(|| ShadowPart::new(dimension)))
            }
            ShadowMode::Perspective(_) => None,
        }
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        match &self.mode {
            ShadowMode::Scene { blocks, .. } => blocks.len(),
            ShadowMode::Perspective(_) => 0,
        }
    }
}
