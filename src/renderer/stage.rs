//! Pass Stage Definitions
//!
//! `PassStage` gives render passes a coarse execution order. Within a
//! stage, passes run by explicit dependency first, then by priority, then in
//! registration order.
//!
//! | Stage | Purpose | Typical Content |
//! |-------|---------|-----------------|
//! | `PreProcess` | Work that feeds later passes | Render-to-texture, environment capture |
//! | `ShadowMap` | Depth capture from light cameras | Cascade depth passes |
//! | `Opaque` | Main scene geometry | Opaque and alpha-tested queues |
//! | `Lighting` | Additive per-light passes | Shadowed and unshadowed light passes |
//! | `Transparent` | Blended geometry | Two-sided alpha-blended queue |
//! | `Overlay` | Drawn last | HUD, debug overlays |

/// Render pass stage.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum PassStage {
    PreProcess = 0,
    ShadowMap = 1,
    #[default]
    Opaque = 2,
    Lighting = 3,
    Transparent = 4,
    Overlay = 5,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        assert!(PassStage::PreProcess < PassStage::ShadowMap);
        assert!(PassStage::ShadowMap < PassStage::Opaque);
        assert!(PassStage::Opaque < PassStage::Lighting);
        assert!(PassStage::Lighting < PassStage::Transparent);
        assert!(PassStage::Transparent < PassStage::Overlay);
    }
}
