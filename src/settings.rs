//! Engine Settings
//!
//! Global configuration consumed once when the application context is
//! built. Settings can be constructed in code (every field has a sensible
//! default) or loaded from JSON:
//!
//! ```rust,ignore
//! use lumen::settings::{EngineSettings, ThreadingMode};
//!
//! let settings = EngineSettings {
//!     threading: ThreadingMode::MultiThreaded,
//!     shadowmap_splits: 3,
//!     ..Default::default()
//! };
//!
//! let from_file = EngineSettings::from_json_str(r#"{ "shadowmap_splits": 2 }"#)?;
//! ```
//!
//! Invalid values are configuration errors: [`EngineSettings::validate`]
//! rejects them and [`AppContext::new`](crate::frame::AppContext::new)
//! refuses to construct with them.

use serde::Deserialize;

use crate::errors::{LumenError, Result};

// ---------------------------------------------------------------------------
// DisplaySettings
// ---------------------------------------------------------------------------

/// Display mode requested from the window system.
///
/// Window creation itself is external; the engine only validates the mode
/// and uses the resolution for the main camera aspect ratio.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub width: u32,
    pub height: u32,
    /// Color depth in bits per pixel. Accepted values: 16, 24, 32.
    pub bit_depth: u32,
    pub fullscreen: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            bit_depth: 32,
            fullscreen: false,
        }
    }
}

impl DisplaySettings {
    #[must_use]
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(LumenError::InvalidDisplayMode(format!(
                "resolution {}x{} is empty",
                self.width, self.height
            )));
        }
        if !matches!(self.bit_depth, 16 | 24 | 32) {
            return Err(LumenError::InvalidDisplayMode(format!(
                "unsupported bit depth {}",
                self.bit_depth
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ThreadingMode
// ---------------------------------------------------------------------------

/// How frames are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadingMode {
    /// Frames run synchronously on the caller's thread, one at a time.
    #[default]
    SingleThreaded,
    /// Each frame slot runs on its own thread; culling may fan out to
    /// `max_cull_threads` workers.
    MultiThreaded,
}

// ---------------------------------------------------------------------------
// EngineSettings
// ---------------------------------------------------------------------------

/// Global engine configuration.
///
/// | Field                       | Description                                  | Default  |
/// |-----------------------------|----------------------------------------------|----------|
/// | `display`                   | Display mode                                 | 1280x720x32 |
/// | `threading`                 | Frame scheduling model                       | single   |
/// | `max_cull_threads`          | Cull worker contexts per frame               | 2        |
/// | `shadowmap_splits`          | Cascade count                                | 3        |
/// | `shadowmap_dimension`       | Texel size of the first cascade              | 1024     |
/// | `shadowmap_reduction_ratio` | Documented cascade size ratio                | 2        |
/// | `shadow_split_lambda`       | Log / uniform blend of the split scheme      | 0.6      |
/// | `clear_color`               | Main target clear color (RGBA)               | black    |
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub display: DisplaySettings,

    pub threading: ThreadingMode,

    /// Upper bound on concurrently used cull contexts per frame.
    ///
    /// Values below 2 keep culling on the frame thread even in
    /// multithreaded mode.
    pub max_cull_threads: usize,

    /// Number of cascades the view frustum is split into.
    pub shadowmap_splits: u32,

    /// Shadow map size of cascade 0; cascade `i` uses `dimension >> i`.
    pub shadowmap_dimension: u32,

    /// Declared ratio between consecutive cascade sizes.
    ///
    /// Not read by the cascade dimension computation, which always halves
    /// (`dimension >> i`). Kept so existing configuration files load.
    pub shadowmap_reduction_ratio: u32,

    /// Blend between uniform (`0.0`) and logarithmic (`1.0`) split
    /// distribution.
    pub shadow_split_lambda: f32,

    pub clear_color: [f32; 4],
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            display: DisplaySettings::default(),
            threading: ThreadingMode::default(),
            max_cull_threads: 2,
            shadowmap_splits: 3,
            shadowmap_dimension: 1024,
            shadowmap_reduction_ratio: 2,
            shadow_split_lambda: 0.6,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl EngineSettings {
    /// Parses settings from a JSON document. Missing fields keep their
    /// defaults. The result is validated.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.display.validate()?;

        if self.shadowmap_splits == 0 {
            return Err(LumenError::InvalidSetting {
                name: "shadowmap_splits",
                reason: "at least one split is required".to_string(),
            });
        }
        if self.shadowmap_dimension == 0 {
            return Err(LumenError::InvalidSetting {
                name: "shadowmap_dimension",
                reason: "must be non-zero".to_string(),
            });
        }
        if self.shadowmap_dimension >> (self.shadowmap_splits - 1).min(31) == 0 {
            return Err(LumenError::InvalidSetting {
                name: "shadowmap_dimension",
                reason: format!(
                    "{} texels cannot be halved {} times",
                    self.shadowmap_dimension,
                    self.shadowmap_splits - 1
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.shadow_split_lambda) {
            return Err(LumenError::InvalidSetting {
                name: "shadow_split_lambda",
                reason: format!("{} is outside [0, 1]", self.shadow_split_lambda),
            });
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn is_multithreaded(&self) -> bool {
        self.threading == ThreadingMode::MultiThreaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineSettings::default().validate().is_ok());
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let settings = EngineSettings {
            display: DisplaySettings {
                width: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(LumenError::InvalidDisplayMode(_))
        ));
    }

    #[test]
    fn odd_bit_depth_is_rejected() {
        let mut settings = EngineSettings::default();
        settings.display.bit_depth = 12;
        assert!(matches!(
            settings.validate(),
            Err(LumenError::InvalidDisplayMode(_))
        ));
    }

    #[test]
    fn json_overrides_only_named_fields() {
        let settings = EngineSettings::from_json_str(
            r#"{ "shadowmap_splits": 2, "threading": "multi_threaded" }"#,
        )
        .unwrap();
        assert_eq!(settings.shadowmap_splits, 2);
        assert!(settings.is_multithreaded());
        assert_eq!(settings.shadowmap_dimension, 1024);
    }

    #[test]
    fn too_many_splits_for_dimension() {
        let settings = EngineSettings {
            shadowmap_dimension: 4,
            shadowmap_splits: 4,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
