//! Error Types
//!
//! This module defines the error types used throughout the engine.
//!
//! # Overview
//!
//! The main error type [`LumenError`] covers all failure modes including:
//! - Configuration errors raised while constructing the engine
//! - Frame state machine violations
//! - Render stage failures (renderer backend, pass execution)
//! - Internal consistency errors (cull context bookkeeping, pass graph)
//!
//! Expected absences (no camera left to cull, no renderable affected by a
//! light, no cached light state) are *not* errors; they are modelled with
//! `Option` and empty collections.
//!
//! # Usage
//!
//! All fallible APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, LumenError>`.

use thiserror::Error;

use crate::frame::FrameState;

/// The main error type for the Lumen engine.
#[derive(Error, Debug)]
pub enum LumenError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// The requested display mode is not usable (zero-sized, bad bit depth).
    #[error("Invalid display mode: {0}")]
    InvalidDisplayMode(String),

    /// A numeric engine setting is outside its allowed range.
    #[error("Invalid setting `{name}`: {reason}")]
    InvalidSetting {
        /// Name of the offending setting
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Settings file could not be parsed.
    #[error("Settings parse error: {0}")]
    SettingsParse(#[from] serde_json::Error),

    // ========================================================================
    // Frame Errors
    // ========================================================================
    /// A state transition that would move the frame backwards.
    #[error("Invalid frame transition {from:?} -> {to:?} on frame {frame}")]
    InvalidFrameTransition {
        /// Frame slot
        frame: usize,
        /// Current state
        from: FrameState,
        /// Requested state
        to: FrameState,
    },

    /// The frame reached `Ended` and can no longer be used.
    #[error("Frame {0} has ended")]
    FrameEnded(usize),

    /// The frame scheduler was asked for a slot it does not own.
    #[error("Frame slot {0} out of range")]
    FrameSlotOutOfRange(usize),

    /// A frame worker thread terminated abnormally.
    #[error("Frame worker thread for slot {0} panicked")]
    FrameThreadPanicked(usize),

    // ========================================================================
    // Render Errors
    // ========================================================================
    /// The renderer backend rejected a command.
    #[error("Renderer error: {0}")]
    Renderer(String),

    /// A pass failed while rendering.
    #[error("Render pass `{pass}` failed: {reason}")]
    PassFailed {
        /// Pass name
        pass: String,
        /// Failure description
        reason: String,
    },

    // ========================================================================
    // Internal Consistency Errors
    // ========================================================================
    /// `work_finished` was reported for a cull context that is not in use.
    #[error("Cull context {0} reported completion but is not in the used list")]
    UnknownCullContext(u32),

    /// A pass dependency refers to a pass that is not registered.
    #[error("Pass {0:?} is not registered")]
    UnknownPass(crate::renderer::PassId),

    /// The pass dependency graph contains a cycle.
    #[error("Pass dependency cycle involving {0} passes")]
    PassDependencyCycle(usize),

    /// A shadow was assigned to a second light.
    #[error("Shadow already belongs to light {existing:?}")]
    ShadowAlreadyParented {
        /// The light that owns the shadow
        existing: crate::scene::LightKey,
    },

    /// A renderable or light key no longer resolves in the scene.
    #[error("Stale scene key: {0}")]
    StaleKey(String),
}

/// Alias for `Result<T, LumenError>`.
pub type Result<T> = std::result::Result<T, LumenError>;
