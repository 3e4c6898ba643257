//! Utility Module
//!
//! - [`Timer`]: frame timing shared by all frame slots

pub mod time;

pub use time::Timer;
