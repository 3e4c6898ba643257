use std::time::{Duration, Instant};

/// Clock behind every frame's update stage.
///
/// One instance lives in the application context and is advanced once per
/// updated frame, whichever slot runs it, so both slots observe a single
/// monotonic timeline.
#[derive(Debug, Clone)]
pub struct Timer {
    origin: Instant,
    previous: Instant,
    /// Length of the most recent step.
    pub delta: Duration,
    /// Sum of all steps so far.
    pub elapsed: Duration,
    /// Steps taken.
    pub frame_count: u64,
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Timer {
    #[must_use]
    pub fn new() -> Self {
        let origin = Instant::now();
        Self {
            origin,
            previous: origin,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Steps by the wall-clock time since the previous step.
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta = now.saturating_duration_since(self.previous);
        self.elapsed = now.saturating_duration_since(self.origin);
        self.previous = now;
        self.frame_count += 1;
    }

    /// Steps by exactly `step`; the wall clock is not consulted. Paused
    /// single-stepping and tests rely on this being deterministic.
    pub fn advance(&mut self, step: Duration) {
        self.delta = step;
        self.elapsed += step;
        self.previous += step;
        self.frame_count += 1;
    }
}
