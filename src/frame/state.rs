//! Frame lifecycle states and the signal frames wait on.

use log::trace;
use parking_lot::{Condvar, Mutex};

use crate::errors::{LumenError, Result};

/// Lifecycle of a frame slot.
///
/// ```text
/// Incomplete ─► Starting ─► Update ─► Cull ─► Ready ─► Material ─► Rendering ─► Finished
///                   ▲                                                              │
///                   └──────────────────────────────────────────────────────────────┘
///            (any state) ─► Ended   (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrameState {
    Incomplete,
    Starting,
    Update,
    Cull,
    Ready,
    Material,
    Rendering,
    Finished,
    Ended,
}

impl FrameState {
    /// Checks a transition of `frame` from `self` to `to`.
    ///
    /// Forward moves are allowed, `Starting` is re-entered only from
    /// `Incomplete` or `Finished`, and nothing leaves `Ended`.
    pub fn check_transition(self, frame: usize, to: FrameState) -> Result<()> {
        if self == FrameState::Ended {
            return Err(LumenError::FrameEnded(frame));
        }
        let allowed = match to {
            FrameState::Ended => true,
            FrameState::Starting => {
                matches!(self, FrameState::Incomplete | FrameState::Finished)
            }
            _ => to > self,
        };
        if allowed {
            Ok(())
        } else {
            Err(LumenError::InvalidFrameTransition {
                frame,
                from: self,
                to,
            })
        }
    }
}

/// Shared, waitable state of one frame slot.
///
/// The frame thread blocks on it between cycles; the scheduler releases it
/// by moving it to `Starting` and waits on it for `Finished`.
#[derive(Debug)]
pub struct FrameSignal {
    frame: usize,
    state: Mutex<FrameState>,
    changed: Condvar,
}

impl FrameSignal {
    #[must_use]
    pub fn new(frame: usize) -> Self {
        Self {
            frame,
            state: Mutex::new(FrameState::Incomplete),
            changed: Condvar::new(),
        }
    }

    #[must_use]
    pub fn get(&self) -> FrameState {
        *self.state.lock()
    }

    pub fn transition(&self, to: FrameState) -> Result<()> {
        let mut state = self.state.lock();
        state.check_transition(self.frame, to)?;
        trace!("Frame {}: {:?} -> {:?}", self.frame, *state, to);
        *state = to;
        self.changed.notify_all();
        Ok(())
    }

    /// Moves to `Ended` from whatever state the frame is in.
    pub fn end(&self) {
        let mut state = self.state.lock();
        if *state != FrameState::Ended {
            trace!("Frame {}: {:?} -> Ended", self.frame, *state);
            *state = FrameState::Ended;
            self.changed.notify_all();
        }
    }

    /// Blocks until `ready` accepts the state, returning that state.
    pub fn wait_until(&self, ready: impl Fn(FrameState) -> bool) -> FrameState {
        let mut state = self.state.lock();
        while !ready(*state) {
            self.changed.wait(&mut state);
        }
        *state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_moves_and_restart() {
        let signal = FrameSignal::new(0);
        for state in [
            FrameState::Starting,
            FrameState::Update,
            FrameState::Cull,
            FrameState::Ready,
            FrameState::Material,
            FrameState::Rendering,
            FrameState::Finished,
            FrameState::Starting,
        ] {
            signal.transition(state).unwrap();
        }
    }

    #[test]
    fn backwards_move_is_rejected() {
        let signal = FrameSignal::new(1);
        signal.transition(FrameState::Starting).unwrap();
        signal.transition(FrameState::Cull).unwrap();
        assert!(matches!(
            signal.transition(FrameState::Update),
            Err(LumenError::InvalidFrameTransition { frame: 1, .. })
        ));
        assert!(signal.transition(FrameState::Starting).is_err());
        assert_eq!(signal.get(), FrameState::Cull);
    }

    #[test]
    fn ended_is_terminal() {
        let signal = FrameSignal::new(0);
        signal.transition(FrameState::Starting).unwrap();
        signal.end();
        assert!(matches!(
            signal.transition(FrameState::Starting),
            Err(LumenError::FrameEnded(0))
        ));
        assert!(signal.transition(FrameState::Ended).is_err());
    }

    #[test]
    fn waiter_wakes_on_release() {
        let signal = std::sync::Arc::new(FrameSignal::new(0));
        let waiter = {
            let signal = signal.clone();
            std::thread::spawn(move || signal.wait_until(|s| s == FrameState::Starting))
        };
        signal.transition(FrameState::Starting).unwrap();
        assert_eq!(waiter.join().unwrap(), FrameState::Starting);
    }
}
