//! Frame Scheduler
//!
//! Owns the `MAX_FRAMES` frame slots and drives them.
//!
//! - Single-threaded: [`FrameScheduler::run_frame`] runs the next slot to
//!   completion on the caller's thread.
//! - Multithreaded: [`FrameScheduler::spawn`] moves each frame onto its own
//!   thread; [`release`](FrameScheduler::release) starts a cycle and
//!   [`wait_finished`](FrameScheduler::wait_finished) waits for it.
//!
//! A frame that reaches `Ended` stops the session: every later call returns
//! [`LumenError::FrameEnded`].

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info, warn};

use crate::errors::{LumenError, Result};
use crate::frame::MAX_FRAMES;
use crate::frame::context::AppContext;
use crate::frame::frame::Frame;
use crate::frame::state::{FrameSignal, FrameState};

enum Slots {
    Local(Vec<Frame>),
    Threads(Vec<(Arc<FrameSignal>, JoinHandle<(Frame, Result<()>)>)>),
    Stopped,
}

pub struct FrameScheduler {
    app: Arc<AppContext>,
    slots: Slots,
    next: usize,
    ended: Option<usize>,
}

impl FrameScheduler {
    pub fn new(app: Arc<AppContext>) -> Result<Self> {
        let frames = (0..MAX_FRAMES)
            .map(|slot| Frame::new(slot, Arc::clone(&app)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            app,
            slots: Slots::Local(frames),
            next: 0,
            ended: None,
        })
    }

    #[must_use]
    pub fn app(&self) -> &Arc<AppContext> {
        &self.app
    }

    /// Local access to a frame slot (before `spawn`).
    pub fn frame_mut(&mut self, slot: usize) -> Option<&mut Frame> {
        match &mut self.slots {
            Slots::Local(frames) => frames.get_mut(slot),
            _ => None,
        }
    }

    /// Slot that ended the session, if any.
    #[must_use]
    pub fn ended_slot(&self) -> Option<usize> {
        self.ended
    }

    fn check_running(&self) -> Result<()> {
        match self.ended {
            Some(slot) => Err(LumenError::FrameEnded(slot)),
            None => Ok(()),
        }
    }

    /// Runs the next frame slot synchronously. Returns the slot that ran.
    pub fn run_frame(&mut self) -> Result<usize> {
        self.check_running()?;
        let slot = self.next;
        let Slots::Local(frames) = &mut self.slots else {
            return Err(LumenError::FrameSlotOutOfRange(slot));
        };
        let frame = frames
            .get_mut(slot)
            .ok_or(LumenError::FrameSlotOutOfRange(slot))?;

        if let Err(err) = frame.execute() {
            error!("Frame {slot} ended the session: {err}");
            self.ended = Some(slot);
            return Err(err);
        }
        self.next = (slot + 1) % MAX_FRAMES;
        Ok(slot)
    }

    /// Moves every frame onto its own thread. Frames wait until released.
    pub fn spawn(&mut self) -> Result<()> {
        let Slots::Local(frames) = std::mem::replace(&mut self.slots, Slots::Stopped) else {
            warn!("Frame threads already spawned");
            return Ok(());
        };

        let mut threads = Vec::with_capacity(frames.len());
        for frame in frames {
            let slot = frame.id();
            let signal = frame.signal();
            let handle = thread::Builder::new()
                .name(format!("lumen-frame-{slot}"))
                .spawn(move || frame.run())
                .map_err(|_| LumenError::FrameThreadPanicked(slot))?;
            threads.push((signal, handle));
        }
        info!("Spawned {} frame threads", threads.len());
        self.slots = Slots::Threads(threads);
        Ok(())
    }

    fn signal(&self, slot: usize) -> Result<&Arc<FrameSignal>> {
        match &self.slots {
            Slots::Threads(threads) => threads
                .get(slot)
                .map(|(signal, _)| signal)
                .ok_or(LumenError::FrameSlotOutOfRange(slot)),
            _ => Err(LumenError::FrameSlotOutOfRange(slot)),
        }
    }

    /// Starts the next cycle of a spawned frame.
    pub fn release(&mut self, slot: usize) -> Result<()> {
        self.check_running()?;
        self.signal(slot)?.transition(FrameState::Starting)
    }

    /// Blocks until a released frame finishes its cycle.
    pub fn wait_finished(&mut self, slot: usize) -> Result<()> {
        let state = self
            .signal(slot)?
            .wait_until(|s| matches!(s, FrameState::Finished | FrameState::Ended | FrameState::Incomplete));
        if state == FrameState::Ended {
            self.ended.get_or_insert(slot);
            return Err(LumenError::FrameEnded(slot));
        }
        Ok(())
    }

    /// Runs `count` frames over the spawned threads, keeping every slot in
    /// flight.
    pub fn run_frames(&mut self, count: usize) -> Result<()> {
        let mut released = [false; MAX_FRAMES];
        for i in 0..count {
            let slot = i % MAX_FRAMES;
            if released[slot] {
                self.wait_finished(slot)?;
            }
            self.release(slot)?;
            released[slot] = true;
        }
        for (slot, was_released) in released.into_iter().enumerate() {
            if was_released {
                self.wait_finished(slot)?;
            }
        }
        Ok(())
    }

    /// Ends every frame, joins the threads and runs the game state cleanup.
    /// Returns the first frame error, if any.
    pub fn shutdown(&mut self) -> Result<()> {
        let mut first_error = None;
        match std::mem::replace(&mut self.slots, Slots::Stopped) {
            Slots::Threads(threads) => {
                for (slot, (signal, handle)) in threads.into_iter().enumerate() {
                    signal.end();
                    match handle.join() {
                        Ok((_, Ok(()))) => {}
                        Ok((_, Err(err))) => {
                            first_error.get_or_insert(err);
                        }
                        Err(_) => {
                            first_error.get_or_insert(LumenError::FrameThreadPanicked(slot));
                        }
                    }
                }
            }
            Slots::Local(frames) => {
                for frame in &frames {
                    frame.signal().end();
                }
            }
            Slots::Stopped => return Ok(()),
        }
        self.app.cleanup();
        info!("Frame scheduler stopped");
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        if let Slots::Threads(threads) = &self.slots {
            for (signal, _) in threads {
                signal.end();
            }
        }
    }
}
