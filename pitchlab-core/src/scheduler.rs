//! Tick scheduling with an explicit cancellation token.
//!
//! The host asks for a [`TickHandle`] once per display refresh and hands it
//! back when the frame callback fires. Every pause, stop or restart bumps the
//! scheduler's generation, so a handle issued before that point is inert no
//! matter when its callback eventually runs.

/// A scheduled tick, stamped with the generation that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickHandle {
    generation: u64,
}

impl TickHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
pub struct FrameScheduler {
    generation: u64,
    armed: bool,
    ticks: u64,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new run of ticks, invalidating every earlier handle.
    pub fn arm(&mut self) {
        self.generation += 1;
        self.armed = true;
    }

    /// Cancels the pending tick and every later one until re-armed.
    pub fn cancel(&mut self) {
        self.generation += 1;
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Issues a handle for the next tick, or `None` while disarmed.
    pub fn request(&self) -> Option<TickHandle> {
        self.armed.then_some(TickHandle {
            generation: self.generation,
        })
    }

    /// Whether `handle` still belongs to the live run.
    pub fn is_live(&self, handle: TickHandle) -> bool {
        self.armed && handle.generation == self.generation
    }

    /// Records a completed tick.
    pub(crate) fn commit(&mut self) {
        self.ticks += 1;
    }

    /// Ticks committed since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}
