use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// A cloneable flag asking a running `Solver` to stop.
///
/// The solver checks it once per iteration, before sampling the next batch, so a
/// step already in flight always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}
