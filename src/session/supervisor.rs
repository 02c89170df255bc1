use std::sync::atomic::{AtomicBool, Ordering};

/// Single-slot job supervisor.
///
/// At most one job holds the slot; acquiring while it is held fails
/// instead of queueing. The holder releases it when the job completes.
#[derive(Debug, Default)]
pub struct JobSlot {
    busy: AtomicBool,
}

impl JobSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot; `false` if a job is already in flight
    pub fn try_acquire(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}
