use std::sync::atomic::{AtomicU64, Ordering};

use super::message::SequenceId;

/// Primary-side sequence counter. Starts at 0; every call returns a fresh,
/// strictly larger number even under concurrent callers.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    next: AtomicU64,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_sequence(&self) -> SequenceId {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of sequences handed out so far.
    pub fn allocated(&self) -> SequenceId {
        self.next.load(Ordering::SeqCst)
    }
}
