use std::sync::atomic::{AtomicU64, Ordering};

/// Ticket handed to an in-flight load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Monotonic request generation; only the newest ticket may apply its result.
#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.0.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.0.load(Ordering::Acquire) == ticket.0
    }

    /// Supersedes every ticket issued so far.
    pub fn invalidate(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}
