//! Process-wide speech interrupt.
//!
//! Every speech request carries a ticket stamped with the interrupt
//! generation current at submission time. Triggering the interrupt bumps the
//! generation, which cancels every outstanding ticket at once, on whichever
//! path (queued or direct) it is travelling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    generation: Arc<AtomicU64>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket for a request submitted now.
    pub fn ticket(&self) -> SpeechTicket {
        SpeechTicket {
            issued: self.generation.load(Ordering::Acquire),
            current: self.generation.clone(),
        }
    }

    /// Cancel every ticket issued so far. Returns the new generation.
    pub fn trigger(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[derive(Debug, Clone)]
pub struct SpeechTicket {
    issued: u64,
    current: Arc<AtomicU64>,
}

impl SpeechTicket {
    pub fn is_cancelled(&self) -> bool {
        self.current.load(Ordering::Acquire) != self.issued
    }

    #[cfg(test)]
    pub fn detached() -> Self {
        Interrupt::new().ticket()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_cancels_outstanding_tickets() {
        let interrupt = Interrupt::new();
        let a = interrupt.ticket();
        let b = a.clone();
        assert!(!a.is_cancelled());

        interrupt.trigger();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());

        let fresh = interrupt.ticket();
        assert!(!fresh.is_cancelled());
    }
}
