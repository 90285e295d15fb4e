/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Outgoing sequence numbers.
//!
//! The real engine owns sequence numbering. In-process engines used for
//! tests and demos stamp MsgSeqNum with this counter so resend requests and
//! the outbound store have real numbers to refer to.

use fixbridge_core::types::SeqNum;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free MsgSeqNum allocator.
#[derive(Debug)]
pub struct SequenceCounter {
    next: AtomicU64,
}

impl SequenceCounter {
    /// Creates a counter whose first allocation is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns the next number without allocating it.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> SeqNum {
        SeqNum::new(self.next.load(Ordering::SeqCst))
    }

    /// Allocates the next number.
    #[inline]
    pub fn allocate(&self) -> SeqNum {
        SeqNum::new(self.next.fetch_add(1, Ordering::SeqCst))
    }

    /// Moves the counter forward to `next`, as a gap fill does.
    ///
    /// Never moves it backwards.
    pub fn advance_to(&self, next: u64) {
        self.next.fetch_max(next, Ordering::SeqCst);
    }

    /// Restarts numbering at 1, as a logon with ResetSeqNumFlag does.
    pub fn reset(&self) {
        self.next.store(1, Ordering::SeqCst);
    }
}

impl Default for SequenceCounter {
    fn default() -> Self {
        Self::new()
    }
}
