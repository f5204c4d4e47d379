//! The offset cursor shared between tree additions.
//!
//! A [`Cursor`] tracks the current read position in a buffer together with
//! one pending step: the length of the most recently added item. Tree-add
//! operations that accept a cursor record the emitted item's length as the
//! pending step; `advance(0)` then consumes it. An explicit non-zero
//! length overrides the pending step, and either way the step resets, so a
//! stale step can never be applied twice.

use std::cell::RefCell;
use std::rc::Rc;

/// Shared cursor handle, as boxed for scripts.
pub type SharedCursor = Rc<RefCell<Cursor>>;

/// A buffer position with one pending step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    current: i64,
    pending_step: i64,
}

impl Cursor {
    pub fn new(start: i64) -> Self {
        Cursor {
            current: start,
            pending_step: 0,
        }
    }

    pub fn shared(self) -> SharedCursor {
        Rc::new(RefCell::new(self))
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    /// Records the length of an item just emitted. Zero is a no-op; a
    /// non-zero length overwrites any previously recorded step, so only
    /// the last recorded step is ever applied.
    pub fn record_step(&mut self, len: i64) {
        if len > 0 {
            self.pending_step = len;
        }
    }

    /// Moves the cursor: by `len` when non-zero, otherwise by the pending
    /// step. The pending step resets in both cases. Returns the new
    /// position.
    pub fn advance(&mut self, len: i64) -> i64 {
        if len != 0 {
            self.current += len;
        } else {
            self.current += self.pending_step;
        }
        self.pending_step = 0;
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_zero_applies_pending_step() {
        let mut c = Cursor::new(0);
        c.record_step(2);
        assert_eq!(c.advance(0), 2);
        // Step was consumed; advancing again without a new step is a no-op.
        assert_eq!(c.advance(0), 2);
    }

    #[test]
    fn explicit_advance_overrides_and_resets_step() {
        let mut c = Cursor::new(10);
        c.record_step(4);
        assert_eq!(c.advance(3), 13);
        assert_eq!(c.advance(0), 13);
    }

    #[test]
    fn record_step_zero_is_a_noop() {
        let mut c = Cursor::new(0);
        c.record_step(5);
        c.record_step(0);
        assert_eq!(c.advance(0), 5);
    }

    #[test]
    fn duplicate_record_keeps_last_step() {
        let mut c = Cursor::new(0);
        c.record_step(2);
        c.record_step(7);
        assert_eq!(c.advance(0), 7);
    }

    #[test]
    fn negative_advance_moves_backwards() {
        let mut c = Cursor::new(10);
        assert_eq!(c.advance(-4), 6);
    }
}
