//! Sibling cursor contract used by the backtracking core.
//!
//! The quantifier engine depends on exactly five operations over a run of
//! siblings: `current`, `has_next`, `advance`, `rewind` (undo one advance)
//! and `rewind_by` (undo the last n advances). The cursor is a position over
//! a borrowed slice; it never owns or copies the run.

/// Cursor over a run of sibling elements.
///
/// `T` is `Copy` because cursors hand out ids (`NodeId`, `PatternNodeId`),
/// never node payloads.
#[derive(Debug, Clone)]
pub struct SiblingCursor<'a, T: Copy> {
    items: &'a [T],
    pos: usize,
}

impl<'a, T: Copy> SiblingCursor<'a, T> {
    /// Creates a cursor positioned at the start of `items`.
    pub fn new(items: &'a [T]) -> Self {
        Self { items, pos: 0 }
    }

    /// Returns the element under the cursor.
    ///
    /// # Panics
    /// Panics if the cursor is exhausted; callers check [`has_next`]
    /// first, mirroring the iterator contract of the matching algorithm.
    ///
    /// [`has_next`]: SiblingCursor::has_next
    #[inline]
    pub fn current(&self) -> T {
        self.items[self.pos]
    }

    /// Returns `true` while the cursor points at an element.
    #[inline]
    pub fn has_next(&self) -> bool {
        self.pos < self.items.len()
    }

    /// Moves the cursor one element forward.
    #[inline]
    pub fn advance(&mut self) {
        debug_assert!(self.pos <= self.items.len(), "cursor advanced past end");
        self.pos += 1;
    }

    /// Undoes the last advance.
    #[inline]
    pub fn rewind(&mut self) {
        debug_assert!(self.pos > 0, "cursor rewound past start");
        self.pos -= 1;
    }

    /// Undoes the last `n` advances.
    #[inline]
    pub fn rewind_by(&mut self, n: usize) {
        debug_assert!(self.pos >= n, "cursor rewound past start");
        self.pos -= n;
    }

    /// Current position, for diagnostics and tests.
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }
}
