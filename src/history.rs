use std::collections::VecDeque;

/// Maximum number of retained undo steps.
pub const MAX_DEPTH: usize = 50;

/// Bounded linear undo/redo container.
///
/// Holds owned snapshots: callers pass value copies, never references into
/// live state. All operations are infallible; undo/redo at a boundary are
/// defined no-ops and capacity eviction is silent and lossy (the oldest
/// states become unrecoverable). There is no branching: committing a new
/// state discards any pending redo path.
#[derive(Clone, Debug)]
pub struct History<T> {
    past: VecDeque<T>,
    present: T,
    future: VecDeque<T>,
    capacity: usize,
}

impl<T> History<T> {
    /// Create a history seeded with `present` and the default capacity of
    /// [`MAX_DEPTH`] undo steps.
    pub fn new(present: T) -> Self {
        Self::with_capacity(MAX_DEPTH, present)
    }

    /// Create a history with an explicit `past` capacity.
    pub fn with_capacity(capacity: usize, present: T) -> Self {
        Self {
            past: VecDeque::new(),
            present,
            future: VecDeque::new(),
            capacity,
        }
    }

    /// Commit a new state as an undoable step.
    ///
    /// The previous present moves onto `past` (evicting the oldest entry
    /// beyond capacity) and any redo path is discarded.
    pub fn push(&mut self, state: T) {
        let prev = std::mem::replace(&mut self.present, state);
        self.commit_past(prev);
        self.future.clear();
    }

    /// Step back once. Returns `false` (and does nothing) when there is no
    /// past state.
    pub fn undo(&mut self) -> bool {
        let Some(prev) = self.past.pop_back() else {
            return false;
        };
        let cur = std::mem::replace(&mut self.present, prev);
        self.future.push_front(cur);
        true
    }

    /// Step forward once. Returns `false` (and does nothing) when there is no
    /// future state.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop_front() else {
            return false;
        };
        let cur = std::mem::replace(&mut self.present, next);
        self.commit_past(cur);
        true
    }

    /// Replace `present` without recording an undo step.
    ///
    /// Used for high-frequency transient updates (per-pixel drag movement)
    /// that must not each become individually undoable.
    pub fn set_present(&mut self, state: T) {
        self.present = state;
    }

    /// Drop all past and future states and set a fresh present. Used when a
    /// new source image invalidates all prior undo context.
    pub fn reset(&mut self, state: T) {
        self.past.clear();
        self.future.clear();
        self.present = state;
    }

    /// The current state.
    pub fn present(&self) -> &T {
        &self.present
    }

    /// Whether [`History::undo`] would take a step.
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// Whether [`History::redo`] would take a step.
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Number of retained undo steps.
    pub fn past_len(&self) -> usize {
        self.past.len()
    }

    fn commit_past(&mut self, state: T) {
        self.past.push_back(state);
        while self.past.len() > self.capacity {
            self.past.pop_front();
        }
    }
}
