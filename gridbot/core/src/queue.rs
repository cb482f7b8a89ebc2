//! Command Queue
//!
//! Process-wide FIFO of [`PendingAction`]s. Consecutive identical actions are
//! stored as a single run so that `FORWARD 100000` costs one entry, while
//! [`CommandQueue::pop`] still hands out exactly one unit action at a time in
//! insertion order.

use std::collections::VecDeque;

use crate::command::PendingAction;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Run {
    action: PendingAction,
    remaining: u64,
}

/// FIFO of unit actions, unbounded
#[derive(Debug, Default)]
pub struct CommandQueue {
    runs: VecDeque<Run>,
    len: u64,
}

impl CommandQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `count` copies of `action`; a count of zero is a no-op
    pub fn push(&mut self, action: PendingAction, count: u32) {
        if count == 0 {
            return;
        }
        let count = u64::from(count);
        match self.runs.back_mut() {
            Some(run) if run.action == action => run.remaining += count,
            _ => self.runs.push_back(Run {
                action,
                remaining: count,
            }),
        }
        self.len += count;
    }

    /// Remove and return the oldest unit action
    pub fn pop(&mut self) -> Option<PendingAction> {
        let front = self.runs.front_mut()?;
        let action = front.action;
        front.remaining -= 1;
        if front.remaining == 0 {
            self.runs.pop_front();
        }
        self.len -= 1;
        Some(action)
    }

    /// Number of unit actions waiting
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether nothing is waiting
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
