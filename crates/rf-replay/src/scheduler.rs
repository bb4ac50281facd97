//! Cancellable timers on a virtual millisecond clock
//!
//! Tasks fire in due-time order; tasks due at the same instant fire in the
//! order they were scheduled. Every task carries the [`CancelToken`] of the
//! run that scheduled it, and the owner checks it before acting.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use crate::timing::Millis;

/// Shared cancellation flag of one sequence run
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Acquire)
    }
}

/// A task waiting for its due time
#[derive(Debug)]
pub struct ScheduledTask<T> {
    /// Absolute due time
    pub due_ms: Millis,
    /// Insertion sequence (tie-break)
    pub seq: u64,
    /// Token captured at schedule time
    pub token: CancelToken,
    pub task: T,
}

impl<T> ScheduledTask<T> {
    pub fn is_live(&self) -> bool {
        !self.token.is_cancelled()
    }
}

impl<T> PartialEq for ScheduledTask<T> {
    fn eq(&self, other: &Self) -> bool {
        self.due_ms == other.due_ms && self.seq == other.seq
    }
}

impl<T> Eq for ScheduledTask<T> {}

impl<T> PartialOrd for ScheduledTask<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for ScheduledTask<T> {
    // Reversed so the max-heap pops the earliest task first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_ms
            .cmp(&self.due_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Timer queue driven by explicit clock advancement
#[derive(Debug)]
pub struct Scheduler<T> {
    heap: BinaryHeap<ScheduledTask<T>>,
    next_seq: u64,
    now_ms: Millis,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
            now_ms: 0,
        }
    }

    /// Current virtual time
    pub fn now_ms(&self) -> Millis {
        self.now_ms
    }

    /// Schedule a task `delay_ms` from now, returning its due time
    pub fn schedule_in(&mut self, delay_ms: Millis, token: CancelToken, task: T) -> Millis {
        let due_ms = self.now_ms.saturating_add(delay_ms);
        self.schedule_at(due_ms, token, task);
        due_ms
    }

    /// Schedule a task at an absolute time (clamped to now)
    pub fn schedule_at(&mut self, due_ms: Millis, token: CancelToken, task: T) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(ScheduledTask {
            due_ms: due_ms.max(self.now_ms),
            seq,
            token,
            task,
        });
    }

    /// Pop the next task due at or before `until_ms`, moving the clock to its due time
    pub fn pop_due(&mut self, until_ms: Millis) -> Option<ScheduledTask<T>> {
        if self.heap.peek()?.due_ms > until_ms {
            return None;
        }
        let task = self.heap.pop()?;
        self.now_ms = self.now_ms.max(task.due_ms);
        Some(task)
    }

    /// Move the clock forward (never backwards)
    pub fn advance_clock_to(&mut self, ms: Millis) {
        self.now_ms = self.now_ms.max(ms);
    }

    /// Due time of the earliest task that is still live
    pub fn next_live_due(&self) -> Option<Millis> {
        self.heap
            .iter()
            .filter(|t| t.is_live())
            .map(|t| t.due_ms)
            .min()
    }

    /// Drop every cancelled task, returning how many were removed
    pub fn purge_cancelled(&mut self) -> usize {
        let before = self.heap.len();
        self.heap.retain(ScheduledTask::is_live);
        before - self.heap.len()
    }

    /// Pending tasks including cancelled ones
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pending tasks whose token is still live
    pub fn live_len(&self) -> usize {
        self.heap.iter().filter(|t| t.is_live()).count()
    }
}
