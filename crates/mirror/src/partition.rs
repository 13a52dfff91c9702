//! Even distribution of an ordered task list across a fixed number of workers.
//!
//! Every worker receives one contiguous range. When the tasks do not divide
//! evenly, the remainder is spread one task at a time over the first workers
//! instead of being handed to the last one, so no single worker trails far
//! behind the rest.

use std::ops::Range;

/// Half-open range `[start, end)` over the ordered link list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskRange {
    pub start: usize,
    pub end: usize,
}

impl TaskRange {
    pub const EMPTY: TaskRange = TaskRange { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Range of tasks owned by worker `worker_index` (1-based) out of
/// `worker_count` workers.
///
/// With fewer tasks than workers, the first `total_tasks` workers get one
/// task each and the others get [`TaskRange::EMPTY`]. A zero worker count or
/// an index outside `1..=worker_count` also yields an empty range.
pub fn partition(total_tasks: usize, worker_count: usize, worker_index: usize) -> TaskRange {
    if worker_count == 0 || worker_index == 0 || worker_index > worker_count {
        return TaskRange::EMPTY;
    }

    if total_tasks < worker_count {
        if worker_index > total_tasks {
            return TaskRange::EMPTY;
        }
        return TaskRange::new(worker_index - 1, worker_index);
    }

    let base = total_tasks / worker_count;
    let remainder = total_tasks % worker_count;
    let position = worker_index - 1;

    // workers before this one that received an extra task
    let extra_before = position.min(remainder);
    let start = position * base + extra_before;
    let size = if position < remainder { base + 1 } else { base };

    TaskRange::new(start, start + size)
}

/// Ranges for every worker, in worker order.
pub fn partition_all(total_tasks: usize, worker_count: usize) -> Vec<TaskRange> {
    (1..=worker_count)
        .map(|index| partition(total_tasks, worker_count, index))
        .collect()
}
