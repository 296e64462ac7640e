//! One-shot deferred tasks.
//!
//! The scheduler never calls a unit test's `start()` directly; it queues the
//! start here with a short delay and the run loop fires it once it is due.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Handle to a queued task. Cancelling it keeps the task from ever firing.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    cancelled: Rc<Cell<bool>>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

#[derive(Debug)]
struct Scheduled<T> {
    due: Instant,
    seq: u64,
    handle: TaskHandle,
    payload: T,
}

/// 延迟任务队列
#[derive(Debug)]
pub struct DeferredQueue<T> {
    tasks: Vec<Scheduled<T>>,
    next_seq: u64,
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self {
            tasks: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<T> DeferredQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `payload` to become due after `delay`.
    pub fn schedule(&mut self, delay: Duration, payload: T) -> TaskHandle {
        self.schedule_at(Instant::now() + delay, payload)
    }

    pub fn schedule_at(&mut self, due: Instant, payload: T) -> TaskHandle {
        let handle = TaskHandle::default();
        self.tasks.push(Scheduled {
            due,
            seq: self.next_seq,
            handle: handle.clone(),
            payload,
        });
        self.next_seq += 1;
        handle
    }

    /// Due time of the earliest live task.
    pub fn next_due(&mut self) -> Option<Instant> {
        self.purge_cancelled();
        self.tasks.iter().map(|t| t.due).min()
    }

    /// Removes and returns the earliest task due at `now`. Tasks due at the
    /// same instant fire in scheduling order.
    pub fn pop_due(&mut self, now: Instant) -> Option<T> {
        self.purge_cancelled();
        let position = self
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due <= now)
            .min_by_key(|(_, t)| (t.due, t.seq))
            .map(|(i, _)| i)?;
        Some(self.tasks.remove(position).payload)
    }

    pub fn cancel_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.handle.cancel();
        }
    }

    fn purge_cancelled(&mut self) {
        self.tasks.retain(|t| !t.handle.is_cancelled());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_in_due_order() {
        let mut queue = DeferredQueue::new();
        let now = Instant::now();
        queue.schedule_at(now + Duration::from_millis(20), "late");
        queue.schedule_at(now, "first");
        queue.schedule_at(now, "second");

        assert_eq!(queue.pop_due(now), Some("first"));
        assert_eq!(queue.pop_due(now), Some("second"));
        assert_eq!(queue.pop_due(now), None);
        assert_eq!(queue.next_due(), Some(now + Duration::from_millis(20)));
        assert_eq!(queue.pop_due(now + Duration::from_millis(20)), Some("late"));
        assert_eq!(queue.next_due(), None);
    }

    #[test]
    fn cancelled_task_never_fires() {
        let mut queue = DeferredQueue::new();
        let now = Instant::now();
        let handle = queue.schedule_at(now, 1);
        queue.schedule_at(now, 2);
        handle.cancel();

        assert_eq!(queue.pop_due(now), Some(2));
        assert_eq!(queue.pop_due(now), None);
        assert_eq!(queue.next_due(), None);
    }

    #[test]
    fn cancel_all_marks_handles() {
        let mut queue = DeferredQueue::new();
        let handle = queue.schedule(Duration::from_secs(1), ());
        queue.cancel_all();
        assert!(handle.is_cancelled());
        assert_eq!(queue.next_due(), None);
    }
}
