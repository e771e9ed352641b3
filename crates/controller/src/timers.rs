/// Handle to a scheduled task. Handles are never reused, so a stale handle
/// cannot cancel a task scheduled after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

#[derive(Clone, Debug)]
struct Pending<T> {
    handle: TimerHandle,
    due: u64,
    task: T,
}

/// Fire-once tasks keyed by the logical tick at which they fall due.
#[derive(Clone, Debug)]
pub struct Scheduler<T> {
    next_id: u64,
    pending: Vec<Pending<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            pending: Vec::new(),
        }
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: u64, task: T) -> TimerHandle {
        let handle = TimerHandle(self.next_id);
        self.next_id += 1;
        self.pending.push(Pending { handle, due, task });
        handle
    }

    /// Returns false if the task already fired or was cancelled.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.handle != handle);
        self.pending.len() != before
    }

    pub fn cancel_all(&mut self) -> usize {
        let n = self.pending.len();
        self.pending.clear();
        n
    }

    /// Remove and return every task due at or before `now`, earliest first.
    pub fn take_due(&mut self, now: u64) -> Vec<(TimerHandle, T)> {
        let (mut due, keep): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|p| p.due <= now);
        self.pending = keep;
        due.sort_by_key(|p| (p.due, p.handle.0));
        due.into_iter().map(|p| (p.handle, p.task)).collect()
    }

    pub fn next_due(&self) -> Option<u64> {
        self.pending.iter().map(|p| p.due).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_in_due_order() {
        let mut s = Scheduler::new();
        s.schedule(5, "late");
        s.schedule(3, "early");
        assert_eq!(s.next_due(), Some(3));

        assert!(s.take_due(2).is_empty());
        let fired: Vec<_> = s.take_due(5).into_iter().map(|(_, t)| t).collect();
        assert_eq!(fired, ["early", "late"]);
        assert!(s.take_due(10).is_empty());
    }

    #[test]
    fn cancelled_tasks_never_fire() {
        let mut s = Scheduler::new();
        let a = s.schedule(1, 'a');
        s.schedule(1, 'b');
        assert!(s.cancel(a));
        assert!(!s.cancel(a));

        let fired: Vec<_> = s.take_due(1).into_iter().map(|(_, t)| t).collect();
        assert_eq!(fired, ['b']);
    }

    #[test]
    fn stale_handle_cannot_touch_new_tasks() {
        let mut s = Scheduler::new();
        let old = s.schedule(1, 1);
        assert_eq!(s.cancel_all(), 1);

        let new = s.schedule(1, 2);
        assert_ne!(old, new);
        assert!(!s.cancel(old));
        assert_eq!(s.len(), 1);
    }
}
