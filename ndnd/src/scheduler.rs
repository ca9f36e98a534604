use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Instant;

use crate::tables::pit::PitEntryId;

/// Events the forwarder schedules against the loop clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    PitExpiry(PitEntryId),
}

/// Handle for a scheduled event, used to cancel it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle(u64);

/// Per-loop timer service
///
/// The scheduler never fires on its own; the owning loop polls `pop_due` after
/// waiting until `next_deadline`. Cancellation is synchronous: a cancelled
/// event is never returned by `pop_due`.
#[derive(Default)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<(Instant, u64)>>,
    pending: HashMap<u64, Event>,
    next_token: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule an event to fire at `at`
    pub fn schedule(&mut self, at: Instant, event: Event) -> TimerHandle {
        let token = self.next_token;
        self.next_token += 1;
        self.queue.push(Reverse((at, token)));
        self.pending.insert(token, event);
        TimerHandle(token)
    }

    /// Cancel a scheduled event
    pub fn cancel(&mut self, handle: TimerHandle) {
        self.pending.remove(&handle.0);
    }

    /// Remove and return the next event whose deadline is at or before `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<Event> {
        while let Some(&Reverse((at, token))) = self.queue.peek() {
            if at > now {
                return None;
            }
            self.queue.pop();
            if let Some(event) = self.pending.remove(&token) {
                return Some(event);
            }
            // cancelled entry, keep draining
        }
        None
    }

    /// The earliest live deadline, if any
    pub fn next_deadline(&mut self) -> Option<Instant> {
        while let Some(&Reverse((at, token))) = self.queue.peek() {
            if self.pending.contains_key(&token) {
                return Some(at);
            }
            self.queue.pop();
        }
        None
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
    use std::time::Duration;

    #[test]
    fn test_fires_in_deadline_order() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        let a = PitEntryId::from_raw(1);
        let b = PitEntryId::from_raw(2);

        scheduler.schedule(now + Duration::from_millis(20), Event::PitExpiry(b));
        scheduler.schedule(now + Duration::from_millis(10), Event::PitExpiry(a));

        assert_eq!(scheduler.pop_due(now), None);
        assert_eq!(
            scheduler.pop_due(now + Duration::from_millis(15)),
            Some(Event::PitExpiry(a))
        );
        assert_eq!(
            scheduler.pop_due(now + Duration::from_millis(15)),
            None
        );
        assert_eq!(
            scheduler.pop_due(now + Duration::from_millis(25)),
            Some(Event::PitExpiry(b))
        );
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        let handle = scheduler.schedule(now, Event::PitExpiry(PitEntryId::from_raw(7)));
        scheduler.cancel(handle);

        assert_eq!(scheduler.pop_due(now + Duration::from_secs(1)), None);
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn test_next_deadline_skips_cancelled() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        let h1 = scheduler.schedule(now + Duration::from_millis(5), Event::PitExpiry(PitEntryId::from_raw(1)));
        scheduler.schedule(now + Duration::from_millis(50), Event::PitExpiry(PitEntryId::from_raw(2)));
        scheduler.cancel(h1);

        assert_eq!(scheduler.next_deadline(), Some(now + Duration::from_millis(50)));
    }
}
