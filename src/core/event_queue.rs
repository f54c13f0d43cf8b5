//! `EventQueue`: an ordered sequence of time-stamped adapters, driving both
//! the power-flow event-driven loop and the dynamic driver's main loop. A
//! min-heap keyed by `(time, insertion order)`, so same-tick events fire in
//! the order they were scheduled.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use super::state::ChangeCode;
use super::time::Time;

/// One scheduled, two-phase adapter. `execute_a` may mutate the model;
/// `execute_b` only observes (recorders). `trigger`/`update_object` support
/// re-arming and re-binding after a contingency clone.
pub trait SimEvent: Send {
    fn next_time(&self) -> Time;
    fn execute_a(&mut self, t: Time) -> ChangeCode;
    fn execute_b(&mut self, t: Time);
    fn trigger(&mut self) {}
    fn update_object(&mut self, _match_mode: bool) {}
    /// Human-readable label used in the `"event1;event2;…"` contingency CSV column.
    fn name(&self) -> String {
        "event".to_string()
    }
    /// Period for periodic ("null event"/tick) adapters; `None` for one-shot events.
    fn period(&self) -> Option<Time> {
        None
    }
    fn advance_next_time(&mut self, _after: Time) {}
}

struct Entry {
    time: Time,
    seq: u64,
    event: Box<dyn SimEvent>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; we want earliest time (and, within a
        // time, earliest insertion) to sort first, so reverse both.
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Strict time-then-insertion-order event queue.
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<Entry>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue::default()
    }

    pub fn insert(&mut self, event: Box<dyn SimEvent>) {
        let time = event.next_time();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { time, seq, event });
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Current earliest scheduled time (`Time::max()` if empty).
    pub fn next_time(&self) -> Time {
        self.heap.peek().map(|e| e.time).unwrap_or_else(Time::max)
    }

    /// Install a periodic "tick" adapter guaranteeing progress in the
    /// event-driven power-flow loop.
    pub fn null_event_time(&mut self, t: Time, period: Time) {
        self.insert(Box::new(NullEvent {
            next: t + period,
            period,
        }));
    }

    /// Execute all adapters with `next_time <= t`, in time order (ties by
    /// insertion order), in two passes: all A-phases, then all B-phases.
    /// Returns the maximum `ChangeCode` over A-phase returns (`NoChange` if
    /// nothing ran).
    pub fn execute_events(&mut self, t: Time) -> ChangeCode {
        let mut due: Vec<Entry> = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.time > t {
                break;
            }
            due.push(self.heap.pop().unwrap());
        }
        // `due` was popped in (time, seq) order already, since the heap
        // orders that way; no further sort needed.

        let mut max_change = ChangeCode::NoChange;
        for entry in due.iter_mut() {
            let code = entry.event.execute_a(t);
            max_change = max_change.max(code);
        }
        for entry in due.iter_mut() {
            entry.event.execute_b(t);
        }

        // Re-arm periodic events; drop one-shot events.
        for mut entry in due {
            if let Some(period) = entry.event.period() {
                entry.event.advance_next_time(t);
                let seq = self.next_seq;
                self.next_seq += 1;
                self.heap.push(Entry {
                    time: entry.event.next_time().max(t + period),
                    seq,
                    event: entry.event,
                });
            }
        }

        max_change
    }
}

struct NullEvent {
    next: Time,
    period: Time,
}

impl SimEvent for NullEvent {
    fn next_time(&self) -> Time {
        self.next
    }
    fn execute_a(&mut self, _t: Time) -> ChangeCode {
        ChangeCode::NoChange
    }
    fn execute_b(&mut self, _t: Time) {}
    fn period(&self) -> Option<Time> {
        Some(self.period)
    }
    fn advance_next_time(&mut self, after: Time) {
        self.next = after + self.period;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct RecordingEvent {
        time: Time,
        a_runs: Arc<Mutex<u32>>,
        b_runs: Arc<Mutex<u32>>,
        a_order: Arc<Mutex<Vec<&'static str>>>,
        b_order: Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    }

    impl SimEvent for RecordingEvent {
        fn next_time(&self) -> Time {
            self.time
        }
        fn execute_a(&mut self, _t: Time) -> ChangeCode {
            *self.a_runs.lock().unwrap() += 1;
            self.a_order.lock().unwrap().push(self.name);
            ChangeCode::NonStateChange
        }
        fn execute_b(&mut self, _t: Time) {
            *self.b_runs.lock().unwrap() += 1;
            self.b_order.lock().unwrap().push(self.name);
        }
    }

    #[test]
    fn empty_queue_returns_no_change() {
        let mut q = EventQueue::new();
        assert_eq!(q.execute_events(Time::from_seconds(1.0)), ChangeCode::NoChange);
    }

    #[test]
    fn next_time_is_max_when_empty() {
        let q = EventQueue::new();
        assert_eq!(q.next_time(), Time::max());
    }

    #[test]
    fn executes_a_then_b_in_time_and_insertion_order() {
        let a_runs = Arc::new(Mutex::new(0));
        let b_runs = Arc::new(Mutex::new(0));
        let a_order = Arc::new(Mutex::new(Vec::new()));
        let b_order = Arc::new(Mutex::new(Vec::new()));

        let mut q = EventQueue::new();
        q.insert(Box::new(RecordingEvent {
            time: Time::from_seconds(1.0),
            a_runs: a_runs.clone(),
            b_runs: b_runs.clone(),
            a_order: a_order.clone(),
            b_order: b_order.clone(),
            name: "first",
        }));
        q.insert(Box::new(RecordingEvent {
            time: Time::from_seconds(1.0),
            a_runs: a_runs.clone(),
            b_runs: b_runs.clone(),
            a_order: a_order.clone(),
            b_order: b_order.clone(),
            name: "second",
        }));

        let code = q.execute_events(Time::from_seconds(1.0));
        assert_eq!(code, ChangeCode::NonStateChange);
        assert_eq!(*a_runs.lock().unwrap(), 2); // both events' A ran exactly once each
        assert_eq!(*b_runs.lock().unwrap(), 2);
        assert_eq!(a_order.lock().unwrap().as_slice(), &["first", "second"]);
        assert_eq!(b_order.lock().unwrap().as_slice(), &["first", "second"]);
        assert!(q.is_empty());
    }

    #[test]
    fn null_event_reinserts_periodically() {
        let mut q = EventQueue::new();
        q.null_event_time(Time::zero(), Time::from_seconds(1.0));
        assert_eq!(q.next_time(), Time::from_seconds(1.0));
        q.execute_events(Time::from_seconds(1.0));
        assert_eq!(q.next_time(), Time::from_seconds(2.0));
    }

    #[test]
    fn only_events_due_at_or_before_t_run() {
        let counter = Arc::new(Mutex::new(0));
        struct Once(Time, Arc<Mutex<i32>>);
        impl SimEvent for Once {
            fn next_time(&self) -> Time {
                self.0
            }
            fn execute_a(&mut self, _t: Time) -> ChangeCode {
                *self.1.lock().unwrap() += 1;
                ChangeCode::NoChange
            }
            fn execute_b(&mut self, _t: Time) {}
        }
        let mut q = EventQueue::new();
        q.insert(Box::new(Once(Time::from_seconds(5.0), counter.clone())));
        q.execute_events(Time::from_seconds(1.0));
        assert_eq!(*counter.lock().unwrap(), 0);
        q.execute_events(Time::from_seconds(5.0));
        assert_eq!(*counter.lock().unwrap(), 1);
    }
}
