//! Step intents and the timed pin transitions they expand into.
//!
//! Times are `Duration` offsets on the dispatcher's event clock.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

use crate::hardware_traits::{IoLevel, PinId};

/// Axes of a linear delta machine: three rails plus the extruder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisId {
    A = 0,
    B = 1,
    C = 2,
    Extruder = 3,
}

impl AxisId {
    pub const ALL: [AxisId; 4] = [AxisId::A, AxisId::B, AxisId::C, AxisId::Extruder];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<AxisId> {
        Self::ALL.get(idx).copied()
    }

    pub fn is_extruder(self) -> bool {
        self == AxisId::Extruder
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Forward,
    Backward,
}

/// One axis should take one step, in `direction`, at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    time: Duration,
    axis: AxisId,
    direction: StepDirection,
}

impl Event {
    pub fn new(time: Duration, axis: AxisId, direction: StepDirection) -> Self {
        Self { time, axis, direction }
    }

    pub fn time(&self) -> Duration {
        self.time
    }

    pub fn axis(&self) -> AxisId {
        self.axis
    }

    pub fn direction(&self) -> StepDirection {
        self.direction
    }
}

/// Drive `pin` to `level` at `time`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputEvent {
    time: Duration,
    pin: PinId,
    level: IoLevel,
}

impl OutputEvent {
    pub fn new(time: Duration, pin: PinId, level: IoLevel) -> Self {
        Self { time, pin, level }
    }

    pub fn time(&self) -> Duration {
        self.time
    }

    pub fn pin(&self) -> PinId {
        self.pin
    }

    pub fn level(&self) -> IoLevel {
        self.level
    }
}

#[derive(Debug)]
struct Pending {
    time: Duration,
    seq: u64,
    event: OutputEvent,
}

// seq is unique per queue, so (time, seq) equality is identity
impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}
impl Eq for Pending {}
impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.time, self.seq).cmp(&(other.time, other.seq))
    }
}

/// Pending pin writes, popped earliest first.
///
/// Writes due at the same time pop in the order they were pushed, so a step
/// sequence pushed whole keeps DIRECTION ahead of the STEP falling edge.
#[derive(Debug, Default)]
pub struct OutputQueue {
    queue: BinaryHeap<Reverse<Pending>>,
    next_seq: u64,
}

impl OutputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: OutputEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Pending {
            time: event.time(),
            seq,
            event,
        }));
    }

    pub fn extend(&mut self, events: impl IntoIterator<Item = OutputEvent>) {
        for event in events {
            self.push(event);
        }
    }

    pub fn pop(&mut self) -> Option<OutputEvent> {
        self.queue.pop().map(|Reverse(pending)| pending.event)
    }

    /// Time of the next write, if any.
    pub fn peek_time(&self) -> Option<Duration> {
        self.queue.peek().map(|Reverse(pending)| pending.time)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_index_round_trip() {
        for axis in AxisId::ALL {
            assert_eq!(AxisId::from_index(axis.index()), Some(axis));
        }
        assert_eq!(AxisId::from_index(4), None);
        assert!(AxisId::Extruder.is_extruder());
        assert!(!AxisId::B.is_extruder());
    }

    #[test]
    fn test_output_queue_pops_earliest_first() {
        let early = OutputEvent::new(Duration::from_micros(10), PinId(9), IoLevel::High);
        let late = OutputEvent::new(Duration::from_micros(18), PinId(1), IoLevel::Low);
        let mut queue = OutputQueue::new();
        queue.push(late);
        queue.push(early);
        assert_eq!(queue.peek_time(), Some(Duration::from_micros(10)));
        assert_eq!(queue.pop(), Some(early));
        assert_eq!(queue.pop(), Some(late));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_simultaneous_writes_keep_push_order() {
        let t = Duration::from_micros(5);
        let dir = OutputEvent::new(t, PinId(18), IoLevel::High);
        let step = OutputEvent::new(t, PinId(17), IoLevel::Low);
        let mut queue = OutputQueue::new();
        // enough same-time entries to force the heap to reorder internally
        for _ in 0..8 {
            queue.extend([dir, step]);
        }
        assert_eq!(queue.len(), 16);
        for _ in 0..8 {
            assert_eq!(queue.pop(), Some(dir));
            assert_eq!(queue.pop(), Some(step));
        }
    }
}
