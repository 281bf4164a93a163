//! Event timeline
//!
//! Everything that is not a processor instruction happens here: barcode
//! half-bit shifts, display ticks, host input and speech completion. Times
//! are in master clock cycles. Entries with the same time come out in the
//! order they were scheduled.

use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::card::CardCode;
use crate::keypad::Key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// Shift the card sensor by one half-bit
    BarcodeShift,
    /// Advance the display persistence clock
    DisplayTick,
    CardSwipe(CardCode),
    KeyChange { key: Key, pressed: bool },
    /// The speech unit finished the word that opened the given stall
    SpeechDone(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheduled {
    pub time: u64,
    seq: u64,
    pub event: Event,
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.time, self.seq).cmp(&(other.time, other.seq))
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Scheduled>", into = "Vec<Scheduled>")]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl From<Vec<Scheduled>> for Scheduler {
    fn from(entries: Vec<Scheduled>) -> Self {
        let next_seq = entries.iter().map(|e| e.seq + 1).max().unwrap_or(0);
        Self {
            queue: entries.into_iter().map(Reverse).collect(),
            next_seq,
        }
    }
}

impl From<Scheduler> for Vec<Scheduled> {
    fn from(scheduler: Scheduler) -> Self {
        let mut entries: Vec<Scheduled> = scheduler.queue.into_iter().map(|Reverse(e)| e).collect();
        entries.sort();
        entries
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.next_seq = 0;
    }

    pub fn schedule_at(&mut self, time: u64, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Scheduled { time, seq, event }));
    }

    /// Time of the earliest pending event
    pub fn peek_time(&self) -> Option<u64> {
        self.queue.peek().map(|Reverse(e)| e.time)
    }

    /// Remove the earliest event if it is due at or before `now`
    pub fn pop_due(&mut self, now: u64) -> Option<Scheduled> {
        match self.peek_time() {
            Some(time) if time <= now => self.queue.pop().map(|Reverse(e)| e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_come_out_in_time_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(30, Event::DisplayTick);
        scheduler.schedule_at(10, Event::BarcodeShift);
        scheduler.schedule_at(20, Event::SpeechDone(1));

        assert_eq!(scheduler.peek_time(), Some(10));
        assert_eq!(scheduler.pop_due(5), None);
        assert_eq!(scheduler.pop_due(100).map(|e| e.event), Some(Event::BarcodeShift));
        assert_eq!(scheduler.pop_due(100).map(|e| e.event), Some(Event::SpeechDone(1)));
        assert_eq!(scheduler.pop_due(100).map(|e| e.event), Some(Event::DisplayTick));
        assert_eq!(scheduler.peek_time(), None);
    }

    #[test]
    fn test_equal_times_are_fifo() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(7, Event::DisplayTick);
        scheduler.schedule_at(7, Event::BarcodeShift);
        scheduler.schedule_at(7, Event::SpeechDone(1));

        let order: Vec<Event> = std::iter::from_fn(|| scheduler.pop_due(7))
            .map(|e| e.event)
            .collect();
        assert_eq!(
            order,
            vec![Event::DisplayTick, Event::BarcodeShift, Event::SpeechDone(1)]
        );
    }

    #[test]
    fn test_serde_keeps_order_and_sequence() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(5, Event::SpeechDone(1));
        scheduler.schedule_at(5, Event::DisplayTick);

        let value = serde_json::to_value(&scheduler).unwrap();
        let mut restored: Scheduler = serde_json::from_value(value).unwrap();
        restored.schedule_at(5, Event::BarcodeShift);

        let order: Vec<Event> = std::iter::from_fn(|| restored.pop_due(5))
            .map(|e| e.event)
            .collect();
        assert_eq!(
            order,
            vec![Event::SpeechDone(1), Event::DisplayTick, Event::BarcodeShift]
        );
    }
}
