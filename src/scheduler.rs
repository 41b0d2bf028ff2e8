//! The Event Scheduler: delayed and repeating callbacks driven by the
//! Clock's `now`, not the OS timer.
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::error;
use ordermap::OrderMap;

use crate::clock::ClockTime;

pub type ScheduleId = u64;

type Callback = Box<dyn FnMut() + Send>;

enum Entry {
    OneShot {
        due: ClockTime,
        callback: Callback,
    },
    Repeating {
        next_due: ClockTime,
        interval: u64,
        callback: Callback,
    },
}

/// Schedules one-shot and repeating callbacks against ticks fed by
/// [`EventScheduler::tick`]. A callback that panics is caught and logged,
/// matching the Clock's own listener isolation; one-shots that panic are
/// still disposed, repeating callbacks survive to fire again next interval.
#[derive(Default)]
pub struct EventScheduler {
    entries: OrderMap<ScheduleId, Entry>,
    next_id: ScheduleId,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc_id(&mut self) -> ScheduleId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Fire `callback` once, when `now` first reaches `target_time`.
    pub fn schedule_at(&mut self, target_time: ClockTime, callback: impl FnMut() + Send + 'static) -> ScheduleId {
        let id = self.alloc_id();
        self.entries.insert(
            id,
            Entry::OneShot {
                due: target_time,
                callback: Box::new(callback),
            },
        );
        id
    }

    /// Fire `callback` every `interval` ticks of elapsed clock time,
    /// starting `initial_delay` (default: `interval`) after `now`.
    pub fn schedule_repeating(
        &mut self,
        callback: impl FnMut() + Send + 'static,
        interval: u64,
        initial_delay: Option<u64>,
        now: ClockTime,
    ) -> ScheduleId {
        let id = self.alloc_id();
        self.entries.insert(
            id,
            Entry::Repeating {
                next_due: now + initial_delay.unwrap_or(interval),
                interval,
                callback: Box::new(callback),
            },
        );
        id
    }

    /// Cancel a scheduled entry. Returns false if `id` was already fired
    /// (one-shot) or never existed.
    pub fn cancel(&mut self, id: ScheduleId) -> bool {
        self.entries.shift_remove(&id).is_some()
    }

    /// Fire every entry now due. One-shots are removed after firing;
    /// repeating entries advance their next-due time by their interval.
    pub fn tick(&mut self, now: ClockTime) {
        let due: Vec<ScheduleId> = self
            .entries
            .iter()
            .filter(|(_, entry)| match entry {
                Entry::OneShot { due, .. } => now >= *due,
                Entry::Repeating { next_due, .. } => now >= *next_due,
            })
            .map(|(id, _)| *id)
            .collect();

        for id in due {
            let remove_after = match self.entries.get_mut(&id) {
                Some(Entry::OneShot { callback, .. }) => {
                    fire(callback);
                    true
                }
                Some(Entry::Repeating { callback, interval, next_due }) => {
                    fire(callback);
                    *next_due += *interval;
                    false
                }
                None => false,
            };
            if remove_after {
                self.entries.shift_remove(&id);
            }
        }
    }

    pub fn is_scheduled(&self, id: ScheduleId) -> bool {
        self.entries.contains_key(&id)
    }
}

fn fire(callback: &mut Callback) {
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback())) {
        error!("scheduled callback panicked: {payload:?}");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_one_shot_fires_once_when_due() {
        let mut scheduler = EventScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_in = count.clone();
        scheduler.schedule_at(100, move || {
            count_in.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.tick(50);
        assert_eq!(0, count.load(Ordering::SeqCst));
        scheduler.tick(100);
        assert_eq!(1, count.load(Ordering::SeqCst));
        scheduler.tick(200);
        assert_eq!(1, count.load(Ordering::SeqCst), "one-shot must not fire twice");
    }

    #[test]
    fn test_repeating_fires_on_every_interval() {
        let mut scheduler = EventScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_in = count.clone();
        scheduler.schedule_repeating(
            move || {
                count_in.fetch_add(1, Ordering::SeqCst);
            },
            100,
            None,
            0,
        );

        scheduler.tick(100);
        assert_eq!(1, count.load(Ordering::SeqCst));
        scheduler.tick(200);
        assert_eq!(2, count.load(Ordering::SeqCst));
        scheduler.tick(250);
        assert_eq!(2, count.load(Ordering::SeqCst));
        scheduler.tick(300);
        assert_eq!(3, count.load(Ordering::SeqCst));
    }

    #[test]
    fn test_cancel_prevents_future_firing() {
        let mut scheduler = EventScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_in = count.clone();
        let id = scheduler.schedule_at(100, move || {
            count_in.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.cancel(id));
        scheduler.tick(100);
        assert_eq!(0, count.load(Ordering::SeqCst));
        assert!(!scheduler.cancel(id), "cancelling twice should report false");
    }

    #[test]
    fn test_panicking_one_shot_is_still_disposed() {
        let mut scheduler = EventScheduler::new();
        scheduler.schedule_at(0, || panic!("boom"));
        scheduler.tick(0);
        assert_eq!(0, scheduler.entries.len());
    }

    #[test]
    fn test_panicking_repeating_survives() {
        let mut scheduler = EventScheduler::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_in = count.clone();
        scheduler.schedule_repeating(
            move || {
                count_in.fetch_add(1, Ordering::SeqCst);
                panic!("boom");
            },
            10,
            Some(0),
            0,
        );
        scheduler.tick(0);
        scheduler.tick(10);
        assert_eq!(2, count.load(Ordering::SeqCst));
    }
}
