//! A single monotonic tick source with delta-time fan-out to listeners.
//!
//! The Clock is the sole driver of the sequencer thread, grounded in
//! `show.rs`'s `Show::run` loop: a dedicated thread sleeps until the next
//! cadence boundary and hands out the true elapsed delta, never a fabricated
//! fixed one, so a slow tick is visible to every listener as a bigger delta
//! rather than silently dropped time.
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, warn};

/// A point in time on the Clock's domain, in milliseconds since the Clock
/// started. All state-machine timestamps (`transitionStartTime`,
/// `waitEndTime`, event counters) live in this domain.
pub type ClockTime = u64;

/// Delta since the previous tick, along with the `now` every listener in
/// this tick observes. Two effects scheduled to start in the same tick see
/// an identical `now`: the Transition Engine captures it once per tick and
/// threads it through every state-machine advance.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Tick {
    pub now: ClockTime,
    pub delta: Duration,
}

type Listener = Box<dyn FnMut(Tick) + Send>;

/// If a tick's actual delta exceeds this multiple of the target cadence, log
/// that the sequencer thread is falling behind.
const FALLING_BEHIND_FACTOR: u32 = 3;

/// Monotonic millisecond tick source.
///
/// Construction registers no listeners; callers add them with
/// [`Clock::register`] before calling [`Clock::start`]. Listeners fire in
/// registration order every tick, and a listener that panics is caught and
/// logged rather than poisoning the clock thread or skipping later
/// listeners in the same tick.
pub struct Clock {
    cadence: Duration,
    listeners: Arc<Mutex<Vec<(ListenerId, Listener)>>>,
    next_listener_id: ListenerId,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

pub type ListenerId = u64;

impl Clock {
    /// Create a new, stopped clock targeting the given tick cadence.
    pub fn new(cadence: Duration) -> Self {
        Self {
            cadence,
            listeners: Arc::new(Mutex::new(Vec::new())),
            next_listener_id: 0,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Register a new tick listener, returning an id usable with
    /// [`Clock::unregister`].
    pub fn register(&mut self, listener: impl FnMut(Tick) + Send + 'static) -> ListenerId {
        let id = self.next_listener_id;
        self.next_listener_id += 1;
        self.listeners
            .lock()
            .unwrap()
            .push((id, Box::new(listener)));
        id
    }

    /// Remove a previously registered listener.
    pub fn unregister(&mut self, id: ListenerId) {
        self.listeners.lock().unwrap().retain(|(lid, _)| *lid != id);
    }

    /// Start the clock thread. A clock can only be started once; calling
    /// `start` again while already running is a no-op.
    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let cadence = self.cadence;
        let listeners = self.listeners.clone();
        let running = self.running.clone();
        self.handle = Some(thread::spawn(move || {
            let start = Instant::now();
            let mut last_elapsed = Duration::ZERO;
            while running.load(Ordering::SeqCst) {
                let target = last_elapsed + cadence;
                let now = Instant::now();
                let elapsed_so_far = now.duration_since(start);
                if target > elapsed_so_far {
                    thread::sleep(target - elapsed_so_far);
                }
                let elapsed = Instant::now().duration_since(start);
                let delta = elapsed - last_elapsed;
                if delta > cadence * FALLING_BEHIND_FACTOR {
                    warn!(
                        "sequencer tick fell behind: {:?} elapsed since previous tick (cadence {:?})",
                        delta, cadence
                    );
                }
                last_elapsed = elapsed;
                let tick = Tick {
                    now: elapsed.as_millis() as ClockTime,
                    delta,
                };
                let mut listeners = listeners.lock().unwrap();
                for (_, listener) in listeners.iter_mut() {
                    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(tick))) {
                        error!("clock listener panicked: {payload:?}");
                    }
                }
            }
        }));
    }

    /// Stop the clock thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// True if the clock thread is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_listeners_fire_in_registration_order_and_deliver_real_deltas() {
        let mut clock = Clock::new(Duration::from_millis(5));
        let (send, recv) = mpsc::channel();
        let send_a = send.clone();
        clock.register(move |tick| send_a.send(('a', tick)).unwrap());
        clock.register(move |tick| send.send(('b', tick)).unwrap());
        clock.start();

        for _ in 0..6 {
            let (label, tick) = recv.recv_timeout(Duration::from_secs(1)).unwrap();
            assert_eq!('a', label);
            assert!(tick.delta > Duration::ZERO);
            let (label, _) = recv.recv_timeout(Duration::from_secs(1)).unwrap();
            assert_eq!('b', label);
        }
        clock.stop();
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let mut clock = Clock::new(Duration::from_millis(2));
        let (send, recv) = mpsc::channel();
        let id = clock.register(move |tick| send.send(tick).unwrap());
        clock.start();
        recv.recv_timeout(Duration::from_secs(1)).unwrap();
        clock.unregister(id);
        // Drain any in-flight ticks, then assert no more arrive.
        while recv.recv_timeout(Duration::from_millis(50)).is_ok() {}
        assert!(recv.recv_timeout(Duration::from_millis(100)).is_err());
        clock.stop();
    }

    #[test]
    fn test_panicking_listener_does_not_stop_others() {
        let mut clock = Clock::new(Duration::from_millis(2));
        clock.register(|_| panic!("boom"));
        let (send, recv) = mpsc::channel();
        clock.register(move |tick| send.send(tick).unwrap());
        clock.start();
        assert!(recv.recv_timeout(Duration::from_secs(1)).is_ok());
        clock.stop();
    }
}
