//! The Sequencer facade: the single object external code constructs, and
//! the owner of the tick loop described in the concurrency model.
//!
//! Grounded directly in `show.rs`'s `Show::run`/`update`/`render` split: a
//! dedicated thread drains its inbox, advances every state machine to the
//! tick's `now`, and assembles/sends a frame, one tick at a time. The inbox
//! itself follows `control.rs`'s `Controller`: a `channel()` pair read with
//! `recv_timeout`, with disconnection surfaced as [`SequencerError::InboxDisconnected`].
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};

use crate::clock::{Clock, ClockTime, Tick};
use crate::color::Rgbio;
use crate::config::FixtureId;
use crate::engine::EventCounters;
use crate::error::SequencerError;
use crate::fixture::FixtureRegistry;
use crate::layer::DEFAULT_IDLE_LAYER_THRESHOLD_MS;
use crate::manager::EffectManager;
use crate::output::OutputAssembler;
use crate::scheduler::EventScheduler;
use crate::transition::{Effect, EventKind};
use crate::transport::Transport;

/// Every mutating operation the façade exposes, carried across the inbox.
/// `*IfFree` variants carry a reply channel since their boolean result must
/// cross back over the thread boundary; every other operation is
/// fire-and-forget, matching the "enqueue and continue" inbox contract.
pub enum Command {
    Add { name: String, effect: Effect, persistent: bool },
    Set { name: String, effect: Effect, persistent: bool },
    AddIfFree { name: String, effect: Effect, persistent: bool, reply: Sender<bool> },
    SetIfFree { name: String, effect: Effect, persistent: bool, reply: Sender<bool> },
    RemoveByLayer { layer: u32, also_remove_transitions: bool },
    RemoveByName { name: String, layer: u32 },
    SetState { fixtures: Vec<FixtureId>, color: Rgbio, duration_ms: u64 },
    Blackout { duration_ms: u64 },
    CancelBlackout,
    RecordEvent(EventKind),
    ReplaceConfig(crate::config::RootConfig),
    Shutdown,
}

/// A cheaply cloneable handle onto a running [`Sequencer`]'s inbox. Every
/// method here enqueues a [`Command`] and returns immediately; the
/// `*_if_free` variants block only on the reply channel, not on a tick.
#[derive(Clone)]
pub struct SequencerHandle {
    inbox: Sender<Command>,
}

impl SequencerHandle {
    fn send(&self, command: Command) -> Result<(), SequencerError> {
        self.inbox.send(command).map_err(|_| SequencerError::InboxDisconnected)
    }

    pub fn add(&self, name: impl Into<String>, effect: Effect, persistent: bool) -> Result<(), SequencerError> {
        self.send(Command::Add { name: name.into(), effect, persistent })
    }

    pub fn set(&self, name: impl Into<String>, effect: Effect, persistent: bool) -> Result<(), SequencerError> {
        self.send(Command::Set { name: name.into(), effect, persistent })
    }

    pub fn add_if_free(&self, name: impl Into<String>, effect: Effect, persistent: bool) -> Result<bool, SequencerError> {
        let (reply, rx) = mpsc::channel();
        self.send(Command::AddIfFree { name: name.into(), effect, persistent, reply })?;
        rx.recv().map_err(|_| SequencerError::InboxDisconnected)
    }

    pub fn set_if_free(&self, name: impl Into<String>, effect: Effect, persistent: bool) -> Result<bool, SequencerError> {
        let (reply, rx) = mpsc::channel();
        self.send(Command::SetIfFree { name: name.into(), effect, persistent, reply })?;
        rx.recv().map_err(|_| SequencerError::InboxDisconnected)
    }

    pub fn remove_by_layer(&self, layer: u32, also_remove_transitions: bool) -> Result<(), SequencerError> {
        self.send(Command::RemoveByLayer { layer, also_remove_transitions })
    }

    pub fn remove_by_name(&self, name: impl Into<String>, layer: u32) -> Result<(), SequencerError> {
        self.send(Command::RemoveByName { name: name.into(), layer })
    }

    pub fn set_state(&self, fixtures: Vec<FixtureId>, color: Rgbio, duration_ms: u64) -> Result<(), SequencerError> {
        self.send(Command::SetState { fixtures, color, duration_ms })
    }

    pub fn blackout(&self, duration_ms: u64) -> Result<(), SequencerError> {
        self.send(Command::Blackout { duration_ms })
    }

    pub fn cancel_blackout(&self) -> Result<(), SequencerError> {
        self.send(Command::CancelBlackout)
    }

    pub fn record_event(&self, kind: EventKind) -> Result<(), SequencerError> {
        self.send(Command::RecordEvent(kind))
    }

    pub fn on_beat(&self) -> Result<(), SequencerError> {
        self.record_event(EventKind::Beat)
    }

    pub fn on_measure(&self) -> Result<(), SequencerError> {
        self.record_event(EventKind::Measure)
    }

    pub fn on_keyframe(&self) -> Result<(), SequencerError> {
        self.record_event(EventKind::Keyframe)
    }

    pub fn replace_config(&self, config: crate::config::RootConfig) -> Result<(), SequencerError> {
        self.send(Command::ReplaceConfig(config))
    }

    pub fn shutdown(&self) -> Result<(), SequencerError> {
        self.send(Command::Shutdown)
    }
}

/// Owns the Clock, Fixture Registry, Event Scheduler, Effect Manager, and
/// transports, and drives them all from a single dedicated thread.
pub struct Sequencer {
    clock: Clock,
    registry: Arc<FixtureRegistry>,
    events: EventCounters,
    scheduler: EventScheduler,
    effects: EffectManager,
    transports: Vec<Box<dyn Transport>>,
    idle_layer_threshold_ms: u64,
    inbox_tx: Sender<Command>,
    inbox_rx: Receiver<Command>,
}

impl Sequencer {
    pub fn new(cadence: Duration, registry: Arc<FixtureRegistry>, transports: Vec<Box<dyn Transport>>) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel();
        Self {
            clock: Clock::new(cadence),
            registry,
            events: EventCounters::new(),
            scheduler: EventScheduler::new(),
            effects: EffectManager::new(),
            transports,
            idle_layer_threshold_ms: DEFAULT_IDLE_LAYER_THRESHOLD_MS,
            inbox_tx,
            inbox_rx,
        }
    }

    pub fn handle(&self) -> SequencerHandle {
        SequencerHandle { inbox: self.inbox_tx.clone() }
    }

    pub fn set_idle_layer_threshold_ms(&mut self, threshold: u64) {
        self.idle_layer_threshold_ms = threshold;
    }

    /// Start the clock and transports and run the tick loop on a dedicated
    /// thread until a [`Command::Shutdown`] is drained, returning the
    /// thread's `JoinHandle`.
    pub fn start(mut self) -> JoinHandle<()> {
        let (tick_tx, tick_rx) = mpsc::channel::<Tick>();
        self.clock.register(move |tick| {
            // The clock thread only forwards ticks; all sequencer state is
            // touched exclusively from the thread spawned below.
            let _ = tick_tx.send(tick);
        });

        for transport in &mut self.transports {
            transport.start();
        }
        self.clock.start();

        thread::spawn(move || {
            info!("sequencer tick loop starting");
            loop {
                match tick_rx.recv_timeout(Duration::from_secs(1)) {
                    Ok(tick) => {
                        if !self.on_tick(tick) {
                            break;
                        }
                    }
                    Err(mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(mpsc::RecvTimeoutError::Disconnected) => {
                        warn!("clock listener channel disconnected; stopping sequencer");
                        break;
                    }
                }
            }
            self.clock.stop();
            for transport in &mut self.transports {
                transport.stop();
            }
            info!("sequencer tick loop stopped");
        })
    }

    /// Drain every pending command, advance every state machine to `now`,
    /// assemble the resulting frame, and fan it out to every transport.
    /// Returns false once a [`Command::Shutdown`] has been processed.
    fn on_tick(&mut self, tick: Tick) -> bool {
        loop {
            match self.inbox_rx.try_recv() {
                Ok(command) => {
                    if !self.handle_command(command, tick.now) {
                        return false;
                    }
                }
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    warn!("sequencer inbox disconnected; every handle has been dropped");
                    return false;
                }
            }
        }

        self.effects.advance_tick(tick.now, &self.events, &self.registry);
        self.effects.cleanup_unused_layers(tick.now, self.idle_layer_threshold_ms);
        self.scheduler.tick(tick.now);

        let frames = OutputAssembler::assemble(self.effects.store(), &self.registry);
        for (universe, buffer) in frames {
            for transport in &mut self.transports {
                transport.send(universe, &buffer);
            }
        }
        true
    }

    fn handle_command(&mut self, command: Command, now: ClockTime) -> bool {
        match command {
            Command::Add { name, effect, persistent } => self.effects.add(&name, &effect, persistent, now),
            Command::Set { name, effect, persistent } => self.effects.set(&name, &effect, persistent, now),
            Command::AddIfFree { name, effect, persistent, reply } => {
                let _ = reply.send(self.effects.add_if_free(&name, &effect, persistent, now));
            }
            Command::SetIfFree { name, effect, persistent, reply } => {
                let _ = reply.send(self.effects.set_if_free(&name, &effect, persistent, now));
            }
            Command::RemoveByLayer { layer, also_remove_transitions } => {
                self.effects.remove_by_layer(layer, also_remove_transitions, now)
            }
            Command::RemoveByName { name, layer } => self.effects.remove_by_name(&name, layer, now),
            Command::SetState { fixtures, color, duration_ms } => {
                self.effects.set_state(fixtures, color, duration_ms, now)
            }
            Command::Blackout { duration_ms } => self.effects.blackout(&self.registry, duration_ms, now),
            Command::CancelBlackout => self.effects.cancel_blackout(now),
            Command::RecordEvent(kind) => self.events.record(kind),
            Command::ReplaceConfig(config) => {
                if let Err(err) = self.registry.replace(&config) {
                    warn!("failed to hot-reload fixture configuration: {err}");
                } else {
                    let known: std::collections::HashSet<FixtureId> =
                        self.registry.all().into_iter().map(|f| f.id).collect();
                    self.effects.store.purge_unknown(&known);
                }
            }
            Command::Shutdown => return false,
        }
        true
    }
}
