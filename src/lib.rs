//! A tick-driven, layered DMX effect sequencer.
//!
//! Data flows Clock -> Transition Engine -> Light State Store -> Output
//! Assembler -> Transports every tick; control flows the other way, with
//! external cue code driving the Effect Manager, which the Effect
//! Transformer and Layer Manager support. [`sequencer::Sequencer`] is the
//! entry point that wires all of it together.
pub mod clock;
pub mod color;
pub mod config;
pub mod dmx;
pub mod easing;
pub mod engine;
pub mod error;
pub mod fixture;
pub mod interpolator;
pub mod layer;
pub mod manager;
pub mod output;
pub mod scheduler;
pub mod sequencer;
pub mod state_store;
pub mod transformer;
pub mod transition;
pub mod transport;

pub use clock::{Clock, ClockTime, Tick};
pub use color::{BlendMode, PanTilt, Rgbio};
pub use config::{ChannelMap, FixtureConfig, FixtureId, GroupConfig, RootConfig};
pub use easing::Easing;
pub use engine::EventCounters;
pub use error::SequencerError;
pub use fixture::{Fixture, FixtureRegistry, Group, Target};
pub use manager::EffectManager;
pub use output::OutputAssembler;
pub use scheduler::EventScheduler;
pub use sequencer::{Command, Sequencer, SequencerHandle};
pub use state_store::LightStateStore;
pub use transition::{Effect, EffectStep, EventKind, TransitionStep, WaitFor};
pub use transport::{ChannelTransport, NullTransport, Transport};
