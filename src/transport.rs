//! Downstream transports: consumers of assembled DMX universe buffers.
//!
//! Real ArtNet/sACN/USB-DMX transports are out of scope here; this module
//! ships only the trait and two stand-ins used by the CLI demo and tests.
use std::sync::mpsc::{SendError, Sender};
use std::sync::{Arc, Mutex};

use log::debug;

use crate::dmx::{DmxBuffer, UniverseIdx};

/// A sink for assembled per-universe DMX frames. Transports own their own
/// connection lifecycle; the sequencer only calls `start`/`stop`/`send` and
/// listens for errors via `on_error`.
pub trait Transport: Send {
    fn start(&mut self) {}
    fn stop(&mut self) {}
    fn send(&mut self, universe: UniverseIdx, buffer: &DmxBuffer);
    fn on_error(&mut self, _listener: Box<dyn Fn(String) + Send>) {}
}

/// Discards every frame. Useful for headless runs and as the CLI demo's
/// default transport when no real output is wired up.
#[derive(Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn send(&mut self, universe: UniverseIdx, _buffer: &DmxBuffer) {
        debug!("null transport discarding frame for universe {universe}");
    }
}

/// Forwards frames across an `mpsc` channel. Intended for tests and for the
/// CLI demo's "print what would go out" mode; not a production transport.
pub struct ChannelTransport {
    sender: Sender<(UniverseIdx, DmxBuffer)>,
    error_listeners: Arc<Mutex<Vec<Box<dyn Fn(String) + Send>>>>,
}

impl ChannelTransport {
    pub fn new(sender: Sender<(UniverseIdx, DmxBuffer)>) -> Self {
        Self {
            sender,
            error_listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn notify_error(&self, err: SendError<(UniverseIdx, DmxBuffer)>) {
        let message = err.to_string();
        for listener in self.error_listeners.lock().unwrap().iter() {
            listener(message.clone());
        }
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, universe: UniverseIdx, buffer: &DmxBuffer) {
        if let Err(err) = self.sender.send((universe, *buffer)) {
            self.notify_error(err);
        }
    }

    fn on_error(&mut self, listener: Box<dyn Fn(String) + Send>) {
        self.error_listeners.lock().unwrap().push(listener);
    }
}
