//! Output side of the effect state machine
//!
//! Rendering and hardware live behind `EffectSink`; the state machine only
//! decides when each call happens.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use letitup_protocol::LyricPayload;
use tracing::{debug, info, warn};

use crate::connection::ConnectionStatus;
use crate::error::ActuatorError;
use crate::palette::Color;

/// Presentation layer and hardware driven by the effect machine
pub trait EffectSink: Send {
    /// Engage the hardware actuator (torch/flash)
    fn torch_on(&mut self) -> Result<(), ActuatorError>;

    /// Release the actuator. Must be safe to call when not engaged.
    fn torch_off(&mut self);

    fn show_overlay(&mut self, color: Color, intensity: f64);

    fn fade_overlay(&mut self, duration: Duration);

    fn clear_overlay(&mut self);

    fn lyric(&mut self, _lyric: &LyricPayload) {}

    fn tempo(&mut self, _bpm: f64) {}

    fn connection_status(&mut self, _status: ConnectionStatus) {}
}

/// Sink for headless subscribers: every call becomes a log line
#[derive(Debug, Default)]
pub struct LogSink {
    torch_engaged: bool,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EffectSink for LogSink {
    fn torch_on(&mut self) -> Result<(), ActuatorError> {
        self.torch_engaged = true;
        info!("🔦 Torch on");
        Ok(())
    }

    fn torch_off(&mut self) {
        if self.torch_engaged {
            info!("🔦 Torch off");
        }
        self.torch_engaged = false;
    }

    fn show_overlay(&mut self, color: Color, intensity: f64) {
        info!("⚡ Flash {} at {:.2}", color, intensity);
    }

    fn fade_overlay(&mut self, duration: Duration) {
        debug!("Fading overlay over {:?}", duration);
    }

    fn clear_overlay(&mut self) {
        debug!("Overlay cleared");
    }

    fn lyric(&mut self, lyric: &LyricPayload) {
        info!("🎤 {}", lyric.text);
    }

    fn tempo(&mut self, bpm: f64) {
        info!("🎵 {:.0} BPM", bpm);
    }

    fn connection_status(&mut self, status: ConnectionStatus) {
        match status {
            ConnectionStatus::Disconnected { exhausted: true, .. } => {
                warn!("Hub unreachable, still retrying: {}", status)
            }
            _ => info!("Connection: {}", status),
        }
    }
}

/// One call made on a `RecordingSink`
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    TorchOn,
    TorchOff,
    Overlay { color: Color, intensity: f64 },
    Fade(Duration),
    Clear,
    Lyric(String),
    Tempo(f64),
    Status(ConnectionStatus),
}

/// Sink that records every call, for embedding hosts and tests
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
    torch_broken: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink whose torch always fails to engage
    pub fn with_broken_torch() -> Self {
        Self {
            torch_broken: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.lock().clone()
    }

    pub fn count(&self, call: &SinkCall) -> usize {
        self.lock().iter().filter(|c| *c == call).count()
    }

    pub fn overlays(&self) -> usize {
        self.lock()
            .iter()
            .filter(|c| matches!(c, SinkCall::Overlay { .. }))
            .count()
    }

    /// Whether the last torch call left it engaged
    pub fn torch_engaged(&self) -> bool {
        self.lock()
            .iter()
            .rev()
            .find_map(|c| match c {
                SinkCall::TorchOn => Some(true),
                SinkCall::TorchOff => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    fn record(&self, call: SinkCall) {
        self.lock().push(call);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SinkCall>> {
        // A panic while recording leaves the Vec intact
        self.calls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EffectSink for RecordingSink {
    fn torch_on(&mut self) -> Result<(), ActuatorError> {
        if self.torch_broken {
            return Err(ActuatorError::Unavailable("no torch".to_string()));
        }
        self.record(SinkCall::TorchOn);
        Ok(())
    }

    fn torch_off(&mut self) {
        self.record(SinkCall::TorchOff);
    }

    fn show_overlay(&mut self, color: Color, intensity: f64) {
        self.record(SinkCall::Overlay { color, intensity });
    }

    fn fade_overlay(&mut self, duration: Duration) {
        self.record(SinkCall::Fade(duration));
    }

    fn clear_overlay(&mut self) {
        self.record(SinkCall::Clear);
    }

    fn lyric(&mut self, lyric: &LyricPayload) {
        self.record(SinkCall::Lyric(lyric.text.clone()));
    }

    fn tempo(&mut self, bpm: f64) {
        self.record(SinkCall::Tempo(bpm));
    }

    fn connection_status(&mut self, status: ConnectionStatus) {
        self.record(SinkCall::Status(status));
    }
}
