//! Flash effect state machine
//!
//! `Idle → Active → Releasing → Idle`. At most one effect is in flight:
//! a flash that arrives while `Active` or `Releasing` is dropped. Phase
//! changes are driven by timers the caller schedules from `next_timer`;
//! every timer carries the epoch it was issued in, and `teardown` bumps the
//! epoch so a timer that fires after a disconnect does nothing.

use std::time::Duration;

use letitup_protocol::FlashPayload;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::palette::{Color, ColorMode};
use crate::sink::EffectSink;

/// Fixed durations of one effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectTiming {
    /// How long the actuator stays engaged
    pub engage: Duration,
    /// Overlay fade-out after the actuator is released
    pub fade: Duration,
}

impl EffectTiming {
    pub fn total(&self) -> Duration {
        self.engage + self.fade
    }
}

impl Default for EffectTiming {
    fn default() -> Self {
        Self {
            engage: Duration::from_millis(100),
            fade: Duration::from_millis(150),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectPhase {
    Idle,
    Active {
        color: Color,
        intensity: f64,
        started_at: Instant,
    },
    Releasing {
        color: Color,
    },
}

/// Pending phase transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectTimer {
    pub at: Instant,
    pub epoch: u64,
}

pub struct EffectMachine<S: EffectSink> {
    sink: S,
    timing: EffectTiming,
    color_mode: ColorMode,
    phase: EffectPhase,
    timer: Option<EffectTimer>,
    epoch: u64,
    torch_engaged: bool,
    cycles: u64,
}

impl<S: EffectSink> EffectMachine<S> {
    pub fn new(sink: S, timing: EffectTiming, color_mode: ColorMode) -> Self {
        Self {
            sink,
            timing,
            color_mode,
            phase: EffectPhase::Idle,
            timer: None,
            epoch: 0,
            torch_engaged: false,
            cycles: 0,
        }
    }

    pub fn phase(&self) -> EffectPhase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == EffectPhase::Idle
    }

    pub fn is_torch_engaged(&self) -> bool {
        self.torch_engaged
    }

    /// Effects that ran all the way back to `Idle`
    pub fn completed_cycles(&self) -> u64 {
        self.cycles
    }

    pub fn next_timer(&self) -> Option<EffectTimer> {
        self.timer
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Start an effect if idle. Returns whether one started.
    pub fn on_flash(&mut self, flash: &FlashPayload, now: Instant) -> bool {
        if !self.is_idle() {
            debug!("Flash coalesced: effect already in flight");
            return false;
        }

        let color = self.color_mode.pick();
        self.sink.show_overlay(color, flash.intensity);

        match self.sink.torch_on() {
            Ok(()) => self.torch_engaged = true,
            Err(e) => warn!("Torch unavailable, flashing screen only: {}", e),
        }

        self.phase = EffectPhase::Active {
            color,
            intensity: flash.intensity,
            started_at: now,
        };
        self.timer = Some(EffectTimer {
            at: now + self.timing.engage,
            epoch: self.epoch,
        });
        true
    }

    /// Advance the phase for a fired timer. Stale timers are ignored.
    pub fn on_timer(&mut self, timer: EffectTimer, now: Instant) {
        if timer.epoch != self.epoch || self.timer != Some(timer) {
            debug!("Ignoring stale effect timer");
            return;
        }

        match self.phase {
            EffectPhase::Active { color, .. } => {
                self.release_torch();
                self.sink.fade_overlay(self.timing.fade);
                self.phase = EffectPhase::Releasing { color };
                self.timer = Some(EffectTimer {
                    at: now + self.timing.fade,
                    epoch: self.epoch,
                });
            }
            EffectPhase::Releasing { .. } => {
                self.sink.clear_overlay();
                self.phase = EffectPhase::Idle;
                self.timer = None;
                self.cycles += 1;
            }
            EffectPhase::Idle => self.timer = None,
        }
    }

    /// Abort whatever is in flight and release the actuator.
    /// Safe to call in any phase, any number of times.
    pub fn teardown(&mut self) {
        // Unconditional: the sink may hold the torch even if we think not
        self.sink.torch_off();
        self.torch_engaged = false;

        if !self.is_idle() {
            self.sink.clear_overlay();
            self.phase = EffectPhase::Idle;
        }
        self.timer = None;
        self.epoch += 1;
    }

    fn release_torch(&mut self) {
        if self.torch_engaged {
            self.sink.torch_off();
            self.torch_engaged = false;
        }
    }
}
