//! Let-It-Up daemon support: configuration, logging setup and the synthetic
//! pulse producer shared by the `letitup-hub`, `letitup-pulse` and
//! `letitup-subscriber` binaries.

pub mod config;
pub mod logging;
pub mod pulse;

pub use config::LetItUpConfig;
pub use pulse::{Pulse, PulseError, PulseSettings};
