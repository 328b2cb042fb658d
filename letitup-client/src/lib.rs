//! Subscriber side of Let-It-Up
//!
//! Turns the hub's event stream into bounded, non-overlapping flash effects.
//!
//! - [`HubClient`] keeps a connection to the hub alive, re-identifying on
//!   every reconnect so the hub replays its cached state.
//! - [`EffectRunner`] owns an [`EffectMachine`] and feeds it from one queue of
//!   [`ClientEvent`]s, so flashes, timers and disconnects are handled in order.
//! - [`EffectSink`] is where rendering and hardware (torch) plug in.
//!
//! ```no_run
//! use letitup_client::{LogSink, Subscriber, SubscriberSettings};
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = Subscriber::spawn(SubscriberSettings::default(), LogSink::new());
//!     subscriber.handle().manual_trigger().await.ok();
//!     tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!     subscriber.shutdown().await;
//! }
//! ```

pub mod connection;
pub mod effect;
pub mod error;
pub mod palette;
pub mod runner;
pub mod sink;
pub mod subscriber;

pub use connection::{ClientHandle, ConnectionStatus, HubClient, ReconnectPolicy};
pub use effect::{EffectMachine, EffectPhase, EffectTimer, EffectTiming};
pub use error::{ActuatorError, ClientError, Result};
pub use palette::{Color, ColorMode, PALETTE};
pub use runner::{ClientEvent, EffectRunner};
pub use sink::{EffectSink, LogSink, RecordingSink, SinkCall};
pub use subscriber::{Subscriber, SubscriberSettings};
