//! Real-time trigger broadcast hub for Let-It-Up
//!
//! This crate provides a TCP server that receives beat triggers, audio
//! analysis and lyric lines from producers (beat analyzers) and fans them out
//! to every connected subscriber (phones, browser tabs) with minimal latency.
//!
//! # Features
//!
//! - Newline-delimited JSON protocol (see `letitup-protocol`)
//! - Producer / subscriber roles set by an identify handshake
//! - Cached current state (lyric, analysis, tempo) replayed to new subscribers
//! - Bounded per-connection queues; a slow or broken subscriber is dropped
//!   without delaying the others
//! - Health snapshot (`status` query)
//!
//! # Example Usage
//!
//! ```no_run
//! use letitup_hub::{HubServer, HubSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = HubServer::new(HubSettings {
//!         listen_addr: "0.0.0.0:3000".to_string(),
//!         ..HubSettings::default()
//!     });
//!     let addr = server.start().await?;
//!     println!("listening on {}", addr);
//!
//!     // Fire a test flash at every subscriber
//!     server.hub().manual_trigger().await?;
//!
//!     let status = server.hub().snapshot().await;
//!     println!("{} subscribers", status.subscriber_count);
//!
//!     server.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod error;
pub mod hub;
pub mod server;
pub mod state;

// Re-exports
pub use connection::{ConnectionId, ConnectionRole};
pub use error::{HubError, Result};
pub use hub::{Hub, IdentifyOutcome};
pub use server::{HubServer, HubSettings};
pub use state::SharedState;
