//! Wire events for the Let-It-Up beat broadcast system
//!
//! Every message is a single line of JSON shaped as an envelope
//! `{"event": <kind>, "data": {...}}`, the same pair a Socket.IO emit carries.
//! Producers (beat analyzers) and subscribers (phones, browser tabs) speak
//! the same envelope; this crate owns the schema and the validation applied
//! to every inbound line before the hub acts on it.
//!
//! # Event Kinds
//!
//! Inbound (peer → hub):
//! - `identify` - declare the connection's role
//! - `trigger` - simple beat pulse from a producer
//! - `analysis` - audio analysis snapshot from a producer
//! - `lyric_update` - current lyric line from a producer
//! - `manual_trigger` - test pulse originated by a subscriber
//! - `status` - health query
//!
//! Outbound (hub → peer):
//! - `flash` - drive one effect on the subscriber
//! - `analysis` / `lyric_update` - forwarded with the same fields
//! - `status` - health report
//! - `error` - a refused request
//!
//! # Example
//!
//! ```
//! use letitup_protocol::{parse_inbound, InboundEvent};
//!
//! let line = r#"{"event":"lyric_update","data":{"text":"hello"}}"#;
//! match parse_inbound(line).unwrap() {
//!     InboundEvent::LyricUpdate(lyric) => assert_eq!(lyric.text, "hello"),
//!     other => panic!("unexpected {:?}", other),
//! }
//! ```

pub mod error;
pub mod events;
pub mod parse;

pub use error::{ProtocolError, Result};
pub use events::{
    derive_flash, now_timestamp, AnalysisKind, AnalysisPayload, ErrorNotice, FlashCause,
    FlashPayload, HubEvent, IdentifyPayload, InboundEvent, LyricPayload, Role, StatusReport,
    TriggerPayload,
};
pub use parse::{decode_line, parse_hub_event, parse_inbound};
