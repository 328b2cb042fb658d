//! Parsing and validation of wire lines
//!
//! Lines are decoded in two steps: the envelope first, so an unknown kind can
//! be reported by name, then the payload for that kind. A payload that
//! decodes but carries a non-finite or out-of-range number is rejected as
//! well; nothing malformed ever reaches the hub.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ProtocolError, Result};
use crate::events::{
    AnalysisPayload, FlashCause, HubEvent, InboundEvent, LyricPayload, TriggerPayload,
};

#[derive(Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Turn raw bytes read from a socket into a line of text.
///
/// `max_len` applies to the line without its terminator. Invalid UTF-8 is an
/// error for this line only; callers decide whether a long line ends the
/// connection.
pub fn decode_line(bytes: &[u8], max_len: usize) -> Result<&str> {
    let content = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let content = content.strip_suffix(b"\r").unwrap_or(content);
    if content.len() > max_len {
        return Err(ProtocolError::LineTooLong { limit: max_len });
    }
    Ok(std::str::from_utf8(content)?)
}

/// Parse and validate one inbound line
pub fn parse_inbound(line: &str) -> Result<InboundEvent> {
    let envelope: Envelope = serde_json::from_str(line.trim())?;

    let event = match envelope.event.as_str() {
        "identify" => InboundEvent::Identify(payload("identify", envelope.data)?),
        "trigger" | "trigger_flash" => {
            let trigger: TriggerPayload = payload("trigger", envelope.data)?;
            check_trigger(&trigger)?;
            InboundEvent::Trigger(trigger)
        }
        "analysis" | "audio_analysis" => {
            let analysis: AnalysisPayload = payload("analysis", envelope.data)?;
            check_analysis(&analysis)?;
            InboundEvent::Analysis(analysis)
        }
        "lyric_update" | "lyrics_update" => {
            let lyric: LyricPayload = payload("lyric_update", envelope.data)?;
            check_timestamp(lyric.timestamp)?;
            InboundEvent::LyricUpdate(lyric)
        }
        "manual_trigger" => InboundEvent::ManualTrigger,
        "status" => InboundEvent::Status,
        other => return Err(ProtocolError::UnknownKind(other.to_string())),
    };

    Ok(event)
}

/// Parse one line sent by the hub
pub fn parse_hub_event(line: &str) -> Result<HubEvent> {
    Ok(serde_json::from_str(line.trim())?)
}

fn payload<T: DeserializeOwned>(kind: &'static str, data: Value) -> Result<T> {
    // Producers may omit `data` entirely when every field is optional
    let data = if data.is_null() {
        Value::Object(Default::default())
    } else {
        data
    };
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidPayload { kind, source })
}

fn check_trigger(trigger: &TriggerPayload) -> Result<()> {
    if let Some(intensity) = trigger.intensity {
        check_intensity(intensity)?;
    }
    if matches!(&trigger.event_type, Some(FlashCause::Other(label)) if label.trim().is_empty()) {
        return Err(ProtocolError::InvalidField {
            field: "event_type",
            reason: "empty label".to_string(),
        });
    }
    check_timestamp(trigger.timestamp)
}

fn check_analysis(analysis: &AnalysisPayload) -> Result<()> {
    check_intensity(analysis.intensity)?;
    if !analysis.bpm.is_finite() || analysis.bpm < 0.0 {
        return Err(ProtocolError::InvalidField {
            field: "bpm",
            reason: format!("expected a non-negative number, got {}", analysis.bpm),
        });
    }
    for (field, energy) in [
        ("bass_energy", analysis.bass_energy),
        ("mid_energy", analysis.mid_energy),
        ("high_energy", analysis.high_energy),
    ] {
        if matches!(energy, Some(value) if !value.is_finite()) {
            return Err(ProtocolError::InvalidField {
                field,
                reason: "not a finite number".to_string(),
            });
        }
    }
    check_timestamp(analysis.timestamp)
}

fn check_intensity(intensity: f64) -> Result<()> {
    if intensity.is_finite() && (0.0..=1.0).contains(&intensity) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidField {
            field: "intensity",
            reason: format!("expected a value in [0, 1], got {}", intensity),
        })
    }
}

fn check_timestamp(timestamp: Option<f64>) -> Result<()> {
    match timestamp {
        Some(ts) if !ts.is_finite() || ts < 0.0 => Err(ProtocolError::InvalidField {
            field: "timestamp",
            reason: format!("expected seconds since the epoch, got {}", ts),
        }),
        _ => Ok(()),
    }
}
