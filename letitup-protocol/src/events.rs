use serde::{Deserialize, Serialize};

/// Role a connection declares in its identify handshake
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Beat or audio analyzer originating events.
    /// `python` and `ai_analyzer` are the names older analyzers announce.
    #[serde(alias = "python", alias = "ai_analyzer")]
    Producer,

    /// Phone or browser tab receiving events
    #[serde(alias = "mobile", alias = "web")]
    Subscriber,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Producer => write!(f, "producer"),
            Role::Subscriber => write!(f, "subscriber"),
        }
    }
}

/// Musical event classified by the analyzer
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Rhythm,
    BassDrop,
    Vocal,
    Build,
}

/// What caused a flash. Analysis kinds, the synthetic `manual` pulse, or
/// whatever label a producer put on its trigger (`beat`, `music_beat`, ...).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlashCause {
    Rhythm,
    BassDrop,
    Vocal,
    Build,
    Manual,
    #[serde(untagged)]
    Other(String),
}

impl From<AnalysisKind> for FlashCause {
    fn from(kind: AnalysisKind) -> Self {
        match kind {
            AnalysisKind::Rhythm => FlashCause::Rhythm,
            AnalysisKind::BassDrop => FlashCause::BassDrop,
            AnalysisKind::Vocal => FlashCause::Vocal,
            AnalysisKind::Build => FlashCause::Build,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IdentifyPayload {
    #[serde(rename = "type")]
    pub role: Role,
}

/// Simple beat pulse
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TriggerPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    /// Producer's label for the beat, passed on to the flash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<FlashCause>,
}

/// Audio analysis snapshot. Forwarded to subscribers with the same fields;
/// keys outside this struct are not carried.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnalysisPayload {
    pub event_type: AnalysisKind,
    pub bpm: f64,
    pub intensity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bass_energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mid_energy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_energy: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LyricPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

/// Instruction for a subscriber to run one effect
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FlashPayload {
    pub timestamp: f64,
    pub intensity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<FlashCause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
}

impl FlashPayload {
    /// Flash for a plain trigger; intensity defaults to full.
    pub fn from_trigger(trigger: &TriggerPayload, now: f64) -> Self {
        Self {
            timestamp: trigger.timestamp.unwrap_or(now),
            intensity: trigger.intensity.unwrap_or(1.0),
            event_type: trigger.event_type.clone(),
            bpm: None,
        }
    }

    /// Synthetic flash used for testing without a producer
    pub fn manual(now: f64) -> Self {
        Self {
            timestamp: now,
            intensity: 1.0,
            event_type: Some(FlashCause::Manual),
            bpm: None,
        }
    }
}

/// Derive the `flash` that accompanies every forwarded `analysis`.
///
/// Basic subscribers only understand `flash`, richer ones read `analysis`;
/// the hub emits both for one analysis so either kind of client reacts.
pub fn derive_flash(analysis: &AnalysisPayload, now: f64) -> FlashPayload {
    FlashPayload {
        timestamp: analysis.timestamp.unwrap_or(now),
        intensity: analysis.intensity,
        event_type: Some(analysis.event_type.into()),
        bpm: Some(analysis.bpm),
    }
}

/// Health snapshot returned for a `status` query
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StatusReport {
    pub subscriber_count: usize,
    pub producer_connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_bpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_lyric: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorNotice {
    pub message: String,
}

/// Events a peer sends to the hub
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundEvent {
    Identify(IdentifyPayload),
    Trigger(TriggerPayload),
    Analysis(AnalysisPayload),
    LyricUpdate(LyricPayload),
    ManualTrigger,
    Status,
}

impl InboundEvent {
    /// Wire name of this event kind
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Identify(_) => "identify",
            InboundEvent::Trigger(_) => "trigger",
            InboundEvent::Analysis(_) => "analysis",
            InboundEvent::LyricUpdate(_) => "lyric_update",
            InboundEvent::ManualTrigger => "manual_trigger",
            InboundEvent::Status => "status",
        }
    }

    /// Convert event to JSON string with newline
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Events the hub sends to peers
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum HubEvent {
    Flash(FlashPayload),
    Analysis(AnalysisPayload),
    LyricUpdate(LyricPayload),
    Status(StatusReport),
    Error(ErrorNotice),
}

impl HubEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            HubEvent::Flash(_) => "flash",
            HubEvent::Analysis(_) => "analysis",
            HubEvent::LyricUpdate(_) => "lyric_update",
            HubEvent::Status(_) => "status",
            HubEvent::Error(_) => "error",
        }
    }

    /// Convert event to JSON string with newline
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}\n", json))
    }
}

/// Seconds since the Unix epoch, the unit every timestamp on the wire uses
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bass_drop() -> AnalysisPayload {
        AnalysisPayload {
            event_type: AnalysisKind::BassDrop,
            bpm: 128.0,
            intensity: 1.0,
            timestamp: None,
            bass_energy: None,
            mid_energy: None,
            high_energy: None,
        }
    }

    #[test]
    fn test_flash_serialization() {
        let event = HubEvent::Flash(FlashPayload::manual(1699000000.0));
        let json = event.to_json_line().unwrap();
        assert!(json.contains("\"event\":\"flash\""));
        assert!(json.contains("\"event_type\":\"manual\""));
        assert!(json.contains("\"intensity\":1.0"));
        assert!(!json.contains("bpm"));
        assert!(json.ends_with('\n'));
    }

    #[test]
    fn test_derive_flash_carries_analysis_fields() {
        let flash = derive_flash(&bass_drop(), 42.0);
        assert_eq!(flash.intensity, 1.0);
        assert_eq!(flash.bpm, Some(128.0));
        assert_eq!(flash.event_type, Some(FlashCause::BassDrop));
        assert_eq!(flash.timestamp, 42.0);
    }

    #[test]
    fn test_derive_flash_keeps_analyzer_timestamp() {
        let mut analysis = bass_drop();
        analysis.timestamp = Some(10.5);
        assert_eq!(derive_flash(&analysis, 42.0).timestamp, 10.5);
    }

    #[test]
    fn test_trigger_flash_defaults_to_full_intensity() {
        let flash = FlashPayload::from_trigger(&TriggerPayload::default(), 7.0);
        assert_eq!(flash.intensity, 1.0);
        assert_eq!(flash.timestamp, 7.0);
        assert_eq!(flash.event_type, None);
    }

    #[test]
    fn test_trigger_label_carried_to_flash() {
        let trigger: TriggerPayload =
            serde_json::from_str(r#"{"intensity":0.8,"event_type":"music_beat"}"#).unwrap();
        let flash = FlashPayload::from_trigger(&trigger, 7.0);
        assert_eq!(flash.event_type, Some(FlashCause::Other("music_beat".to_string())));

        let json = HubEvent::Flash(flash).to_json_line().unwrap();
        assert!(json.contains("\"event_type\":\"music_beat\""));
    }

    #[test]
    fn test_known_trigger_label_maps_to_cause() {
        let trigger: TriggerPayload = serde_json::from_str(r#"{"event_type":"bass_drop"}"#).unwrap();
        assert_eq!(trigger.event_type, Some(FlashCause::BassDrop));
    }

    #[test]
    fn test_unit_events_serialize_without_data() {
        let json = InboundEvent::ManualTrigger.to_json_line().unwrap();
        assert_eq!(json, "{\"event\":\"manual_trigger\"}\n");
    }

    #[test]
    fn test_identify_uses_type_field() {
        let event = InboundEvent::Identify(IdentifyPayload {
            role: Role::Subscriber,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"identify","data":{"type":"subscriber"}}"#);
    }

    #[test]
    fn test_status_report_omits_unset_state() {
        let event = HubEvent::Status(StatusReport {
            subscriber_count: 3,
            producer_connected: true,
            current_bpm: None,
            current_lyric: None,
        });
        let json = event.to_json_line().unwrap();
        assert!(json.contains("\"subscriber_count\":3"));
        assert!(!json.contains("current_bpm"));
    }

    #[test]
    fn test_now_timestamp_is_seconds() {
        let now = now_timestamp();
        // Between 2020 and 2100
        assert!(now > 1_577_836_800.0 && now < 4_102_444_800.0);
    }
}
