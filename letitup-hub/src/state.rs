use letitup_protocol::{AnalysisPayload, HubEvent, LyricPayload};

/// Most recent producer-originated values, replayed to every new subscriber
///
/// Lives in RAM only and survives producer disconnects.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    current_lyric: Option<LyricPayload>,
    last_analysis: Option<AnalysisPayload>,
    current_tempo: Option<f64>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_analysis(&mut self, analysis: &AnalysisPayload) {
        self.current_tempo = Some(analysis.bpm);
        self.last_analysis = Some(analysis.clone());
    }

    pub fn record_lyric(&mut self, lyric: &LyricPayload) {
        self.current_lyric = Some(lyric.clone());
    }

    pub fn current_lyric(&self) -> Option<&LyricPayload> {
        self.current_lyric.as_ref()
    }

    pub fn current_tempo(&self) -> Option<f64> {
        self.current_tempo
    }

    /// Events that bring a joining subscriber up to date.
    /// Only kinds that have been set are included.
    pub fn replay_events(&self) -> Vec<HubEvent> {
        let mut events = Vec::with_capacity(2);
        if let Some(lyric) = &self.current_lyric {
            events.push(HubEvent::LyricUpdate(lyric.clone()));
        }
        if let Some(analysis) = &self.last_analysis {
            events.push(HubEvent::Analysis(analysis.clone()));
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use letitup_protocol::AnalysisKind;

    #[test]
    fn test_empty_state_replays_nothing() {
        assert!(SharedState::new().replay_events().is_empty());
    }

    #[test]
    fn test_latest_update_wins() {
        let mut state = SharedState::new();
        for bpm in [120.0, 128.0] {
            state.record_analysis(&AnalysisPayload {
                event_type: AnalysisKind::Rhythm,
                bpm,
                intensity: 0.5,
                timestamp: None,
                bass_energy: None,
                mid_energy: None,
                high_energy: None,
            });
        }
        state.record_lyric(&LyricPayload {
            text: "abc".to_string(),
            timestamp: Some(1.0),
        });

        assert_eq!(state.current_tempo(), Some(128.0));
        let replay = state.replay_events();
        assert_eq!(replay.len(), 2);
        assert!(matches!(&replay[0], HubEvent::LyricUpdate(l) if l.text == "abc"));
        assert!(matches!(&replay[1], HubEvent::Analysis(a) if a.bpm == 128.0));
    }
}
