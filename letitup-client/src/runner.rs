use std::future::pending;

use letitup_protocol::HubEvent;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::connection::ConnectionStatus;
use crate::effect::EffectMachine;
use crate::sink::EffectSink;

/// Everything the effect runner reacts to, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Event pushed by the hub
    Hub(HubEvent),
    /// Connection lifecycle change
    Connection(ConnectionStatus),
    /// Stop the runner
    Shutdown,
}

/// Single task owning the effect machine
///
/// Inbound events and the machine's phase timer are polled in one loop, so
/// effect state is never touched from two places at once.
pub struct EffectRunner<S: EffectSink> {
    machine: EffectMachine<S>,
    events: mpsc::Receiver<ClientEvent>,
}

impl<S: EffectSink> EffectRunner<S> {
    pub fn new(machine: EffectMachine<S>, events: mpsc::Receiver<ClientEvent>) -> Self {
        Self { machine, events }
    }

    /// Run until shutdown or until every sender is gone.
    /// The machine is torn down before it is handed back.
    pub async fn run(mut self) -> EffectMachine<S> {
        loop {
            let timer = self.machine.next_timer();
            let wake = async {
                match timer {
                    Some(timer) => sleep_until(timer.at).await,
                    None => pending::<()>().await,
                }
            };

            tokio::select! {
                event = self.events.recv() => match event {
                    Some(ClientEvent::Hub(event)) => self.handle_hub_event(event),
                    Some(ClientEvent::Connection(status)) => self.handle_status(status),
                    Some(ClientEvent::Shutdown) | None => break,
                },
                _ = wake => {
                    if let Some(timer) = timer {
                        self.machine.on_timer(timer, Instant::now());
                    }
                }
            }
        }

        info!("Effect runner stopping");
        self.machine.teardown();
        self.machine
    }

    fn handle_hub_event(&mut self, event: HubEvent) {
        match event {
            HubEvent::Flash(flash) => {
                if let Some(bpm) = flash.bpm {
                    self.machine.sink_mut().tempo(bpm);
                }
                self.machine.on_flash(&flash, Instant::now());
            }
            HubEvent::Analysis(analysis) => {
                debug!("Analysis {:?} at {} BPM", analysis.event_type, analysis.bpm);
                self.machine.sink_mut().tempo(analysis.bpm);
            }
            HubEvent::LyricUpdate(lyric) => self.machine.sink_mut().lyric(&lyric),
            HubEvent::Status(report) => debug!("Hub status: {:?}", report),
            HubEvent::Error(notice) => warn!("Hub refused a request: {}", notice.message),
        }
    }

    fn handle_status(&mut self, status: ConnectionStatus) {
        if !status.is_connected() {
            // Nothing may stay lit while we cannot hear the hub
            self.machine.teardown();
        }
        self.machine.sink_mut().connection_status(status);
    }
}
