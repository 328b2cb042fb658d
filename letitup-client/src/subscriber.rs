use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::connection::{ClientHandle, HubClient, ReconnectPolicy};
use crate::effect::{EffectMachine, EffectTiming};
use crate::error::Result;
use crate::palette::ColorMode;
use crate::runner::EffectRunner;
use crate::sink::EffectSink;

/// Everything needed to run one subscriber
#[derive(Debug, Clone)]
pub struct SubscriberSettings {
    pub server_address: String,
    pub reconnect: ReconnectPolicy,
    pub timing: EffectTiming,
    pub color_mode: ColorMode,
}

impl Default for SubscriberSettings {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:3000".to_string(),
            reconnect: ReconnectPolicy::default(),
            timing: EffectTiming::default(),
            color_mode: ColorMode::default(),
        }
    }
}

/// A running subscriber: connection task plus effect runner
pub struct Subscriber<S: EffectSink + 'static> {
    handle: ClientHandle,
    connection: JoinHandle<Result<()>>,
    runner: JoinHandle<EffectMachine<S>>,
}

impl<S: EffectSink + 'static> Subscriber<S> {
    /// Spawn the connection and the effect runner on the current runtime
    pub fn spawn(settings: SubscriberSettings, sink: S) -> Self {
        let (events_tx, events_rx) = mpsc::channel(64);
        let machine = EffectMachine::new(sink, settings.timing, settings.color_mode);
        let runner = tokio::spawn(EffectRunner::new(machine, events_rx).run());

        let (client, handle) = HubClient::new(settings.server_address, settings.reconnect, events_tx);
        let connection = tokio::spawn(client.run());

        Self {
            handle,
            connection,
            runner,
        }
    }

    pub fn handle(&self) -> ClientHandle {
        self.handle.clone()
    }

    /// Shut down and wait for both tasks; returns the torn-down machine
    pub async fn shutdown(self) -> Option<EffectMachine<S>> {
        if let Err(e) = self.handle.shutdown().await {
            tracing::debug!("Connection already stopped: {}", e);
        }
        match self.connection.await {
            Ok(Err(e)) => tracing::warn!("Hub client ended with error: {}", e),
            Err(e) => tracing::warn!("Hub client task failed: {}", e),
            Ok(Ok(())) => {}
        }
        match self.runner.await {
            Ok(machine) => Some(machine),
            Err(e) => {
                tracing::warn!("Effect runner task failed: {}", e);
                None
            }
        }
    }
}
