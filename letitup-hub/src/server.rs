use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use letitup_protocol::{decode_line, parse_inbound, ProtocolError};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::connection::ConnectionId;
use crate::error::{HubError, Result};
use crate::hub::Hub;

/// Transport settings for the hub server
#[derive(Debug, Clone)]
pub struct HubSettings {
    /// Address to listen on, e.g. `0.0.0.0:3000`
    pub listen_addr: String,
    /// Lines buffered per connection before it counts as too slow
    pub outbound_queue_capacity: usize,
    /// Upper bound on a single socket write
    pub send_timeout: Duration,
    /// Longest accepted inbound line
    pub max_line_bytes: usize,
    /// Refuse a second producer while one is connected
    pub exclusive_producer: bool,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            outbound_queue_capacity: 64,
            send_timeout: Duration::from_millis(2000),
            max_line_bytes: 64 * 1024,
            exclusive_producer: false,
        }
    }
}

/// TCP front end of the hub: newline-delimited JSON in both directions
pub struct HubServer {
    settings: Arc<HubSettings>,
    hub: Arc<Hub>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    local_addr: RwLock<Option<SocketAddr>>,
    shutdown: watch::Sender<bool>,
}

impl HubServer {
    pub fn new(settings: HubSettings) -> Self {
        let hub = Arc::new(Hub::new(settings.exclusive_producer));
        let (shutdown, _) = watch::channel(false);

        Self {
            settings: Arc::new(settings),
            hub,
            accept_task: Mutex::new(None),
            local_addr: RwLock::new(None),
            shutdown,
        }
    }

    /// The hub behind this server
    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.hub)
    }

    /// Bound address, once started
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.read().await
    }

    /// Bind and start accepting connections
    pub async fn start(&self) -> Result<SocketAddr> {
        let mut accept_task = self.accept_task.lock().await;
        if accept_task.is_some() {
            return Err(HubError::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.settings.listen_addr).await?;
        let addr = listener.local_addr()?;
        *self.local_addr.write().await = Some(addr);
        self.shutdown.send_replace(false);

        tracing::info!("Hub listening on {}", addr);

        let hub = Arc::clone(&self.hub);
        let settings = Arc::clone(&self.settings);
        let shutdown = self.shutdown.subscribe();

        let task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        tokio::spawn(serve_connection(
                            stream,
                            peer,
                            Arc::clone(&hub),
                            Arc::clone(&settings),
                            shutdown.clone(),
                        ));
                    }
                    Err(e) => {
                        tracing::error!("Failed to accept connection: {}", e);
                    }
                }
            }
        });

        *accept_task = Some(task);
        Ok(addr)
    }

    /// Stop accepting and close every open connection
    pub async fn stop(&self) -> Result<()> {
        let task = self
            .accept_task
            .lock()
            .await
            .take()
            .ok_or(HubError::NotStarted)?;
        task.abort();

        self.shutdown.send_replace(true);
        self.hub.close_all().await;
        *self.local_addr.write().await = None;

        tracing::info!("Hub stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.accept_task.lock().await.is_some()
    }
}

/// Serve one peer until it disconnects, is dropped by the hub, or the server stops
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    hub: Arc<Hub>,
    settings: Arc<HubSettings>,
    mut shutdown: watch::Receiver<bool>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Could not disable Nagle for {}: {}", peer, e);
    }

    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::channel(settings.outbound_queue_capacity);
    let id = hub.register(tx).await;
    tracing::info!("Accepted {} from {}", id, peer);

    let mut writer = tokio::spawn(write_loop(
        id,
        write_half,
        rx,
        Arc::clone(&hub),
        settings.send_timeout,
    ));

    let mut reader = BufReader::new(read_half);
    let limit = settings.max_line_bytes as u64 + 1;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = tokio::select! {
            read = read_limited_line(&mut reader, &mut buf, limit) => read,
            _ = &mut writer => {
                tracing::debug!("Writer for {} finished", id);
                break;
            }
            _ = shutdown.changed() => break,
        };

        match read {
            Ok(0) => {
                tracing::info!("{} closed by peer", id);
                break;
            }
            Ok(_) => {
                let line = match decode_line(&buf, settings.max_line_bytes) {
                    Ok(line) => line,
                    Err(e @ ProtocolError::LineTooLong { .. }) => {
                        tracing::warn!("Closing {}: {}", id, e);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Dropping malformed line from {}: {}", id, e);
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_inbound(line) {
                    Ok(event) => match hub.ingest(id, event).await {
                        Ok(()) => {}
                        Err(HubError::UnknownConnection(_)) => break,
                        Err(e) => tracing::warn!("Failed to handle event from {}: {}", id, e),
                    },
                    Err(e) => tracing::warn!("Dropping malformed event from {}: {}", id, e),
                }
            }
            Err(e) => {
                tracing::warn!("Read error on {}: {}", id, e);
                break;
            }
        }
    }

    // Drops the outbound queue; the writer drains what is left and exits
    hub.disconnect(id).await;
}

/// Read up to and including `\n`, but never more than `limit` bytes
async fn read_limited_line(
    reader: &mut BufReader<OwnedReadHalf>,
    buf: &mut Vec<u8>,
    limit: u64,
) -> std::io::Result<usize> {
    reader.take(limit).read_until(b'\n', buf).await
}

async fn write_loop(
    id: ConnectionId,
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<Arc<str>>,
    hub: Arc<Hub>,
    send_timeout: Duration,
) {
    while let Some(line) = rx.recv().await {
        match tokio::time::timeout(send_timeout, writer.write_all(line.as_bytes())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!("Write to {} failed: {}", id, e);
                break;
            }
            Err(_) => {
                tracing::warn!("Write to {} timed out after {:?}", id, send_timeout);
                break;
            }
        }
    }

    hub.disconnect(id).await;
    let _ = writer.shutdown().await;
}
