use super::events::{ChannelEvent, ClientMessage, RoomEvent, RoomInfo};
use super::transport::{PayloadStream, RoomSubjects, RoomTransport, TransportConnector};
use crate::error::SessionError;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Retry and buffering policy for the room channel
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Reconnect attempts after a failure before giving up
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Bound on one connection handshake
    pub connect_timeout: Duration,
    /// Capacity of the event channel handed to the session
    pub event_buffer: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(16),
            connect_timeout: Duration::from_secs(20),
            event_buffer: 256,
        }
    }
}

/// Exponential backoff: `initial * 2^(attempt - 1)`, capped at `max`
pub fn backoff_delay(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
    initial.saturating_mul(factor).min(max)
}

type TransportSlot = Arc<Mutex<Option<Arc<dyn RoomTransport>>>>;

/// Client side of one room's realtime channel
pub struct ChannelClient {
    room: RoomInfo,
    subjects: RoomSubjects,
    config: ChannelConfig,
    connector: Arc<dyn TransportConnector>,
    /// Set by the first connect, cleared only by an explicit disconnect
    joined: Arc<AtomicBool>,
    transport: TransportSlot,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelClient {
    pub fn new(room: RoomInfo, connector: Arc<dyn TransportConnector>, config: ChannelConfig) -> Self {
        let subjects = RoomSubjects::new(&room.room_id, &room.user_id);
        Self {
            room,
            subjects,
            config,
            connector,
            joined: Arc::new(AtomicBool::new(false)),
            transport: Arc::new(Mutex::new(None)),
            supervisor: Mutex::new(None),
        }
    }

    /// Open the room connection and start delivering events
    ///
    /// The handshake runs in the background; its outcome arrives as
    /// [`ChannelEvent::Connected`] or, once retries are exhausted,
    /// [`ChannelEvent::ConnectionLost`]. A second call before
    /// [`disconnect`](Self::disconnect) fails with
    /// [`SessionError::AlreadyJoined`].
    pub async fn connect(&self) -> Result<mpsc::Receiver<ChannelEvent>> {
        if self.joined.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyJoined(self.room.room_id.clone()).into());
        }

        info!(
            "Joining room {} as {} ({})",
            self.room.room_id,
            self.room.user_name,
            self.room.user_type.as_str()
        );

        let (tx, rx) = mpsc::channel(self.config.event_buffer.max(1));
        let handle = tokio::spawn(supervise(
            self.room.clone(),
            self.subjects.clone(),
            self.config.clone(),
            Arc::clone(&self.connector),
            Arc::clone(&self.transport),
            tx,
        ));

        *self.supervisor.lock().await = Some(handle);

        Ok(rx)
    }

    /// Leave the room and detach every subscription
    pub async fn disconnect(&self) {
        if let Some(handle) = self.supervisor.lock().await.take() {
            handle.abort();
        }

        let transport = self.transport.lock().await.take();
        if let Some(transport) = transport {
            if let Err(e) = publish(transport.as_ref(), &self.subjects.client, &ClientMessage::leave(&self.room)).await {
                warn!("Failed to announce leave: {:#}", e);
            }
        }

        self.joined.store(false, Ordering::SeqCst);
        info!("Left room {}", self.room.room_id);
    }

    pub fn is_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }

    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_some()
    }

    pub fn subjects(&self) -> &RoomSubjects {
        &self.subjects
    }
}

async fn publish(transport: &dyn RoomTransport, subject: &str, message: &ClientMessage) -> Result<()> {
    let payload = serde_json::to_vec(message).context("Failed to encode room message")?;
    transport.publish(subject, payload).await
}

/// Connect and subscribe to both room subjects, bounded by `timeout`
async fn open(
    connector: &dyn TransportConnector,
    subjects: &RoomSubjects,
    timeout: Duration,
) -> Result<(Arc<dyn RoomTransport>, PayloadStream)> {
    let handshake = async {
        let transport = connector.connect().await?;
        let events = transport.subscribe(&subjects.events).await?;
        let direct = transport.subscribe(&subjects.direct).await?;
        Ok::<_, anyhow::Error>((transport, stream::select(events, direct).boxed()))
    };

    tokio::time::timeout(timeout, handshake)
        .await
        .map_err(|_| SessionError::Connection(format!("handshake timed out after {:?}", timeout)))?
}

/// Connection supervisor: forwards room events and reconnects with backoff
///
/// Only the first successful connection publishes `join_room`; later ones ask
/// for a state sync. The loop ends when the session drops its receiver or
/// after `max_retries` consecutive failures.
async fn supervise(
    room: RoomInfo,
    subjects: RoomSubjects,
    config: ChannelConfig,
    connector: Arc<dyn TransportConnector>,
    slot: TransportSlot,
    tx: mpsc::Sender<ChannelEvent>,
) {
    let mut attempt = 0u32;
    let mut join_sent = false;

    loop {
        let reason = match open(connector.as_ref(), &subjects, config.connect_timeout).await {
            Ok((transport, mut messages)) => {
                *slot.lock().await = Some(Arc::clone(&transport));
                attempt = 0;

                let status = if join_sent {
                    if let Err(e) = publish(transport.as_ref(), &subjects.client, &ClientMessage::request_sync(&room)).await {
                        warn!("Failed to request state sync: {:#}", e);
                    }
                    ChannelEvent::Reconnected
                } else {
                    match publish(transport.as_ref(), &subjects.client, &ClientMessage::join(&room)).await {
                        Ok(()) => join_sent = true,
                        Err(e) => warn!("Failed to publish join: {:#}", e),
                    }
                    ChannelEvent::Connected
                };

                info!("Room channel up for {}", room.room_id);
                if tx.send(status).await.is_err() {
                    return;
                }

                while let Some(payload) = messages.next().await {
                    match serde_json::from_slice::<RoomEvent>(&payload) {
                        Ok(event) => {
                            debug!("Room event: {}", event.name());
                            if tx.send(ChannelEvent::Room(event)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!("Ignoring unrecognised room message: {}", e);
                        }
                    }
                }

                *slot.lock().await = None;
                let reason = "room subscription closed".to_string();
                if tx.send(ChannelEvent::Disconnected { reason: reason.clone() }).await.is_err() {
                    return;
                }
                reason
            }
            Err(e) => {
                warn!("Room connection attempt failed: {:#}", e);
                format!("{:#}", e)
            }
        };

        attempt += 1;
        if attempt > config.max_retries {
            error!(
                "Giving up on room {} after {} retries: {}",
                room.room_id, config.max_retries, reason
            );
            let _ = tx.send(ChannelEvent::ConnectionLost { reason }).await;
            return;
        }

        let delay = backoff_delay(attempt, config.initial_backoff, config.max_backoff);
        info!("Reconnecting in {:?} (attempt {}/{})", delay, attempt, config.max_retries);
        if tx.send(ChannelEvent::Reconnecting { attempt, delay }).await.is_err() {
            return;
        }
        tokio::time::sleep(delay).await;
    }
}
