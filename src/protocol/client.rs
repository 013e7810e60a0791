//! Persistent connection to the chat platform.
//!
//! One task owns the connection: inbound frames are processed sequentially
//! in wire order, the heartbeat timer and all outbound actions share the
//! write half through the same `select!` loop, and a dropped connection
//! triggers at most one reconnect attempt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use http::HeaderValue;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::bridge::Bridge;
use crate::common::error::ProtocolError;
use crate::config::{ConnectionConfig, HeartbeatConfig, ReconnectConfig};
use crate::protocol::action::{heartbeat_frame, OutboundAction};
use crate::protocol::event::classify_frame;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct ProtocolClient {
    connection: ConnectionConfig,
    reconnect: ReconnectConfig,
    heartbeat_interval: Duration,
    bridge: Arc<Bridge>,
    action_rx: mpsc::UnboundedReceiver<OutboundAction>,
    shutdown_rx: watch::Receiver<bool>,
    /// DISCONNECTED/CONNECTED, the only observable states of the connection.
    connected: AtomicBool,
}

impl ProtocolClient {
    pub fn new(
        connection: ConnectionConfig,
        reconnect: ReconnectConfig,
        heartbeat: HeartbeatConfig,
        bridge: Arc<Bridge>,
        action_rx: mpsc::UnboundedReceiver<OutboundAction>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            connection,
            reconnect,
            heartbeat_interval: Duration::from_secs(heartbeat.interval_secs),
            bridge,
            action_rx,
            shutdown_rx,
            connected: AtomicBool::new(false),
        }
    }

    /// Open the WebSocket connection. One attempt only - the caller decides
    /// the retry policy for a failed first connect.
    pub async fn connect(config: &ConnectionConfig) -> Result<WsStream, ProtocolError> {
        let mut request = config.endpoint.as_str().into_client_request()?;

        if let Some(token) = &config.access_token {
            if !token.is_empty() {
                let header = format!("Bearer {}", token);
                request
                    .headers_mut()
                    .insert("Authorization", HeaderValue::from_str(&header)?);
            }
        }

        let (stream, _) = connect_async(request).await?;
        Ok(stream)
    }

    /// Drive the connection until shutdown or an unrecovered disconnect.
    ///
    /// After each disconnect, exactly one reconnect attempt is scheduled
    /// (when enabled); a failed attempt is logged and not retried. A later
    /// disconnect schedules a fresh attempt.
    pub async fn run(mut self, initial: WsStream) {
        let mut stream = Some(initial);

        while let Some(ws) = stream.take() {
            self.connected.store(true, Ordering::SeqCst);
            info!("Connected to chat platform at {}", self.connection.endpoint);

            let closed = self.run_connection(ws).await;
            self.connected.store(false, Ordering::SeqCst);
            match closed {
                Ok(()) => info!("Connection closed"),
                Err(e) => warn!("Connection lost: {}", e),
            }

            if *self.shutdown_rx.borrow() {
                break;
            }
            if !self.reconnect.enabled {
                info!("Reconnect disabled, giving up");
                break;
            }

            let delay = Duration::from_secs(self.reconnect.delay_secs);
            info!("Scheduling reconnect attempt in {}s", delay.as_secs());
            let mut shutdown_rx = self.shutdown_rx.clone();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_rx.changed() => {}
            }
            // The scheduled attempt still runs, but no-ops when the client
            // is already connected or intentionally closing.
            if !self.reconnect_should_run() {
                break;
            }

            self.drain_stale_actions();

            match Self::connect(&self.connection).await {
                Ok(ws) => stream = Some(ws),
                Err(e) => {
                    error!("Reconnect attempt failed: {} - not retrying", e);
                    break;
                }
            }
        }

        info!("Connection task ended");
    }

    /// Process one established connection until it closes.
    async fn run_connection(&mut self, ws: WsStream) -> Result<(), ProtocolError> {
        let (mut writer, mut reader) = ws.split();
        let bridge = Arc::clone(&self.bridge);
        let action_rx = &mut self.action_rx;
        let mut shutdown_rx = self.shutdown_rx.clone();

        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                frame = reader.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            // Frames are handled one at a time, in arrival order.
                            if let Some(event) = classify_frame(text.as_str()) {
                                bridge.handle_event(event);
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) => return Ok(()),
                        Some(Ok(_)) => {} // binary/ping/pong are not part of this protocol
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(()),
                    }
                }

                _ = heartbeat.tick() => {
                    debug!("Sending heartbeat probe");
                    writer.send(WsMessage::Text(heartbeat_frame().into())).await?;
                }

                Some(action) = action_rx.recv() => {
                    match action.to_frame() {
                        Ok(frame) => writer.send(WsMessage::Text(frame.into())).await?,
                        Err(e) => error!("Failed to serialize outbound action: {}", e),
                    }
                }

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        let _ = writer.send(WsMessage::Close(None)).await;
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Idempotent reconnect guard.
    fn reconnect_should_run(&self) -> bool {
        !self.connected.load(Ordering::SeqCst) && !*self.shutdown_rx.borrow()
    }

    /// Anything queued while disconnected is dropped: there is no delivery
    /// guarantee across a reconnect.
    fn drain_stale_actions(&mut self) {
        let mut dropped = 0usize;
        while self.action_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!("Dropped {} outbound action(s) queued while disconnected", dropped);
        }
    }
}
