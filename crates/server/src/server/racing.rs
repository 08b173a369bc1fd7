//! Racing connection handling. JSON in both directions.

use crate::racing::{Race, RacingWorld};
use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use fishy_protocol::messages::{RaceWelcome, RacingClientMessage, RacingServerMessage};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Ping cadence for racing sockets; traffic is otherwise sparse.
const RACING_PING_INTERVAL: Duration = Duration::from_secs(54);

/// A race's view of a connection: a bounded channel of serialized JSON
/// messages. A full channel drops the message rather than blocking a race
/// loop.
#[derive(Debug)]
pub struct RacingHandle {
    pub id: String,
    tx: mpsc::Sender<String>,
}

impl RacingHandle {
    pub fn new(id: String, tx: mpsc::Sender<String>) -> Self {
        Self { id, tx }
    }

    pub fn send(&self, msg: &RacingServerMessage) {
        match serde_json::to_string(msg) {
            Ok(json) => {
                if self.tx.try_send(json).is_err() {
                    warn!("Client {} send channel full, dropping message", self.id);
                }
            }
            Err(err) => warn!("Error serializing racing message: {}", err),
        }
    }
}

/// Run a newly-upgraded racing socket to completion.
pub async fn handle_racing_socket(socket: WebSocket, world: Arc<RacingWorld>, config: Arc<crate::config::Config>) {
    let (sink, mut stream) = socket.split();
    let client_id = crate::util::generate_client_id();
    info!("Racing client connected: {}", client_id);

    let (tx, rx) = mpsc::channel(config.server.send_channel_size);
    let handle = Arc::new(RacingHandle::new(client_id.clone(), tx));
    let write_deadline = Duration::from_secs(config.server.write_timeout_secs);
    let writer = tokio::spawn(write_pump(sink, rx, write_deadline));

    let read_deadline = Duration::from_secs(config.server.read_timeout_secs);
    let mut race: Option<Arc<Race>> = None;

    loop {
        let msg = match timeout(read_deadline, stream.next()).await {
            Err(_) => {
                warn!("Racing client {} read deadline exceeded", client_id);
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                debug!("Racing client {} read error: {}", client_id, err);
                break;
            }
            Ok(Some(Ok(msg))) => msg,
        };

        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let parsed = match serde_json::from_str::<RacingClientMessage>(&text) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("Error parsing racing message from {}: {}", client_id, err);
                continue;
            }
        };

        match parsed {
            RacingClientMessage::Join { name, model } => {
                let joined = world
                    .join(handle.clone(), name.clone(), model.clone())
                    .await;
                handle.send(&RacingServerMessage::Welcome(RaceWelcome {
                    player_id: client_id.clone(),
                    race_id: joined.id.clone(),
                    name,
                    model,
                    race_state: joined.phase().await.as_str().to_string(),
                }));
                joined.broadcast_state().await;
                race = Some(joined);
            }
            RacingClientMessage::Ready => {
                if let Some(race) = &race {
                    race.handle_ready(&client_id).await;
                }
            }
            RacingClientMessage::MouthInput { mouth_open } => {
                // Open/close transitions alone never advance progress.
                debug!("Mouth input from {}: open={}", client_id, mouth_open);
            }
            RacingClientMessage::MouthCycle { .. } => {
                if let Some(race) = &race {
                    race.handle_mouth_cycle(&client_id).await;
                }
            }
            RacingClientMessage::StateUpdate { fish_state } => {
                if let Some(race) = &race {
                    race.handle_state_update(&client_id, fish_state.mouth_cycles)
                        .await;
                }
            }
            RacingClientMessage::Ping => {
                handle.send(&RacingServerMessage::Pong);
            }
        }
    }

    if let Some(race) = &race {
        race.disconnect_player(&client_id).await;
    }
    drop(handle);
    let _ = writer.await;
    info!("Racing client disconnected: {}", client_id);
}

/// Writer task: batch queued JSON messages into one newline-separated text
/// message and drive the periodic ping.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<String>,
    write_deadline: Duration,
) {
    let mut ping = tokio::time::interval(RACING_PING_INTERVAL);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ping.tick().await;

    loop {
        tokio::select! {
            msg = rx.recv() => {
                let Some(mut text) = msg else { break };
                while let Ok(next) = rx.try_recv() {
                    text.push('\n');
                    text.push_str(&next);
                }
                match timeout(write_deadline, sink.send(Message::Text(text.into()))).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
            _ = ping.tick() => {
                match timeout(write_deadline, sink.send(Message::Ping(Bytes::new()))).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
        }
    }

    let _ = sink.send(Message::Close(None)).await;
}
