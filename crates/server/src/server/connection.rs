//! Ocean connection handling.
//!
//! Each accepted upgrade runs a reader task and a writer task. The writer
//! drains a bounded frame channel, batching queued frames into one binary
//! WebSocket message. An optional second socket (`/ws/meta?id=`) binds a
//! secondary channel used for low-rate metadata frames.

use crate::ocean::{Ocean, PlayerInput};
use axum::extract::ws::{Message, WebSocket};
use bytes::{Bytes, BytesMut};
use fishy_protocol::frames::Frame;
use fishy_protocol::messages::OceanClientMessage;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use glam::Vec2;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Maximum queued frames concatenated into one WebSocket message.
const MAX_BATCH: usize = 10;

/// The world's view of a connection: two frame channels and the set of
/// peers this client has been told about. The simulator never touches the
/// socket itself.
#[derive(Debug)]
pub struct ClientHandle {
    pub id: String,
    primary: mpsc::Sender<Bytes>,
    meta: Mutex<Option<mpsc::Sender<Bytes>>>,
    seen_players: Mutex<HashSet<String>>,
    defunct: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl ClientHandle {
    pub fn new(id: String, primary: mpsc::Sender<Bytes>) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            id,
            primary,
            meta: Mutex::new(None),
            seen_players: Mutex::new(HashSet::new()),
            defunct: AtomicBool::new(false),
            shutdown,
        }
    }

    /// Enqueue a frame on the primary channel. Never blocks; a full channel
    /// marks the client for disconnection instead.
    pub fn enqueue(&self, frame: Bytes) {
        if self.is_defunct() {
            return;
        }
        if let Err(err) = self.primary.try_send(frame) {
            match err {
                mpsc::error::TrySendError::Full(_) => {
                    warn!("Client {} send channel full, disconnecting", self.id);
                }
                mpsc::error::TrySendError::Closed(_) => {}
            }
            self.mark_defunct();
        }
    }

    /// Enqueue a frame preferring the metadata channel when one is bound.
    pub fn enqueue_meta(&self, frame: Bytes) {
        let meta = self.meta.lock().unwrap().clone();
        match meta {
            Some(tx) => match tx.try_send(frame) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Closed(frame)) => {
                    // Meta socket went away; fall back to primary.
                    *self.meta.lock().unwrap() = None;
                    self.enqueue(frame);
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Client {} meta channel full, disconnecting", self.id);
                    self.mark_defunct();
                }
            },
            None => self.enqueue(frame),
        }
    }

    /// Bind the secondary metadata channel.
    pub fn bind_meta(&self, tx: mpsc::Sender<Bytes>) {
        *self.meta.lock().unwrap() = Some(tx);
    }

    pub fn has_meta(&self) -> bool {
        self.meta.lock().unwrap().is_some()
    }

    /// Record that `peer_id` is now visible to this client. Returns true
    /// the first time a given peer is recorded.
    pub fn first_sight(&self, peer_id: &str) -> bool {
        self.seen_players.lock().unwrap().insert(peer_id.to_string())
    }

    pub fn is_defunct(&self) -> bool {
        self.defunct.load(Ordering::Relaxed)
    }

    /// Mark the connection dead and wake its pump tasks. The simulator
    /// reaps the player on its next tick.
    pub fn mark_defunct(&self) {
        self.defunct.store(true, Ordering::Relaxed);
        let _ = self.shutdown.send(true);
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

/// Run a newly-upgraded ocean socket to completion.
pub async fn handle_ocean_socket(socket: WebSocket, ocean: Arc<Ocean>) {
    let (sink, stream) = socket.split();
    let client_id = crate::util::generate_client_id();
    info!("Ocean client {} connected", client_id);

    let (tx, rx) = mpsc::channel(ocean.config.server.send_channel_size);
    let handle = Arc::new(ClientHandle::new(client_id.clone(), tx));

    let ping_interval = Duration::from_millis(ocean.config.server.ping_interval_ms);
    let write_deadline = Duration::from_secs(ocean.config.server.write_timeout_secs);
    let writer = tokio::spawn(write_pump(
        sink,
        rx,
        handle.shutdown_signal(),
        ping_interval,
        write_deadline,
    ));

    read_pump(stream, &handle, &ocean).await;

    // Cleanup: remove the player, stop the writer, drop the channels.
    ocean.remove_player(&client_id).await;
    handle.mark_defunct();
    let _ = writer.await;
    info!("Ocean client {} disconnected", client_id);
}

/// Reader task: decode JSON client messages until error, close, or a 60 s
/// silence. Any inbound frame (pongs included) refreshes the deadline.
async fn read_pump(mut stream: SplitStream<WebSocket>, handle: &Arc<ClientHandle>, ocean: &Arc<Ocean>) {
    let read_deadline = Duration::from_secs(ocean.config.server.read_timeout_secs);
    loop {
        let msg = match timeout(read_deadline, stream.next()).await {
            Err(_) => {
                warn!("Client {} read deadline exceeded", handle.id);
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                debug!("Client {} read error: {}", handle.id, err);
                break;
            }
            Ok(Some(Ok(msg))) => msg,
        };

        match msg {
            Message::Text(text) => match serde_json::from_str::<OceanClientMessage>(&text) {
                Ok(msg) => handle_message(handle, ocean, msg).await,
                Err(err) => {
                    warn!("Client {} sent malformed message: {}", handle.id, err);
                }
            },
            Message::Close(_) => break,
            // Pings are answered by axum; pongs only refresh the deadline.
            _ => {}
        }

        if handle.is_defunct() {
            break;
        }
    }
}

async fn handle_message(handle: &Arc<ClientHandle>, ocean: &Arc<Ocean>, msg: OceanClientMessage) {
    match msg {
        OceanClientMessage::Join { name, model } => {
            let welcome = ocean.join(handle.clone(), name, model).await;
            handle.enqueue_meta(welcome.to_bytes());
        }
        OceanClientMessage::Input {
            dir_x,
            dir_y,
            boost,
            seq,
        } => {
            // Normalisation happens when the simulator applies the input.
            ocean.queue_input(PlayerInput {
                player_id: handle.id.clone(),
                direction: Vec2::new(dir_x, dir_y),
                boost,
                seq,
            });
        }
        OceanClientMessage::Ping => {
            handle.enqueue(Frame::Pong.to_bytes());
        }
    }
}

/// Writer task: dequeue frames, greedily batch up to [`MAX_BATCH`] into one
/// binary message, and drive the periodic WebSocket ping.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
    mut shutdown: watch::Receiver<bool>,
    ping_interval: Duration,
    write_deadline: Duration,
) {
    let mut ping = tokio::time::interval(ping_interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            frame = rx.recv() => {
                let Some(frame) = frame else { break };
                let mut buf = BytesMut::with_capacity(frame.len() + 512);
                buf.extend_from_slice(&frame);
                for _ in 1..MAX_BATCH {
                    match rx.try_recv() {
                        Ok(next) => buf.extend_from_slice(&next),
                        Err(_) => break,
                    }
                }
                match timeout(write_deadline, sink.send(Message::Binary(buf.freeze()))).await {
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
            _ = shutdown.changed() => break,
        }
    }

    let _ = sink.send(Message::Close(None)).await;
}

/// Run a metadata socket: attach to an already-joined client and stream
/// low-rate frames to it until either side goes away.
pub async fn handle_meta_socket(socket: WebSocket, ocean: Arc<Ocean>, client_id: String) {
    let handle = {
        let world = ocean.world.read().await;
        world.players.get(&client_id).map(|p| p.handle.clone())
    };
    let Some(handle) = handle else {
        debug!("Meta connection for unknown client {}", client_id);
        return;
    };

    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::channel(ocean.config.server.send_channel_size);
    handle.bind_meta(tx);
    info!("Meta channel bound for client {}", client_id);

    let ping_interval = Duration::from_millis(ocean.config.server.ping_interval_ms);
    let write_deadline = Duration::from_secs(ocean.config.server.write_timeout_secs);
    let writer = tokio::spawn(write_pump(
        sink,
        rx,
        handle.shutdown_signal(),
        ping_interval,
        write_deadline,
    ));

    // Nothing meaningful arrives on the meta socket; drain until it closes.
    let read_deadline = Duration::from_secs(ocean.config.server.read_timeout_secs);
    loop {
        match timeout(read_deadline, stream.next()).await {
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) | Err(_) => break,
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(_))) => break,
        }
    }

    let _ = writer.await;
    debug!("Meta channel closed for client {}", client_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overflow_marks_defunct() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = ClientHandle::new("c1".into(), tx);
        handle.enqueue(Bytes::from_static(b"a"));
        assert!(!handle.is_defunct());
        handle.enqueue(Bytes::from_static(b"b"));
        assert!(handle.is_defunct());
    }

    #[test]
    fn meta_prefers_secondary_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let (meta_tx, mut meta_rx) = mpsc::channel(4);
        let handle = ClientHandle::new("c1".into(), tx);

        handle.enqueue_meta(Bytes::from_static(b"lb1"));
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"lb1"));

        handle.bind_meta(meta_tx);
        handle.enqueue_meta(Bytes::from_static(b"lb2"));
        assert_eq!(meta_rx.try_recv().unwrap(), Bytes::from_static(b"lb2"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn meta_falls_back_when_secondary_closes() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = ClientHandle::new("c1".into(), tx);
        let (meta_tx, meta_rx) = mpsc::channel(4);
        handle.bind_meta(meta_tx);
        drop(meta_rx);

        handle.enqueue_meta(Bytes::from_static(b"lb"));
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"lb"));
        assert!(!handle.has_meta());
    }

    #[test]
    fn first_sight_reports_each_peer_once() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = ClientHandle::new("c1".into(), tx);
        assert!(handle.first_sight("p2"));
        assert!(!handle.first_sight("p2"));
        assert!(handle.first_sight("p3"));
    }
}
