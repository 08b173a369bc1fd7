//! The ocean simulator: one owning task per world.
//!
//! All mutations arrive through the bounded input queue or through
//! operations that take the world write lock. The simulator holds the
//! write lock for the whole tick; the broadcaster runs on its own cadence
//! under the read lock.

mod broadcast;
mod world;

pub use broadcast::{build_leaderboard, build_state_for_player};
pub use world::World;

use crate::config::Config;
use crate::entity::Player;
use crate::server::connection::ClientHandle;
use crate::util;
use fishy_protocol::frames::{Frame, Welcome};
use glam::Vec2;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

/// A client input drained by the simulator at the next tick boundary.
#[derive(Debug, Clone)]
pub struct PlayerInput {
    pub player_id: String,
    pub direction: Vec2,
    pub boost: bool,
    pub seq: u32,
}

/// The persistent arena.
pub struct Ocean {
    pub config: Arc<Config>,
    pub world: RwLock<World>,
    input_tx: mpsc::Sender<PlayerInput>,
}

impl Ocean {
    /// Create the ocean and the input queue receiver that its simulation
    /// loop will drain.
    pub fn new(config: Arc<Config>) -> (Arc<Self>, mpsc::Receiver<PlayerInput>) {
        let (input_tx, input_rx) = mpsc::channel(config.server.input_queue_size);
        let ocean = Arc::new(Self {
            config,
            world: RwLock::new(World::new(util::world_rng())),
            input_tx,
        });
        (ocean, input_rx)
    }

    /// Spawn the simulation and broadcast loops.
    pub fn start(self: &Arc<Self>, input_rx: mpsc::Receiver<PlayerInput>) {
        let sim = Arc::clone(self);
        tokio::spawn(async move {
            sim.run_simulation(input_rx).await;
        });
        let broadcaster = Arc::clone(self);
        tokio::spawn(async move {
            broadcaster.run_broadcasts().await;
        });
    }

    /// Non-blocking input hand-off; a full queue drops the input.
    pub fn queue_input(&self, input: PlayerInput) {
        if let Err(err) = self.input_tx.try_send(input) {
            if let mpsc::error::TrySendError::Full(input) = err {
                warn!("Input queue full, dropping input from {}", input.player_id);
            }
        }
    }

    /// Create a player for `handle` and return the welcome frame to send.
    pub async fn join(&self, handle: Arc<ClientHandle>, name: String, model: String) -> Frame {
        let name: String = name.chars().take(self.config.server.max_name_len).collect();
        let name = if name.is_empty() { "Fish".to_string() } else { name };
        let model = if model.is_empty() {
            "swordfish".to_string()
        } else {
            model
        };

        let id = handle.id.clone();
        let mut world = self.world.write().await;
        let position = world.random_spawn_position(&self.config);
        let player = Player::new(
            id.clone(),
            name.clone(),
            model.clone(),
            position,
            self.config.player.initial_size,
            handle,
        );
        world.add_player(player);
        drop(world);

        info!("Player {} ({}) joined the ocean", name, id);
        Frame::Welcome(Welcome {
            id,
            name,
            model,
            world_width: self.config.world.width as f64,
            world_height: self.config.world.height as f64,
        })
    }

    pub async fn remove_player(&self, id: &str) {
        self.world.write().await.remove_player(id);
    }

    /// The fixed-rate tick loop. Holds the write lock for the whole tick.
    async fn run_simulation(self: Arc<Self>, mut input_rx: mpsc::Receiver<PlayerInput>) {
        let dt = self.config.tick_dt();
        let mut ticker = tokio::time::interval(Duration::from_millis(
            1000 / self.config.world.tick_rate as u64,
        ));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        {
            let mut world = self.world.write().await;
            world.populate(&self.config);
            info!(
                "Ocean initialized: {} food, {} powerups",
                world.food.len(),
                world.powerups.len()
            );
        }

        loop {
            ticker.tick().await;
            let mut world = self.world.write().await;
            world.reap_defunct();
            // Inputs accepted after this drain apply next tick.
            while let Ok(input) = input_rx.try_recv() {
                world.apply_input(input);
            }
            world.update(&self.config, dt);
        }
    }

    /// State, leaderboard, and shark-vision fan-out on independent clocks.
    async fn run_broadcasts(self: Arc<Self>) {
        let mut state_ticker = tokio::time::interval(Duration::from_millis(
            1000 / self.config.world.broadcast_rate as u64,
        ));
        let mut leaderboard_ticker = tokio::time::interval(Duration::from_secs(1));
        let mut shark_ticker = tokio::time::interval(Duration::from_millis(500));
        state_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        leaderboard_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        shark_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state_ticker.tick() => {
                    let world = self.world.read().await;
                    broadcast::broadcast_state(&world, &self.config);
                }
                _ = leaderboard_ticker.tick() => {
                    let world = self.world.read().await;
                    broadcast::broadcast_leaderboard(&world);
                }
                _ = shark_ticker.tick() => {
                    let world = self.world.read().await;
                    broadcast::broadcast_shark_vision(&world);
                }
            }
        }
    }
}
