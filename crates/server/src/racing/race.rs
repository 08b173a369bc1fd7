//! A single race session and its state machine.
//!
//! `Lobby -> Countdown -> Racing -> Finished`. The server does not simulate
//! motion: clients count their own mouth cycles and the server converts
//! them to track progress.

use crate::config::Config;
use crate::racing::RacingWorld;
use crate::server::racing::RacingHandle;
use crate::util;
use fishy_protocol::messages::{
    RacePlayerState, RaceResult, RaceResultsPayload, RaceStatePayload, RacingServerMessage,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Race lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RacePhase {
    Lobby,
    Countdown,
    Racing,
    Finished,
}

impl RacePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RacePhase::Lobby => "lobby",
            RacePhase::Countdown => "countdown",
            RacePhase::Racing => "racing",
            RacePhase::Finished => "finished",
        }
    }
}

/// A player in a race.
#[derive(Debug)]
pub struct RacingPlayer {
    pub id: String,
    pub name: String,
    pub model: String,
    pub handle: Option<Arc<RacingHandle>>,
    /// Client-authoritative cumulative cycle count.
    pub mouth_cycles: u32,
    /// Track progress in [0, 1].
    pub progress: f64,
    pub finish_time: f64,
    pub finished: bool,
    pub ready: bool,
    /// Last cycle report, for stall detection.
    pub last_update: Option<Instant>,
}

struct RaceInner {
    phase: RacePhase,
    /// BTreeMap keeps the broadcast player order stable (sorted by id).
    players: BTreeMap<String, RacingPlayer>,
    start_time: Option<Instant>,
    countdown_start: Option<Instant>,
    results: Vec<RaceResult>,
}

impl RaceInner {
    /// Mark a player finished and record their result. Ranks are assigned
    /// when the race ends.
    fn finish_player(&mut self, player_id: &str) {
        let elapsed = self
            .start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let Some(player) = self.players.get_mut(player_id) else {
            return;
        };
        if player.finished {
            return;
        }
        player.finished = true;
        player.finish_time = elapsed;

        let mouth_actions_per_minute = if elapsed > 0.0 {
            (player.mouth_cycles as f64 * 2.0 / elapsed) * 60.0
        } else {
            0.0
        };
        self.results.push(RaceResult {
            player_id: player.id.clone(),
            name: player.name.clone(),
            model: player.model.clone(),
            finish_time: elapsed,
            mouth_actions_per_minute,
            rank: 0,
        });
    }

    /// Apply an authoritative cycle count to a player.
    fn apply_cycles(&mut self, player_id: &str, cycles: u32, config: &Config) {
        let racing = &config.racing;
        let finished_now = {
            let Some(player) = self.players.get_mut(player_id) else {
                return;
            };
            player.mouth_cycles = cycles;
            player.last_update = Some(Instant::now());
            player.progress = (cycles as f64 * racing.cycle_progress).min(1.0);
            if cycles >= racing.cycles_per_race {
                player.progress = 1.0;
            }
            player.progress >= 1.0 && !player.finished
        };
        if finished_now {
            self.finish_player(player_id);
            if let Some(player) = self.players.get(player_id) {
                info!(
                    "Player {} finished! Time: {:.2}s, Cycles: {}",
                    player_id, player.finish_time, player.mouth_cycles
                );
            }
        }
    }
}

/// A race session. Message handlers mutate under the write lock and
/// release it before broadcasting; broadcasts snapshot under the read lock
/// and send outside it.
pub struct Race {
    pub id: String,
    config: Arc<Config>,
    world: Weak<RacingWorld>,
    inner: RwLock<RaceInner>,
}

impl Race {
    pub fn new(config: Arc<Config>, world: Weak<RacingWorld>) -> Arc<Self> {
        Arc::new(Self {
            id: util::generate_client_id(),
            config,
            world,
            inner: RwLock::new(RaceInner {
                phase: RacePhase::Lobby,
                players: BTreeMap::new(),
                start_time: None,
                countdown_start: None,
                results: Vec::new(),
            }),
        })
    }

    pub async fn phase(&self) -> RacePhase {
        self.inner.read().await.phase
    }

    pub async fn add_player(
        &self,
        id: String,
        name: String,
        model: String,
        handle: Option<Arc<RacingHandle>>,
    ) {
        let mut inner = self.inner.write().await;
        info!(
            "Player {} joined race {} ({}/{} players)",
            name,
            self.id,
            inner.players.len() + 1,
            self.config.racing.max_players
        );
        inner.players.insert(
            id.clone(),
            RacingPlayer {
                id,
                name,
                model,
                handle,
                mouth_cycles: 0,
                progress: 0.0,
                finish_time: 0.0,
                finished: false,
                ready: false,
                last_update: None,
            },
        );
    }

    /// A player clicked ready. When everyone present is ready the
    /// countdown starts.
    pub async fn handle_ready(self: &Arc<Self>, player_id: &str) {
        let all_ready = {
            let mut inner = self.inner.write().await;
            if inner.phase != RacePhase::Lobby {
                return;
            }
            let Some(player) = inner.players.get_mut(player_id) else {
                return;
            };
            player.ready = true;
            info!("Player {} is ready ({})", player.name, self.id);

            let ready_count = inner.players.values().filter(|p| p.ready).count();
            info!(
                "Race {}: {}/{} players ready",
                self.id,
                ready_count,
                inner.players.len()
            );
            !inner.players.is_empty() && ready_count == inner.players.len()
        };

        if all_ready {
            info!("All players ready! Starting race {}", self.id);
            self.start_countdown().await;
        } else {
            self.broadcast_state().await;
        }
    }

    /// `Lobby -> Countdown`: stamp the countdown, hand the lobby role to a
    /// fresh race, and broadcast once per second until the start.
    async fn start_countdown(self: &Arc<Self>) {
        {
            let mut inner = self.inner.write().await;
            if inner.phase != RacePhase::Lobby {
                return;
            }
            inner.phase = RacePhase::Countdown;
            inner.countdown_start = Some(Instant::now());
            info!(
                "Race {} starting countdown with {} players",
                self.id,
                inner.players.len()
            );
        }

        // Replace the waiting lobby so late joiners do not land in this
        // race. Spawned because the lobby swap takes the world lock.
        if let Some(world) = self.world.upgrade() {
            tokio::spawn(async move {
                world.replace_lobby().await;
            });
        }

        self.broadcast_state().await;

        let race = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(1));
            ticker.tick().await;
            for _ in 0..race.config.racing.countdown_secs {
                ticker.tick().await;
                if race.phase().await == RacePhase::Countdown {
                    race.broadcast_state().await;
                }
            }
            race.start_race().await;
        });
    }

    /// `Countdown -> Racing`: stamp the start and begin the update loop.
    async fn start_race(self: &Arc<Self>) {
        {
            let mut inner = self.inner.write().await;
            if inner.phase != RacePhase::Countdown {
                return;
            }
            inner.phase = RacePhase::Racing;
            inner.start_time = Some(Instant::now());
        }
        info!("Race {} started!", self.id);
        self.broadcast_state().await;

        let race = Arc::clone(self);
        tokio::spawn(async move {
            race.race_loop().await;
        });
    }

    /// The per-race update loop: stall auto-finish, end-of-race detection,
    /// and the regular state broadcast.
    async fn race_loop(self: Arc<Self>) {
        let mut ticker = interval(Duration::from_millis(self.config.racing.tick_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let all_finished = {
                let mut inner = self.inner.write().await;
                if inner.phase != RacePhase::Racing {
                    return;
                }

                // Players parked just short of the line who stopped
                // reporting get finished with their observed cycles.
                let stall = Duration::from_secs_f64(self.config.racing.stall_secs);
                let stall_progress = self.config.racing.stall_progress;
                let now = Instant::now();
                let stalled: Vec<String> = inner
                    .players
                    .values()
                    .filter(|p| {
                        !p.finished
                            && p.progress >= stall_progress
                            && p.last_update
                                .is_some_and(|last| now.duration_since(last) > stall)
                    })
                    .map(|p| p.id.clone())
                    .collect();
                for id in stalled {
                    info!("Auto-finishing player {} after stall", id);
                    inner.finish_player(&id);
                }

                !inner.players.is_empty() && inner.players.values().all(|p| p.finished)
            };

            if all_finished {
                self.end_race().await;
                return;
            }
            self.broadcast_state().await;
        }
    }

    /// `Racing -> Finished`: rank results by finish time and publish them.
    async fn end_race(&self) {
        {
            let mut inner = self.inner.write().await;
            inner.phase = RacePhase::Finished;
            inner.results.sort_by(|a, b| {
                a.finish_time
                    .partial_cmp(&b.finish_time)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for (index, result) in inner.results.iter_mut().enumerate() {
                result.rank = index + 1;
            }
        }
        info!("Race {} finished!", self.id);
        self.broadcast_results().await;
    }

    /// Authoritative cumulative cycle count from a `stateUpdate`.
    pub async fn handle_state_update(&self, player_id: &str, mouth_cycles: u32) {
        let mut inner = self.inner.write().await;
        if inner.phase == RacePhase::Finished {
            debug!(
                "Ignoring state update for player {} - race {} is finished",
                player_id, self.id
            );
            return;
        }
        inner.apply_cycles(player_id, mouth_cycles, &self.config);
    }

    /// A `mouthCycle` message counts as one more completed cycle.
    pub async fn handle_mouth_cycle(&self, player_id: &str) {
        let mut inner = self.inner.write().await;
        if inner.phase == RacePhase::Finished {
            return;
        }
        let Some(player) = inner.players.get(player_id) else {
            return;
        };
        let cycles = player.mouth_cycles + 1;
        inner.apply_cycles(player_id, cycles, &self.config);
    }

    /// Remove a player; a finished race that empties out is dropped from
    /// the world. An emptied waiting lobby stays in place for new joiners.
    pub async fn disconnect_player(&self, player_id: &str) {
        let cleanup = {
            let mut inner = self.inner.write().await;
            match inner.players.remove(player_id) {
                Some(player) => {
                    info!(
                        "Player {} disconnected from race {} (state: {})",
                        player.name,
                        self.id,
                        inner.phase.as_str()
                    );
                    inner.players.is_empty() && inner.phase == RacePhase::Finished
                }
                None => false,
            }
        };
        if cleanup {
            if let Some(world) = self.world.upgrade() {
                world.remove_race(&self.id).await;
            }
        }
    }

    /// Send the current race state to every connected player.
    pub async fn broadcast_state(&self) {
        let racing = &self.config.racing;
        let (race_state, time_remaining, players, recipients) = {
            let inner = self.inner.read().await;
            let time_remaining = match inner.phase {
                RacePhase::Countdown => {
                    let elapsed = inner
                        .countdown_start
                        .map(|t| t.elapsed().as_secs_f64())
                        .unwrap_or(0.0);
                    Some((racing.countdown_secs as f64 - elapsed).max(0.0))
                }
                RacePhase::Lobby => Some(racing.lobby_wait_secs as f64),
                _ => None,
            };
            let players: Vec<RacePlayerState> = inner
                .players
                .values()
                .map(|p| RacePlayerState {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    model: p.model.clone(),
                    progress: p.progress,
                    finished: p.finished,
                    ready: p.ready,
                })
                .collect();
            let recipients: Vec<(usize, Arc<RacingHandle>)> = inner
                .players
                .values()
                .enumerate()
                .filter_map(|(index, p)| p.handle.clone().map(|h| (index, h)))
                .collect();
            (
                inner.phase.as_str().to_string(),
                time_remaining,
                players,
                recipients,
            )
        };

        let ready_count = players.iter().filter(|p| p.ready).count();
        for (index, handle) in recipients {
            let payload = RaceStatePayload {
                race_state: race_state.clone(),
                time_remaining,
                players: players.clone(),
                your_progress: players[index].clone(),
                ready_count,
                total_players: players.len(),
            };
            handle.send(&RacingServerMessage::RaceState(payload));
        }
    }

    /// Send the final ranking to every connected player.
    async fn broadcast_results(&self) {
        let (results, handles) = {
            let inner = self.inner.read().await;
            let handles: Vec<Arc<RacingHandle>> = inner
                .players
                .values()
                .filter_map(|p| p.handle.clone())
                .collect();
            (inner.results.clone(), handles)
        };
        let payload = RaceResultsPayload { results };
        for handle in handles {
            handle.send(&RacingServerMessage::RaceResults(payload.clone()));
        }
    }

    /// Final results, for inspection after the race ends.
    pub async fn results(&self) -> Vec<RaceResult> {
        self.inner.read().await.results.clone()
    }

    /// Progress and finished flag for one player.
    pub async fn player_progress(&self, player_id: &str) -> Option<(f64, bool)> {
        self.inner
            .read()
            .await
            .players
            .get(player_id)
            .map(|p| (p.progress, p.finished))
    }

    pub async fn player_count(&self) -> usize {
        self.inner.read().await.players.len()
    }
}
