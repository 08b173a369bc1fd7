//! Server configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub food: FoodConfig,
    #[serde(default)]
    pub powerup: PowerupConfig,
    #[serde(default)]
    pub racing: RacingConfig,
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Path::new("config.toml");
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No config.toml found, creating default config");
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }

    /// Seconds per simulation tick.
    #[inline]
    pub fn tick_dt(&self) -> f32 {
        1.0 / self.world.tick_rate as f32
    }
}

/// Networking and general server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Capacity of the shared player-input queue.
    #[serde(default = "default_input_queue_size")]
    pub input_queue_size: usize,
    /// Capacity of each per-client send channel.
    #[serde(default = "default_send_channel_size")]
    pub send_channel_size: usize,
    /// WebSocket ping cadence in milliseconds (ocean connections).
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,
    /// Read deadline in seconds; refreshed by any inbound frame.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Write deadline in seconds.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
    /// Maximum player display-name length.
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            input_queue_size: default_input_queue_size(),
            send_channel_size: default_send_channel_size(),
            ping_interval_ms: default_ping_interval_ms(),
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
            max_name_len: default_max_name_len(),
        }
    }
}

fn default_port() -> u16 {
    8080
}
fn default_bind() -> String {
    "0.0.0.0".to_string()
}
fn default_input_queue_size() -> usize {
    10_000
}
fn default_send_channel_size() -> usize {
    256
}
fn default_ping_interval_ms() -> u64 {
    2000
}
fn default_read_timeout() -> u64 {
    60
}
fn default_write_timeout() -> u64 {
    10
}
fn default_max_name_len() -> usize {
    20
}

/// Ocean world configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    #[serde(default = "default_world_size")]
    pub width: f32,
    #[serde(default = "default_world_size")]
    pub height: f32,
    /// Simulation updates per second.
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
    /// State broadcasts per second.
    #[serde(default = "default_broadcast_rate")]
    pub broadcast_rate: u32,
    /// Interest radius for state fan-out and the eating query.
    #[serde(default = "default_view_distance")]
    pub view_distance: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: default_world_size(),
            height: default_world_size(),
            tick_rate: default_tick_rate(),
            broadcast_rate: default_broadcast_rate(),
            view_distance: default_view_distance(),
        }
    }
}

fn default_world_size() -> f32 {
    4000.0
}
fn default_tick_rate() -> u32 {
    30
}
fn default_broadcast_rate() -> u32 {
    15
}
fn default_view_distance() -> f32 {
    600.0
}

/// Player tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default = "default_initial_size")]
    pub initial_size: f32,
    #[serde(default = "default_min_size")]
    pub min_size: f32,
    #[serde(default = "default_max_size")]
    pub max_size: f32,
    /// Base swim speed in units per second.
    #[serde(default = "default_speed")]
    pub speed: f32,
    #[serde(default = "default_boost_multiplier")]
    pub boost_multiplier: f32,
    /// Size drained per second while boosting.
    #[serde(default = "default_boost_cost_per_sec")]
    pub boost_cost_per_sec: f32,
    /// Smoothing factor for velocity changes.
    #[serde(default = "default_velocity_lerp")]
    pub velocity_lerp: f32,
    /// How much bigger a fish must be to eat another.
    #[serde(default = "default_size_multiplier")]
    pub size_multiplier: f32,
    /// Push force when bodies collide.
    #[serde(default = "default_bounce_strength")]
    pub bounce_strength: f32,
    #[serde(default = "default_respawn_delay")]
    pub respawn_delay: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            initial_size: default_initial_size(),
            min_size: default_min_size(),
            max_size: default_max_size(),
            speed: default_speed(),
            boost_multiplier: default_boost_multiplier(),
            boost_cost_per_sec: default_boost_cost_per_sec(),
            velocity_lerp: default_velocity_lerp(),
            size_multiplier: default_size_multiplier(),
            bounce_strength: default_bounce_strength(),
            respawn_delay: default_respawn_delay(),
        }
    }
}

fn default_initial_size() -> f32 {
    20.0
}
fn default_min_size() -> f32 {
    10.0
}
fn default_max_size() -> f32 {
    200.0
}
fn default_speed() -> f32 {
    200.0
}
fn default_boost_multiplier() -> f32 {
    2.0
}
fn default_boost_cost_per_sec() -> f32 {
    3.0
}
fn default_velocity_lerp() -> f32 {
    0.1
}
fn default_size_multiplier() -> f32 {
    1.1
}
fn default_bounce_strength() -> f32 {
    150.0
}
fn default_respawn_delay() -> f32 {
    3.0
}

/// Food tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FoodConfig {
    #[serde(default = "default_food_max_count")]
    pub max_count: usize,
    /// Items spawned per tick while below the cap.
    #[serde(default = "default_food_spawn_rate")]
    pub spawn_rate: usize,
    #[serde(default = "default_food_min_size")]
    pub min_size: f32,
    #[serde(default = "default_food_max_size")]
    pub max_size: f32,
    /// Size gained when eating one item.
    #[serde(default = "default_food_value")]
    pub value: f32,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            max_count: default_food_max_count(),
            spawn_rate: default_food_spawn_rate(),
            min_size: default_food_min_size(),
            max_size: default_food_max_size(),
            value: default_food_value(),
        }
    }
}

fn default_food_max_count() -> usize {
    300
}
fn default_food_spawn_rate() -> usize {
    10
}
fn default_food_min_size() -> f32 {
    3.0
}
fn default_food_max_size() -> f32 {
    10.0
}
fn default_food_value() -> f32 {
    2.0
}

/// Powerup tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PowerupConfig {
    #[serde(default = "default_powerup_max_count")]
    pub max_count: usize,
    /// Effect duration in seconds.
    #[serde(default = "default_powerup_duration")]
    pub duration: f32,
    #[serde(default = "default_powerup_size")]
    pub size: f32,
}

impl Default for PowerupConfig {
    fn default() -> Self {
        Self {
            max_count: default_powerup_max_count(),
            duration: default_powerup_duration(),
            size: default_powerup_size(),
        }
    }
}

fn default_powerup_max_count() -> usize {
    5
}
fn default_powerup_duration() -> f32 {
    5.0
}
fn default_powerup_size() -> f32 {
    15.0
}

/// Racing tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RacingConfig {
    #[serde(default = "default_race_max_players")]
    pub max_players: usize,
    /// Nominal lobby wait shown to clients.
    #[serde(default = "default_lobby_wait_secs")]
    pub lobby_wait_secs: u64,
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u64,
    /// Complete mouth cycles needed to finish.
    #[serde(default = "default_cycles_per_race")]
    pub cycles_per_race: u32,
    /// Progress contributed by one cycle.
    #[serde(default = "default_cycle_progress")]
    pub cycle_progress: f64,
    /// Race loop cadence in milliseconds.
    #[serde(default = "default_race_tick_ms")]
    pub tick_ms: u64,
    /// Seconds of silence after which a near-finished player is forced in.
    #[serde(default = "default_stall_secs")]
    pub stall_secs: f64,
    /// Minimum progress for the stall auto-finish to apply.
    #[serde(default = "default_stall_progress")]
    pub stall_progress: f64,
}

impl Default for RacingConfig {
    fn default() -> Self {
        Self {
            max_players: default_race_max_players(),
            lobby_wait_secs: default_lobby_wait_secs(),
            countdown_secs: default_countdown_secs(),
            cycles_per_race: default_cycles_per_race(),
            cycle_progress: default_cycle_progress(),
            tick_ms: default_race_tick_ms(),
            stall_secs: default_stall_secs(),
            stall_progress: default_stall_progress(),
        }
    }
}

fn default_race_max_players() -> usize {
    8
}
fn default_lobby_wait_secs() -> u64 {
    10
}
fn default_countdown_secs() -> u64 {
    3
}
fn default_cycles_per_race() -> u32 {
    50
}
fn default_cycle_progress() -> f64 {
    0.02
}
fn default_race_tick_ms() -> u64 {
    100
}
fn default_stall_secs() -> f64 {
    3.0
}
fn default_stall_progress() -> f64 {
    0.96
}
