//! Game entities: players, food, powerups.

mod food;
mod player;
mod powerup;

pub use food::Food;
pub use player::{hitbox_for_model, HitboxConfig, Player};
pub use powerup::Powerup;
