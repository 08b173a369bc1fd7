//! Powerup pickups.

use glam::Vec2;

/// A powerup item. The effect it grants depends on the species of the fish
/// that picks it up.
#[derive(Debug, Clone, Copy)]
pub struct Powerup {
    pub id: u64,
    pub position: Vec2,
    pub radius: f32,
}

impl Powerup {
    pub fn new(id: u64, position: Vec2, radius: f32) -> Self {
        Self {
            id,
            position,
            radius,
        }
    }
}
