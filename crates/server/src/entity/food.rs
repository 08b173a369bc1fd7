//! Food pellets.

use glam::Vec2;

/// A food item. Ids are monotonic and never reused.
#[derive(Debug, Clone, Copy)]
pub struct Food {
    pub id: u64,
    pub position: Vec2,
    pub radius: f32,
}

impl Food {
    pub fn new(id: u64, position: Vec2, radius: f32) -> Self {
        Self {
            id,
            position,
            radius,
        }
    }
}
