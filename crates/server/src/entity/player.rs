//! Player fish.

use crate::collision::{Circle, OrientedRect};
use crate::server::connection::ClientHandle;
use glam::Vec2;
use std::sync::Arc;

/// Hitbox dimensions for a fish model, as ratios of the capped size.
#[derive(Debug, Clone, Copy)]
pub struct HitboxConfig {
    pub body_width: f32,
    pub body_height: f32,
    pub mouth_radius: f32,
    pub mouth_offset: f32,
}

const SWORDFISH: HitboxConfig = HitboxConfig {
    body_width: 1.3,
    body_height: 0.6,
    mouth_radius: 0.25,
    mouth_offset: 0.6,
};
const BLOBFISH: HitboxConfig = HitboxConfig {
    body_width: 1.3,
    body_height: 1.3,
    mouth_radius: 0.35,
    mouth_offset: 0.6,
};
const PUFFERFISH: HitboxConfig = HitboxConfig {
    body_width: 1.2,
    body_height: 1.2,
    mouth_radius: 0.4,
    mouth_offset: 0.6,
};
const SHARK: HitboxConfig = HitboxConfig {
    body_width: 1.8,
    body_height: 0.9,
    mouth_radius: 0.35,
    mouth_offset: 0.9,
};
const SACABAMBASPIS: HitboxConfig = HitboxConfig {
    body_width: 2.0,
    body_height: 1.0,
    mouth_radius: 0.4,
    mouth_offset: 0.9,
};
const DEFAULT: HitboxConfig = HitboxConfig {
    body_width: 2.5,
    body_height: 1.0,
    mouth_radius: 0.3,
    mouth_offset: 1.2,
};

/// Look up the hitbox configuration for a fish model.
pub fn hitbox_for_model(model: &str) -> &'static HitboxConfig {
    match model {
        "swordfish" => &SWORDFISH,
        "blobfish" => &BLOBFISH,
        "pufferfish" => &PUFFERFISH,
        "shark" => &SHARK,
        "sacabambaspis" => &SACABAMBASPIS,
        _ => &DEFAULT,
    }
}

/// A player fish in the ocean.
#[derive(Debug)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub model: String,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Wire orientation in radians; also the direction the mouth projects.
    pub rotation: f32,
    pub size: f32,
    pub score: u32,
    pub alive: bool,
    /// Seconds until respawn while dead.
    pub respawn_in: f32,
    pub killed_by: String,
    /// Last input sequence number seen, echoed back on state frames.
    pub last_seq: u32,
    /// Unit direction from the latest input; zero means coasting to a stop.
    pub input_direction: Vec2,
    pub input_boost: bool,
    pub powerup_active: bool,
    /// Remaining powerup seconds while active.
    pub powerup_duration: f32,
    /// Pre-powerup size, for species whose powerup mutates size.
    pub base_size: f32,
    /// Owning connection; the world only ever enqueues frames through it.
    pub handle: Arc<ClientHandle>,
}

impl Player {
    pub fn new(
        id: String,
        name: String,
        model: String,
        position: Vec2,
        initial_size: f32,
        handle: Arc<ClientHandle>,
    ) -> Self {
        Self {
            id,
            name,
            model,
            position,
            velocity: Vec2::ZERO,
            rotation: 0.0,
            size: initial_size,
            score: 0,
            alive: true,
            respawn_in: 0.0,
            killed_by: String::new(),
            last_seq: 0,
            input_direction: Vec2::ZERO,
            input_boost: false,
            powerup_active: false,
            powerup_duration: 0.0,
            base_size: 0.0,
            handle,
        }
    }

    pub fn hitbox(&self) -> &'static HitboxConfig {
        hitbox_for_model(&self.model)
    }

    /// The circular mouth hitbox, projected `mouth_offset` along the
    /// current rotation. An active swordfish powerup doubles the radius and
    /// extends the reach by half again.
    pub fn mouth_hitbox(&self, max_size: f32) -> Circle {
        let config = self.hitbox();
        let capped = self.size.min(max_size);

        let mut radius = capped * config.mouth_radius;
        let mut offset = capped * config.mouth_offset;
        if self.powerup_active && self.model == "swordfish" {
            radius *= 2.0;
            offset *= 1.5;
        }

        Circle {
            center: self.position + Vec2::from_angle(self.rotation) * offset,
            radius,
        }
    }

    /// The rectangular body hitbox used for bouncing and pickup.
    pub fn body_hitbox(&self, max_size: f32) -> OrientedRect {
        let config = self.hitbox();
        let capped = self.size.min(max_size);
        OrientedRect {
            center: self.position,
            width: capped * config.body_width,
            height: capped * config.body_height,
            rotation: self.rotation,
        }
    }

    /// Whether this fish is big enough to eat `other`.
    #[inline]
    pub fn can_eat(&self, other: &Player, size_multiplier: f32) -> bool {
        self.size >= other.size * size_multiplier
    }

    /// Reset to a fresh spawn at `position`.
    pub fn respawn(&mut self, position: Vec2, initial_size: f32) {
        self.position = position;
        self.velocity = Vec2::ZERO;
        self.size = initial_size;
        self.rotation = 0.0;
        self.alive = true;
        self.respawn_in = 0.0;
        self.killed_by.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_player(model: &str) -> Player {
        let (tx, _rx) = mpsc::channel(8);
        Player::new(
            "p1".into(),
            "Tester".into(),
            model.into(),
            Vec2::new(500.0, 500.0),
            30.0,
            Arc::new(ClientHandle::new("p1".into(), tx)),
        )
    }

    #[test]
    fn unknown_model_uses_default_hitbox() {
        let config = hitbox_for_model("goldfish");
        assert_eq!(config.body_width, 2.5);
        assert_eq!(config.mouth_offset, 1.2);
    }

    #[test]
    fn mouth_projects_along_rotation() {
        let mut player = test_player("swordfish");
        player.rotation = 0.0;
        let mouth = player.mouth_hitbox(200.0);
        // offset 30 * 0.6 = 18 along +x, radius 30 * 0.25 = 7.5
        assert!((mouth.center.x - 518.0).abs() < 1e-3);
        assert!((mouth.center.y - 500.0).abs() < 1e-3);
        assert!((mouth.radius - 7.5).abs() < 1e-3);
    }

    #[test]
    fn swordfish_powerup_extends_mouth() {
        let mut player = test_player("swordfish");
        player.rotation = 0.0;
        player.powerup_active = true;
        let mouth = player.mouth_hitbox(200.0);
        assert!((mouth.radius - 15.0).abs() < 1e-3); // 7.5 * 2
        assert!((mouth.center.x - 527.0).abs() < 1e-3); // 500 + 18 * 1.5
    }

    #[test]
    fn hitboxes_cap_at_max_size() {
        let mut player = test_player("shark");
        player.size = 400.0;
        let body = player.body_hitbox(200.0);
        assert!((body.width - 200.0 * 1.8).abs() < 1e-3);
        let mouth = player.mouth_hitbox(200.0);
        assert!((mouth.radius - 200.0 * 0.35).abs() < 1e-3);
    }

    #[test]
    fn respawn_resets_state() {
        let mut player = test_player("blobfish");
        player.alive = false;
        player.killed_by = "Bruce".into();
        player.respawn_in = -0.01;
        player.velocity = Vec2::new(50.0, 0.0);
        player.size = 80.0;
        player.respawn(Vec2::new(100.0, 200.0), 20.0);
        assert!(player.alive);
        assert_eq!(player.size, 20.0);
        assert_eq!(player.velocity, Vec2::ZERO);
        assert_eq!(player.rotation, 0.0);
        assert!(player.killed_by.is_empty());
    }
}
