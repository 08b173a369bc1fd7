//! Ocean world state and per-tick update steps.

use crate::collision::{circle_rect_overlap, circles_overlap, heading_from_velocity, Circle};
use crate::config::Config;
use crate::entity::{Food, Player, Powerup};
use crate::ocean::PlayerInput;
use crate::spatial::{QuadEntity, QuadItem, Quadtree, Rect};
use glam::Vec2;
use rand::rngs::SmallRng;
use rand::Rng;
use std::collections::HashMap;
use tracing::{debug, info};

/// Margin from the border for player spawns and respawns.
const SPAWN_MARGIN: f32 = 100.0;

/// The ocean world: all entities plus the world PRNG. Mutated only by the
/// simulator task while it holds the world write lock.
pub struct World {
    pub players: HashMap<String, Player>,
    pub food: HashMap<u64, Food>,
    pub powerups: HashMap<u64, Powerup>,
    next_food_id: u64,
    next_powerup_id: u64,
    rng: SmallRng,
}

impl World {
    pub fn new(rng: SmallRng) -> Self {
        Self {
            players: HashMap::new(),
            food: HashMap::new(),
            powerups: HashMap::new(),
            next_food_id: 1,
            next_powerup_id: 1,
            rng,
        }
    }

    /// Fill the world with its initial food and powerups.
    pub fn populate(&mut self, config: &Config) {
        while self.food.len() < config.food.max_count {
            self.spawn_food(config);
        }
        while self.powerups.len() < config.powerup.max_count {
            self.spawn_powerup(config);
        }
    }

    /// A random position at least `SPAWN_MARGIN` from every border.
    pub fn random_spawn_position(&mut self, config: &Config) -> Vec2 {
        Vec2::new(
            self.rng
                .random_range(SPAWN_MARGIN..config.world.width - SPAWN_MARGIN),
            self.rng
                .random_range(SPAWN_MARGIN..config.world.height - SPAWN_MARGIN),
        )
    }

    pub fn add_player(&mut self, player: Player) {
        info!(
            "Added player {} to world. Total players: {}",
            player.id,
            self.players.len() + 1
        );
        self.players.insert(player.id.clone(), player);
    }

    pub fn remove_player(&mut self, id: &str) {
        if self.players.remove(id).is_some() {
            info!(
                "Player {} left the ocean. Total players: {}",
                id,
                self.players.len()
            );
        }
    }

    /// Drop players whose connection overflowed or closed.
    pub fn reap_defunct(&mut self) {
        let dead: Vec<String> = self
            .players
            .values()
            .filter(|p| p.handle.is_defunct())
            .map(|p| p.id.clone())
            .collect();
        for id in dead {
            info!("Reaping defunct client {}", id);
            self.players.remove(&id);
        }
    }

    /// One simulation step; inputs are drained by the caller beforehand.
    pub fn update(&mut self, config: &Config, dt: f32) {
        self.update_physics(config, dt);
        self.detect_collisions(config);
        self.handle_respawns(config, dt);
        self.update_powerups(dt);
        self.spawn_food_if_needed(config);
        self.spawn_powerups_if_needed(config);
    }

    /// Overwrite a player's held input. Direction is normalised here; a
    /// zero vector stays zero and lets the fish coast to a stop.
    pub fn apply_input(&mut self, input: PlayerInput) {
        if let Some(player) = self.players.get_mut(&input.player_id) {
            if !player.alive {
                return;
            }
            player.input_direction = if input.direction.length() > 0.0 {
                input.direction.normalize()
            } else {
                Vec2::ZERO
            };
            player.input_boost = input.boost;
            player.last_seq = input.seq;
        }
    }

    /// Integrate velocities and positions, clamp to the world rect, derive
    /// rotation, and drain size while boosting.
    pub fn update_physics(&mut self, config: &Config, dt: f32) {
        let p = &config.player;
        let w = &config.world;
        for player in self.players.values_mut() {
            if !player.alive {
                continue;
            }

            let mut target = player.input_direction * p.speed;
            if player.input_boost {
                target *= p.boost_multiplier;
            }
            player.velocity = player.velocity.lerp(target, p.velocity_lerp);
            player.position += player.velocity * dt;

            if player.velocity.length() > 0.1 {
                player.rotation = heading_from_velocity(player.velocity);
            }

            // Hard border: clamp and kill that axis' velocity.
            if player.position.x < 0.0 {
                player.position.x = 0.0;
                player.velocity.x = 0.0;
            } else if player.position.x > w.width {
                player.position.x = w.width;
                player.velocity.x = 0.0;
            }
            if player.position.y < 0.0 {
                player.position.y = 0.0;
                player.velocity.y = 0.0;
            } else if player.position.y > w.height {
                player.position.y = w.height;
                player.velocity.y = 0.0;
            }

            if player.velocity.length() > p.speed * 1.5 && player.size > p.min_size {
                player.size = (player.size - p.boost_cost_per_sec * dt).max(p.min_size);
            }
        }
    }

    /// Rebuild the spatial index from the current entity maps.
    pub fn build_quadtree(&self, config: &Config) -> Quadtree {
        let mut tree = Quadtree::new(
            Rect::new(0.0, 0.0, config.world.width, config.world.height),
            4,
        );
        for player in self.players.values() {
            if player.alive {
                tree.insert(QuadItem {
                    entity: QuadEntity::Player(player.id.clone()),
                    position: player.position,
                    radius: player.size,
                });
            }
        }
        for food in self.food.values() {
            tree.insert(QuadItem {
                entity: QuadEntity::Food(food.id),
                position: food.position,
                radius: food.radius,
            });
        }
        for powerup in self.powerups.values() {
            tree.insert(QuadItem {
                entity: QuadEntity::Powerup(powerup.id),
                position: powerup.position,
                radius: powerup.radius,
            });
        }
        tree
    }

    /// Eating pass (mouth hitbox) then bounce pass (body hitboxes).
    pub fn detect_collisions(&mut self, config: &Config) {
        let tree = self.build_quadtree(config);
        let max_size = config.player.max_size;
        let size_multiplier = config.player.size_multiplier;

        let mut player_eats: Vec<(String, String)> = Vec::new();
        let mut food_eats: Vec<(String, u64)> = Vec::new();
        let mut powerup_picks: Vec<(String, u64)> = Vec::new();

        for (id, player) in &self.players {
            if !player.alive {
                continue;
            }
            let mouth = player.mouth_hitbox(max_size);
            let body = player.body_hitbox(max_size);

            for item in tree.query_circle(player.position, config.world.view_distance) {
                match &item.entity {
                    QuadEntity::Player(other_id) => {
                        if other_id == id {
                            continue;
                        }
                        let Some(other) = self.players.get(other_id) else {
                            continue;
                        };
                        if !other.alive {
                            continue;
                        }
                        if circle_rect_overlap(&mouth, &other.body_hitbox(max_size))
                            && player.can_eat(other, size_multiplier)
                        {
                            player_eats.push((id.clone(), other_id.clone()));
                        }
                    }
                    QuadEntity::Food(food_id) => {
                        let Some(food) = self.food.get(food_id) else {
                            continue;
                        };
                        let circle = Circle {
                            center: food.position,
                            radius: food.radius,
                        };
                        if circles_overlap(&mouth, &circle) || circle_rect_overlap(&circle, &body) {
                            food_eats.push((id.clone(), *food_id));
                        }
                    }
                    QuadEntity::Powerup(powerup_id) => {
                        let Some(powerup) = self.powerups.get(powerup_id) else {
                            continue;
                        };
                        let circle = Circle {
                            center: powerup.position,
                            radius: powerup.radius,
                        };
                        if circles_overlap(&mouth, &circle) || circle_rect_overlap(&circle, &body) {
                            powerup_picks.push((id.clone(), *powerup_id));
                        }
                    }
                }
            }
        }

        for (eater, victim) in player_eats {
            self.eat_player(&eater, &victim, config);
        }
        for (player_id, food_id) in food_eats {
            self.eat_food(&player_id, food_id, config);
        }
        for (player_id, powerup_id) in powerup_picks {
            self.collect_powerup(&player_id, powerup_id, config);
        }

        self.bounce_players(config);
    }

    /// Push overlapping bodies apart unless one side could eat the other,
    /// in which case the eating pass resolves the contact instead.
    fn bounce_players(&mut self, config: &Config) {
        let max_size = config.player.max_size;
        let size_multiplier = config.player.size_multiplier;
        let alive: Vec<String> = self
            .players
            .values()
            .filter(|p| p.alive)
            .map(|p| p.id.clone())
            .collect();

        let mut impulses: Vec<(String, Vec2)> = Vec::new();
        for i in 0..alive.len() {
            for j in (i + 1)..alive.len() {
                let p1 = &self.players[&alive[i]];
                let p2 = &self.players[&alive[j]];

                let (collides, separation) = crate::collision::rect_rect_overlap(
                    &p1.body_hitbox(max_size),
                    &p2.body_hitbox(max_size),
                );
                if !collides {
                    continue;
                }
                if p1.can_eat(p2, size_multiplier) || p2.can_eat(p1, size_multiplier) {
                    continue;
                }

                let impulse = separation * config.player.bounce_strength * 0.016;
                impulses.push((alive[i].clone(), -impulse));
                impulses.push((alive[j].clone(), impulse));
            }
        }

        for (id, delta) in impulses {
            if let Some(player) = self.players.get_mut(&id) {
                player.velocity += delta;
            }
        }
    }

    /// One player eats another. A blobfish with an active powerup cannot be
    /// eaten.
    pub fn eat_player(&mut self, eater_id: &str, victim_id: &str, config: &Config) {
        let (victim_size, victim_score) = {
            let Some(victim) = self.players.get(victim_id) else {
                return;
            };
            if !victim.alive {
                return;
            }
            if victim.powerup_active && victim.model == "blobfish" {
                return;
            }
            (victim.size, victim.score)
        };

        let eater_name = {
            let Some(eater) = self.players.get_mut(eater_id) else {
                return;
            };
            eater.size = (eater.size + victim_size * 0.5).min(config.player.max_size);
            eater.score += victim_score + 100;
            eater.name.clone()
        };

        if let Some(victim) = self.players.get_mut(victim_id) {
            let victim_name = victim.name.clone();
            victim.alive = false;
            victim.killed_by = eater_name.clone();
            victim.respawn_in = config.player.respawn_delay;
            info!("Player {} ate player {}", eater_name, victim_name);
        }
    }

    pub fn eat_food(&mut self, player_id: &str, food_id: u64, config: &Config) {
        if self.food.remove(&food_id).is_none() {
            return;
        }
        if let Some(player) = self.players.get_mut(player_id) {
            player.size = (player.size + config.food.value).min(config.player.max_size);
            player.score += 1;
        }
    }

    /// A powerup pickup: ignored while one is already active.
    pub fn collect_powerup(&mut self, player_id: &str, powerup_id: u64, config: &Config) {
        let Some(player) = self.players.get_mut(player_id) else {
            return;
        };
        if player.powerup_active {
            return;
        }
        if self.powerups.remove(&powerup_id).is_none() {
            return;
        }

        player.powerup_active = true;
        player.powerup_duration = config.powerup.duration;

        match player.model.as_str() {
            "swordfish" => {
                // Extended mouth reach; applied where the mouth is derived.
                info!("Player {} (swordfish) activated range powerup", player.name);
            }
            "blobfish" => {
                // Invulnerability; applied in eat_player.
                info!(
                    "Player {} (blobfish) activated invulnerability powerup",
                    player.name
                );
            }
            "pufferfish" => {
                player.base_size = player.size;
                player.size = (player.size * 1.5).min(config.player.max_size);
                info!("Player {} (pufferfish) activated size powerup", player.name);
            }
            "shark" => {
                // Position feed; applied by the shark-vision broadcast.
                info!("Player {} (shark) activated vision powerup", player.name);
            }
            "sacabambaspis" => {
                // Ball form is cosmetic; the client renders it.
                info!("Player {} (sacabambaspis) activated ball powerup", player.name);
            }
            other => {
                debug!("Player {} ({}) activated powerup", player.name, other);
            }
        }
    }

    /// Count down respawn timers and bring dead players back.
    pub fn handle_respawns(&mut self, config: &Config, dt: f32) {
        let mut due: Vec<String> = Vec::new();
        for (id, player) in self.players.iter_mut() {
            if !player.alive {
                player.respawn_in -= dt;
                if player.respawn_in <= 0.0 {
                    due.push(id.clone());
                }
            }
        }
        for id in due {
            let position = self.random_spawn_position(config);
            if let Some(player) = self.players.get_mut(&id) {
                player.respawn(position, config.player.initial_size);
                info!("Player {} respawned", player.name);
            }
        }
    }

    /// Count down powerup timers; expiry reverts the pufferfish size boost.
    pub fn update_powerups(&mut self, dt: f32) {
        for player in self.players.values_mut() {
            if !player.powerup_active {
                continue;
            }
            player.powerup_duration -= dt;
            if player.powerup_duration <= 0.0 {
                player.powerup_active = false;
                player.powerup_duration = 0.0;
                if player.model == "pufferfish" && player.base_size > 0.0 {
                    player.size = player.base_size;
                    player.base_size = 0.0;
                }
                info!("Player {} powerup expired", player.name);
            }
        }
    }

    pub fn spawn_food_if_needed(&mut self, config: &Config) {
        let missing = config.food.max_count.saturating_sub(self.food.len());
        for _ in 0..missing.min(config.food.spawn_rate) {
            self.spawn_food(config);
        }
    }

    pub fn spawn_food(&mut self, config: &Config) {
        let position = Vec2::new(
            self.rng.random_range(0.0..config.world.width),
            self.rng.random_range(0.0..config.world.height),
        );
        let radius = self
            .rng
            .random_range(config.food.min_size..config.food.max_size);
        let id = self.next_food_id;
        self.next_food_id += 1;
        self.food.insert(id, Food::new(id, position, radius));
    }

    pub fn spawn_powerups_if_needed(&mut self, config: &Config) {
        while self.powerups.len() < config.powerup.max_count {
            self.spawn_powerup(config);
        }
    }

    pub fn spawn_powerup(&mut self, config: &Config) {
        let position = Vec2::new(
            self.rng.random_range(0.0..config.world.width),
            self.rng.random_range(0.0..config.world.height),
        );
        let id = self.next_powerup_id;
        self.next_powerup_id += 1;
        self.powerups
            .insert(id, Powerup::new(id, position, config.powerup.size));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::connection::ClientHandle;
    use bytes::Bytes;
    use rand::SeedableRng;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    const DT: f32 = 1.0 / 30.0;

    fn test_world() -> World {
        World::new(SmallRng::seed_from_u64(7))
    }

    fn add_player(
        world: &mut World,
        id: &str,
        model: &str,
        position: Vec2,
        size: f32,
    ) -> mpsc::Receiver<Bytes> {
        let (tx, rx) = mpsc::channel(256);
        let handle = Arc::new(ClientHandle::new(id.to_string(), tx));
        let player = Player::new(
            id.to_string(),
            id.to_string(),
            model.to_string(),
            position,
            size,
            handle,
        );
        world.players.insert(id.to_string(), player);
        rx
    }

    #[test]
    fn bigger_swordfish_eats_smaller_one() {
        let config = Config::default();
        let mut world = test_world();
        let _rx1 = add_player(&mut world, "p1", "swordfish", Vec2::new(500.0, 500.0), 30.0);
        let _rx2 = add_player(&mut world, "p2", "swordfish", Vec2::new(520.0, 500.0), 25.0);

        world.detect_collisions(&config);

        let p1 = &world.players["p1"];
        let p2 = &world.players["p2"];
        assert!(!p2.alive);
        assert_eq!(p2.killed_by, "p1");
        assert_eq!(p2.respawn_in, 3.0);
        assert!(p1.size >= 42.5); // 30 + 25 * 0.5
        assert_eq!(p1.score, 100);
        assert!(p1.alive);
    }

    #[test]
    fn similar_sizes_cannot_eat() {
        let config = Config::default();
        let mut world = test_world();
        let _rx1 = add_player(&mut world, "p1", "swordfish", Vec2::new(500.0, 500.0), 26.0);
        let _rx2 = add_player(&mut world, "p2", "swordfish", Vec2::new(520.0, 500.0), 25.0);

        world.detect_collisions(&config);

        // 26 < 25 * 1.1, so both survive.
        assert!(world.players["p1"].alive);
        assert!(world.players["p2"].alive);
    }

    #[test]
    fn blobfish_powerup_blocks_eating() {
        let config = Config::default();
        let mut world = test_world();
        let _rx1 = add_player(&mut world, "p1", "shark", Vec2::new(500.0, 500.0), 60.0);
        let _rx2 = add_player(&mut world, "p2", "blobfish", Vec2::new(545.0, 500.0), 20.0);
        if let Some(p2) = world.players.get_mut("p2") {
            p2.powerup_active = true;
            p2.powerup_duration = 5.0;
        }

        world.detect_collisions(&config);

        assert!(world.players["p2"].alive);
        assert_eq!(world.players["p1"].score, 0);
    }

    #[test]
    fn equal_sharks_bounce_apart() {
        let config = Config::default();
        let mut world = test_world();
        let _rx1 = add_player(&mut world, "p1", "shark", Vec2::new(500.0, 500.0), 40.0);
        let _rx2 = add_player(&mut world, "p2", "shark", Vec2::new(530.0, 500.0), 40.0);

        let initial_distance = 30.0;
        for _ in 0..5 {
            world.update_physics(&config, DT);
            world.detect_collisions(&config);
        }

        let p1 = &world.players["p1"];
        let p2 = &world.players["p2"];
        assert!(p1.alive && p2.alive);
        assert!(p1.velocity.x < 0.0);
        assert!(p2.velocity.x > 0.0);
        assert!(p1.position.distance(p2.position) > initial_distance);
    }

    #[test]
    fn pufferfish_powerup_round_trip() {
        let config = Config::default();
        let mut world = test_world();
        let _rx = add_player(&mut world, "p1", "pufferfish", Vec2::new(500.0, 500.0), 50.0);
        world
            .powerups
            .insert(1, Powerup::new(1, Vec2::new(500.0, 500.0), 15.0));

        world.collect_powerup("p1", 1, &config);
        {
            let p1 = &world.players["p1"];
            assert!(p1.powerup_active);
            assert_eq!(p1.powerup_duration, 5.0);
            assert_eq!(p1.size, 75.0);
            assert_eq!(p1.base_size, 50.0);
            assert!(world.powerups.is_empty());
        }

        for _ in 0..160 {
            world.update_powerups(DT);
        }
        let p1 = &world.players["p1"];
        assert!(!p1.powerup_active);
        assert_eq!(p1.size, 50.0);
        assert_eq!(p1.base_size, 0.0);
    }

    #[test]
    fn second_powerup_is_not_collected_while_active() {
        let config = Config::default();
        let mut world = test_world();
        let _rx = add_player(&mut world, "p1", "shark", Vec2::new(500.0, 500.0), 50.0);
        world
            .powerups
            .insert(1, Powerup::new(1, Vec2::new(500.0, 500.0), 15.0));
        world
            .powerups
            .insert(2, Powerup::new(2, Vec2::new(500.0, 500.0), 15.0));

        world.collect_powerup("p1", 1, &config);
        world.collect_powerup("p1", 2, &config);

        // The second pickup stays on the map.
        assert_eq!(world.powerups.len(), 1);
        assert!(world.powerups.contains_key(&2));
    }

    #[test]
    fn food_feeds_mouth_and_body() {
        let config = Config::default();
        let mut world = test_world();
        let _rx = add_player(&mut world, "p1", "swordfish", Vec2::new(500.0, 500.0), 30.0);
        // One pellet inside the body, one far away.
        world
            .food
            .insert(1, Food::new(1, Vec2::new(505.0, 500.0), 5.0));
        world
            .food
            .insert(2, Food::new(2, Vec2::new(1500.0, 500.0), 5.0));

        world.detect_collisions(&config);

        let p1 = &world.players["p1"];
        assert_eq!(p1.size, 32.0);
        assert_eq!(p1.score, 1);
        assert!(!world.food.contains_key(&1));
        assert!(world.food.contains_key(&2));
    }

    #[test]
    fn eating_caps_size_at_max() {
        let config = Config::default();
        let mut world = test_world();
        let _rx1 = add_player(&mut world, "p1", "shark", Vec2::new(500.0, 500.0), 195.0);
        let _rx2 = add_player(&mut world, "p2", "shark", Vec2::new(560.0, 500.0), 100.0);

        world.eat_player("p1", "p2", &config);
        assert_eq!(world.players["p1"].size, 200.0);
    }

    #[test]
    fn input_normalisation_is_observable_only_as_direction() {
        let mut world = test_world();
        let _rx = add_player(&mut world, "p1", "swordfish", Vec2::new(500.0, 500.0), 20.0);

        world.apply_input(PlayerInput {
            player_id: "p1".into(),
            direction: Vec2::new(3.0, 4.0),
            boost: false,
            seq: 1,
        });
        let scaled = world.players["p1"].input_direction;

        world.apply_input(PlayerInput {
            player_id: "p1".into(),
            direction: Vec2::new(0.6, 0.8),
            boost: false,
            seq: 2,
        });
        let unit = world.players["p1"].input_direction;

        assert!((scaled - unit).length() < 1e-6);
        assert!((unit.length() - 1.0).abs() < 1e-6);
        assert_eq!(world.players["p1"].last_seq, 2);
    }

    #[test]
    fn dead_players_ignore_input_and_hold_position() {
        let config = Config::default();
        let mut world = test_world();
        let _rx = add_player(&mut world, "p1", "swordfish", Vec2::new(500.0, 500.0), 20.0);
        {
            let p = world.players.get_mut("p1").unwrap();
            p.alive = false;
            p.respawn_in = 3.0;
        }

        world.apply_input(PlayerInput {
            player_id: "p1".into(),
            direction: Vec2::X,
            boost: true,
            seq: 9,
        });
        world.update_physics(&config, DT);

        let p = &world.players["p1"];
        assert_eq!(p.input_direction, Vec2::ZERO);
        assert_eq!(p.position, Vec2::new(500.0, 500.0));
        assert_eq!(p.last_seq, 0);
    }

    #[test]
    fn border_clamp_zeroes_that_axis() {
        let config = Config::default();
        let mut world = test_world();
        let _rx = add_player(&mut world, "p1", "swordfish", Vec2::new(3999.0, 500.0), 20.0);
        world.apply_input(PlayerInput {
            player_id: "p1".into(),
            direction: Vec2::new(1.0, 0.0),
            boost: true,
            seq: 1,
        });

        for _ in 0..60 {
            world.update_physics(&config, DT);
        }

        let p = &world.players["p1"];
        assert_eq!(p.position.x, config.world.width);
        assert_eq!(p.velocity.x, 0.0);
        assert!(p.position.y >= 0.0 && p.position.y <= config.world.height);
    }

    #[test]
    fn boosting_drains_size_down_to_min() {
        let config = Config::default();
        let mut world = test_world();
        let _rx = add_player(&mut world, "p1", "swordfish", Vec2::new(2000.0, 2000.0), 10.5);
        world.apply_input(PlayerInput {
            player_id: "p1".into(),
            direction: Vec2::X,
            boost: true,
            seq: 1,
        });

        let mut previous = world.players["p1"].size;
        let mut drained = false;
        for _ in 0..600 {
            world.update_physics(&config, DT);
            let size = world.players["p1"].size;
            assert!(size <= previous);
            if size < previous {
                drained = true;
            }
            previous = size;
        }
        assert!(drained);
        assert_eq!(world.players["p1"].size, config.player.min_size);
    }

    #[test]
    fn rotation_follows_velocity_with_flip() {
        let config = Config::default();
        let mut world = test_world();
        let _rx = add_player(&mut world, "p1", "swordfish", Vec2::new(2000.0, 2000.0), 20.0);
        world.apply_input(PlayerInput {
            player_id: "p1".into(),
            direction: Vec2::new(0.0, 1.0),
            boost: false,
            seq: 1,
        });

        for _ in 0..30 {
            world.update_physics(&config, DT);
        }

        let p = &world.players["p1"];
        // Swimming +y transmits -PI/2; always inside (-PI, PI].
        assert!((p.rotation + std::f32::consts::FRAC_PI_2).abs() < 1e-3);
        assert!(p.rotation > -std::f32::consts::PI && p.rotation <= std::f32::consts::PI);
    }

    #[test]
    fn respawn_after_delay_at_interior_position() {
        let config = Config::default();
        let mut world = test_world();
        let _rx = add_player(&mut world, "p1", "swordfish", Vec2::new(500.0, 500.0), 60.0);
        {
            let p = world.players.get_mut("p1").unwrap();
            p.alive = false;
            p.killed_by = "p2".into();
            p.respawn_in = config.player.respawn_delay;
        }

        // Just under the delay: still dead.
        for _ in 0..85 {
            world.handle_respawns(&config, DT);
        }
        assert!(!world.players["p1"].alive);

        for _ in 0..10 {
            world.handle_respawns(&config, DT);
        }
        let p = &world.players["p1"];
        assert!(p.alive);
        assert_eq!(p.size, config.player.initial_size);
        assert!(p.position.x >= 100.0 && p.position.x <= config.world.width - 100.0);
        assert!(p.position.y >= 100.0 && p.position.y <= config.world.height - 100.0);
        assert!(p.killed_by.is_empty());
    }

    #[test]
    fn spawners_respect_caps_and_rates() {
        let config = Config::default();
        let mut world = test_world();

        world.spawn_food_if_needed(&config);
        assert_eq!(world.food.len(), config.food.spawn_rate);

        world.populate(&config);
        assert_eq!(world.food.len(), config.food.max_count);
        assert_eq!(world.powerups.len(), config.powerup.max_count);

        world.spawn_food_if_needed(&config);
        world.spawn_powerups_if_needed(&config);
        assert_eq!(world.food.len(), config.food.max_count);
        assert_eq!(world.powerups.len(), config.powerup.max_count);

        for food in world.food.values() {
            assert!(food.radius >= config.food.min_size && food.radius <= config.food.max_size);
        }
    }

    #[test]
    fn full_tick_keeps_invariants() {
        let config = Config::default();
        let mut world = test_world();
        world.populate(&config);
        let _rx1 = add_player(&mut world, "p1", "shark", Vec2::new(100.0, 100.0), 40.0);
        let _rx2 = add_player(&mut world, "p2", "blobfish", Vec2::new(3900.0, 3900.0), 20.0);
        world.apply_input(PlayerInput {
            player_id: "p1".into(),
            direction: Vec2::new(-1.0, -1.0),
            boost: true,
            seq: 1,
        });

        for _ in 0..90 {
            world.update(&config, DT);
        }

        assert!(world.food.len() <= config.food.max_count);
        assert!(world.powerups.len() <= config.powerup.max_count);
        for p in world.players.values() {
            assert!(p.position.x >= 0.0 && p.position.x <= config.world.width);
            assert!(p.position.y >= 0.0 && p.position.y <= config.world.height);
            assert!(p.size >= config.player.min_size && p.size <= config.player.max_size);
        }
    }

    #[test]
    fn defunct_clients_are_reaped() {
        let mut world = test_world();
        let rx = add_player(&mut world, "p1", "swordfish", Vec2::new(500.0, 500.0), 20.0);
        drop(rx);
        world.players["p1"].handle.enqueue(Bytes::from_static(b"x"));
        assert!(world.players["p1"].handle.is_defunct());

        world.reap_defunct();
        assert!(world.players.is_empty());
    }
}
