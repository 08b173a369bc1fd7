//! Interest-scoped state fan-out.
//!
//! The broadcaster walks all players under the world read lock; per-client
//! state (the seen-players set) lives behind each connection's own lock,
//! acquired strictly inside the world lock.

use crate::config::Config;
use crate::entity::Player;
use crate::ocean::World;
use fishy_protocol::frames::{
    Frame, LeaderboardEntry, OtherPlayer, Pellet, PlayerInfo, PlayerPosition, StateFrame, YouState,
};

/// Build the state frame for one player, plus the one-shot identity
/// records for peers this connection has not been told about yet.
pub fn build_state_for_player(
    world: &World,
    player: &Player,
    config: &Config,
) -> (StateFrame, Vec<PlayerInfo>) {
    let you = YouState {
        alive: player.alive,
        x: player.position.x,
        y: player.position.y,
        vel_x: player.velocity.x,
        vel_y: player.velocity.y,
        rotation: player.rotation,
        size: player.size,
        score: player.score,
        seq: player.last_seq,
        killed_by: (!player.alive).then(|| player.killed_by.clone()),
        respawn_in: (!player.alive).then_some(player.respawn_in),
        powerup_duration: player.powerup_active.then_some(player.powerup_duration),
    };

    let view_distance = config.world.view_distance;
    let mut others = Vec::new();
    let mut new_peers = Vec::new();
    for other in world.players.values() {
        if other.id == player.id || !other.alive {
            continue;
        }
        if player.position.distance(other.position) > view_distance {
            continue;
        }

        // Name and model go out once per connection; state frames carry
        // kinematics only.
        if player.handle.first_sight(&other.id) {
            new_peers.push(PlayerInfo {
                id: other.id.clone(),
                name: other.name.clone(),
                model: other.model.clone(),
            });
        }

        others.push(OtherPlayer {
            id: other.id.clone(),
            x: other.position.x,
            y: other.position.y,
            vel_x: other.velocity.x,
            vel_y: other.velocity.y,
            rotation: other.rotation,
            size: other.size,
            powerup_active: other.powerup_active,
        });
    }

    let food = world
        .food
        .values()
        .filter(|f| player.position.distance(f.position) <= view_distance)
        .map(|f| Pellet {
            id: f.id,
            x: f.position.x,
            y: f.position.y,
            radius: f.radius,
        })
        .collect();

    // Powerups are few and drive the minimap; send them all.
    let powerups = world
        .powerups
        .values()
        .map(|p| Pellet {
            id: p.id,
            x: p.position.x,
            y: p.position.y,
            radius: p.radius,
        })
        .collect();

    (
        StateFrame {
            you,
            others,
            food,
            powerups,
        },
        new_peers,
    )
}

/// Send every connected player their view of the world.
pub fn broadcast_state(world: &World, config: &Config) {
    for player in world.players.values() {
        let (state, new_peers) = build_state_for_player(world, player, config);
        for info in new_peers {
            player.handle.enqueue_meta(Frame::PlayerInfo(info).to_bytes());
        }
        player
            .handle
            .enqueue(Frame::State(Box::new(state)).to_bytes());
    }
}

/// Top 10 players by score, alive or dead.
pub fn build_leaderboard(world: &World) -> Vec<LeaderboardEntry> {
    let mut players: Vec<&Player> = world.players.values().collect();
    players.sort_by(|a, b| b.score.cmp(&a.score));
    players
        .iter()
        .take(10)
        .map(|p| LeaderboardEntry {
            name: p.name.clone(),
            score: p.score,
        })
        .collect()
}

pub fn broadcast_leaderboard(world: &World) {
    let frame = Frame::Leaderboard(build_leaderboard(world)).to_bytes();
    for player in world.players.values() {
        player.handle.enqueue_meta(frame.clone());
    }
}

/// Send every alive player's position to sharks with the vision powerup.
pub fn broadcast_shark_vision(world: &World) {
    let positions: Vec<PlayerPosition> = world
        .players
        .values()
        .filter(|p| p.alive)
        .map(|p| PlayerPosition {
            id: p.id.clone(),
            x: p.position.x,
            y: p.position.y,
        })
        .collect();
    if positions.is_empty() {
        return;
    }

    let frame = Frame::AllPlayers(positions).to_bytes();
    for player in world.players.values() {
        if player.powerup_active && player.model == "shark" {
            player.handle.enqueue_meta(frame.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocean::World;
    use crate::server::connection::ClientHandle;
    use bytes::Bytes;
    use glam::Vec2;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::sync::Arc;
    use tokio::sync::mpsc;

    fn test_world() -> World {
        World::new(SmallRng::seed_from_u64(11))
    }

    fn add_player(
        world: &mut World,
        id: &str,
        model: &str,
        position: Vec2,
    ) -> mpsc::Receiver<Bytes> {
        let (tx, rx) = mpsc::channel(256);
        let handle = Arc::new(ClientHandle::new(id.to_string(), tx));
        let player = Player::new(
            id.to_string(),
            id.to_string(),
            model.to_string(),
            position,
            20.0,
            handle,
        );
        world.players.insert(id.to_string(), player);
        rx
    }

    fn drain_frames(rx: &mut mpsc::Receiver<Bytes>) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(bytes) = rx.try_recv() {
            frames.extend(Frame::decode_batch(bytes).unwrap());
        }
        frames
    }

    #[test]
    fn state_is_scoped_to_view_distance() {
        let config = Config::default();
        let mut world = test_world();
        let _ra = add_player(&mut world, "a", "swordfish", Vec2::new(0.0, 0.0));
        let _rb = add_player(&mut world, "b", "swordfish", Vec2::new(500.0, 0.0));
        let _rc = add_player(&mut world, "c", "swordfish", Vec2::new(1000.0, 0.0));

        let visible = |id: &str| -> Vec<String> {
            let (state, _) = build_state_for_player(&world, &world.players[id], &config);
            let mut ids: Vec<String> = state.others.iter().map(|o| o.id.clone()).collect();
            ids.sort();
            ids
        };

        assert_eq!(visible("a"), vec!["b"]);
        assert_eq!(visible("b"), vec!["a", "c"]);
        assert_eq!(visible("c"), vec!["b"]);
    }

    #[test]
    fn player_info_announced_once_per_peer() {
        let config = Config::default();
        let mut world = test_world();
        let _ra = add_player(&mut world, "a", "swordfish", Vec2::new(0.0, 0.0));
        let _rb = add_player(&mut world, "b", "shark", Vec2::new(500.0, 0.0));

        let a = &world.players["a"];
        let (_, new_peers) = build_state_for_player(&world, a, &config);
        assert_eq!(new_peers.len(), 1);
        assert_eq!(new_peers[0].id, "b");
        assert_eq!(new_peers[0].model, "shark");

        let (state, new_peers) = build_state_for_player(&world, a, &config);
        assert!(new_peers.is_empty());
        assert_eq!(state.others.len(), 1);
    }

    #[test]
    fn broadcast_sends_info_before_state() {
        let config = Config::default();
        let mut world = test_world();
        let mut ra = add_player(&mut world, "a", "swordfish", Vec2::new(0.0, 0.0));
        let _rb = add_player(&mut world, "b", "blobfish", Vec2::new(300.0, 0.0));

        broadcast_state(&world, &config);

        let frames = drain_frames(&mut ra);
        let info_index = frames
            .iter()
            .position(|f| matches!(f, Frame::PlayerInfo(_)))
            .unwrap();
        let state_index = frames
            .iter()
            .position(|f| matches!(f, Frame::State(_)))
            .unwrap();
        assert!(info_index < state_index);

        // Second broadcast: state only.
        broadcast_state(&world, &config);
        let frames = drain_frames(&mut ra);
        assert!(frames.iter().all(|f| matches!(f, Frame::State(_))));
    }

    #[test]
    fn dead_player_state_carries_killer_and_respawn() {
        let config = Config::default();
        let mut world = test_world();
        let _ra = add_player(&mut world, "a", "swordfish", Vec2::new(0.0, 0.0));
        {
            let a = world.players.get_mut("a").unwrap();
            a.alive = false;
            a.killed_by = "Bruce".into();
            a.respawn_in = 2.5;
        }

        let (state, _) = build_state_for_player(&world, &world.players["a"], &config);
        assert!(!state.you.alive);
        assert_eq!(state.you.killed_by.as_deref(), Some("Bruce"));
        assert_eq!(state.you.respawn_in, Some(2.5));
        assert_eq!(state.you.powerup_duration, None);
    }

    #[test]
    fn dead_peers_are_not_listed() {
        let config = Config::default();
        let mut world = test_world();
        let _ra = add_player(&mut world, "a", "swordfish", Vec2::new(0.0, 0.0));
        let _rb = add_player(&mut world, "b", "swordfish", Vec2::new(300.0, 0.0));
        world.players.get_mut("b").unwrap().alive = false;

        let (state, new_peers) = build_state_for_player(&world, &world.players["a"], &config);
        assert!(state.others.is_empty());
        assert!(new_peers.is_empty());
    }

    #[test]
    fn food_is_filtered_but_powerups_are_not() {
        let config = Config::default();
        let mut world = test_world();
        let _ra = add_player(&mut world, "a", "swordfish", Vec2::new(0.0, 0.0));
        world
            .food
            .insert(1, crate::entity::Food::new(1, Vec2::new(100.0, 0.0), 5.0));
        world
            .food
            .insert(2, crate::entity::Food::new(2, Vec2::new(2000.0, 0.0), 5.0));
        world.powerups.insert(
            9,
            crate::entity::Powerup::new(9, Vec2::new(3000.0, 3000.0), 15.0),
        );

        let (state, _) = build_state_for_player(&world, &world.players["a"], &config);
        assert_eq!(state.food.len(), 1);
        assert_eq!(state.food[0].id, 1);
        assert_eq!(state.powerups.len(), 1);
        assert_eq!(state.powerups[0].id, 9);
    }

    #[test]
    fn leaderboard_is_top_ten_by_score() {
        let mut world = test_world();
        let mut receivers = Vec::new();
        for i in 0..12 {
            let id = format!("p{i:02}");
            receivers.push(add_player(&mut world, &id, "swordfish", Vec2::ZERO));
            world.players.get_mut(&id).unwrap().score = i * 10;
        }
        // Dead players still rank.
        world.players.get_mut("p11").unwrap().alive = false;

        let entries = build_leaderboard(&world);
        assert_eq!(entries.len(), 10);
        assert_eq!(entries[0].name, "p11");
        assert_eq!(entries[0].score, 110);
        for pair in entries.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn shark_vision_goes_to_powered_sharks_only() {
        let mut world = test_world();
        let mut shark_rx = add_player(&mut world, "shark1", "shark", Vec2::new(0.0, 0.0));
        let mut idle_shark_rx = add_player(&mut world, "shark2", "shark", Vec2::new(50.0, 0.0));
        let mut sword_rx = add_player(&mut world, "sword", "swordfish", Vec2::new(100.0, 0.0));
        {
            let shark = world.players.get_mut("shark1").unwrap();
            shark.powerup_active = true;
            shark.powerup_duration = 5.0;
        }

        broadcast_shark_vision(&world);

        let frames = drain_frames(&mut shark_rx);
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            Frame::AllPlayers(positions) => {
                assert_eq!(positions.len(), 3);
            }
            other => panic!("unexpected frame {other:?}"),
        }
        assert!(drain_frames(&mut idle_shark_rx).is_empty());
        assert!(drain_frames(&mut sword_rx).is_empty());
    }
}
