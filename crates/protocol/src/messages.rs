//! JSON message types.
//!
//! The ocean mode reads JSON from clients and answers in binary frames
//! (see [`crate::frames`]). The racing mode is JSON in both directions;
//! its message rate is low enough that the simpler encoding wins.

use serde::{Deserialize, Serialize};

// ── Ocean client → server ──

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OceanClientMessage {
    #[serde(rename_all = "camelCase")]
    Join {
        #[serde(default)]
        name: String,
        #[serde(default)]
        model: String,
    },
    #[serde(rename_all = "camelCase")]
    Input {
        #[serde(default)]
        dir_x: f32,
        #[serde(default)]
        dir_y: f32,
        #[serde(default)]
        boost: bool,
        #[serde(default)]
        seq: u32,
    },
    Ping,
}

// ── Racing client → server ──

/// Client-reported fish state; the mouth cycle counter is authoritative.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FishState {
    #[serde(default)]
    pub mouth_cycles: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RacingClientMessage {
    #[serde(rename_all = "camelCase")]
    Join {
        #[serde(default)]
        name: String,
        #[serde(default)]
        model: String,
    },
    Ready,
    /// Raw mouth open/close transitions; does not affect progress.
    #[serde(rename_all = "camelCase")]
    MouthInput {
        #[serde(default)]
        mouth_open: bool,
    },
    /// Sent by some client variants per completed cycle; counts as +1.
    #[serde(rename_all = "camelCase")]
    MouthCycle {
        #[serde(default)]
        mouth_cycle: u32,
    },
    /// Authoritative cumulative cycle count.
    #[serde(rename_all = "camelCase")]
    StateUpdate {
        #[serde(default)]
        fish_state: FishState,
    },
    Ping,
}

// ── Racing server → client ──

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum RacingServerMessage {
    Welcome(RaceWelcome),
    RaceState(RaceStatePayload),
    RaceResults(RaceResultsPayload),
    Pong,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceWelcome {
    pub player_id: String,
    pub race_id: String,
    pub name: String,
    pub model: String,
    pub race_state: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceStatePayload {
    pub race_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining: Option<f64>,
    pub players: Vec<RacePlayerState>,
    pub your_progress: RacePlayerState,
    pub ready_count: usize,
    pub total_players: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RacePlayerState {
    pub id: String,
    pub name: String,
    pub model: String,
    pub progress: f64,
    pub finished: bool,
    pub ready: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RaceResult {
    pub player_id: String,
    pub name: String,
    pub model: String,
    pub finish_time: f64,
    pub mouth_actions_per_minute: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RaceResultsPayload {
    pub results: Vec<RaceResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocean_input_parses() {
        let msg: OceanClientMessage =
            serde_json::from_str(r#"{"type":"input","dirX":0.5,"dirY":-1.0,"boost":true,"seq":9}"#)
                .unwrap();
        match msg {
            OceanClientMessage::Input {
                dir_x,
                dir_y,
                boost,
                seq,
            } => {
                assert_eq!((dir_x, dir_y), (0.5, -1.0));
                assert!(boost);
                assert_eq!(seq, 9);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn ocean_join_defaults() {
        let msg: OceanClientMessage = serde_json::from_str(r#"{"type":"join"}"#).unwrap();
        match msg {
            OceanClientMessage::Join { name, model } => {
                assert_eq!(name, "");
                assert_eq!(model, "");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(serde_json::from_str::<OceanClientMessage>(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn racing_state_update_parses() {
        let msg: RacingClientMessage =
            serde_json::from_str(r#"{"type":"stateUpdate","fishState":{"mouthCycles":37}}"#)
                .unwrap();
        match msg {
            RacingClientMessage::StateUpdate { fish_state } => {
                assert_eq!(fish_state.mouth_cycles, 37);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn racing_welcome_serializes_with_payload_envelope() {
        let msg = RacingServerMessage::Welcome(RaceWelcome {
            player_id: "p1".into(),
            race_id: "r1".into(),
            name: "Nemo".into(),
            model: "blobfish".into(),
            race_state: "lobby".into(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.starts_with(r#"{"type":"welcome","payload":{"#));
        assert!(json.contains(r#""playerId":"p1""#));
        assert!(json.contains(r#""raceState":"lobby""#));
    }

    #[test]
    fn pong_has_no_payload() {
        let json = serde_json::to_string(&RacingServerMessage::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }

    #[test]
    fn time_remaining_omitted_when_absent() {
        let payload = RaceStatePayload {
            race_state: "racing".into(),
            time_remaining: None,
            players: vec![],
            your_progress: RacePlayerState {
                id: "p1".into(),
                name: "Nemo".into(),
                model: "swordfish".into(),
                progress: 0.5,
                finished: false,
                ready: true,
            },
            ready_count: 1,
            total_players: 1,
        };
        let json = serde_json::to_string(&RacingServerMessage::RaceState(payload)).unwrap();
        assert!(!json.contains("timeRemaining"));
    }
}
