//! Outbound binary frame set for the ocean mode.
//!
//! Every frame starts with a 1-byte tag. Frames may be concatenated into a
//! single WebSocket message; the decoder advances until the buffer is
//! exhausted. All values are big-endian, strings are u16-length-prefixed
//! UTF-8, kinematics are f32 and world dimensions f64.

use crate::{FrameReader, FrameWriter, ProtocolError};
use bytes::Bytes;

/// Frame tags for server -> client binary frames.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTag {
    /// Join acknowledgement with world dimensions.
    Welcome = 1,
    /// Interest-scoped world state.
    State = 2,
    /// Reply to a client ping.
    Pong = 3,
    /// Top-10 score list.
    Leaderboard = 4,
    /// One-shot identity record for a newly-visible peer.
    PlayerInfo = 5,
    /// All alive player positions (shark vision).
    AllPlayers = 6,
}

/// State flags packed into the first byte of a `State` frame.
const FLAG_ALIVE: u8 = 0x01;
const FLAG_KILLED_BY: u8 = 0x02;
const FLAG_RESPAWN_IN: u8 = 0x04;
const FLAG_POWERUP: u8 = 0x08;

/// Join acknowledgement (tag 1).
#[derive(Debug, Clone, PartialEq)]
pub struct Welcome {
    pub id: String,
    pub name: String,
    pub model: String,
    pub world_width: f64,
    pub world_height: f64,
}

/// The receiving player's own state within a `State` frame.
#[derive(Debug, Clone, PartialEq)]
pub struct YouState {
    pub alive: bool,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub rotation: f32,
    pub size: f32,
    pub score: u32,
    pub seq: u32,
    pub killed_by: Option<String>,
    pub respawn_in: Option<f32>,
    /// Remaining powerup seconds, present while a powerup is active.
    pub powerup_duration: Option<f32>,
}

/// Another visible player within a `State` frame. Name and model are sent
/// once per connection via `PlayerInfo`, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct OtherPlayer {
    pub id: String,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub rotation: f32,
    pub size: f32,
    pub powerup_active: bool,
}

/// A food or powerup item on the wire.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pellet {
    pub id: u64,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
}

/// Interest-scoped world state (tag 2).
#[derive(Debug, Clone, PartialEq)]
pub struct StateFrame {
    pub you: YouState,
    pub others: Vec<OtherPlayer>,
    pub food: Vec<Pellet>,
    pub powerups: Vec<Pellet>,
}

/// Leaderboard entry (tag 4 carries up to 10 of these).
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: u32,
}

/// Identity record for a newly-visible peer (tag 5).
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerInfo {
    pub id: String,
    pub name: String,
    pub model: String,
}

/// A player position in an `AllPlayers` frame (tag 6).
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerPosition {
    pub id: String,
    pub x: f32,
    pub y: f32,
}

/// A single server -> client binary frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Welcome(Welcome),
    State(Box<StateFrame>),
    Pong,
    Leaderboard(Vec<LeaderboardEntry>),
    PlayerInfo(PlayerInfo),
    AllPlayers(Vec<PlayerPosition>),
}

impl Frame {
    /// Append this frame to a writer.
    pub fn encode(&self, w: &mut FrameWriter) {
        match self {
            Frame::Welcome(welcome) => {
                w.put_u8(FrameTag::Welcome as u8);
                w.put_string(&welcome.id);
                w.put_string(&welcome.name);
                w.put_string(&welcome.model);
                w.put_f64(welcome.world_width);
                w.put_f64(welcome.world_height);
            }
            Frame::State(state) => {
                w.put_u8(FrameTag::State as u8);
                let you = &state.you;
                let mut flags = 0u8;
                if you.alive {
                    flags |= FLAG_ALIVE;
                }
                if you.killed_by.is_some() {
                    flags |= FLAG_KILLED_BY;
                }
                if you.respawn_in.is_some() {
                    flags |= FLAG_RESPAWN_IN;
                }
                if you.powerup_duration.is_some() {
                    flags |= FLAG_POWERUP;
                }
                w.put_u8(flags);
                w.put_f32(you.x);
                w.put_f32(you.y);
                w.put_f32(you.vel_x);
                w.put_f32(you.vel_y);
                w.put_f32(you.rotation);
                w.put_f32(you.size);
                w.put_u32(you.score);
                w.put_u32(you.seq);
                if let Some(killed_by) = &you.killed_by {
                    w.put_string(killed_by);
                }
                if let Some(respawn_in) = you.respawn_in {
                    w.put_f32(respawn_in);
                }
                if let Some(duration) = you.powerup_duration {
                    w.put_f32(duration);
                }
                w.put_u16(state.others.len() as u16);
                for other in &state.others {
                    w.put_string(&other.id);
                    w.put_f32(other.x);
                    w.put_f32(other.y);
                    w.put_f32(other.vel_x);
                    w.put_f32(other.vel_y);
                    w.put_f32(other.rotation);
                    w.put_f32(other.size);
                    w.put_u8(other.powerup_active as u8);
                }
                w.put_u16(state.food.len() as u16);
                for pellet in &state.food {
                    put_pellet(w, pellet);
                }
                w.put_u16(state.powerups.len() as u16);
                for pellet in &state.powerups {
                    put_pellet(w, pellet);
                }
            }
            Frame::Pong => {
                w.put_u8(FrameTag::Pong as u8);
            }
            Frame::Leaderboard(entries) => {
                w.put_u8(FrameTag::Leaderboard as u8);
                w.put_u8(entries.len() as u8);
                for entry in entries {
                    w.put_string(&entry.name);
                    w.put_u32(entry.score);
                }
            }
            Frame::PlayerInfo(info) => {
                w.put_u8(FrameTag::PlayerInfo as u8);
                w.put_string(&info.id);
                w.put_string(&info.name);
                w.put_string(&info.model);
            }
            Frame::AllPlayers(players) => {
                w.put_u8(FrameTag::AllPlayers as u8);
                w.put_u16(players.len() as u16);
                for p in players {
                    w.put_string(&p.id);
                    w.put_f32(p.x);
                    w.put_f32(p.y);
                }
            }
        }
    }

    /// Encode a single frame into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut w = FrameWriter::new();
        self.encode(&mut w);
        w.finish()
    }

    /// Decode one frame, advancing the reader past it.
    pub fn decode(r: &mut FrameReader) -> Result<Frame, ProtocolError> {
        let tag = r.get_u8()?;
        match tag {
            t if t == FrameTag::Welcome as u8 => Ok(Frame::Welcome(Welcome {
                id: r.get_string()?,
                name: r.get_string()?,
                model: r.get_string()?,
                world_width: r.get_f64()?,
                world_height: r.get_f64()?,
            })),
            t if t == FrameTag::State as u8 => {
                let flags = r.get_u8()?;
                let x = r.get_f32()?;
                let y = r.get_f32()?;
                let vel_x = r.get_f32()?;
                let vel_y = r.get_f32()?;
                let rotation = r.get_f32()?;
                let size = r.get_f32()?;
                let score = r.get_u32()?;
                let seq = r.get_u32()?;
                let killed_by = if flags & FLAG_KILLED_BY != 0 {
                    Some(r.get_string()?)
                } else {
                    None
                };
                let respawn_in = if flags & FLAG_RESPAWN_IN != 0 {
                    Some(r.get_f32()?)
                } else {
                    None
                };
                let powerup_duration = if flags & FLAG_POWERUP != 0 {
                    Some(r.get_f32()?)
                } else {
                    None
                };
                let n_others = r.get_u16()?;
                let mut others = Vec::with_capacity(n_others as usize);
                for _ in 0..n_others {
                    others.push(OtherPlayer {
                        id: r.get_string()?,
                        x: r.get_f32()?,
                        y: r.get_f32()?,
                        vel_x: r.get_f32()?,
                        vel_y: r.get_f32()?,
                        rotation: r.get_f32()?,
                        size: r.get_f32()?,
                        powerup_active: r.get_u8()? != 0,
                    });
                }
                let food = get_pellets(r)?;
                let powerups = get_pellets(r)?;
                Ok(Frame::State(Box::new(StateFrame {
                    you: YouState {
                        alive: flags & FLAG_ALIVE != 0,
                        x,
                        y,
                        vel_x,
                        vel_y,
                        rotation,
                        size,
                        score,
                        seq,
                        killed_by,
                        respawn_in,
                        powerup_duration,
                    },
                    others,
                    food,
                    powerups,
                })))
            }
            t if t == FrameTag::Pong as u8 => Ok(Frame::Pong),
            t if t == FrameTag::Leaderboard as u8 => {
                let n = r.get_u8()?;
                let mut entries = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    entries.push(LeaderboardEntry {
                        name: r.get_string()?,
                        score: r.get_u32()?,
                    });
                }
                Ok(Frame::Leaderboard(entries))
            }
            t if t == FrameTag::PlayerInfo as u8 => Ok(Frame::PlayerInfo(PlayerInfo {
                id: r.get_string()?,
                name: r.get_string()?,
                model: r.get_string()?,
            })),
            t if t == FrameTag::AllPlayers as u8 => {
                let n = r.get_u16()?;
                let mut players = Vec::with_capacity(n as usize);
                for _ in 0..n {
                    players.push(PlayerPosition {
                        id: r.get_string()?,
                        x: r.get_f32()?,
                        y: r.get_f32()?,
                    });
                }
                Ok(Frame::AllPlayers(players))
            }
            other => Err(ProtocolError::InvalidTag(other)),
        }
    }

    /// Decode a whole WebSocket message, which may carry several
    /// concatenated frames. Any decoding error aborts the whole batch.
    pub fn decode_batch(data: impl Into<Bytes>) -> Result<Vec<Frame>, ProtocolError> {
        let mut r = FrameReader::new(data);
        let mut frames = Vec::new();
        while r.remaining() > 0 {
            frames.push(Frame::decode(&mut r)?);
        }
        Ok(frames)
    }
}

fn put_pellet(w: &mut FrameWriter, pellet: &Pellet) {
    w.put_u64(pellet.id);
    w.put_f32(pellet.x);
    w.put_f32(pellet.y);
    w.put_f32(pellet.radius);
}

fn get_pellets(r: &mut FrameReader) -> Result<Vec<Pellet>, ProtocolError> {
    let n = r.get_u16()?;
    let mut pellets = Vec::with_capacity(n as usize);
    for _ in 0..n {
        pellets.push(Pellet {
            id: r.get_u64()?,
            x: r.get_f32()?,
            y: r.get_f32()?,
            radius: r.get_f32()?,
        });
    }
    Ok(pellets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_state(alive: bool) -> Frame {
        Frame::State(Box::new(StateFrame {
            you: YouState {
                alive,
                x: 120.5,
                y: 88.25,
                vel_x: -3.0,
                vel_y: 1.5,
                rotation: 0.75,
                size: 24.0,
                score: 310,
                seq: 42,
                killed_by: if alive { None } else { Some("Bruce".into()) },
                respawn_in: if alive { None } else { Some(2.5) },
                powerup_duration: if alive { Some(4.0) } else { None },
            },
            others: vec![OtherPlayer {
                id: "p2".into(),
                x: 300.0,
                y: 90.0,
                vel_x: 0.0,
                vel_y: 0.0,
                rotation: -1.0,
                size: 31.0,
                powerup_active: true,
            }],
            food: vec![Pellet {
                id: 7,
                x: 10.0,
                y: 20.0,
                radius: 4.5,
            }],
            powerups: vec![],
        }))
    }

    #[test]
    fn roundtrip_welcome() {
        let frame = Frame::Welcome(Welcome {
            id: "abc-123".into(),
            name: "Fish".into(),
            model: "swordfish".into(),
            world_width: 4000.0,
            world_height: 4000.0,
        });
        let mut r = FrameReader::new(frame.to_bytes());
        assert_eq!(Frame::decode(&mut r).unwrap(), frame);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn roundtrip_state_alive_and_dead() {
        for alive in [true, false] {
            let frame = sample_state(alive);
            let mut r = FrameReader::new(frame.to_bytes());
            assert_eq!(Frame::decode(&mut r).unwrap(), frame);
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn roundtrip_leaderboard_info_allplayers_pong() {
        let frames = [
            Frame::Leaderboard(vec![
                LeaderboardEntry {
                    name: "Nemo".into(),
                    score: 900,
                },
                LeaderboardEntry {
                    name: "Dory".into(),
                    score: 450,
                },
            ]),
            Frame::PlayerInfo(PlayerInfo {
                id: "p9".into(),
                name: "Bruce".into(),
                model: "shark".into(),
            }),
            Frame::AllPlayers(vec![PlayerPosition {
                id: "p1".into(),
                x: 1.0,
                y: 2.0,
            }]),
            Frame::Pong,
        ];
        for frame in &frames {
            let mut r = FrameReader::new(frame.to_bytes());
            assert_eq!(&Frame::decode(&mut r).unwrap(), frame);
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn state_flags_reflect_optional_fields() {
        let bytes = sample_state(false).to_bytes();
        // tag, then flags
        assert_eq!(bytes[0], FrameTag::State as u8);
        assert_eq!(bytes[1], FLAG_KILLED_BY | FLAG_RESPAWN_IN);
        let bytes = sample_state(true).to_bytes();
        assert_eq!(bytes[1], FLAG_ALIVE | FLAG_POWERUP);
    }

    #[test]
    fn batched_frames_decode_in_order() {
        let a = Frame::Pong;
        let b = sample_state(true);
        let c = Frame::PlayerInfo(PlayerInfo {
            id: "x".into(),
            name: "y".into(),
            model: "blobfish".into(),
        });
        let mut w = FrameWriter::new();
        a.encode(&mut w);
        b.encode(&mut w);
        c.encode(&mut w);
        let decoded = Frame::decode_batch(w.finish()).unwrap();
        assert_eq!(decoded, vec![a, b, c]);
    }

    #[test]
    fn truncated_batch_aborts() {
        let bytes = sample_state(true).to_bytes();
        let cut = bytes.slice(..bytes.len() - 3);
        assert!(Frame::decode_batch(cut).is_err());
    }

    #[test]
    fn unknown_tag_aborts() {
        assert!(matches!(
            Frame::decode_batch(vec![0xEEu8]),
            Err(ProtocolError::InvalidTag(0xEE))
        ));
    }
}
