//! Fish racing: short-lived lobby/countdown/race sessions.

mod race;
mod world;

pub use race::{Race, RacePhase, RacingPlayer};
pub use world::RacingWorld;
