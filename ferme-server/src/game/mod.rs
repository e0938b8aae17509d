//! Game Logic Module
//!
//! The rules engine. Synchronous and free of I/O; randomness comes in
//! through `DieSource`.
//!
//! ## Module Structure
//!
//! - `face`: The six die faces
//! - `dice`: Die sources (seeded PRNG, scripted)
//! - `rules`: Rule set and scoring formulas
//! - `state`: Session and grid
//! - `engine`: The player's moves
//! - `events`: Events emitted by moves

pub mod face;
pub mod dice;
pub mod rules;
pub mod state;
pub mod engine;
pub mod events;

// Re-export key types
pub use face::{Face, Fruit};
pub use dice::{DieSource, ScriptedDice};
pub use rules::{GameRules, ScoringRule, BonusPolicy};
pub use state::{GameSession, Grid};
pub use engine::{ActionResult, BonusDraw, GameError};
pub use events::{GameEvent, GameEventData, RoundOutcome};
