//! Game Events
//!
//! Events produced by engine operations. The server logs them and forwards
//! them to the client after each move.

use serde::{Serialize, Deserialize};
use crate::game::face::{Face, Fruit};

/// How a round came to an end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    /// Exited and banked a score.
    Banked,
    /// Exited holding none of the chosen fruit.
    Bust,
    /// Exited on a grid slot that was already filled.
    Blocked,
    /// Too many BARs; a malus was recorded.
    Penalty,
    /// Drew the last die without exiting.
    BowlExhausted,
}

/// Game event data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEventData {
    /// A die was rolled from the bowl
    DieDrawn {
        face: Face,
        bowl_remaining: u32,
    },

    /// A BAR came up
    BarDrawn {
        bar_count: u32,
    },

    /// A score was written to the grid
    ScoreBanked {
        fruit: Fruit,
        row: u32,
        value: u32,
    },

    /// A bonus draw produced candidates
    BonusOffered {
        candidates: Vec<Fruit>,
        bonus_remaining: u32,
    },

    /// A bonus candidate was put in the pool
    BonusPlaced {
        fruit: Fruit,
    },

    /// The round's first die was chosen rather than rolled
    FirstPlaced {
        fruit: Fruit,
    },

    /// A round resolved
    RoundEnded {
        outcome: RoundOutcome,
        next_round: u32,
    },

    /// The last round resolved
    GameFinished {
        score: i64,
    },
}

/// A game event stamped with the round it happened in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    /// Round when the event occurred
    pub round: u32,

    /// Event data
    #[serde(flatten)]
    pub data: GameEventData,
}

impl GameEvent {
    /// Create a new event.
    pub fn new(round: u32, data: GameEventData) -> Self {
        Self { round, data }
    }

    /// Create die drawn event.
    pub fn die_drawn(round: u32, face: Face, bowl_remaining: u32) -> Self {
        Self::new(round, GameEventData::DieDrawn { face, bowl_remaining })
    }

    /// Create round ended event.
    pub fn round_ended(round: u32, outcome: RoundOutcome) -> Self {
        Self::new(
            round,
            GameEventData::RoundEnded {
                outcome,
                next_round: round + 1,
            },
        )
    }

    /// Create game finished event.
    pub fn game_finished(round: u32, score: i64) -> Self {
        Self::new(round, GameEventData::GameFinished { score })
    }
}
