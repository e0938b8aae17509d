//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are JSON objects tagged by a `"type"` field.

use serde::{Serialize, Deserialize};

use crate::game::engine::{BonusDraw, GameError};
use crate::game::events::GameEvent;
use crate::game::face::Fruit;
use crate::game::state::GameSession;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
///
/// Fruit arguments stay strings here; the server parses them so an unknown
/// name becomes an `invalid_fruit` error rather than a malformed message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start a new game, replacing the current one.
    Start {
        /// Fixed dice seed, for reproducible games.
        #[serde(default)]
        seed: Option<u64>,
    },

    /// Roll one die from the bowl.
    Roll,

    /// Leave the round, banking the given fruit.
    Exit { fruit: String },

    /// Spend a bonus draw.
    UseBonus,

    /// Place one of the offered bonus dice.
    ChooseBonus { chosen: String },

    /// Choose the round's first die.
    PlaceFirst { fruit: String },

    /// Request the current game state.
    GetState,

    /// Request the final score.
    GetScore,

    /// Ping for latency measurement.
    Ping { timestamp: u64 },
}

impl ClientMessage {
    /// Name of the message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Start { .. } => "start",
            ClientMessage::Roll => "roll",
            ClientMessage::Exit { .. } => "exit",
            ClientMessage::UseBonus => "use_bonus",
            ClientMessage::ChooseBonus { .. } => "choose_bonus",
            ClientMessage::PlaceFirst { .. } => "place_first",
            ClientMessage::GetState => "get_state",
            ClientMessage::GetScore => "get_score",
            ClientMessage::Ping { .. } => "ping",
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Game state (after every move, or on request).
    State(StateUpdate),

    /// Result of a bonus draw.
    Bonus(BonusOffer),

    /// Final score; absent until the game has finished.
    Score { score: Option<i64> },

    /// Events produced by the last move.
    Events { events: Vec<GameEvent> },

    /// Pong response.
    Pong { timestamp: u64, server_time: u64 },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown { reason: String },
}

/// Game state snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Game identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    /// The session; absent if no game has been started.
    pub session: Option<GameSession>,
    /// Hex-encoded state hash for drift detection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_hash: Option<String>,
}

impl StateUpdate {
    /// Snapshot a session.
    pub fn from_session(game_id: &str, session: &GameSession) -> Self {
        Self {
            game_id: Some(game_id.to_string()),
            session: Some(session.clone()),
            state_hash: Some(hex::encode(session.compute_hash())),
        }
    }
}

/// Bonus draw result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusOffer {
    /// Fruits the player may choose from.
    pub candidates: Vec<Fruit>,
    /// Why there is nothing to choose, if so.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<BonusDraw> for BonusOffer {
    fn from(draw: BonusDraw) -> Self {
        Self {
            candidates: draw.candidates,
            message: draw.message,
        }
    }
}

/// Server error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

impl ServerError {
    /// Create an error with a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<&GameError> for ServerError {
    fn from(err: &GameError) -> Self {
        let code = match err {
            GameError::NoActiveSession => ErrorCode::NoActiveSession,
            GameError::BowlEmpty => ErrorCode::BowlEmpty,
            GameError::NoBonusRemaining => ErrorCode::NoBonusRemaining,
            GameError::InvalidFruit(_) => ErrorCode::InvalidFruit,
            GameError::NoPendingBonus => ErrorCode::NoPendingBonus,
            GameError::NotOffered(_) => ErrorCode::NotOffered,
            GameError::RoundAlreadyStarted => ErrorCode::RoundAlreadyStarted,
            GameError::FirstPlacementDisabled => ErrorCode::FirstPlacementDisabled,
        };
        Self::new(code, err.to_string())
    }
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// No game started, or the game is over.
    NoActiveSession,
    /// Bowl is empty.
    BowlEmpty,
    /// No bonus draws left.
    NoBonusRemaining,
    /// Unknown fruit name.
    InvalidFruit,
    /// No bonus draw to choose from.
    NoPendingBonus,
    /// Fruit not among the bonus candidates.
    NotOffered,
    /// Round has already begun.
    RoundAlreadyStarted,
    /// First die placement not allowed.
    FirstPlacementDisabled,
    /// Malformed message.
    InvalidInput,
    /// Internal error.
    InternalError,
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
