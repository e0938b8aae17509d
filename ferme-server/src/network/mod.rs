//! Network Layer
//!
//! WebSocket server and message types. Game rules live in `game/`; this
//! layer owns the live game, the dice, and the clock.

pub mod protocol;
pub mod session;
pub mod server;

pub use protocol::{
    ClientMessage, ServerMessage, StateUpdate, BonusOffer, ServerError, ErrorCode,
};
pub use session::{ActiveGame, GameTable, MoveOutcome};
pub use server::{GameServer, ServerConfig, GameServerError};
