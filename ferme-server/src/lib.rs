//! # Fruit Ferme
//!
//! Rules engine and game server for Fruit Ferme, a push-your-luck dice game.
//! Each of 12 rounds the player rolls dice from a bowl of nine, then exits on
//! a fruit to bank `round x count` on the grid, before two BARs end the round
//! with a malus.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    FRUIT FERME SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── rng.rs      - Deterministic Xorshift128+ PRNG           │
//! │  └── hash.rs     - State hashing                             │
//! │                                                              │
//! │  game/           - Rules engine (synchronous, no I/O)        │
//! │  ├── face.rs     - Fruits and die faces                      │
//! │  ├── dice.rs     - Die sources                               │
//! │  ├── rules.rs    - Rule set and scoring                      │
//! │  ├── state.rs    - Session and grid                          │
//! │  ├── engine.rs   - Roll, exit, bonus, placement              │
//! │  └── events.rs   - Move events                               │
//! │                                                              │
//! │  network/        - Transport                                 │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - Message types                             │
//! │  └── session.rs  - The live game                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism
//!
//! Given the same seed and the same moves, a game plays out identically:
//! every die comes from a seeded Xorshift128+ and the grid is a `BTreeMap`.
//!
//! ```
//! use ferme::game::{engine, GameRules, ScriptedDice, Face, Fruit};
//!
//! let mut session = engine::start(GameRules::default());
//! let mut dice = ScriptedDice::new([Face::Cerise, Face::Cerise]);
//! engine::roll(&mut session, &mut dice).unwrap();
//! engine::roll(&mut session, &mut dice).unwrap();
//! engine::exit_round(&mut session, Fruit::Cerise).unwrap();
//!
//! assert_eq!(session.grid.get(Fruit::Cerise, 2), Some(2));
//! assert_eq!(session.round, 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use core::rng::DeterministicRng;
pub use game::{GameRules, GameSession, GameError, Fruit, Face};
pub use network::{GameServer, ServerConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
