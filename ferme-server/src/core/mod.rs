//! Core deterministic primitives.
//!
//! Seeded randomness and state fingerprinting. Nothing in here knows
//! about fruit or rounds.

pub mod rng;
pub mod hash;

// Re-export core types
pub use rng::DeterministicRng;
pub use hash::{StateHash, compute_state_hash};
