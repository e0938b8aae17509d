//! Game Session Management
//!
//! Owns the single live game. All of a game's fields change together, so
//! the whole game sits behind one lock and every move runs as one critical
//! section. Starting a game swaps the slot's content in place.

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::rng::{derive_game_seed, DeterministicRng};
use crate::game::engine::{self, ActionResult, BonusDraw, GameError};
use crate::game::events::{GameEvent, GameEventData};
use crate::game::face::Fruit;
use crate::game::rules::GameRules;
use crate::game::state::GameSession;
use crate::network::protocol::StateUpdate;

/// The live game and its dice.
#[derive(Debug)]
pub struct ActiveGame {
    /// Unique game identifier.
    pub id: Uuid,
    /// When the game was started.
    pub started_at: DateTime<Utc>,
    /// Seed the dice were initialized from.
    pub seed: u64,
    /// Game state.
    pub session: GameSession,
    /// Dice for this game.
    rng: DeterministicRng,
}

impl ActiveGame {
    fn new(rules: GameRules, seed: Option<u64>) -> Self {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let seed = seed.unwrap_or_else(|| derive_game_seed(id.as_bytes(), started_at.timestamp_millis()));

        Self {
            id,
            started_at,
            seed,
            session: engine::start(rules),
            rng: DeterministicRng::new(seed),
        }
    }

    /// Snapshot for the wire.
    pub fn snapshot(&self) -> StateUpdate {
        StateUpdate::from_session(&self.id.to_string(), &self.session)
    }
}

/// A successful move.
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    /// State after the move.
    pub update: StateUpdate,
    /// What the move did.
    pub result: ActionResult,
}

/// Holder of the one active game.
pub struct GameTable {
    /// Rules for newly started games.
    rules: GameRules,
    /// Seed used when a start request does not name one.
    fixed_seed: Option<u64>,
    /// The live game, if any.
    slot: RwLock<Option<ActiveGame>>,
}

impl GameTable {
    /// Create an empty table.
    pub fn new(rules: GameRules) -> Self {
        Self {
            rules,
            fixed_seed: None,
            slot: RwLock::new(None),
        }
    }

    /// Use a fixed seed for every game started without one.
    pub fn with_fixed_seed(mut self, seed: Option<u64>) -> Self {
        self.fixed_seed = seed;
        self
    }

    /// Start a new game, discarding the current one.
    pub async fn start(&self, seed: Option<u64>) -> StateUpdate {
        let game = ActiveGame::new(self.rules.clone(), seed.or(self.fixed_seed));
        info!("Started game {} (seed {})", game.id, game.seed);

        let update = game.snapshot();
        let previous = self.slot.write().await.replace(game);
        if let Some(previous) = previous {
            debug!("Discarded game {} at round {}", previous.id, previous.session.round);
        }
        update
    }

    /// Roll one die.
    pub async fn roll(&self) -> Result<MoveOutcome, GameError> {
        self.apply(|session, rng| engine::roll(session, rng)).await
    }

    /// Leave the round banking `fruit`.
    pub async fn exit_round(&self, fruit: &str) -> Result<MoveOutcome, GameError> {
        self.apply(|session, _| {
            let fruit = parse_fruit(session, fruit)?;
            engine::exit_round(session, fruit)
        })
        .await
    }

    /// Draw bonus candidates.
    pub async fn use_bonus(&self) -> Result<BonusDraw, GameError> {
        let mut slot = self.slot.write().await;
        let game = slot.as_mut().ok_or(GameError::NoActiveSession)?;

        let draw = engine::use_bonus(&mut game.session, &mut game.rng)?;
        log_events(&game.id, &draw.events);
        Ok(draw)
    }

    /// Place a bonus candidate.
    pub async fn choose_bonus(&self, fruit: &str) -> Result<MoveOutcome, GameError> {
        self.apply(|session, _| {
            let fruit = parse_fruit(session, fruit)?;
            engine::choose_bonus(session, fruit)
        })
        .await
    }

    /// Choose the round's first die.
    pub async fn place_first(&self, fruit: &str) -> Result<MoveOutcome, GameError> {
        self.apply(|session, _| {
            let fruit = parse_fruit(session, fruit)?;
            engine::place_first(session, fruit)
        })
        .await
    }

    /// Current state; no session if no game was started.
    pub async fn state(&self) -> StateUpdate {
        self.slot
            .read()
            .await
            .as_ref()
            .map(ActiveGame::snapshot)
            .unwrap_or_default()
    }

    /// Final score of the current game, once it has finished.
    pub async fn score(&self) -> Option<i64> {
        self.slot
            .read()
            .await
            .as_ref()
            .and_then(|game| engine::final_score(&game.session))
    }

    /// Is there a game, finished or not?
    pub async fn has_game(&self) -> bool {
        self.slot.read().await.is_some()
    }

    async fn apply<F>(&self, op: F) -> Result<MoveOutcome, GameError>
    where
        F: FnOnce(&mut GameSession, &mut DeterministicRng) -> Result<ActionResult, GameError>,
    {
        let mut slot = self.slot.write().await;
        let game = slot.as_mut().ok_or(GameError::NoActiveSession)?;

        let result = op(&mut game.session, &mut game.rng)?;
        log_events(&game.id, &result.events);

        Ok(MoveOutcome {
            update: game.snapshot(),
            result,
        })
    }
}

/// Parse a fruit argument, reporting a finished game ahead of a bad name.
fn parse_fruit(session: &GameSession, name: &str) -> Result<Fruit, GameError> {
    if !session.is_active() {
        return Err(GameError::NoActiveSession);
    }
    name.parse()
}

fn log_events(game_id: &Uuid, events: &[GameEvent]) {
    for event in events {
        match &event.data {
            GameEventData::RoundEnded { outcome, .. } => {
                info!("Game {}: round {} ended ({:?})", game_id, event.round, outcome);
            }
            GameEventData::GameFinished { score } => {
                info!("Game {} finished with score {}", game_id, score);
            }
            data => debug!("Game {}: round {}: {:?}", game_id, event.round, data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::events::RoundOutcome;

    #[tokio::test]
    async fn test_empty_table() {
        let table = GameTable::new(GameRules::default());

        assert!(!table.has_game().await);
        assert!(table.state().await.session.is_none());
        assert_eq!(table.score().await, None);
        assert_eq!(table.roll().await.unwrap_err(), GameError::NoActiveSession);
        assert_eq!(table.use_bonus().await.unwrap_err(), GameError::NoActiveSession);
        assert_eq!(table.exit_round("cerise").await.unwrap_err(), GameError::NoActiveSession);
    }

    #[tokio::test]
    async fn test_start_and_roll() {
        let table = GameTable::new(GameRules::default());
        let update = table.start(Some(7)).await;

        let session = update.session.unwrap();
        assert_eq!(session.round, 1);
        assert_eq!(session.bonus_remaining, 5);
        assert!(update.game_id.is_some());

        let outcome = table.roll().await.unwrap();
        let session = outcome.update.session.unwrap();
        assert!(session.bowl_remaining == 8 || session.round == 2);
    }

    #[tokio::test]
    async fn test_same_seed_same_game() {
        let a = GameTable::new(GameRules::default());
        let b = GameTable::new(GameRules::default());
        a.start(Some(99)).await;
        b.start(Some(99)).await;

        for _ in 0..6 {
            let sa = a.roll().await.map(|o| o.update.state_hash);
            let sb = b.roll().await.map(|o| o.update.state_hash);
            assert_eq!(sa, sb);
        }
    }

    #[tokio::test]
    async fn test_fixed_seed_applies_to_start() {
        let table = GameTable::new(GameRules::default()).with_fixed_seed(Some(5));
        table.start(None).await;

        let seed = table.slot.read().await.as_ref().map(|g| g.seed);
        assert_eq!(seed, Some(5));
    }

    #[tokio::test]
    async fn test_invalid_fruit() {
        let table = GameTable::new(GameRules::default());
        table.start(Some(1)).await;
        let before = table.state().await.state_hash;

        let err = table.exit_round("banane").await.unwrap_err();
        assert_eq!(err, GameError::InvalidFruit("banane".to_string()));
        assert_eq!(table.state().await.state_hash, before);
    }

    #[tokio::test]
    async fn test_start_replaces_game() {
        let table = GameTable::new(GameRules::default());
        let first = table.start(Some(1)).await;
        table.exit_round("cerise").await.unwrap();

        let second = table.start(Some(1)).await;
        assert_ne!(first.game_id, second.game_id);
        assert_eq!(table.state().await.session.unwrap().round, 1);
    }

    #[tokio::test]
    async fn test_play_to_the_end() {
        let table = GameTable::new(GameRules::default());
        table.start(Some(3)).await;

        for round in 1..=12u32 {
            let outcome = table.exit_round("orange").await.unwrap();
            assert_eq!(outcome.result.round_ended, Some(RoundOutcome::Bust));
            assert_eq!(outcome.result.game_finished, round == 12);
        }

        assert_eq!(table.score().await, Some(0));
        assert_eq!(table.roll().await.unwrap_err(), GameError::NoActiveSession);
        // Finished games report the end of the game, not the bad argument
        assert_eq!(table.exit_round("banane").await.unwrap_err(), GameError::NoActiveSession);
        // State stays readable
        assert!(table.state().await.session.unwrap().finished);
    }

    #[tokio::test]
    async fn test_bonus_flow() {
        let table = GameTable::new(GameRules::default());
        table.start(Some(11)).await;

        let draw = table.use_bonus().await.unwrap();
        assert_eq!(draw.candidates.len(), 2);

        let chosen = draw.candidates[0].to_string();
        let outcome = table.choose_bonus(&chosen).await.unwrap();
        let session = outcome.update.session.unwrap();
        assert_eq!(session.dice_pool.len(), 1);
        assert_eq!(session.bonus_remaining, 4);
    }
}
