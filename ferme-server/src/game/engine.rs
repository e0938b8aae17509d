//! Rules Engine
//!
//! Every move a player can make, as a function over `&mut GameSession`.
//! Each operation either applies all of its effects or returns an error
//! without touching the session.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::dice::DieSource;
use crate::game::events::{GameEvent, GameEventData, RoundOutcome};
use crate::game::face::{Face, Fruit};
use crate::game::rules::{BonusPolicy, GameRules, BONUS_DICE, GRID_ROWS};
use crate::game::state::GameSession;

/// Message returned when a bonus draw has nothing to place.
pub const NO_PLACEMENT_MESSAGE: &str = "Two BARs drawn, nothing to place";

/// Rejected moves. None of these change the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// No game started, or the game is over.
    #[error("No active game")]
    NoActiveSession,

    /// Roll attempted with an empty bowl.
    #[error("No dice remaining in the bowl")]
    BowlEmpty,

    /// All bonus draws spent.
    #[error("No bonus remaining")]
    NoBonusRemaining,

    /// Argument is not one of the five fruits.
    #[error("Invalid fruit: {0}")]
    InvalidFruit(String),

    /// Bonus choice without a bonus draw to choose from.
    #[error("No bonus draw to choose from")]
    NoPendingBonus,

    /// Bonus choice naming a fruit the draw did not offer.
    #[error("{0} was not offered by the last bonus draw")]
    NotOffered(Fruit),

    /// First die placement after the round has begun.
    #[error("Round already started")]
    RoundAlreadyStarted,

    /// First die placement while the rules do not allow it.
    #[error("First die placement is disabled")]
    FirstPlacementDisabled,
}

/// Result of a move.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActionResult {
    /// Events generated by this move
    pub events: Vec<GameEvent>,
    /// How the round ended, if it did
    pub round_ended: Option<RoundOutcome>,
    /// Whether the game ended with this move
    pub game_finished: bool,
}

/// Dice offered by a bonus draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusDraw {
    /// Fruits the player may place; empty if nothing can be placed.
    pub candidates: Vec<Fruit>,
    /// Explanation when there are no candidates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Events generated by the draw
    #[serde(skip)]
    pub events: Vec<GameEvent>,
}

/// Start a new game.
pub fn start(rules: GameRules) -> GameSession {
    GameSession::new(rules)
}

/// Roll one die from the bowl.
///
/// A fruit goes into the pool; drawing the bowl's last die ends the round
/// with nothing banked. A BAR goes into the pool too, and once the round
/// has seen `bar_threshold` of them it ends with a malus equal to the round
/// number.
pub fn roll<D: DieSource>(state: &mut GameSession, dice: &mut D) -> Result<ActionResult, GameError> {
    ensure_active(state)?;
    if state.bowl_remaining == 0 {
        return Err(GameError::BowlEmpty);
    }

    let mut result = ActionResult::default();
    let face = dice.draw();
    state.bowl_remaining -= 1;
    state.dice_pool.push(face);
    result.events.push(GameEvent::die_drawn(state.round, face, state.bowl_remaining));

    if face.is_bar() {
        state.bar_count += 1;
        result.events.push(GameEvent::new(
            state.round,
            GameEventData::BarDrawn { bar_count: state.bar_count },
        ));

        if state.bar_count >= state.rules.bar_threshold {
            state.malus.push(state.round);
            resolve_round(state, RoundOutcome::Penalty, &mut result);
        }
    } else if state.bowl_remaining == 0 {
        resolve_round(state, RoundOutcome::BowlExhausted, &mut result);
    }

    Ok(result)
}

/// Leave the round, banking the dice of one fruit.
///
/// `n` matching dice fill row `n` of that fruit's column (rows past the
/// grid height land on the last row). No matching dice, or a row already
/// filled, banks nothing. The round ends either way.
pub fn exit_round(state: &mut GameSession, fruit: Fruit) -> Result<ActionResult, GameError> {
    ensure_active(state)?;

    let mut result = ActionResult::default();
    let count = state.count_in_pool(fruit);

    let outcome = if count == 0 {
        RoundOutcome::Bust
    } else {
        let row = count.min(GRID_ROWS);
        if state.grid.is_filled(fruit, row) {
            RoundOutcome::Blocked
        } else {
            let value = state.rules.scoring.exit_value(state.round, row);
            state.grid.fill(fruit, row, value);
            result.events.push(GameEvent::new(
                state.round,
                GameEventData::ScoreBanked { fruit, row: row as u32, value },
            ));
            RoundOutcome::Banked
        }
    };

    resolve_round(state, outcome, &mut result);
    Ok(result)
}

/// Spend a bonus charge to draw two candidate dice.
///
/// The charge is spent even when the draw offers nothing. An empty bowl
/// is rejected up front, since no candidate could be placed.
pub fn use_bonus<D: DieSource>(state: &mut GameSession, dice: &mut D) -> Result<BonusDraw, GameError> {
    ensure_active(state)?;
    if state.bonus_remaining == 0 {
        return Err(GameError::NoBonusRemaining);
    }
    if state.bowl_remaining == 0 {
        return Err(GameError::BowlEmpty);
    }

    let candidates: Vec<Fruit> = match state.rules.bonus_policy {
        BonusPolicy::RerollBar => (0..BONUS_DICE).map(|_| dice.draw_fruit()).collect(),
        BonusPolicy::AllowBar => (0..BONUS_DICE).filter_map(|_| dice.draw().fruit()).collect(),
    };

    state.bonus_remaining -= 1;

    let mut events = Vec::new();
    let message = if candidates.is_empty() {
        state.pending_bonus = None;
        Some(NO_PLACEMENT_MESSAGE.to_string())
    } else {
        state.pending_bonus = Some(candidates.clone());
        None
    };
    events.push(GameEvent::new(
        state.round,
        GameEventData::BonusOffered {
            candidates: candidates.clone(),
            bonus_remaining: state.bonus_remaining,
        },
    ));

    Ok(BonusDraw { candidates, message, events })
}

/// Put one of the offered bonus dice into the pool.
///
/// Uses a die from the bowl like a roll does, and ends the round the same
/// way if that was the last one.
pub fn choose_bonus(state: &mut GameSession, fruit: Fruit) -> Result<ActionResult, GameError> {
    ensure_active(state)?;
    let offered = state.pending_bonus.as_ref().ok_or(GameError::NoPendingBonus)?;
    if !offered.contains(&fruit) {
        return Err(GameError::NotOffered(fruit));
    }
    if state.bowl_remaining == 0 {
        return Err(GameError::BowlEmpty);
    }

    let mut result = ActionResult::default();
    state.pending_bonus = None;
    state.dice_pool.push(Face::from(fruit));
    state.bowl_remaining -= 1;
    result.events.push(GameEvent::new(state.round, GameEventData::BonusPlaced { fruit }));

    if state.bowl_remaining == 0 {
        resolve_round(state, RoundOutcome::BowlExhausted, &mut result);
    }

    Ok(result)
}

/// Choose the first die of a round instead of rolling it.
pub fn place_first(state: &mut GameSession, fruit: Fruit) -> Result<ActionResult, GameError> {
    ensure_active(state)?;
    if !state.rules.first_placement {
        return Err(GameError::FirstPlacementDisabled);
    }
    if !state.round_untouched() {
        return Err(GameError::RoundAlreadyStarted);
    }

    state.dice_pool.push(Face::from(fruit));
    state.bowl_remaining -= 1;

    Ok(ActionResult {
        events: vec![GameEvent::new(state.round, GameEventData::FirstPlaced { fruit })],
        ..Default::default()
    })
}

/// Final score, available once the game has finished.
pub fn final_score(state: &GameSession) -> Option<i64> {
    state.finished.then(|| state.current_score())
}

fn ensure_active(state: &GameSession) -> Result<(), GameError> {
    if state.is_active() {
        Ok(())
    } else {
        Err(GameError::NoActiveSession)
    }
}

fn resolve_round(state: &mut GameSession, outcome: RoundOutcome, result: &mut ActionResult) {
    let round = state.round;
    result.events.push(GameEvent::round_ended(round, outcome));
    result.round_ended = Some(outcome);

    if state.advance_round() {
        result.game_finished = true;
        result.events.push(GameEvent::game_finished(round, state.current_score()));
    }
}
