//! Rule Set
//!
//! The game has been played under two scoring families and two BAR rules.
//! [`GameRules`] picks one coherent combination per session; the exit value
//! and the final score always come from the same [`ScoringRule`].

use std::str::FromStr;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::game::state::Grid;

/// Rounds in a game.
pub const MAX_ROUNDS: u32 = 12;

/// Dice in the bowl at the start of every round.
pub const BOWL_SIZE: u32 = 9;

/// Rows per fruit column in the grid.
pub const GRID_ROWS: usize = 6;

/// Bonus draws granted per game.
pub const MAX_BONUS: u32 = 5;

/// Dice drawn by one bonus.
pub const BONUS_DICE: usize = 2;

/// BAR draws that end a round under the default rules.
pub const DEFAULT_BAR_THRESHOLD: u32 = 2;

/// Extra points per grid row under [`ScoringRule::Weighted`], indexed by row - 1.
const WEIGHTED_ROW_BONUS: [u32; GRID_ROWS] = [0, 1, 2, 3, 4, 5];

/// Paired exit and final scoring formulas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringRule {
    /// Exit banks `round * row`; final score is the grid sum minus the malus sum.
    #[default]
    Linear,
    /// Exit banks `round + bonus(row)`; final score weights each column by
    /// its filled count and subtracts the malus product.
    Weighted,
}

impl ScoringRule {
    /// Value banked when exiting at `round` with `row` matching dice.
    ///
    /// `row` is 1-based and already clamped to the grid height.
    pub fn exit_value(self, round: u32, row: usize) -> u32 {
        debug_assert!((1..=GRID_ROWS).contains(&row));
        match self {
            ScoringRule::Linear => round * row as u32,
            ScoringRule::Weighted => round + WEIGHTED_ROW_BONUS[row - 1],
        }
    }

    /// Score of a grid after subtracting penalties.
    pub fn final_score(self, grid: &Grid, malus: &[u32]) -> i64 {
        match self {
            ScoringRule::Linear => {
                let positive: i64 = grid
                    .columns()
                    .flat_map(|(_, column)| column.iter().flatten())
                    .map(|v| *v as i64)
                    .sum();
                let negative: i64 = malus.iter().map(|m| *m as i64).sum();
                positive - negative
            }
            ScoringRule::Weighted => {
                let positive: i64 = grid
                    .columns()
                    .map(|(_, column)| {
                        let filled: Vec<i64> = column.iter().flatten().map(|v| *v as i64).collect();
                        filled.iter().sum::<i64>() * filled.len() as i64
                    })
                    .sum();
                let negative = if malus.is_empty() {
                    0
                } else {
                    malus.iter().fold(1i64, |acc, m| acc.saturating_mul(*m as i64))
                };
                positive - negative
            }
        }
    }
}

/// What a bonus draw does with `BAR` faces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusPolicy {
    /// Each bonus die is redrawn until it shows a fruit.
    #[default]
    RerollBar,
    /// `BAR` may come up; those dice are not offered, and two `BAR`s
    /// spend the bonus with nothing to place.
    AllowBar,
}

/// Error parsing a rule name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseRuleError {
    /// Unknown scoring rule name.
    #[error("unknown scoring rule: {0}")]
    Scoring(String),
    /// Unknown bonus policy name.
    #[error("unknown bonus policy: {0}")]
    BonusPolicy(String),
}

impl FromStr for ScoringRule {
    type Err = ParseRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" | "a" => Ok(ScoringRule::Linear),
            "weighted" | "b" => Ok(ScoringRule::Weighted),
            other => Err(ParseRuleError::Scoring(other.to_string())),
        }
    }
}

impl FromStr for BonusPolicy {
    type Err = ParseRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reroll" | "reroll_bar" => Ok(BonusPolicy::RerollBar),
            "allow_bar" | "allow" => Ok(BonusPolicy::AllowBar),
            other => Err(ParseRuleError::BonusPolicy(other.to_string())),
        }
    }
}

/// Rules fixed for the lifetime of one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRules {
    /// Rounds before the game finishes.
    pub max_rounds: u32,
    /// BAR draws in one round that end it with a malus (1 = immediate).
    pub bar_threshold: u32,
    /// Exit and final scoring pair.
    pub scoring: ScoringRule,
    /// Bonus draw handling of `BAR`.
    pub bonus_policy: BonusPolicy,
    /// Allow choosing the first die of a round instead of rolling it.
    pub first_placement: bool,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            max_rounds: MAX_ROUNDS,
            bar_threshold: DEFAULT_BAR_THRESHOLD,
            scoring: ScoringRule::Linear,
            bonus_policy: BonusPolicy::RerollBar,
            first_placement: false,
        }
    }
}

impl GameRules {
    /// Create rules from environment variables.
    ///
    /// Unset or unparsable variables keep their default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_rounds: defaults.max_rounds,
            bar_threshold: std::env::var("FERME_BAR_THRESHOLD")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|t| *t >= 1)
                .unwrap_or(defaults.bar_threshold),
            scoring: std::env::var("FERME_SCORING")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.scoring),
            bonus_policy: std::env::var("FERME_BONUS_POLICY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.bonus_policy),
            first_placement: std::env::var("FERME_FIRST_PLACEMENT")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.first_placement),
        }
    }
}
