//! Game State Definitions
//!
//! The session data model. Uses BTreeMap so the grid serializes and hashes
//! in a stable column order.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

use crate::core::hash::{StateHash, compute_state_hash};
use crate::game::face::{Face, Fruit};
use crate::game::rules::{GameRules, BOWL_SIZE, GRID_ROWS, MAX_BONUS};

// =============================================================================
// GRID
// =============================================================================

/// One fruit's column of scores; `None` is an empty slot.
pub type Column = [Option<u32>; GRID_ROWS];

/// The scoreboard: one column per fruit, one row per matching-dice count.
///
/// Slots are write-once. [`Grid::fill`] never overwrites.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grid(BTreeMap<Fruit, Column>);

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    /// Create an empty grid with a column for every fruit.
    pub fn new() -> Self {
        Self(Fruit::ALL.into_iter().map(|f| (f, [None; GRID_ROWS])).collect())
    }

    /// Value at `row` (1-based) of a fruit's column.
    pub fn get(&self, fruit: Fruit, row: usize) -> Option<u32> {
        if row == 0 || row > GRID_ROWS {
            return None;
        }
        self.0.get(&fruit).and_then(|column| column[row - 1])
    }

    /// Is the slot at `row` (1-based) already filled?
    pub fn is_filled(&self, fruit: Fruit, row: usize) -> bool {
        self.get(fruit, row).is_some()
    }

    /// Fill an empty slot. Returns false, leaving the grid untouched,
    /// if the slot is taken or out of range.
    pub fn fill(&mut self, fruit: Fruit, row: usize, value: u32) -> bool {
        if row == 0 || row > GRID_ROWS {
            return false;
        }
        let column = self.0.entry(fruit).or_insert([None; GRID_ROWS]);
        if column[row - 1].is_some() {
            return false;
        }
        column[row - 1] = Some(value);
        true
    }

    /// A fruit's column.
    pub fn column(&self, fruit: Fruit) -> Column {
        self.0.get(&fruit).copied().unwrap_or([None; GRID_ROWS])
    }

    /// All columns in fruit order.
    pub fn columns(&self) -> impl Iterator<Item = (Fruit, &Column)> {
        self.0.iter().map(|(fruit, column)| (*fruit, column))
    }

    /// Number of filled slots across the grid.
    pub fn filled_count(&self) -> usize {
        self.0.values().map(|c| c.iter().flatten().count()).sum()
    }
}

// =============================================================================
// GAME SESSION
// =============================================================================

/// One game, from `start` until it is replaced.
///
/// Serializes in the camelCase shape clients read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    /// Current round, 1-based. Reaches `max_rounds + 1` when the game ends.
    pub round: u32,

    /// Rounds in this game.
    pub max_rounds: u32,

    /// Dice still in the bowl this round.
    pub bowl_remaining: u32,

    /// Faces drawn so far this round.
    pub dice_pool: Vec<Face>,

    /// Banked scores.
    pub grid: Grid,

    /// One entry per round lost to BAR, holding that round's number.
    pub malus: Vec<u32>,

    /// BAR faces drawn this round.
    pub bar_count: u32,

    /// Bonus draws left.
    pub bonus_remaining: u32,

    /// Set once the last round resolves; never cleared.
    pub finished: bool,

    /// Candidates from the last bonus draw, until one is chosen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_bonus: Option<Vec<Fruit>>,

    /// Rules this game is played under.
    pub rules: GameRules,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new(GameRules::default())
    }
}

impl GameSession {
    /// Create a fresh game at round 1 with a full bowl.
    pub fn new(rules: GameRules) -> Self {
        Self {
            round: 1,
            max_rounds: rules.max_rounds,
            bowl_remaining: BOWL_SIZE,
            dice_pool: Vec::new(),
            grid: Grid::new(),
            malus: Vec::new(),
            bar_count: 0,
            bonus_remaining: MAX_BONUS,
            finished: false,
            pending_bonus: None,
            rules,
        }
    }

    /// Does the game still accept moves?
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.finished
    }

    /// Has no die been drawn or placed this round yet?
    #[inline]
    pub fn round_untouched(&self) -> bool {
        self.dice_pool.is_empty() && self.bowl_remaining == BOWL_SIZE
    }

    /// Occurrences of a fruit in the dice pool.
    pub fn count_in_pool(&self, fruit: Fruit) -> usize {
        let face = Face::from(fruit);
        self.dice_pool.iter().filter(|f| **f == face).count()
    }

    /// Clear the round and move to the next one.
    ///
    /// Returns true if this was the last round.
    pub(crate) fn advance_round(&mut self) -> bool {
        self.dice_pool.clear();
        self.bar_count = 0;
        self.bowl_remaining = BOWL_SIZE;
        self.pending_bonus = None;
        self.round += 1;
        if self.round > self.max_rounds {
            self.finished = true;
        }
        self.finished
    }

    /// Score under this game's rules, whether or not it has finished.
    pub fn current_score(&self) -> i64 {
        self.rules.scoring.final_score(&self.grid, &self.malus)
    }

    /// Compute deterministic hash of the observable session.
    pub fn compute_hash(&self) -> StateHash {
        compute_state_hash(self.round, |hasher| {
            hasher.update_u32(self.max_rounds);
            hasher.update_u32(self.bowl_remaining);

            hasher.update_u32(self.dice_pool.len() as u32);
            for face in &self.dice_pool {
                hasher.update_u8(*face as u8);
            }

            for (fruit, column) in self.grid.columns() {
                hasher.update_u8(fruit as u8);
                for slot in column {
                    hasher.update_opt_u32(*slot);
                }
            }

            hasher.update_u32(self.malus.len() as u32);
            for m in &self.malus {
                hasher.update_u32(*m);
            }

            hasher.update_u32(self.bar_count);
            hasher.update_u32(self.bonus_remaining);
            hasher.update_bool(self.finished);
        })
    }
}
