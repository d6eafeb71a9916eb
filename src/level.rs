//! Level progression: score targets, difficulty schedule, frozen-tile rarity.

use crate::item::ItemKind;

/// Points per popped cell.
pub const POINTS_PER_CELL: u32 = 10;
/// Minimum cluster size at level 1.
pub const BASE_MIN_MATCH: usize = 3;
pub const MAX_MIN_MATCH: usize = 5;
/// Item kinds in play at level 1.
pub const BASE_ACTIVE_KINDS: usize = 4;
/// Levels at which the minimum cluster size goes up by one.
const MIN_MATCH_BUMP_LEVELS: [u32; 2] = [5, 9];

/// Score needed to complete `level`: 900, 1300, 1700, then +550 per level.
pub fn score_target_for(level: u32) -> u32 {
    let level = level.max(1);
    if level <= 3 {
        900 + (level - 1) * 400
    } else {
        1700 + (level - 3) * 550
    }
}

/// Per-cell probability of a frozen tile when a grid is created.
pub fn frozen_chance_for(level: u32) -> f64 {
    (0.06 + f64::from(level) * 0.01).min(0.12)
}

/// Item kinds in play at `level`: 4 through level 2, then `3 + level - 1`, capped by the palette.
pub fn active_kinds_for(level: u32) -> usize {
    let kinds = if level <= 2 {
        BASE_ACTIVE_KINDS
    } else {
        3 + level as usize - 1
    };
    kinds.min(ItemKind::PALETTE.len())
}

/// Burst power-ups appear at the start of even levels.
pub fn spawns_burst(level: u32) -> bool {
    level % 2 == 0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelState {
    pub level: u32,
    /// Cumulative, never decreases within a game.
    pub score: u32,
    /// Resets on every level transition.
    pub level_score: u32,
    pub score_target: u32,
    pub min_match: usize,
    pub active_kinds: usize,
}

impl Default for LevelState {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelState {
    pub fn new() -> Self {
        Self {
            level: 1,
            score: 0,
            level_score: 0,
            score_target: score_target_for(1),
            min_match: BASE_MIN_MATCH,
            active_kinds: BASE_ACTIVE_KINDS,
        }
    }

    /// State as if the player had advanced from level 1 to `level`, with zero score.
    pub fn starting_at(level: u32) -> Self {
        let mut state = Self::new();
        while state.level < level {
            state.advance();
        }
        state
    }

    /// Score a popped cluster of `cells` cells. Returns the points gained.
    pub fn award(&mut self, cells: usize) -> u32 {
        let gained = POINTS_PER_CELL.saturating_mul(cells as u32);
        self.score = self.score.saturating_add(gained);
        self.level_score = self.level_score.saturating_add(gained);
        gained
    }

    pub fn is_complete(&self) -> bool {
        self.level_score >= self.score_target
    }

    /// `level_score / score_target`, clamped to `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.score_target == 0 {
            return 1.0;
        }
        (f64::from(self.level_score) / f64::from(self.score_target)).clamp(0.0, 1.0)
    }

    pub fn frozen_chance(&self) -> f64 {
        frozen_chance_for(self.level)
    }

    /// Move to the next level and recompute the difficulty parameters.
    pub fn advance(&mut self) {
        self.level += 1;
        self.active_kinds = active_kinds_for(self.level);
        if MIN_MATCH_BUMP_LEVELS.contains(&self.level) {
            self.min_match = (self.min_match + 1).min(MAX_MIN_MATCH);
        }
        self.score_target = score_target_for(self.level);
        self.level_score = 0;
    }
}

/// Score as shown in the sidebar: zero-padded to six digits.
pub fn format_score(score: u32) -> String {
    format!("{:06}", score)
}
