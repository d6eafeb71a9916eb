//! Game engine: resolves moves against the grid, keeps the board playable,
//! and drives level progression. One move is resolved synchronously; the only
//! deferred step is the no-moves check, which waits for the presentation layer
//! to report that its fall/pop animations have settled.

use crate::gravity::Fall;
use crate::grid::{Grid, Pos};
use crate::item::{Item, ItemFactory};
use crate::level::{self, LevelState};
use std::collections::HashSet;
use std::iter;

/// Rows from the top where a burst power-up may be placed.
const BURST_SPAWN_ROWS: usize = 5;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub cols: usize,
    pub rows: usize,
    /// Regeneration attempts for an unplayable fresh grid.
    pub retry_limit: u32,
    /// Cells removed by a burst, including the burst itself.
    pub burst_batch: usize,
    /// When set, the no-moves check waits for `Engine::animations_settled`.
    pub defer_playability_check: bool,
    /// Level a new game starts at.
    pub start_level: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cols: 10,
            rows: 15,
            retry_limit: 50,
            burst_batch: 6,
            defer_playability_check: false,
            start_level: 1,
        }
    }
}

/// Where the engine is within a move. Between calls it is always `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Resolving,
    Settling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Out of bounds or interactions locked; nothing changed.
    Ignored,
    /// Cluster below the minimum size; affected cells were nudged.
    NoOp,
    Popped,
    /// A burst power-up went off.
    Burst,
    LevelComplete,
    GameOver,
}

/// Result of a playability check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playability {
    Playable,
    /// Fresh grid had to be redrawn this many times.
    Regenerated { attempts: u32 },
    /// Retry bound hit; the board may have no legal move.
    Exhausted { attempts: u32 },
    GameOver,
}

impl Playability {
    pub fn has_move(&self) -> bool {
        matches!(self, Self::Playable | Self::Regenerated { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cleared {
    pub pos: Pos,
    pub item: Item,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Crack {
    pub pos: Pos,
    pub remaining: u8,
}

/// Everything the presentation layer needs to animate one move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveResult {
    pub outcome: Outcome,
    pub cleared: Vec<Cleared>,
    /// Cells that wiggled for a sub-threshold selection.
    pub nudged: Vec<Pos>,
    pub cracked: Vec<Crack>,
    pub score_delta: u32,
    pub level_score: u32,
    pub falls: Vec<Fall>,
    /// Remaining board, to be blown away when the level is won.
    pub celebration: Vec<Cleared>,
}

impl MoveResult {
    fn empty(outcome: Outcome, level_score: u32) -> Self {
        Self {
            outcome,
            cleared: Vec::new(),
            nudged: Vec::new(),
            cracked: Vec::new(),
            score_delta: 0,
            level_score,
            falls: Vec::new(),
            celebration: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    grid: Grid,
    factory: ItemFactory,
    level: LevelState,
    phase: Phase,
    interactions_locked: bool,
    pending_move_check: bool,
    game_over: bool,
    level_complete: bool,
    last_playability: Playability,
}

impl Engine {
    /// Engine with a fresh game already set up.
    pub fn new(config: EngineConfig, factory: ItemFactory) -> Self {
        let grid = Grid::new(config.cols, config.rows);
        let mut engine = Self {
            config,
            grid,
            factory,
            level: LevelState::new(),
            phase: Phase::Idle,
            interactions_locked: false,
            pending_move_check: false,
            game_over: false,
            level_complete: false,
            last_playability: Playability::Playable,
        };
        engine.new_game();
        engine
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn level(&self) -> &LevelState {
        &self.level
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_locked(&self) -> bool {
        self.interactions_locked
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn is_level_complete(&self) -> bool {
        self.level_complete
    }

    pub fn pending_move_check(&self) -> bool {
        self.pending_move_check
    }

    pub fn last_playability(&self) -> Playability {
        self.last_playability
    }

    /// Reset score and difficulty and deal a fresh grid.
    pub fn new_game(&mut self) -> LevelState {
        self.level = LevelState::starting_at(self.config.start_level);
        log::debug!("new game at level {}", self.level.level);
        self.init_grid();
        self.level
    }

    /// New game after a game over.
    pub fn restart(&mut self) -> LevelState {
        log::info!("restart after score {}", self.level.score);
        self.new_game()
    }

    /// Next level: harder parameters and a fresh grid.
    pub fn advance_level(&mut self) -> LevelState {
        self.level.advance();
        log::debug!(
            "level {} (target {}, min match {}, kinds {})",
            self.level.level,
            self.level.score_target,
            self.level.min_match,
            self.level.active_kinds
        );
        self.init_grid();
        self.level
    }

    fn init_grid(&mut self) {
        self.grid = Grid::generate(
            self.config.cols,
            self.config.rows,
            &mut self.factory,
            self.level.active_kinds,
            self.level.frozen_chance(),
        );
        log::debug!(
            "dealt {}x{} grid with {} frozen tiles",
            self.grid.cols,
            self.grid.rows,
            self.grid.frozen_count()
        );
        self.game_over = false;
        self.level_complete = false;
        self.pending_move_check = false;
        self.phase = Phase::Idle;
        self.ensure_playable(true);
        if level::spawns_burst(self.level.level) {
            self.spawn_burst();
        }
        self.interactions_locked = false;
    }

    /// Replace a random unfrozen item near the top with a burst power-up.
    fn spawn_burst(&mut self) {
        let rows = BURST_SPAWN_ROWS.min(self.grid.rows);
        let candidates: Vec<Pos> = self
            .grid
            .positions()
            .take_while(|p| p.row < rows)
            .filter(|&p| self.grid.get(p).is_some() && !self.grid.is_frozen(p))
            .collect();
        if let Some(pos) = self.factory.pick(candidates.len()).map(|i| candidates[i]) {
            log::trace!("burst spawned at {:?}", pos);
            self.grid.set(pos, Some(Item::burst()));
        }
    }

    /// Make sure at least one cluster of `min_match` cells exists.
    ///
    /// A fresh grid (`is_initial`) is redrawn up to `retry_limit` times; running
    /// out of attempts is reported but not fatal. Mid-game, no cluster means game over.
    pub fn ensure_playable(&mut self, is_initial: bool) -> Playability {
        let threshold = self.level.min_match;
        let result = if self.grid.has_any_cluster(threshold) {
            Playability::Playable
        } else if is_initial {
            self.regenerate(threshold)
        } else {
            self.trigger_game_over();
            Playability::GameOver
        };
        self.last_playability = result;
        result
    }

    fn regenerate(&mut self, threshold: usize) -> Playability {
        for attempt in 1..=self.config.retry_limit {
            self.grid
                .reroll_items(&mut self.factory, self.level.active_kinds);
            if self.grid.has_any_cluster(threshold) {
                log::debug!("grid regenerated after {} attempt(s)", attempt);
                return Playability::Regenerated { attempts: attempt };
            }
        }
        log::warn!(
            "no cluster of {} after {} regeneration attempts; continuing with current grid",
            threshold,
            self.config.retry_limit
        );
        Playability::Exhausted {
            attempts: self.config.retry_limit,
        }
    }

    fn trigger_game_over(&mut self) {
        log::info!(
            "game over at level {} with score {}",
            self.level.level,
            self.level.score
        );
        self.interactions_locked = true;
        self.game_over = true;
    }

    /// The presentation layer reports that no fall/pop animation is in flight.
    /// Runs the deferred no-moves check, if one is pending.
    pub fn animations_settled(&mut self) -> Option<Playability> {
        if !self.pending_move_check {
            return None;
        }
        self.pending_move_check = false;
        if self.level_complete || self.game_over {
            return None;
        }
        Some(self.ensure_playable(false))
    }

    /// Pointer hover feedback.
    pub fn hover(&mut self, pos: Pos) {
        if let Some(item) = self.grid.get_mut(pos) {
            item.wiggle = item.wiggle.max(0.2);
        }
    }

    /// Fade wiggle feedback over `dt` seconds.
    pub fn decay_wiggle(&mut self, dt: f32) {
        for pos in self.grid.positions() {
            if let Some(item) = self.grid.get_mut(pos) {
                if item.wiggle > 0.0 {
                    item.wiggle = (item.wiggle - dt * 1.8).max(0.0);
                }
            }
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        log::trace!("{:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Player selects `pos`.
    pub fn resolve_move(&mut self, pos: Pos) -> MoveResult {
        if self.interactions_locked || !self.grid.in_bounds(pos) {
            return MoveResult::empty(Outcome::Ignored, self.level.level_score);
        }
        self.set_phase(Phase::Validating);

        let burst = self
            .grid
            .get(pos)
            .is_some_and(|item| item.kind.is_burst())
            && !self.grid.is_frozen(pos);
        if burst {
            return self.resolve_burst(pos);
        }

        let cluster = self.grid.find_cluster(pos);
        if cluster.len() < self.level.min_match {
            for &cell in &cluster {
                if let Some(item) = self.grid.get_mut(cell) {
                    item.wiggle = 1.0;
                }
            }
            self.set_phase(Phase::Idle);
            let mut result = MoveResult::empty(Outcome::NoOp, self.level.level_score);
            result.nudged = cluster;
            return result;
        }

        self.set_phase(Phase::Resolving);
        let mut cracked = self.damage_armor(&cluster);
        let cleared = self.clear_cells(&cluster, &mut cracked);
        let score_delta = self.level.award(cluster.len());
        let falls = self.grid.apply_gravity(&mut self.factory, self.level.active_kinds);
        self.pending_move_check = true;

        self.set_phase(Phase::Settling);
        let mut result = MoveResult {
            outcome: Outcome::Popped,
            cleared,
            nudged: Vec::new(),
            cracked,
            score_delta,
            level_score: self.level.level_score,
            falls,
            celebration: Vec::new(),
        };
        self.settle(&mut result);
        self.set_phase(Phase::Idle);
        result
    }

    /// Burst: the burst cell plus random occupied cells, no score.
    fn resolve_burst(&mut self, origin: Pos) -> MoveResult {
        self.set_phase(Phase::Resolving);
        let mut others: Vec<Pos> = self
            .grid
            .occupied()
            .into_iter()
            .filter(|&p| p != origin)
            .collect();
        self.factory.shuffle(&mut others);
        let take = self.config.burst_batch.max(1) - 1;
        let batch: Vec<Pos> = iter::once(origin)
            .chain(others.into_iter().take(take))
            .collect();

        let mut cracked = self.damage_armor(&batch);
        let cleared = self.clear_cells(&batch, &mut cracked);
        let falls = self.grid.apply_gravity(&mut self.factory, self.level.active_kinds);
        self.pending_move_check = true;

        self.set_phase(Phase::Settling);
        let mut result = MoveResult {
            outcome: Outcome::Burst,
            cleared,
            nudged: Vec::new(),
            cracked,
            score_delta: 0,
            level_score: self.level.level_score,
            falls,
            celebration: Vec::new(),
        };
        self.settle(&mut result);
        self.set_phase(Phase::Idle);
        result
    }

    /// Level-complete and no-moves checks after the grid has settled.
    fn settle(&mut self, result: &mut MoveResult) {
        if self.level.is_complete() {
            log::debug!(
                "level {} complete with {} / {}",
                self.level.level,
                self.level.level_score,
                self.level.score_target
            );
            self.interactions_locked = true;
            self.level_complete = true;
            self.pending_move_check = false;
            result.outcome = Outcome::LevelComplete;
            result.celebration = self
                .grid
                .occupied()
                .into_iter()
                .filter_map(|pos| self.grid.get(pos).map(|&item| Cleared { pos, item }))
                .collect();
        } else if !self.config.defer_playability_check {
            self.pending_move_check = false;
            if self.ensure_playable(false) == Playability::GameOver {
                result.outcome = Outcome::GameOver;
            }
        }
    }

    /// One hit to every frozen cell among `cells` and their neighbours, at most once each.
    fn damage_armor(&mut self, cells: &[Pos]) -> Vec<Crack> {
        let mut hit = HashSet::new();
        let mut cracked = Vec::new();
        for &cell in cells {
            let targets: Vec<Pos> = iter::once(cell).chain(self.grid.neighbors(cell)).collect();
            for pos in targets {
                if !hit.insert(pos) {
                    continue;
                }
                if let Some(remaining) = self.grid.crack(pos) {
                    cracked.push(Crack { pos, remaining });
                }
            }
        }
        cracked
    }

    /// Empty every unfrozen cell in `cells`. A cell still frozen here (only a
    /// burst can pick one) keeps its item and takes one more hit.
    fn clear_cells(&mut self, cells: &[Pos], cracked: &mut Vec<Crack>) -> Vec<Cleared> {
        let mut cleared = Vec::with_capacity(cells.len());
        for &pos in cells {
            if self.grid.is_frozen(pos) {
                if let Some(remaining) = self.grid.crack(pos) {
                    cracked.push(Crack { pos, remaining });
                }
                continue;
            }
            if let Some(item) = self.grid.take(pos) {
                cleared.push(Cleared { pos, item });
            }
        }
        cleared
    }

    #[cfg(test)]
    pub(crate) fn load(&mut self, grid: Grid) {
        self.grid = grid;
        self.interactions_locked = false;
        self.game_over = false;
        self.level_complete = false;
        self.pending_move_check = false;
    }

    #[cfg(test)]
    pub(crate) fn level_mut(&mut self) -> &mut LevelState {
        &mut self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::grid_from_rows;
    use crate::item::ItemKind;

    fn deferred() -> EngineConfig {
        EngineConfig {
            defer_playability_check: true,
            ..EngineConfig::default()
        }
    }

    /// 10x15 board: a 2x2 donut block top-left, cookie/boba checkerboard elsewhere.
    fn donut_block_grid() -> Grid {
        let rows: Vec<String> = (0..15)
            .map(|r| {
                (0..10)
                    .map(|c| {
                        if r < 2 && c < 2 {
                            'D'
                        } else if (r + c) % 2 == 0 {
                            'C'
                        } else {
                            'B'
                        }
                    })
                    .collect()
            })
            .collect();
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        grid_from_rows(&refs)
    }

    fn checkerboard(cols: usize, rows: usize) -> Grid {
        let lines: Vec<String> = (0..rows)
            .map(|r| {
                (0..cols)
                    .map(|c| if (r + c) % 2 == 0 { 'C' } else { 'B' })
                    .collect()
            })
            .collect();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        grid_from_rows(&refs)
    }

    #[test]
    fn new_game_deals_a_full_playable_grid() {
        let engine = Engine::new(EngineConfig::default(), ItemFactory::new(1));
        assert!(engine.grid().is_full());
        assert_eq!((engine.grid().cols, engine.grid().rows), (10, 15));
        assert_eq!(*engine.level(), LevelState::new());
        assert!(engine.last_playability().has_move());
        assert!(engine.grid().has_any_cluster(3));
        assert!(!engine.is_locked());
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn popping_a_two_by_two_block_scores_forty() {
        let mut engine = Engine::new(deferred(), ItemFactory::new(2));
        engine.load(donut_block_grid());

        let cluster = engine.grid().find_cluster(Pos::new(0, 0));
        assert_eq!(cluster.len(), 4);

        let result = engine.resolve_move(Pos::new(0, 0));
        assert_eq!(result.outcome, Outcome::Popped);
        assert_eq!(result.score_delta, 40);
        assert_eq!(result.level_score, 40);
        assert_eq!(engine.level().score, 40);
        let cleared: HashSet<Pos> = result.cleared.iter().map(|c| c.pos).collect();
        let expected: HashSet<Pos> = [(0, 0), (1, 0), (0, 1), (1, 1)]
            .into_iter()
            .map(|(c, r)| Pos::new(c, r))
            .collect();
        assert_eq!(cleared, expected);
        assert!(result.cleared.iter().all(|c| c.item.kind == ItemKind::Donut));
        assert!(engine.grid().is_full());
        assert!(engine.pending_move_check());
        assert_eq!(engine.phase(), Phase::Idle);
        // Only the two popped columns moved, four new items spawned.
        assert!(result.falls.iter().all(|f| f.col < 2));
        assert_eq!(
            result
                .falls
                .iter()
                .filter(|f| f.origin == crate::gravity::FallOrigin::Spawned)
                .count(),
            4
        );
    }

    #[test]
    fn frozen_neighbour_takes_exactly_one_hit() {
        let mut engine = Engine::new(deferred(), ItemFactory::new(3));
        let mut grid = grid_from_rows(&["DDD", "DDD", "DDD"]);
        let center = Pos::new(1, 1);
        grid.set_armor(center, 2);
        engine.load(grid);

        assert!(!engine.grid().find_cluster(Pos::new(1, 0)).contains(&center));
        let result = engine.resolve_move(Pos::new(0, 0));
        assert_eq!(result.outcome, Outcome::Popped);
        assert_eq!(result.score_delta, 80);
        assert_eq!(result.cracked, vec![Crack { pos: center, remaining: 1 }]);
        assert_eq!(engine.grid().armor(center), 1);
        assert_eq!(
            engine.grid().get(center).map(|i| i.kind),
            Some(ItemKind::Donut)
        );
        assert!(engine.grid().is_full());
    }

    #[test]
    fn small_cluster_is_a_nudge() {
        let mut engine = Engine::new(deferred(), ItemFactory::new(4));
        engine.load(grid_from_rows(&["DDC", "CBB", "BCD"]));

        let result = engine.resolve_move(Pos::new(0, 0));
        assert_eq!(result.outcome, Outcome::NoOp);
        assert_eq!(result.nudged.len(), 2);
        assert_eq!(result.score_delta, 0);
        assert!(result.cleared.is_empty());
        assert_eq!(engine.level().score, 0);
        assert_eq!(engine.grid().get(Pos::new(0, 0)).map(|i| i.wiggle), Some(1.0));
        assert_eq!(engine.grid().get(Pos::new(2, 0)).map(|i| i.wiggle), Some(0.0));
        assert!(!engine.pending_move_check());
    }

    #[test]
    fn frozen_or_empty_selection_is_a_silent_nudge() {
        let mut engine = Engine::new(deferred(), ItemFactory::new(5));
        let mut grid = grid_from_rows(&["DDD", "D.D"]);
        grid.set_armor(Pos::new(0, 0), 2);
        engine.load(grid);

        let frozen = engine.resolve_move(Pos::new(0, 0));
        assert_eq!(frozen.outcome, Outcome::NoOp);
        assert!(frozen.nudged.is_empty());
        let empty = engine.resolve_move(Pos::new(1, 1));
        assert_eq!(empty.outcome, Outcome::NoOp);
        assert_eq!(engine.grid().armor(Pos::new(0, 0)), 2);
    }

    #[test]
    fn out_of_bounds_is_ignored() {
        let mut engine = Engine::new(deferred(), ItemFactory::new(6));
        let before = engine.grid().clone();
        let result = engine.resolve_move(Pos::new(10, 0));
        assert_eq!(result.outcome, Outcome::Ignored);
        assert_eq!(engine.resolve_move(Pos::new(0, 15)).outcome, Outcome::Ignored);
        for p in before.positions() {
            assert_eq!(engine.grid().get(p), before.get(p));
            assert_eq!(engine.grid().armor(p), before.armor(p));
        }
        assert_eq!(engine.level().score, 0);
    }

    #[test]
    fn reaching_the_target_completes_and_locks() {
        let mut engine = Engine::new(deferred(), ItemFactory::new(7));
        engine.load(donut_block_grid());
        engine.level_mut().level_score = 880;

        let result = engine.resolve_move(Pos::new(0, 0));
        assert_eq!(result.outcome, Outcome::LevelComplete);
        assert_eq!(result.level_score, 920);
        assert_eq!(result.celebration.len(), 150);
        assert!(engine.is_locked());
        assert!(engine.is_level_complete());
        assert!(!engine.pending_move_check());
        assert_eq!(engine.animations_settled(), None);

        assert_eq!(engine.resolve_move(Pos::new(3, 3)).outcome, Outcome::Ignored);

        let state = engine.advance_level();
        assert_eq!(state.level, 2);
        assert_eq!(state.level_score, 0);
        assert_eq!(state.score, 40);
        assert_eq!(state.score_target, 1300);
        assert!(!engine.is_locked());
        assert!(engine.grid().is_full());
        let bursts: Vec<Pos> = engine
            .grid()
            .positions()
            .filter(|&p| engine.grid().get(p).is_some_and(|i| i.kind.is_burst()))
            .collect();
        assert_eq!(bursts.len(), 1);
        assert!(bursts[0].row < BURST_SPAWN_ROWS);
        assert!(!engine.grid().is_frozen(bursts[0]));
    }

    #[test]
    fn min_match_schedule_through_advance_level() {
        let mut engine = Engine::new(deferred(), ItemFactory::new(8));
        for _ in 0..3 {
            engine.advance_level();
        }
        assert_eq!(engine.level().level, 4);
        assert_eq!(engine.level().min_match, 3);
        assert_eq!(engine.advance_level().min_match, 4);
        for _ in 0..3 {
            assert_eq!(engine.advance_level().min_match, 4);
        }
        assert_eq!(engine.advance_level().min_match, 5);
        assert_eq!(engine.level().level, 9);
        assert_eq!(engine.advance_level().min_match, 5);
        assert_eq!(engine.advance_level().min_match, 5);
    }

    #[test]
    fn mid_game_dead_board_is_game_over() {
        let mut engine = Engine::new(deferred(), ItemFactory::new(9));
        engine.load(checkerboard(10, 15));
        assert_eq!(engine.ensure_playable(false), Playability::GameOver);
        assert!(engine.is_game_over());
        assert!(engine.is_locked());
        assert_eq!(engine.resolve_move(Pos::new(0, 0)).outcome, Outcome::Ignored);

        let state = engine.restart();
        assert_eq!(state, LevelState::new());
        assert!(!engine.is_locked());
        assert!(!engine.is_game_over());
    }

    #[test]
    fn deferred_check_runs_when_animations_settle() {
        let mut engine = Engine::new(deferred(), ItemFactory::new(10));
        assert_eq!(engine.animations_settled(), None);

        engine.load(checkerboard(4, 4));
        engine.pending_move_check = true;
        assert_eq!(engine.animations_settled(), Some(Playability::GameOver));
        assert!(!engine.pending_move_check());
        assert_eq!(engine.animations_settled(), None);
    }

    #[test]
    fn immediate_check_reports_game_over_in_move_result() {
        // A single column of three: the refill can only be playable if all
        // three new items share a kind, which seed 11 does not deal.
        let config = EngineConfig {
            cols: 1,
            rows: 3,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config, ItemFactory::new(11));
        engine.load(grid_from_rows(&["D", "D", "D"]));
        engine.level_mut().active_kinds = 5;
        let result = engine.resolve_move(Pos::new(0, 0));
        assert_eq!(result.outcome, Outcome::GameOver);
        assert!(engine.is_game_over());
        assert!(engine.is_locked());
        assert!(!engine.grid().has_any_cluster(3));
        assert!(!engine.pending_move_check());
        assert_eq!(engine.last_playability(), Playability::GameOver);
    }

    #[test]
    fn initial_retries_are_bounded_and_reported() {
        let config = EngineConfig {
            retry_limit: 0,
            ..deferred()
        };
        let mut engine = Engine::new(config, ItemFactory::new(12));
        engine.load(checkerboard(10, 15));
        assert_eq!(
            engine.ensure_playable(true),
            Playability::Exhausted { attempts: 0 }
        );
        assert!(!engine.is_game_over());
        assert!(!engine.is_locked());

        let mut engine = Engine::new(deferred(), ItemFactory::new(13));
        engine.load(checkerboard(10, 15));
        match engine.ensure_playable(true) {
            Playability::Regenerated { attempts } => assert!((1..=50).contains(&attempts)),
            other => panic!("expected regeneration, got {other:?}"),
        }
        assert!(engine.grid().has_any_cluster(engine.level().min_match));
    }

    #[test]
    fn burst_clears_a_batch_without_score() {
        let mut engine = Engine::new(deferred(), ItemFactory::new(14));
        let mut grid = checkerboard(10, 15);
        grid.set(Pos::new(4, 0), Some(Item::burst()));
        engine.load(grid);

        let result = engine.resolve_move(Pos::new(4, 0));
        assert_eq!(result.outcome, Outcome::Burst);
        assert_eq!(result.cleared.len(), 6);
        assert_eq!(result.cleared[0].pos, Pos::new(4, 0));
        assert!(result.cleared[0].item.kind.is_burst());
        let distinct: HashSet<Pos> = result.cleared.iter().map(|c| c.pos).collect();
        assert_eq!(distinct.len(), 6);
        assert_eq!(result.score_delta, 0);
        assert_eq!(engine.level().score, 0);
        assert!(engine.grid().is_full());
        assert!(engine.pending_move_check());
    }

    #[test]
    fn burst_on_small_board_and_frozen_targets() {
        let config = EngineConfig {
            cols: 3,
            rows: 1,
            ..deferred()
        };
        let mut engine = Engine::new(config, ItemFactory::new(15));
        let mut grid = grid_from_rows(&["*DC"]);
        grid.set_armor(Pos::new(2, 0), 2);
        engine.load(grid);

        let result = engine.resolve_move(Pos::new(0, 0));
        assert_eq!(result.outcome, Outcome::Burst);
        // Burst and donut cleared; the frozen cookie takes the radiated hit,
        // then a second one while clearing, and keeps its item.
        assert_eq!(result.cleared.len(), 2);
        assert_eq!(
            result.cracked,
            vec![
                Crack { pos: Pos::new(2, 0), remaining: 1 },
                Crack { pos: Pos::new(2, 0), remaining: 0 },
            ]
        );
        assert_eq!(engine.grid().armor(Pos::new(2, 0)), 0);
        assert_eq!(
            engine.grid().get(Pos::new(2, 0)).map(|i| i.kind),
            Some(ItemKind::Cookie)
        );
        assert!(engine.grid().is_full());
    }

    #[test]
    fn score_never_decreases_over_random_play() {
        let mut engine = Engine::new(deferred(), ItemFactory::new(16));
        let mut picker = ItemFactory::new(17);
        let mut last_score = 0;
        for _ in 0..400 {
            if engine.is_level_complete() {
                engine.advance_level();
            } else if engine.is_game_over() {
                engine.restart();
                last_score = 0;
            }
            let pos = Pos::new(
                picker.pick(engine.grid().cols).unwrap_or(0),
                picker.pick(engine.grid().rows).unwrap_or(0),
            );
            let before = engine.level().score;
            let result = engine.resolve_move(pos);
            match result.outcome {
                Outcome::Popped | Outcome::LevelComplete => {
                    assert_eq!(result.score_delta, 10 * result.cleared.len() as u32);
                    assert!(result.cleared.len() >= engine.level().min_match);
                }
                _ => assert_eq!(result.score_delta, 0),
            }
            assert_eq!(engine.level().score, before + result.score_delta);
            assert!(engine.level().score >= last_score);
            last_score = engine.level().score;
            assert!(engine.grid().is_full());
            engine.animations_settled();
        }
    }

    #[test]
    fn hover_and_decay_wiggle() {
        let mut engine = Engine::new(deferred(), ItemFactory::new(18));
        let p = Pos::new(2, 2);
        engine.hover(p);
        assert_eq!(engine.grid().get(p).map(|i| i.wiggle), Some(0.2));
        engine.decay_wiggle(1.0);
        assert_eq!(engine.grid().get(p).map(|i| i.wiggle), Some(0.0));
    }
}
