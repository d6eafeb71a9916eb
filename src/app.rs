//! App: terminal init, main loop, animation clock and input handling.

use crate::engine::{Cleared, Crack, Engine, MoveResult, Outcome, Playability};
use crate::gravity::Fall;
use crate::grid::Pos;
use crate::input::{key_to_action, Action};
use crate::item::ItemFactory;
use crate::theme::Theme;
use crate::GameConfig;
use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use ratatui::DefaultTerminal;
use std::time::{Duration, Instant};
use tachyonfx::Effect;

/// Target frame time (~60 FPS).
const FRAME_MS: u64 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    LevelClear,
    GameOver,
}

/// Where an animation is at a given instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stage {
    /// Popped cells fading; survivors still at their old rows.
    Pop,
    /// Items travelling to their new rows; progress in `[0, 1]`.
    Fall(f32),
    Done,
}

/// Presentation of one resolved move. The engine's grid is already final;
/// this only remembers what to show while the eye catches up.
#[derive(Debug, Clone)]
pub struct Animation {
    pub started: Instant,
    pub cleared: Vec<Cleared>,
    pub falls: Vec<Fall>,
    /// Ice hits, flashed while the popped cells fade.
    pub cracked: Vec<Crack>,
    /// Non-empty when the level was won: the whole board fades out.
    pub celebration: Vec<Cleared>,
}

impl Animation {
    pub fn from_result(result: MoveResult, now: Instant) -> Self {
        Self {
            started: now,
            cleared: result.cleared,
            falls: result.falls,
            cracked: result.cracked,
            celebration: result.celebration,
        }
    }

    pub fn is_celebration(&self) -> bool {
        !self.celebration.is_empty()
    }

    pub fn stage(&self, now: Instant, pop_ms: u64, fall_ms: u64) -> Stage {
        let elapsed = now.saturating_duration_since(self.started).as_millis() as u64;
        if self.is_celebration() {
            return if elapsed < pop_ms * 2 {
                Stage::Pop
            } else {
                Stage::Done
            };
        }
        if elapsed < pop_ms {
            Stage::Pop
        } else if elapsed < pop_ms + fall_ms && !self.falls.is_empty() {
            let t = (elapsed - pop_ms) as f32 / fall_ms.max(1) as f32;
            // Ease in: items accelerate as they drop.
            Stage::Fall((t * t).min(1.0))
        } else {
            Stage::Done
        }
    }
}

pub struct App {
    config: GameConfig,
    theme: Theme,
    engine: Engine,
    screen: Screen,
    paused: bool,
    cursor: Pos,
    /// Cells highlighted by the hint key until the next move.
    hint: Vec<Pos>,
    animation: Option<Animation>,
    /// TachyonFX fade for popped cells (created when the animation starts drawing).
    pop_effect: Option<Effect>,
    /// Last time we processed the pop effect (for delta).
    pop_effect_time: Option<Instant>,
    /// Board rect from the last frame, for mapping mouse positions to cells.
    board_area: Rect,
    last_frame: Instant,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Self {
        let factory = config
            .seed
            .map(ItemFactory::new)
            .unwrap_or_default();
        let engine = Engine::new(config.engine_config(), factory);
        Self {
            config,
            theme,
            engine,
            screen: Screen::Playing,
            paused: false,
            cursor: Pos::new(0, 0),
            hint: Vec::new(),
            animation: None,
            pop_effect: None,
            pop_effect_time: None,
            board_area: Rect::default(),
            last_frame: Instant::now(),
        }
    }

    fn reset_presentation(&mut self) {
        self.screen = Screen::Playing;
        self.paused = false;
        self.hint.clear();
        self.animation = None;
        self.pop_effect = None;
        self.pop_effect_time = None;
        let grid = self.engine.grid();
        self.cursor = Pos::new(
            self.cursor.col.min(grid.cols - 1),
            self.cursor.row.min(grid.rows - 1),
        );
    }

    fn move_cursor(&mut self, dc: isize, dr: isize) {
        let grid = self.engine.grid();
        let col = self
            .cursor
            .col
            .saturating_add_signed(dc)
            .min(grid.cols - 1);
        let row = self
            .cursor
            .row
            .saturating_add_signed(dr)
            .min(grid.rows - 1);
        self.cursor = Pos::new(col, row);
        self.engine.hover(self.cursor);
    }

    fn pop_at(&mut self, pos: Pos, now: Instant) {
        let result = self.engine.resolve_move(pos);
        match result.outcome {
            Outcome::Ignored | Outcome::NoOp => return,
            Outcome::Popped | Outcome::Burst | Outcome::LevelComplete | Outcome::GameOver => {}
        }
        self.hint.clear();
        if self.config.no_animation {
            match result.outcome {
                Outcome::LevelComplete => self.screen = Screen::LevelClear,
                Outcome::GameOver => self.screen = Screen::GameOver,
                _ => {}
            }
            return;
        }
        self.animation = Some(Animation::from_result(result, now));
        self.pop_effect = None;
        self.pop_effect_time = None;
    }

    /// Retire finished animations and, once nothing is in flight, let the engine
    /// run its deferred checks.
    fn tick_animation(&mut self, now: Instant) {
        let done = self
            .animation
            .as_ref()
            .is_some_and(|a| a.stage(now, self.config.pop_ms, self.config.fall_ms) == Stage::Done);
        if done {
            self.animation = None;
            self.pop_effect = None;
            self.pop_effect_time = None;
        }
        if self.animation.is_some() || self.screen != Screen::Playing {
            return;
        }
        if self.engine.animations_settled() == Some(Playability::GameOver) {
            self.screen = Screen::GameOver;
        } else if self.engine.is_level_complete() {
            self.screen = Screen::LevelClear;
        } else if self.engine.is_game_over() {
            self.screen = Screen::GameOver;
        }
    }

    /// Returns true when the app should exit.
    fn apply_action(&mut self, action: Action, now: Instant) -> bool {
        if action == Action::Quit {
            return true;
        }
        match self.screen {
            Screen::Playing => {
                if action == Action::Pause {
                    self.paused = !self.paused;
                    return false;
                }
                if self.paused {
                    return false;
                }
                match action {
                    Action::Left => self.move_cursor(-1, 0),
                    Action::Right => self.move_cursor(1, 0),
                    Action::Up => self.move_cursor(0, -1),
                    Action::Down => self.move_cursor(0, 1),
                    Action::Pop => self.pop_at(self.cursor, now),
                    Action::Hint => {
                        let best = self.engine.grid().largest_cluster();
                        self.hint = if best.len() >= self.engine.level().min_match {
                            best
                        } else {
                            Vec::new()
                        };
                    }
                    Action::Restart => {
                        self.engine.new_game();
                        self.reset_presentation();
                    }
                    _ => {}
                }
            }
            Screen::LevelClear => {
                match action {
                    Action::NextLevel | Action::Pop => {
                        self.engine.advance_level();
                        self.reset_presentation();
                    }
                    Action::Restart => {
                        self.engine.new_game();
                        self.reset_presentation();
                    }
                    _ => {}
                }
            }
            Screen::GameOver => {
                if matches!(action, Action::Restart | Action::Pop) {
                    self.engine.restart();
                    self.reset_presentation();
                }
            }
        }
        false
    }

    fn handle_mouse(&mut self, mouse: MouseEvent, now: Instant) {
        let grid = self.engine.grid();
        let Some(pos) = crate::ui::cell_at(self.board_area, grid.cols, grid.rows, mouse.column, mouse.row)
        else {
            return;
        };
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.cursor = pos;
                if self.screen == Screen::Playing && !self.paused {
                    self.pop_at(pos, now);
                }
            }
            MouseEventKind::Moved => {
                self.cursor = pos;
                self.engine.hover(pos);
            }
            _ => {}
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{DisableMouseCapture, EnableMouseCapture},
            execute,
            terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;

        let mut terminal = ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = self.run_loop(&mut terminal);

        // Restore
        execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)?;
        disable_raw_mode()?;
        if let Err(err) = &result {
            log::error!("session ended with error: {:#}", err);
        }

        result
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let now = Instant::now();
            let dt = now.duration_since(self.last_frame).as_secs_f32().min(0.05);
            self.last_frame = now;
            if !self.paused {
                self.engine.decay_wiggle(dt);
            }
            self.tick_animation(now);

            let view = crate::ui::View {
                engine: &self.engine,
                theme: &self.theme,
                screen: self.screen,
                paused: self.paused,
                cursor: self.cursor,
                hint: &self.hint,
                animation: self.animation.as_ref(),
                ascii: self.config.ascii,
                pop_ms: self.config.pop_ms,
                fall_ms: self.config.fall_ms,
                now,
            };
            let pop_effect = &mut self.pop_effect;
            let pop_effect_time = &mut self.pop_effect_time;
            let board_area = &mut self.board_area;
            terminal.draw(|f| {
                *board_area = crate::ui::draw(f, &view, pop_effect, pop_effect_time);
            })?;

            let timeout = Duration::from_millis(FRAME_MS).saturating_sub(now.elapsed());
            if event::poll(timeout)? {
                while event::poll(Duration::ZERO)? {
                    let now = Instant::now();
                    match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            if self.apply_action(key_to_action(key), now) {
                                return Ok(());
                            }
                        }
                        Event::Mouse(mouse) => self.handle_mouse(mouse, now),
                        _ => {}
                    }
                }
            }
        }
    }
}
