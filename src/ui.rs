//! Rendering: board, sidebar and overlays. Pop fade via TachyonFX.

use crate::app::{Screen, Stage};
use crate::engine::{Cleared, Crack, Engine};
use crate::gravity::{Fall, FallOrigin};
use crate::grid::Pos;
use crate::item::{Item, ItemKind};
use crate::level::format_score;
use crate::theme::Theme;
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Gauge, Paragraph, Widget};
use std::collections::HashSet;
use std::time::Instant;
use tachyonfx::{
    CellFilter, Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx, ref_count,
};

/// Terminal columns per grid cell; emoji are double width.
pub const CELL_W: u16 = 2;

const SIDEBAR_WIDTH: u16 = 26;

/// Everything the renderer reads for one frame.
pub struct View<'a> {
    pub engine: &'a Engine,
    pub theme: &'a Theme,
    pub screen: Screen,
    pub paused: bool,
    pub cursor: Pos,
    pub hint: &'a [Pos],
    pub animation: Option<&'a crate::app::Animation>,
    pub ascii: bool,
    pub pop_ms: u64,
    pub fall_ms: u64,
    pub now: Instant,
}

impl View<'_> {
    fn stage(&self) -> Stage {
        self.animation
            .map(|a| a.stage(self.now, self.pop_ms, self.fall_ms))
            .unwrap_or(Stage::Done)
    }

    /// Falls still being shown; empty once the animation has caught up.
    fn moving(&self) -> &[Fall] {
        match self.animation {
            Some(a) if !a.is_celebration() && self.stage() != Stage::Done => &a.falls,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Mark {
    cursor: bool,
    hint: bool,
}

fn board_outer_size(cols: usize, rows: usize) -> (u16, u16) {
    let cols = u16::try_from(cols).unwrap_or(u16::MAX);
    let rows = u16::try_from(rows).unwrap_or(u16::MAX);
    (
        cols.saturating_mul(CELL_W).saturating_add(2),
        rows.saturating_add(2),
    )
}

/// Board (with border) and sidebar, centred in `area`.
fn split(area: Rect, cols: usize, rows: usize) -> (Rect, Rect) {
    let (bw, bh) = board_outer_size(cols, rows);
    let total_w = bw.saturating_add(SIDEBAR_WIDTH);

    let horiz_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);

    let vert_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(bh),
            Constraint::Fill(1),
        ])
        .split(horiz_chunks[1]);

    let inner = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(bw), Constraint::Length(SIDEBAR_WIDTH)])
        .split(vert_chunks[1]);
    (inner[0], inner[1])
}

/// Screen rect covered by grid cells, inside the board border.
pub fn board_rect(area: Rect, cols: usize, rows: usize) -> Rect {
    let (outer, _) = split(area, cols, rows);
    let inner = Block::default().borders(Borders::ALL).inner(outer);
    let (bw, bh) = board_outer_size(cols, rows);
    Rect {
        x: inner.x,
        y: inner.y,
        width: bw.saturating_sub(2).min(inner.width),
        height: bh.saturating_sub(2).min(inner.height),
    }
}

/// Map a terminal position to the grid cell under it.
pub fn cell_at(board: Rect, cols: usize, rows: usize, x: u16, y: u16) -> Option<Pos> {
    if !board.contains(Position::new(x, y)) {
        return None;
    }
    let col = usize::from((x - board.x) / CELL_W);
    let row = usize::from(y - board.y);
    (col < cols && row < rows).then(|| Pos::new(col, row))
}

fn mix(a: Color, b: Color) -> Color {
    match (a, b) {
        (Color::Rgb(r1, g1, b1), Color::Rgb(r2, g2, b2)) => Color::Rgb(
            ((u16::from(r1) + u16::from(r2)) / 2) as u8,
            ((u16::from(g1) + u16::from(g2)) / 2) as u8,
            ((u16::from(b1) + u16::from(b2)) / 2) as u8,
        ),
        _ => a,
    }
}

fn symbol(kind: ItemKind, armor: u8, ascii: bool) -> String {
    match (ascii, armor) {
        (true, 0) => kind.ascii().to_string(),
        // Keep the first letter so the kind stays readable under the ice.
        (true, _) => format!("{}#", &kind.ascii()[..1]),
        (false, _) => kind.glyph().to_string(),
    }
}

/// Draw one item (or an empty slot) at grid `col`, `row`. Rows above the board are skipped.
fn draw_cell(
    buf: &mut Buffer,
    board: Rect,
    view: &View,
    col: usize,
    row: isize,
    item: Option<&Item>,
    armor: u8,
    mark: Mark,
) {
    let (Ok(col), Ok(row)) = (u16::try_from(col), u16::try_from(row)) else {
        return;
    };
    let x = board.x.saturating_add(col.saturating_mul(CELL_W));
    let y = board.y.saturating_add(row);
    if x.saturating_add(CELL_W) > board.right() || y >= board.bottom() {
        return;
    }
    let theme = view.theme;
    let mut bg = item.map_or(theme.bg, |i| theme.item_color(i.kind, i.shade));
    bg = match armor {
        0 => bg,
        1 => mix(theme.frost, bg),
        _ => theme.frost,
    };
    if item.is_some_and(|i| i.wiggle > 0.0) {
        bg = mix(bg, theme.main_fg);
    }
    let mut style = Style::default().fg(Color::Black).bg(bg);
    if mark.hint {
        style = style.add_modifier(Modifier::UNDERLINED | Modifier::BOLD);
    }
    if mark.cursor {
        style = style.fg(theme.cursor).add_modifier(Modifier::REVERSED);
    }
    let text = item.map_or_else(|| "  ".to_string(), |i| symbol(i.kind, armor, view.ascii));
    buf.set_string(x, y, text, style);
    buf[(x + 1, y)].set_style(style);
}

/// Draw the current screen. Returns the board rect for mouse mapping.
pub fn draw(
    frame: &mut Frame,
    view: &View,
    pop_effect: &mut Option<Effect>,
    pop_process_time: &mut Option<Instant>,
) -> Rect {
    let area = frame.area();
    let grid = view.engine.grid();
    let (board_outer, sidebar_area) = split(area, grid.cols, grid.rows);
    let board = board_rect(area, grid.cols, grid.rows);

    draw_board(frame, view, board_outer, board);
    if view.stage() == Stage::Pop {
        apply_pop_effect(frame, view, board, pop_effect, pop_process_time);
    }
    draw_sidebar(frame, view, sidebar_area);

    let level = view.engine.level();
    match view.screen {
        Screen::Playing if view.paused => draw_message(
            frame,
            view.theme,
            board_outer,
            " Paused ",
            &[String::new(), "P — Resume    Q — Quit".to_string()],
        ),
        Screen::Playing => {}
        Screen::LevelClear => draw_message(
            frame,
            view.theme,
            board_outer,
            &format!(" Level {} complete! ", level.level),
            &[
                format!("Score {}", format_score(level.score)),
                String::new(),
                "N — Next level".to_string(),
                "R — Restart  Q — Quit".to_string(),
            ],
        ),
        Screen::GameOver => draw_message(
            frame,
            view.theme,
            board_outer,
            " No more moves ",
            &[
                format!("Final score {}", format_score(level.score)),
                format!("Reached level {}", level.level),
                String::new(),
                "R — Restart  Q — Quit".to_string(),
            ],
        ),
    }
    board
}

fn draw_board(frame: &mut Frame, view: &View, outer: Rect, board: Rect) {
    let theme = view.theme;
    let grid = view.engine.grid();
    let title = format!(" Popem  Level {} ", view.engine.level().level);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled(title, theme.title));
    block.render(outer, frame.buffer_mut());

    let stage = view.stage();
    let moving = view.moving();
    // Destinations of in-flight items stay empty until the item lands.
    let hidden: HashSet<Pos> = moving.iter().map(|f| Pos::new(f.col, f.to_row)).collect();
    let hint: HashSet<Pos> = view.hint.iter().copied().collect();
    let show_cursor = view.screen == Screen::Playing && !view.paused;

    let buf = frame.buffer_mut();
    buf.set_style(board, Style::default().bg(theme.bg));

    for pos in grid.positions() {
        let item = if hidden.contains(&pos) { None } else { grid.get(pos) };
        let mark = Mark {
            cursor: show_cursor && pos == view.cursor,
            hint: hint.contains(&pos),
        };
        draw_cell(buf, board, view, pos.col, pos.row as isize, item, grid.armor(pos), mark);
    }

    match (stage, view.animation) {
        (Stage::Pop, Some(anim)) if !anim.is_celebration() => {
            for cleared in &anim.cleared {
                let Cleared { pos, item } = cleared;
                draw_cell(buf, board, view, pos.col, pos.row as isize, Some(item), 0, Mark::default());
            }
            for fall in moving {
                if let FallOrigin::Row(row) = fall.origin {
                    draw_cell(buf, board, view, fall.col, row as isize, Some(&fall.item), 0, Mark::default());
                }
            }
            for crack in &anim.cracked {
                flash_crack(buf, board, theme, crack);
            }
        }
        (Stage::Fall(t), _) => {
            for fall in moving {
                let from = fall.start_row() as f32;
                let row = (from + (fall.to_row as f32 - from) * t).round() as isize;
                // Spawned items entering a lower segment must not paint over the ice above it.
                if row < 0 || grid.is_frozen(Pos::new(fall.col, row as usize)) {
                    continue;
                }
                draw_cell(buf, board, view, fall.col, row, Some(&fall.item), 0, Mark::default());
            }
        }
        _ => {}
    }
}

fn crack_flash(theme: &Theme) -> Color {
    mix(theme.frost, theme.cursor)
}

/// Whiten the background of a cell whose ice was just hit.
fn flash_crack(buf: &mut Buffer, board: Rect, theme: &Theme, crack: &Crack) {
    let (Ok(col), Ok(row)) = (u16::try_from(crack.pos.col), u16::try_from(crack.pos.row)) else {
        return;
    };
    let x = board.x.saturating_add(col.saturating_mul(CELL_W));
    let y = board.y.saturating_add(row);
    if x.saturating_add(CELL_W) > board.right() || y >= board.bottom() {
        return;
    }
    let style = Style::default()
        .bg(crack_flash(theme))
        .add_modifier(Modifier::BOLD);
    for dx in 0..CELL_W {
        buf[(x + dx, y)].set_style(style);
    }
}

/// Buffer (x, y) positions covered by `cells` (both columns of each cell).
fn cell_buffer_positions(board: Rect, cells: &[Cleared]) -> HashSet<(u16, u16)> {
    let mut set = HashSet::new();
    for cleared in cells {
        let (Ok(col), Ok(row)) = (u16::try_from(cleared.pos.col), u16::try_from(cleared.pos.row))
        else {
            continue;
        };
        let x = board.x.saturating_add(col.saturating_mul(CELL_W));
        let y = board.y.saturating_add(row);
        for dx in 0..CELL_W {
            if x + dx < board.right() && y < board.bottom() {
                set.insert((x + dx, y));
            }
        }
    }
    set
}

/// Create or update the pop fade and process it (fade popped cells to bg).
/// A level clear fades the whole board for twice as long.
fn apply_pop_effect(
    frame: &mut Frame,
    view: &View,
    board: Rect,
    pop_effect: &mut Option<Effect>,
    pop_process_time: &mut Option<Instant>,
) {
    let Some(anim) = view.animation else {
        return;
    };
    let delta = pop_process_time
        .map(|t| view.now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    let tfx_delta = TfxDuration::from_millis(delta_ms);
    *pop_process_time = Some(view.now);

    if pop_effect.is_none() {
        let (cells, ms) = if anim.is_celebration() {
            (&anim.celebration, view.pop_ms * 2)
        } else {
            (&anim.cleared, view.pop_ms)
        };
        let fading = cell_buffer_positions(board, cells);
        let filter = CellFilter::PositionFn(ref_count(move |pos: Position| {
            fading.contains(&(pos.x, pos.y))
        }));
        let bg = view.theme.bg;
        let ms = u32::try_from(ms).unwrap_or(u32::MAX);
        let effect = fx::fade_to(bg, bg, (ms, Interpolation::Linear))
            .with_filter(filter)
            .with_area(board);
        *pop_effect = Some(effect);
    }

    if let Some(effect) = pop_effect {
        frame.render_effect(effect, board, tfx_delta);
    }
}

fn draw_sidebar(frame: &mut Frame, view: &View, area: Rect) {
    let theme = view.theme;
    let level = view.engine.level();
    let title_style = Style::default().fg(theme.title);
    let fg_style = Style::default().fg(theme.main_fg);
    let border_style = Style::default().fg(theme.div_line).bg(theme.bg);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7), // Stats
            Constraint::Length(1), // gap
            Constraint::Length(3), // Progress
            Constraint::Length(1), // gap
            Constraint::Length(3), // Sweets in play
            Constraint::Length(1), // gap
            Constraint::Fill(1),   // Help
        ])
        .split(area);

    let stat = |label: &'static str, value: String| {
        Line::from(vec![
            Span::styled(label, title_style),
            Span::styled(value, fg_style),
        ])
    };
    let stats = vec![
        stat("Score:  ", format_score(level.score)),
        stat("Level:  ", level.level.to_string()),
        stat("Target: ", format!("{}/{}", level.level_score, level.score_target)),
        stat("Match:  ", format!("{}+", level.min_match)),
        stat("Frozen: ", view.engine.grid().frozen_count().to_string()),
    ];
    Paragraph::new(stats)
        .block(Block::default().borders(Borders::ALL).border_style(border_style))
        .render(chunks[0], frame.buffer_mut());

    let progress = level.progress();
    Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(Span::styled("Progress", theme.title)),
        )
        .gauge_style(Style::default().fg(theme.title).bg(theme.bg))
        .ratio(progress)
        .label(format!("{}%", (progress * 100.0).round() as u32))
        .render(chunks[2], frame.buffer_mut());

    let kinds: Vec<Span> = ItemKind::PALETTE
        .iter()
        .take(level.active_kinds)
        .flat_map(|&kind| {
            let text = if view.ascii { kind.ascii() } else { kind.glyph() };
            [
                Span::styled(text, Style::default().fg(Color::Black).bg(theme.item_color(kind, 0))),
                Span::raw(" "),
            ]
        })
        .collect();
    Paragraph::new(Line::from(kinds))
        .block(Block::default().borders(Borders::ALL).border_style(border_style))
        .render(chunks[4], frame.buffer_mut());

    let help_style = Style::default().fg(theme.inactive_fg);
    let help: Vec<Line> = [
        "Space/click  pop",
        "Arrows/hjkl  move",
        "?            hint",
        "P            pause",
        "R            restart",
        "Q            quit",
    ]
    .into_iter()
    .map(|s| Line::from(Span::styled(s, help_style)))
    .collect();
    Paragraph::new(help).render(chunks[6], frame.buffer_mut());
}

/// Centered message box over `area`.
fn draw_message(frame: &mut Frame, theme: &Theme, area: Rect, title: &str, body: &[String]) {
    let popup_w = 28u16;
    let popup_h = body.len() as u16 + 4;
    let popup = Rect {
        x: area.x + area.width.saturating_sub(popup_w) / 2,
        y: area.y + area.height.saturating_sub(popup_h) / 2,
        width: popup_w.min(area.width),
        height: popup_h.min(area.height),
    };
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            title.to_string(),
            Style::default()
                .fg(Color::Black)
                .bg(theme.title)
                .add_modifier(Modifier::BOLD),
        )),
    ];
    lines.extend(
        body.iter()
            .map(|s| Line::from(Span::styled(s.clone(), Style::default().fg(theme.main_fg)))),
    );
    Clear.render(popup, frame.buffer_mut());
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg)),
        )
        .render(popup, frame.buffer_mut());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::item::ItemFactory;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    #[test]
    fn board_is_centred_and_sized_by_cells() {
        let area = Rect::new(0, 0, 100, 40);
        let board = board_rect(area, 10, 15);
        assert_eq!((board.width, board.height), (20, 15));
        // 22 wide board + 26 sidebar, centred in 100 columns.
        assert_eq!(board.x, 26 + 1);
        // 23 spare rows split between the two fills.
        assert!(board.y == 12 || board.y == 13);
    }

    #[test]
    fn mouse_maps_to_double_width_cells() {
        let board = Rect::new(10, 5, 20, 15);
        assert_eq!(cell_at(board, 10, 15, 10, 5), Some(Pos::new(0, 0)));
        assert_eq!(cell_at(board, 10, 15, 11, 5), Some(Pos::new(0, 0)));
        assert_eq!(cell_at(board, 10, 15, 12, 7), Some(Pos::new(1, 2)));
        assert_eq!(cell_at(board, 10, 15, 29, 19), Some(Pos::new(9, 14)));
        assert_eq!(cell_at(board, 10, 15, 30, 5), None);
        assert_eq!(cell_at(board, 10, 15, 9, 5), None);
        assert_eq!(cell_at(board, 10, 15, 10, 20), None);
    }

    #[test]
    fn frozen_ascii_keeps_kind_letter() {
        assert_eq!(symbol(ItemKind::Cookie, 2, true), "C#");
        assert_eq!(symbol(ItemKind::Cookie, 0, true), "Co");
        assert_eq!(symbol(ItemKind::Boba, 1, false), "🧋");
    }

    #[test]
    fn renders_sidebar_and_game_over() {
        let engine = Engine::new(EngineConfig::default(), ItemFactory::new(3));
        let theme = Theme::default();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let mut effect = None;
        let mut effect_time = None;
        let mut board = Rect::default();
        terminal
            .draw(|f| {
                let view = View {
                    engine: &engine,
                    theme: &theme,
                    screen: Screen::GameOver,
                    paused: false,
                    cursor: Pos::new(0, 0),
                    hint: &[],
                    animation: None,
                    ascii: true,
                    pop_ms: 350,
                    fall_ms: 400,
                    now: Instant::now(),
                };
                board = draw(f, &view, &mut effect, &mut effect_time);
            })
            .unwrap();
        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("Score:"));
        assert!(text.contains("No more moves"));
        assert_eq!((board.width, board.height), (20, 15));
        assert!(effect.is_none());
    }

    #[test]
    fn cracked_ice_flashes_while_popping() {
        let engine = Engine::new(EngineConfig::default(), ItemFactory::new(3));
        let theme = Theme::default();
        let start = Instant::now();
        let animation = crate::app::Animation {
            started: start,
            cleared: Vec::new(),
            falls: Vec::new(),
            cracked: vec![Crack { pos: Pos::new(3, 4), remaining: 1 }],
            celebration: Vec::new(),
        };
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        let mut effect = None;
        let mut effect_time = None;
        let mut board = Rect::default();
        terminal
            .draw(|f| {
                let view = View {
                    engine: &engine,
                    theme: &theme,
                    screen: Screen::Playing,
                    paused: false,
                    cursor: Pos::new(0, 0),
                    hint: &[],
                    animation: Some(&animation),
                    ascii: true,
                    pop_ms: 350,
                    fall_ms: 400,
                    now: start,
                };
                board = draw(f, &view, &mut effect, &mut effect_time);
            })
            .unwrap();
        let buf = terminal.backend().buffer();
        let (x, y) = (board.x + 3 * CELL_W, board.y + 4);
        assert_eq!(buf[(x, y)].bg, crack_flash(&theme));
        assert_eq!(buf[(x + 1, y)].bg, crack_flash(&theme));
        // Neighbouring cell is drawn normally.
        assert_ne!(buf[(x + CELL_W, y)].bg, crack_flash(&theme));
    }
}
