//! Popem: cluster-pop puzzle game in the terminal.

mod app;
mod cluster;
mod engine;
mod gravity;
mod grid;
mod input;
mod item;
mod level;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::File;
use std::path::Path;

/// Options derived from CLI that affect the game session.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub cols: usize,
    pub rows: usize,
    pub seed: Option<u64>,
    pub start_level: u32,
    pub no_animation: bool,
    pub fall_ms: u64,
    pub pop_ms: u64,
    pub ascii: bool,
}

impl GameConfig {
    pub fn engine_config(&self) -> engine::EngineConfig {
        engine::EngineConfig {
            cols: self.cols,
            rows: self.rows,
            defer_playability_check: !self.no_animation,
            start_level: self.start_level,
            ..engine::EngineConfig::default()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = args.log_file.as_deref() {
        setup_logging(path, args.log_level)?;
    }
    let theme = theme::Theme::load(args.theme.as_deref(), args.palette).unwrap_or_else(|err| {
        log::warn!("theme not loaded, using defaults: {}", err);
        theme::Theme::default()
    });
    let config = GameConfig {
        cols: usize::from(args.cols.max(1)),
        rows: usize::from(args.rows.max(1)),
        seed: args.seed,
        start_level: args.level.max(1),
        no_animation: args.no_animation,
        fall_ms: args.fall_ms,
        pop_ms: args.pop_ms,
        ascii: args.ascii,
    };
    log::info!("starting with {:?}", config);
    let mut app = App::new(config, theme);
    app.run()?;
    Ok(())
}

/// The terminal belongs to the UI, so logs only ever go to a file.
fn setup_logging(path: &Path, level: LogLevel) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating log file {}", path.display()))?;
    WriteLogger::init(
        level.into(),
        ConfigBuilder::new()
            .set_target_level(LevelFilter::Error)
            .build(),
        file,
    )
    .context("installing logger")?;
    Ok(())
}

/// Cluster-pop puzzle game in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "popem",
    version,
    about = "Cluster-pop puzzle in the terminal. Pop groups of matching sweets, crack frozen tiles, reach the target score.",
    long_about = "Popem is a terminal cluster-pop puzzle.\n\n\
        Select a group of at least three touching sweets of the same kind to pop it. \
        Items above fall down and new ones drop in from the top. Frozen tiles block \
        matching and falling; popping next to them cracks the ice (two hits to thaw).\n\n\
        Reach the target score to clear the level. Later levels add a fifth sweet and \
        raise the minimum group size. The game ends when no group is big enough to pop.\n\n\
        CONTROLS:\n  Arrows / hjkl   Move cursor    Space / Enter   Pop\n  \
        Mouse click     Pop            ?               Show a hint\n  \
        N               Next level     R               Restart\n  \
        P               Pause          Q / Esc         Quit"
)]
pub struct Args {
    /// Grid width in cells.
    #[arg(long, default_value = "10", value_name = "COLS")]
    pub cols: u16,

    /// Grid height in cells.
    #[arg(long, default_value = "15", value_name = "ROWS")]
    pub rows: u16,

    /// RNG seed for a reproducible game. Random when not set.
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Starting level (practice). Difficulty is set as if levels 1..N were played.
    #[arg(long, default_value = "1", value_name = "N")]
    pub level: u32,

    /// Path to theme file (btop-style theme[key]=\"value\"). Kind keys take a list of hex shades.
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<std::path::PathBuf>,

    /// Colour palette: normal (pastel theme), high-contrast, or colorblind.
    #[arg(long, default_value = "normal")]
    pub palette: Palette,

    /// Disable pop/fall animation; the no-moves check runs right after every move.
    #[arg(long)]
    pub no_animation: bool,

    /// Fall animation duration in ms.
    #[arg(long, default_value = "400", value_name = "MS")]
    pub fall_ms: u64,

    /// Pop fade duration in ms.
    #[arg(long, default_value = "350", value_name = "MS")]
    pub pop_ms: u64,

    /// Draw items as letters instead of emoji.
    #[arg(long)]
    pub ascii: bool,

    /// Write diagnostics to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<std::path::PathBuf>,

    /// Log level for --log-file.
    #[arg(long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Normal,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}
