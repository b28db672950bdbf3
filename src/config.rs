use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use segmenta::{LoopStrategy, SelectionConfig};

use crate::cli::{self, Cli};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub selection: SelectionSection,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Deserialize)]
pub struct SelectionSection {
    #[serde(default = "default_min_window")]
    pub min_window: f32,
    #[serde(default = "default_max_window")]
    pub max_window: f32,
    #[serde(default = "default_stride")]
    pub stride: f32,
    #[serde(default = "default_crossfade")]
    pub crossfade: f32,
    #[serde(default = "default_loop_strategy")]
    pub loop_strategy: String,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
}

#[derive(Debug, Default, Deserialize)]
pub struct OutputSection {
    pub dir: Option<PathBuf>,
    pub segment_dir: Option<PathBuf>,
}

impl Default for SelectionSection {
    fn default() -> Self {
        Self {
            min_window: default_min_window(),
            max_window: default_max_window(),
            stride: default_stride(),
            crossfade: default_crossfade(),
            loop_strategy: default_loop_strategy(),
            score_threshold: default_score_threshold(),
        }
    }
}

fn default_min_window() -> f32 { cli::DEFAULT_MIN_WINDOW }
fn default_max_window() -> f32 { cli::DEFAULT_MAX_WINDOW }
fn default_stride() -> f32 { cli::DEFAULT_STRIDE }
fn default_crossfade() -> f32 { cli::DEFAULT_CROSSFADE }
fn default_loop_strategy() -> String { cli::DEFAULT_LOOP_STRATEGY.into() }
fn default_score_threshold() -> f32 { cli::DEFAULT_SCORE_THRESHOLD }

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Explicit path, else `./segmenta.toml`, else `<config dir>/segmenta/config.toml`.
pub fn find_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("segmenta.toml");
    if local.exists() {
        return Some(local);
    }
    let platform = dirs::config_dir()?.join("segmenta").join("config.toml");
    platform.exists().then_some(platform)
}

/// Config values apply only where the CLI is still at its default.
pub fn merge_into(cli: &mut Cli, cfg: Config) {
    let sel = cfg.selection;
    if cli.min_window == cli::DEFAULT_MIN_WINDOW { cli.min_window = sel.min_window; }
    if cli.max_window == cli::DEFAULT_MAX_WINDOW { cli.max_window = sel.max_window; }
    if cli.stride == cli::DEFAULT_STRIDE { cli.stride = sel.stride; }
    if cli.crossfade == cli::DEFAULT_CROSSFADE { cli.crossfade = sel.crossfade; }
    if cli.loop_strategy == cli::DEFAULT_LOOP_STRATEGY { cli.loop_strategy = sel.loop_strategy; }
    if cli.score_threshold == cli::DEFAULT_SCORE_THRESHOLD { cli.score_threshold = sel.score_threshold; }
    if cli.output_dir == Path::new(cli::DEFAULT_OUTPUT_DIR) {
        if let Some(dir) = cfg.output.dir {
            cli.output_dir = dir;
        }
    }
    if cli.segment_dir.is_none() {
        cli.segment_dir = cfg.output.segment_dir;
    }
}

pub fn parse_loop_strategy(name: &str) -> Result<LoopStrategy> {
    match name.trim().to_ascii_lowercase().as_str() {
        "correlation" => Ok(LoopStrategy::Correlation),
        "beat-aligned" | "beat_aligned" | "beats" => Ok(LoopStrategy::BeatAligned),
        other => anyhow::bail!(
            "Unknown loop strategy '{}' (expected 'correlation' or 'beat-aligned')",
            other
        ),
    }
}

pub fn selection_config(cli: &Cli) -> Result<SelectionConfig> {
    Ok(SelectionConfig {
        min_window_seconds: cli.min_window,
        max_window_seconds: cli.max_window,
        stride_seconds: cli.stride,
        crossfade_seconds: cli.crossfade,
        loop_strategy: parse_loop_strategy(&cli.loop_strategy)?,
    })
}
