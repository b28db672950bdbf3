use clap::Parser;
use std::path::PathBuf;

pub const DEFAULT_OUTPUT_DIR: &str = "segments";
pub const DEFAULT_MIN_WINDOW: f32 = 40.0;
pub const DEFAULT_MAX_WINDOW: f32 = 60.0;
pub const DEFAULT_STRIDE: f32 = 0.5;
pub const DEFAULT_CROSSFADE: f32 = 0.15;
pub const DEFAULT_LOOP_STRATEGY: &str = "correlation";
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.2;

#[derive(Parser, Debug)]
#[command(
    name = "segmenta",
    about = "Select the most vocal window of each track and compute seamless loop points"
)]
pub struct Cli {
    /// Input audio files (WAV, MP3, FLAC, OGG, AAC)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory for the per-track JSON reports
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Also write the selected window of each track as a mono WAV here
    #[arg(long)]
    pub segment_dir: Option<PathBuf>,

    /// Config file (defaults to ./segmenta.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Shortest acceptable window, in seconds
    #[arg(long, default_value_t = DEFAULT_MIN_WINDOW)]
    pub min_window: f32,

    /// Longest window, in seconds
    #[arg(long, default_value_t = DEFAULT_MAX_WINDOW)]
    pub max_window: f32,

    /// Distance between candidate window starts, in seconds
    #[arg(long, default_value_t = DEFAULT_STRIDE)]
    pub stride: f32,

    /// Crossfade length at the loop seam, in seconds
    #[arg(long, default_value_t = DEFAULT_CROSSFADE)]
    pub crossfade: f32,

    /// Loop placement: "correlation" or "beat-aligned"
    #[arg(long, default_value = DEFAULT_LOOP_STRATEGY)]
    pub loop_strategy: String,

    /// Skip tracks whose whole-track vocal score is below this (0 disables)
    #[arg(long, default_value_t = DEFAULT_SCORE_THRESHOLD)]
    pub score_threshold: f32,

    /// Worker threads (defaults to one per core)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}
