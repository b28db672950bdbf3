mod cli;
mod config;
mod report;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;

use segmenta::analysis::{score, spectral};
use segmenta::audio::decode;
use segmenta::{segment_for_window, select_window, LogObserver, SegmentError, SelectionConfig};

use cli::Cli;
use report::TrackReport;

enum Outcome {
    Written,
    Skipped,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    if let Some(path) = config::find_config_path(cli.config.as_deref()) {
        let cfg = config::load_config(&path)?;
        log::info!("Loaded config from {}", path.display());
        config::merge_into(&mut cli, cfg);
    }

    let selection = config::selection_config(&cli)?;

    if let Some(jobs) = cli.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs.max(1))
            .build_global()
            .context("Failed to configure worker threads")?;
    }

    log::info!("segmenta - vocal window selection");
    log::info!("Tracks: {}", cli.inputs.len());
    log::info!("Output: {}", cli.output_dir.display());
    log::info!(
        "Window: {}-{}s, stride {}s, crossfade {}s, loop strategy {:?}",
        selection.min_window_seconds,
        selection.max_window_seconds,
        selection.stride_seconds,
        selection.crossfade_seconds,
        selection.loop_strategy
    );

    let stems = report::report_stems(&cli.inputs)?;
    for (input, stem) in cli.inputs.iter().zip(&stems) {
        if input.file_stem().and_then(|s| s.to_str()) != Some(stem.as_str()) {
            log::warn!(
                "{} shares its file name with another input, writing it as '{}'",
                input.display(),
                stem
            );
        }
    }

    let pb = ProgressBar::new(cli.inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tracks ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    let outcomes: Vec<Result<Outcome>> = cli
        .inputs
        .par_iter()
        .zip(stems.par_iter())
        .map(|(input, stem)| {
            let outcome = process_track(input, stem, &cli, &selection)
                .with_context(|| format!("Failed to process {}", input.display()));
            pb.inc(1);
            outcome
        })
        .collect();
    pb.finish_and_clear();

    let mut written = 0;
    let mut skipped = 0;
    let mut failed = 0;
    for outcome in outcomes {
        match outcome {
            Ok(Outcome::Written) => written += 1,
            Ok(Outcome::Skipped) => skipped += 1,
            Err(err) => {
                failed += 1;
                log::error!("{:#}", err);
            }
        }
    }
    log::info!("Done: {} written, {} skipped, {} failed", written, skipped, failed);

    if written == 0 {
        anyhow::bail!("No track could be processed");
    }
    Ok(())
}

fn process_track(
    input: &Path,
    stem: &str,
    cli: &Cli,
    selection: &SelectionConfig,
) -> Result<Outcome> {
    let signal = decode::decode_file(input)?;

    let track_score = score::score(&spectral::analyze(&signal.as_slice()));
    if cli.score_threshold > 0.0 && track_score < cli.score_threshold {
        log::warn!(
            "[{}] vocal score {:.3} below threshold {:.3}, skipping",
            stem,
            track_score,
            cli.score_threshold
        );
        return Ok(Outcome::Skipped);
    }

    let observer = LogObserver::new(stem);
    let best = match select_window(&signal, selection, &observer) {
        Ok(best) => best,
        Err(SegmentError::InsufficientSignalLength { duration_seconds, min_length_seconds }) => {
            log::warn!(
                "[{}] {:.1}s is shorter than the {:.1}s minimum window, skipping",
                stem,
                duration_seconds,
                min_length_seconds
            );
            return Ok(Outcome::Skipped);
        }
        Err(err) => return Err(err.into()),
    };

    let segment = match segment_for_window(&signal, &best, selection, &observer) {
        Ok(segment) => segment,
        Err(SegmentError::WindowTooShortForCrossfade { window_seconds, crossfade_seconds }) => {
            let shrunk = SelectionConfig {
                crossfade_seconds: window_seconds * 0.25,
                ..*selection
            };
            log::warn!(
                "[{}] crossfade {:.2}s too long for a {:.2}s window, retrying with {:.2}s",
                stem,
                crossfade_seconds,
                window_seconds,
                shrunk.crossfade_seconds
            );
            segment_for_window(&signal, &best, &shrunk, &observer)?
        }
        Err(err) => return Err(err.into()),
    };

    let report = TrackReport::new(input, &signal, track_score, segment);
    let path = report::write_report(&cli.output_dir, stem, &report)?;
    log::info!("[{}] report written to {}", stem, path.display());

    if let Some(ref dir) = cli.segment_dir {
        let wav = report::export_segment_wav(&signal, &segment, dir, stem)?;
        log::info!("[{}] segment written to {}", stem, wav.display());
    }

    Ok(Outcome::Written)
}
