use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use segmenta::{AudioSignal, LoopPoints, SegmentSelectionResult};

#[derive(Debug, Serialize)]
pub struct TrackInfo {
    pub path: PathBuf,
    pub duration_seconds: f32,
    pub sample_rate: u32,
}

/// Per-track JSON report. `segment.loop` is window-relative, `absolute_loop`
/// is on the track timeline.
#[derive(Debug, Serialize)]
pub struct TrackReport {
    pub track: TrackInfo,
    pub track_vocal_score: f32,
    pub segment: SegmentSelectionResult,
    pub absolute_loop: LoopPoints,
}

impl TrackReport {
    pub fn new(
        path: &Path,
        signal: &AudioSignal,
        track_vocal_score: f32,
        segment: SegmentSelectionResult,
    ) -> Self {
        Self {
            track: TrackInfo {
                path: path.to_path_buf(),
                duration_seconds: signal.duration_seconds(),
                sample_rate: signal.sample_rate(),
            },
            track_vocal_score,
            absolute_loop: segment.absolute_loop(),
            segment,
        }
    }
}

/// One output name per input, in input order. Inputs sharing a file stem
/// get `-1`, `-2`, ... suffixes so their reports don't overwrite each other.
pub fn report_stems(inputs: &[PathBuf]) -> Result<Vec<String>> {
    let stems = inputs
        .iter()
        .map(|path| {
            path.file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string)
                .with_context(|| format!("Input path has no usable file name: {}", path.display()))
        })
        .collect::<Result<Vec<String>>>()?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for stem in &stems {
        *counts.entry(stem.as_str()).or_default() += 1;
    }
    let mut used: HashSet<String> = stems
        .iter()
        .filter(|stem| counts[stem.as_str()] == 1)
        .cloned()
        .collect();

    let mut names = Vec::with_capacity(stems.len());
    for stem in &stems {
        if counts[stem.as_str()] == 1 {
            names.push(stem.clone());
            continue;
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}-{}", stem, n);
            n += 1;
            if used.insert(candidate.clone()) {
                names.push(candidate);
                break;
            }
        }
    }
    Ok(names)
}

/// Writes `<dir>/<stem>_segment.json`, creating `dir` if needed.
pub fn write_report(dir: &Path, stem: &str, report: &TrackReport) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;
    let path = dir.join(format!("{}_segment.json", stem));
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

/// Writes the selected window as a 32-bit float mono WAV, `<dir>/<stem>_segment.wav`.
///
/// `signal` must be the signal `segment` was selected from.
pub fn export_segment_wav(
    signal: &AudioSignal,
    segment: &SegmentSelectionResult,
    dir: &Path,
    stem: &str,
) -> Result<PathBuf> {
    if segment.span.sample_rate != signal.sample_rate() || segment.span.end() > signal.len() {
        anyhow::bail!("Segment {:?} does not belong to this signal", segment.span);
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create segment directory: {}", dir.display()))?;
    let path = dir.join(format!("{}_segment.wav", stem));
    let window = segment.window(signal);

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: signal.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&path, spec)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for &sample in window.samples() {
        writer.write_sample(sample)?;
    }
    writer
        .finalize()
        .with_context(|| format!("Failed to finalize {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use segmenta::{PitchClass, SampleSpan};

    fn segment() -> SegmentSelectionResult {
        SegmentSelectionResult {
            start: 1.0,
            end: 3.0,
            bpm: Some(120.0),
            key: Some(PitchClass::A),
            vocal_score: 0.6,
            loop_points: LoopPoints {
                loop_start_seconds: 0.01,
                loop_end_seconds: 1.85,
                crossfade_seconds: 0.15,
            },
            span: SampleSpan {
                start: 1000,
                len: 2000,
                sample_rate: 1000,
            },
        }
    }

    fn ramp_signal() -> AudioSignal {
        let samples = (0..4000).map(|i| i as f32 / 4000.0).collect();
        AudioSignal::new(samples, 1000).unwrap()
    }

    #[test]
    fn report_json_has_both_loop_frames() {
        let dir = tempfile::tempdir().unwrap();
        let signal = ramp_signal();
        let report = TrackReport::new(Path::new("song.wav"), &signal, 0.4, segment());
        let path = write_report(&dir.path().join("out"), "song", &report).unwrap();

        assert_eq!(path.file_name().unwrap(), "song_segment.json");
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["track"]["sample_rate"], 1000);
        assert_eq!(json["segment"]["key"], "A");
        let relative = json["segment"]["loop"]["loop_start_seconds"].as_f64().unwrap();
        let absolute = json["absolute_loop"]["loop_start_seconds"].as_f64().unwrap();
        assert!((absolute - relative - 1.0).abs() < 1e-5);
    }

    #[test]
    fn exported_wav_holds_the_window() {
        let dir = tempfile::tempdir().unwrap();
        let signal = ramp_signal();
        let path = export_segment_wav(&signal, &segment(), dir.path(), "song").unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 1000);
        let samples: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 2000);
        assert_eq!(samples[0], signal.samples()[1000]);
        assert_eq!(samples[1999], signal.samples()[2999]);
    }

    #[test]
    fn shared_stems_get_distinct_names() {
        let inputs = [
            PathBuf::from("a/song.wav"),
            PathBuf::from("b/song.flac"),
            PathBuf::from("c/other.mp3"),
            PathBuf::from("song-1.ogg"),
        ];
        let names = report_stems(&inputs).unwrap();
        assert_eq!(names, vec!["song-2", "song-3", "other", "song-1"]);
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn distinct_stems_are_kept() {
        let inputs = [PathBuf::from("x/a.wav"), PathBuf::from("y/b.wav")];
        assert_eq!(report_stems(&inputs).unwrap(), vec!["a", "b"]);
        assert!(report_stems(&[PathBuf::from("/")]).is_err());
    }

    #[test]
    fn export_rejects_a_span_outside_the_signal() {
        let dir = tempfile::tempdir().unwrap();
        let short = AudioSignal::new(vec![0.0; 1500], 1000).unwrap();
        assert!(export_segment_wav(&short, &segment(), dir.path(), "song").is_err());
    }
}
