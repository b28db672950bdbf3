use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::signal::AudioSignal;

/// Decodes the first audio track of `path` and downmixes it to mono.
///
/// Packets are downmixed as they are decoded, so only the mono buffer grows
/// with the track length.
pub fn decode_file(path: &Path) -> Result<AudioSignal> {
    let (mut format, track_id) = open_format(path)?;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.id == track_id)
        .context("Audio track disappeared after probing")?;
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;
    let declared_channels = track.codec_params.channels.map_or(1, |c| c.count());
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut mono: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e).context("Failed to read audio packet"),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(err)) => {
                skipped_packets += 1;
                log::debug!("Skipping undecodable packet in {}: {}", path.display(), err);
                continue;
            }
            Err(e) => return Err(e).context("Failed to decode audio packet"),
        };

        let spec = *decoded.spec();
        let frames = decoded.capacity() as u64;
        let needed = frames as usize * spec.channels.count();
        if sample_buf.as_ref().is_some_and(|buf| buf.capacity() < needed) {
            sample_buf = None;
        }
        let buf = sample_buf.get_or_insert_with(|| SampleBuffer::<f32>::new(frames, spec));
        buf.copy_interleaved_ref(decoded);
        downmix_into(buf.samples(), spec.channels.count(), &mut mono);
    }

    if skipped_packets > 0 {
        log::warn!("{}: skipped {} undecodable packet(s)", path.display(), skipped_packets);
    }
    log::info!(
        "Decoded {}: {} samples, {}Hz, {} channel(s) -> mono, {:.1}s",
        path.display(),
        mono.len(),
        sample_rate,
        declared_channels,
        mono.len() as f32 / sample_rate as f32
    );

    AudioSignal::new(mono, sample_rate)
        .with_context(|| format!("Decoded audio is unusable: {}", path.display()))
}

/// Detects the container of `path` and picks its first decodable track.
fn open_format(path: &Path) -> Result<(Box<dyn FormatReader>, u32)> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let detected = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Failed to detect audio format: {}", path.display()))?;

    let track_id = detected
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .map(|t| t.id)
        .context("No audio tracks found")?;
    Ok((detected.format, track_id))
}

/// Averages interleaved frames down to a single channel.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    let mut mono = Vec::with_capacity(interleaved.len() / channels.max(1));
    downmix_into(interleaved, channels, &mut mono);
    mono
}

/// Appends the mono mix of `interleaved` to `out`.
pub fn downmix_into(interleaved: &[f32], channels: usize, out: &mut Vec<f32>) {
    if channels <= 1 {
        out.extend_from_slice(interleaved);
        return;
    }
    let scale = 1.0 / channels as f32;
    out.extend(
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() * scale),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_stereo_frames() {
        let mono = downmix(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn downmix_appends_packet_by_packet() {
        let mut mono = vec![9.0];
        downmix_into(&[1.0, 1.0, 0.0, 1.0], 2, &mut mono);
        downmix_into(&[-1.0, 1.0], 2, &mut mono);
        assert_eq!(mono, vec![9.0, 1.0, 0.5, 0.0]);
    }

    #[test]
    fn downmix_passes_mono_through() {
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }

    #[test]
    fn decodes_wav_written_by_hound() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..8_000 {
            writer.write_sample(i16::MAX / 2).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let signal = decode_file(&path).unwrap();
        assert_eq!(signal.sample_rate(), 8_000);
        assert_eq!(signal.len(), 8_000);
        assert!((signal.samples()[100] - 0.25).abs() < 0.01);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(decode_file(Path::new("/definitely/not/here.wav")).is_err());
    }
}
