use std::path::Path;
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Result, VisualiserError};

/// Decoded PCM: interleaved signed 16-bit samples.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    pub samples: Arc<[i16]>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<i16>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
            channels,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        let per_second = self.sample_rate as f64 * self.channels.max(1) as f64;
        if per_second == 0.0 {
            0.0
        } else {
            self.samples.len() as f64 / per_second
        }
    }
}

pub fn decode_audio(path: &Path) -> Result<AudioBuffer> {
    let file = std::fs::File::open(path).map_err(|source| VisualiserError::AssetUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let decode_err = |message: String| VisualiserError::Decode {
        path: path.to_path_buf(),
        message,
    };

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| decode_err(format!("failed to probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| decode_err("no audio tracks found".into()))?;

    let track_id = track.id;
    let mut channels = track.codec_params.channels.map_or(0, |c| c.count());
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_err(format!("failed to create decoder: {}", e)))?;

    let mut all_samples: Vec<i16> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(decode_err(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(decode_err(e.to_string())),
        };

        // Some containers only report the signal layout on the first decoded packet
        let spec = *decoded.spec();
        if channels == 0 {
            channels = spec.channels.count();
        }
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }

        let mut sample_buf = SampleBuffer::<i16>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        all_samples.extend_from_slice(sample_buf.samples());
    }

    if channels == 0 || sample_rate == 0 {
        return Err(decode_err("unknown channel layout or sample rate".into()));
    }

    let buffer = AudioBuffer::new(all_samples, sample_rate, channels as u16);
    log::info!(
        "Decoded audio: {} samples, {} channel(s), {}Hz, {:.1}s",
        buffer.samples.len(),
        buffer.channels,
        buffer.sample_rate,
        buffer.duration_secs()
    );

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_accounts_for_channels() {
        let buffer = AudioBuffer::new(vec![0; 88_200], 44_100, 2);
        assert!((buffer.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn missing_file_is_asset_unreadable() {
        let err = decode_audio(Path::new("/nonexistent/pulsemesh/track.ogg")).unwrap_err();
        assert!(matches!(err, VisualiserError::AssetUnreadable { .. }));
    }
}
