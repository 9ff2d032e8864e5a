use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;

use super::sampler::AmplitudeSampler;
use crate::error::{Result, VisualiserError};

/// Plays an [`AmplitudeSampler`] on the default output device.
///
/// The device callback thread pulls chunks from the sampler; looping restarts
/// the track by seeking it back to zero.
pub struct AudioOutput {
    stream: cpal::Stream,
}

impl AudioOutput {
    pub fn start(sampler: Arc<AmplitudeSampler>, looping: bool) -> Result<Self> {
        let init_err =
            |message: String| VisualiserError::ContextInit(format!("audio output: {}", message));

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| init_err("no default output device".into()))?;

        let channels = sampler.channels();
        let rate = cpal::SampleRate(sampler.sample_rate());

        let available: Vec<cpal::SupportedStreamConfigRange> = device
            .supported_output_configs()
            .map_err(|e| init_err(e.to_string()))?
            .collect();

        let supported = available
            .iter()
            .filter(|c| {
                c.channels() == channels
                    && c.min_sample_rate() <= rate
                    && rate <= c.max_sample_rate()
                    && matches!(
                        c.sample_format(),
                        cpal::SampleFormat::I16 | cpal::SampleFormat::F32
                    )
            })
            // i16 needs no conversion
            .max_by_key(|c| c.sample_format() == cpal::SampleFormat::I16)
            .cloned()
            .ok_or_else(|| {
                let ranges: Vec<FormatRange> = available
                    .iter()
                    .map(|c| FormatRange {
                        channels: c.channels(),
                        min_rate: c.min_sample_rate().0,
                        max_rate: c.max_sample_rate().0,
                    })
                    .collect();
                init_err(unsupported_format(channels, rate.0, &ranges))
            })?;

        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.with_sample_rate(rate).into();

        log::info!(
            "Audio output: {} ({} channel(s), {}Hz, {:?}, loop={})",
            device.name().unwrap_or_else(|_| "unknown device".into()),
            config.channels,
            config.sample_rate.0,
            sample_format,
            looping
        );

        let err_fn = |err: cpal::StreamError| log::error!("Audio stream error: {}", err);

        let stream = match sample_format {
            cpal::SampleFormat::I16 => {
                let sampler = Arc::clone(&sampler);
                device.build_output_stream(
                    &config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        fill_from(&sampler, looping, data);
                    },
                    err_fn,
                    None,
                )
            }
            _ => {
                let sampler = Arc::clone(&sampler);
                let mut scratch: Vec<i16> = Vec::new();
                device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        scratch.resize(data.len(), 0);
                        fill_from(&sampler, looping, &mut scratch);
                        for (dst, src) in data.iter_mut().zip(&scratch) {
                            *dst = src.to_sample::<f32>();
                        }
                    },
                    err_fn,
                    None,
                )
            }
        }
        .map_err(|e| init_err(e.to_string()))?;

        stream.play().map_err(|e| init_err(e.to_string()))?;

        Ok(Self { stream })
    }

    pub fn pause(&self) {
        if let Err(err) = self.stream.pause() {
            log::warn!("Failed to pause audio output: {}", err);
        }
    }
}

/// Channel count and sample-rate range of one device output config.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FormatRange {
    pub channels: u16,
    pub min_rate: u32,
    pub max_rate: u32,
}

/// Error text for a track the device cannot play as-is, listing what it can.
pub(crate) fn unsupported_format(channels: u16, rate: u32, available: &[FormatRange]) -> String {
    let mut message = format!("device does not support {} channel(s) at {}Hz", channels, rate);
    if available.is_empty() {
        message.push_str("; it reports no output formats");
        return message;
    }
    let listed: Vec<String> = available
        .iter()
        .map(|r| {
            if r.min_rate == r.max_rate {
                format!("{}ch {}Hz", r.channels, r.min_rate)
            } else {
                format!("{}ch {}-{}Hz", r.channels, r.min_rate, r.max_rate)
            }
        })
        .collect();
    message.push_str("; supported: ");
    message.push_str(&listed.join(", "));
    message.push_str(". Resample or remix the file to a supported format");
    message
}

/// Fill `out` from the sampler, wrapping to the start when `looping`.
/// Whatever cannot be filled is silence.
pub(crate) fn fill_from(sampler: &AmplitudeSampler, looping: bool, out: &mut [i16]) {
    let mut filled = 0;
    while filled < out.len() {
        let chunk = sampler.pull_chunk(&mut out[filled..]);
        filled += chunk.written;
        if !chunk.more {
            if looping && !sampler.is_empty() {
                sampler.seek(0.0);
                continue;
            }
            break;
        }
    }
    out[filled..].fill(0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::AudioBuffer;
    use crate::audio::sampler::PlaybackState;

    fn sampler(samples: Vec<i16>) -> AmplitudeSampler {
        AmplitudeSampler::attach(AudioBuffer::new(samples, 4, 1))
    }

    #[test]
    fn fill_pads_with_silence_at_end() {
        let s = sampler(vec![1, 2, 3]);
        let mut out = [9i16; 5];
        fill_from(&s, false, &mut out);
        assert_eq!(out, [1, 2, 3, 0, 0]);

        fill_from(&s, false, &mut out);
        assert_eq!(out, [0; 5]);
        assert_eq!(s.state(), PlaybackState::Exhausted);
    }

    #[test]
    fn fill_wraps_when_looping() {
        let s = sampler(vec![1, 2, 3]);
        let mut out = [0i16; 8];
        fill_from(&s, true, &mut out);
        assert_eq!(out, [1, 2, 3, 1, 2, 3, 1, 2]);
        assert_eq!(s.cursor(), 2);
    }

    #[test]
    fn looping_an_empty_track_is_silent() {
        let s = sampler(Vec::new());
        let mut out = [5i16; 4];
        fill_from(&s, true, &mut out);
        assert_eq!(out, [0; 4]);
    }

    #[test]
    fn unsupported_format_lists_device_ranges() {
        let ranges = [
            FormatRange {
                channels: 2,
                min_rate: 44_100,
                max_rate: 48_000,
            },
            FormatRange {
                channels: 2,
                min_rate: 96_000,
                max_rate: 96_000,
            },
        ];
        let message = unsupported_format(1, 22_050, &ranges);
        assert!(message.starts_with("device does not support 1 channel(s) at 22050Hz"));
        assert!(message.contains("2ch 44100-48000Hz"));
        assert!(message.contains("2ch 96000Hz"));
    }

    #[test]
    fn unsupported_format_without_ranges() {
        let message = unsupported_format(2, 48_000, &[]);
        assert!(message.ends_with("it reports no output formats"));
    }
}
