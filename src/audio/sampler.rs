//! Streams a decoded buffer to the audio device and answers "how loud is it
//! right now" for the render thread.
//!
//! The cursor is shared between the device callback thread (`pull_chunk`,
//! `seek`) and the render thread (`current_amplitude`) through relaxed
//! atomics, with no lock. A render-thread read can lag the device by up to one
//! callback period, which is one frame of amplitude at worst.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use super::decode::AudioBuffer;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Streaming,
    Exhausted,
}

impl PlaybackState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => PlaybackState::Streaming,
            2 => PlaybackState::Exhausted,
            _ => PlaybackState::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            PlaybackState::Idle => 0,
            PlaybackState::Streaming => 1,
            PlaybackState::Exhausted => 2,
        }
    }
}

/// Result of one `pull_chunk` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub written: usize,
    pub more: bool,
}

pub struct AmplitudeSampler {
    samples: Arc<[i16]>,
    sample_rate: u32,
    channels: u16,
    cursor: AtomicUsize,
    state: AtomicU8,
}

impl AmplitudeSampler {
    pub fn attach(buffer: AudioBuffer) -> Self {
        Self {
            samples: buffer.samples,
            sample_rate: buffer.sample_rate,
            channels: buffer.channels,
            cursor: AtomicUsize::new(0),
            state: AtomicU8::new(PlaybackState::Idle.as_u8()),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn samples_per_second(&self) -> f64 {
        self.sample_rate as f64 * self.channels as f64
    }

    pub fn duration_secs(&self) -> f64 {
        let rate = self.samples_per_second();
        if rate == 0.0 {
            0.0
        } else {
            self.len() as f64 / rate
        }
    }

    pub fn position_secs(&self) -> f64 {
        let rate = self.samples_per_second();
        if rate == 0.0 {
            0.0
        } else {
            self.cursor() as f64 / rate
        }
    }

    /// Copy up to `out.len()` samples from the cursor and advance it.
    ///
    /// `more == false` means the end of the buffer was already reached and
    /// nothing was written.
    pub fn pull_chunk(&self, out: &mut [i16]) -> Chunk {
        let cursor = self.cursor.load(Ordering::Relaxed);
        let total = self.samples.len();

        if cursor >= total {
            self.state.store(PlaybackState::Exhausted.as_u8(), Ordering::Relaxed);
            return Chunk {
                written: 0,
                more: false,
            };
        }

        let count = out.len().min(total - cursor);
        out[..count].copy_from_slice(&self.samples[cursor..cursor + count]);

        // A seek that landed since the load wins; this chunk still plays.
        let _ = self.cursor.compare_exchange(
            cursor,
            cursor + count,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
        self.state.store(PlaybackState::Streaming.as_u8(), Ordering::Relaxed);

        Chunk {
            written: count,
            more: true,
        }
    }

    /// Move the cursor to `seconds` into the track. Negative offsets clamp to
    /// the start; offsets past the end exhaust on the next pull.
    pub fn seek(&self, seconds: f64) {
        let target = (seconds.max(0.0) * self.samples_per_second()).round();
        let target = if target >= usize::MAX as f64 {
            usize::MAX
        } else {
            target as usize
        };
        self.cursor.store(target, Ordering::Relaxed);
        if self.state() == PlaybackState::Exhausted {
            self.state.store(PlaybackState::Streaming.as_u8(), Ordering::Relaxed);
        }
    }

    /// |sample at cursor| / 32767, or 0 once the cursor is out of range.
    ///
    /// A single-sample probe; smoothing is up to the caller.
    pub fn current_amplitude(&self) -> f32 {
        match self.samples.get(self.cursor()) {
            Some(&sample) => (sample.unsigned_abs() as f32 / i16::MAX as f32).min(1.0),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampler(samples: Vec<i16>, sample_rate: u32, channels: u16) -> AmplitudeSampler {
        AmplitudeSampler::attach(AudioBuffer::new(samples, sample_rate, channels))
    }

    #[test]
    fn attach_starts_idle_at_zero() {
        let s = sampler(vec![1, 2, 3], 8_000, 1);
        assert_eq!(s.cursor(), 0);
        assert_eq!(s.state(), PlaybackState::Idle);
        assert_eq!(s.channels(), 1);
        assert_eq!(s.sample_rate(), 8_000);
    }

    #[test]
    fn silent_buffer_has_zero_amplitude() {
        let s = sampler(vec![0; 1000], 1000, 1);
        let mut out = [0i16; 64];
        loop {
            assert_eq!(s.current_amplitude(), 0.0);
            if !s.pull_chunk(&mut out).more {
                break;
            }
        }
        assert_eq!(s.current_amplitude(), 0.0);
    }

    #[test]
    fn amplitude_is_normalised_magnitude() {
        let s = sampler(vec![i16::MAX, -16_384, i16::MIN], 10, 1);
        assert!((s.current_amplitude() - 1.0).abs() < 1e-6);
        s.seek(0.1);
        assert!((s.current_amplitude() - 16_384.0 / 32_767.0).abs() < 1e-6);
        s.seek(0.2);
        assert_eq!(s.current_amplitude(), 1.0);
    }

    #[test]
    fn pull_copies_and_advances() {
        let s = sampler((0..10).collect(), 10, 1);
        let mut out = [0i16; 4];

        let chunk = s.pull_chunk(&mut out);
        assert_eq!(chunk, Chunk { written: 4, more: true });
        assert_eq!(out, [0, 1, 2, 3]);
        assert_eq!(s.cursor(), 4);
        assert_eq!(s.state(), PlaybackState::Streaming);

        s.pull_chunk(&mut out);
        let chunk = s.pull_chunk(&mut out);
        assert_eq!(chunk, Chunk { written: 2, more: true });
        assert_eq!(&out[..2], &[8, 9]);
        assert_eq!(s.cursor(), 10);

        let chunk = s.pull_chunk(&mut out);
        assert_eq!(chunk, Chunk { written: 0, more: false });
        assert_eq!(s.cursor(), 10);
        assert_eq!(s.state(), PlaybackState::Exhausted);
    }

    #[test]
    fn pull_never_passes_the_end() {
        let s = sampler(vec![7; 1001], 100, 1);
        let mut out = [0i16; 128];
        let mut ends = 0;
        for _ in 0..20 {
            if !s.pull_chunk(&mut out).more {
                ends += 1;
                assert_eq!(s.cursor(), s.len());
            }
            assert!(s.cursor() <= s.len());
        }
        // 1001 samples in chunks of 128 take 8 pulls, the rest report the end
        assert_eq!(ends, 12);
    }

    #[test]
    fn seek_rounds_by_rate_and_channels() {
        let s = sampler(vec![0; 200_000], 44_100, 2);
        s.seek(1.0);
        assert_eq!(s.cursor(), 88_200);
        s.seek(0.000_011);
        assert_eq!(s.cursor(), 1);
        s.seek(-3.0);
        assert_eq!(s.cursor(), 0);
    }

    #[test]
    fn seek_past_end_exhausts_on_next_pull() {
        let s = sampler(vec![5; 100], 100, 1);
        s.seek(10.0);
        assert_eq!(s.cursor(), 1000);
        assert_eq!(s.current_amplitude(), 0.0);
        let mut out = [0i16; 8];
        assert!(!s.pull_chunk(&mut out).more);
        assert_eq!(s.cursor(), 1000);
        assert_eq!(s.state(), PlaybackState::Exhausted);
    }

    #[test]
    fn seek_to_start_restarts_after_exhaustion() {
        let s = sampler(vec![3; 4], 4, 1);
        let mut out = [0i16; 8];
        s.pull_chunk(&mut out);
        assert!(!s.pull_chunk(&mut out).more);
        s.seek(0.0);
        assert_eq!(s.state(), PlaybackState::Streaming);
        assert_eq!(s.pull_chunk(&mut out).written, 4);
    }

    #[test]
    fn position_and_duration() {
        let s = sampler(vec![0; 4_000], 1_000, 2);
        assert!((s.duration_secs() - 2.0).abs() < 1e-9);
        s.seek(0.5);
        assert!((s.position_secs() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn reads_from_another_thread() {
        let s = Arc::new(sampler((0..4096).map(|i| (i % 100) as i16).collect(), 48_000, 1));
        let feeder = Arc::clone(&s);
        let handle = std::thread::spawn(move || {
            let mut out = [0i16; 256];
            while feeder.pull_chunk(&mut out).more {}
        });
        for _ in 0..100 {
            let a = s.current_amplitude();
            assert!((0.0..=1.0).contains(&a));
        }
        handle.join().unwrap();
        assert_eq!(s.cursor(), 4096);
    }
}
