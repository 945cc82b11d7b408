use log::{debug, warn};

use crate::PipelineError;
use crate::audio_queue::AudioProducer;

pub const AUDIO_SAMPLE_RATE: u32 = 32768;
pub const DMG_CLOCK_FREQ: f64 = 4_194_304.0;
pub const SCREEN_REFRESH_CYCLES: f64 = 70_224.0;
/// Emulated frames per second.
pub const VERTICAL_SYNC: f64 = DMG_CLOCK_FREQ / SCREEN_REFRESH_CYCLES;
/// Stereo frames synthesized per emulated frame.
pub const AUDIO_SAMPLES: usize = (AUDIO_SAMPLE_RATE as f64 / VERTICAL_SYNC) as usize;

/// Largest attenuation shift; at this setting output is silent.
pub const MAX_ATTENUATION: u8 = 16;
pub const DEFAULT_ATTENUATION: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub samples_per_frame: usize,
    /// Right shift applied to every sample; 0 is full scale.
    pub attenuation: u8,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: AUDIO_SAMPLE_RATE,
            samples_per_frame: AUDIO_SAMPLES,
            attenuation: DEFAULT_ATTENUATION,
        }
    }
}

impl AudioConfig {
    /// Interleaved length of one frame's buffer, or `None` if it does not fit
    /// in a `usize`.
    pub fn buffer_len(&self) -> Option<usize> {
        self.samples_per_frame.checked_mul(2)
    }

    /// Positive `delta` makes output louder.
    pub fn set_volume(&mut self, delta: i8) {
        let attenuation = self.attenuation as i16 - delta as i16;
        self.attenuation = attenuation.clamp(0, MAX_ATTENUATION as i16) as u8;
    }

    pub fn increase_volume(&mut self) {
        self.set_volume(1);
    }

    pub fn decrease_volume(&mut self) {
        self.set_volume(-1);
    }

    #[inline]
    pub fn apply_volume(&self, sample: i16) -> i16 {
        ((sample as i32) >> self.attenuation) as i16
    }
}

/// Audio output hardware. Submission is fire-and-forget: nothing is reported
/// back to the frame driver.
pub trait AudioSink {
    fn submit(&mut self, config: &AudioConfig, buffer: &[i16]);
}

/// Discards every buffer. Used when audio output is disabled.
pub struct NullSink;

impl AudioSink for NullSink {
    fn submit(&mut self, _config: &AudioConfig, _buffer: &[i16]) {}
}

/// Feeds an [`AudioProducer`] ring, applying the configured volume.
///
/// When the consumer falls behind, frames that do not fit are dropped.
pub struct QueueSink {
    producer: AudioProducer,
    overruns: u64,
}

impl QueueSink {
    pub fn new(producer: AudioProducer) -> Self {
        Self {
            producer,
            overruns: 0,
        }
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Frames lost to overruns since the ring was created.
    pub fn dropped_frames(&self) -> u64 {
        self.producer.dropped_frames()
    }
}

impl AudioSink for QueueSink {
    fn submit(&mut self, config: &AudioConfig, buffer: &[i16]) {
        let mut accepted = 0;
        for frame in buffer.chunks_exact(2) {
            let left = config.apply_volume(frame[0]);
            let right = config.apply_volume(frame[1]);
            if self.producer.push_stereo(left, right) {
                accepted += 1;
            }
        }

        let frames = buffer.len() / 2;
        if accepted < frames {
            self.overruns += 1;
            let total = self.producer.dropped_frames();
            if self.overruns == 1 {
                warn!("audio overrun: dropped {} of {frames} frames", frames - accepted);
            } else {
                debug!(
                    "audio overrun #{}: dropped {} frames ({total} in total)",
                    self.overruns,
                    frames - accepted
                );
            }
        }
    }
}

/// Owns the per-frame sample buffer, allocated once at start-up.
pub struct AudioFeed {
    config: AudioConfig,
    buffer: Box<[i16]>,
}

impl AudioFeed {
    pub fn new(config: AudioConfig) -> Result<Self, PipelineError> {
        let alloc_failed = || PipelineError::AudioBufferAlloc {
            bytes: config
                .samples_per_frame
                .saturating_mul(2 * size_of::<i16>()),
        };
        let len = config.buffer_len().ok_or_else(alloc_failed)?;
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(len).map_err(|_| alloc_failed())?;
        buffer.resize(len, 0);

        Ok(Self {
            config,
            buffer: buffer.into_boxed_slice(),
        })
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut AudioConfig {
        &mut self.config
    }

    /// Synthesize exactly one frame of audio in place and hand it off.
    pub fn service<F>(&mut self, synthesize: F, sink: &mut dyn AudioSink)
    where
        F: FnOnce(&mut [i16]),
    {
        synthesize(&mut self.buffer[..]);
        sink.submit(&self.config, &self.buffer[..]);
    }
}
