use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{info, warn};
use picoboy_core::audio::AUDIO_SAMPLE_RATE;
use picoboy_core::audio_queue::AudioConsumer;

use crate::error::HostError;

/// Steps through the ring at the engine's rate while the device pulls at its
/// own, repeating or skipping frames as needed.
struct RateMatch {
    step: f64,
    acc: f64,
    current: (i16, i16),
}

impl RateMatch {
    fn new(device_rate: u32) -> Self {
        Self {
            step: AUDIO_SAMPLE_RATE as f64 / device_rate as f64,
            acc: 1.0,
            current: (0, 0),
        }
    }

    fn next(&mut self, queue: &AudioConsumer) -> (i16, i16) {
        while self.acc >= 1.0 {
            self.acc -= 1.0;
            // Underrun: silence.
            self.current = queue.pop_stereo().unwrap_or((0, 0));
        }
        self.acc += self.step;
        self.current
    }
}

fn pick_config(device: &cpal::Device) -> Result<cpal::SupportedStreamConfig, HostError> {
    let wanted: cpal::SampleRate = AUDIO_SAMPLE_RATE;
    if let Ok(ranges) = device.supported_output_configs() {
        for range in ranges {
            if range.channels() >= 2
                && range.min_sample_rate() <= wanted
                && wanted <= range.max_sample_rate()
            {
                return Ok(range.with_sample_rate(wanted));
            }
        }
    }
    device
        .default_output_config()
        .map_err(|e| HostError::AudioDevice(format!("no supported output config: {e}")))
}

fn build<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    queue: AudioConsumer,
    convert: fn(i16) -> T,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample + Send + 'static,
{
    let channels = config.channels as usize;
    let mut rate = RateMatch::new(config.sample_rate);
    device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            for frame in data.chunks_mut(channels) {
                let (left, right) = rate.next(&queue);
                frame[0] = convert(left);
                if channels > 1 {
                    frame[1] = convert(right);
                }
            }
        },
        |err| warn!("audio stream error: {err}"),
        None,
    )
}

/// Start playback on the default output device, pulling from `queue`.
///
/// The returned stream must be kept alive for as long as audio should play.
pub fn start_stream(queue: AudioConsumer) -> Result<cpal::Stream, HostError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| HostError::AudioDevice("no output device".into()))?;
    let supported = pick_config(&device)?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    if config.sample_rate != AUDIO_SAMPLE_RATE {
        info!(
            "audio device runs at {} Hz, rate-matching from {AUDIO_SAMPLE_RATE} Hz",
            config.sample_rate
        );
    }

    let stream = match sample_format {
        cpal::SampleFormat::I16 => build(&device, &config, queue, |s| s),
        cpal::SampleFormat::U16 => build(&device, &config, queue, |s| (s as i32 + 32768) as u16),
        cpal::SampleFormat::F32 => build(&device, &config, queue, |s| s as f32 / 32768.0),
        other => {
            return Err(HostError::AudioDevice(format!(
                "unsupported sample format {other:?}"
            )));
        }
    }
    .map_err(|e| HostError::AudioDevice(e.to_string()))?;

    stream
        .play()
        .map_err(|e| HostError::AudioDevice(e.to_string()))?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use picoboy_core::audio_queue::audio_queue;

    #[test]
    fn matched_rate_pops_one_frame_per_output() {
        let (tx, rx) = audio_queue(8);
        for i in 0..4 {
            tx.push_stereo(i, -i);
        }
        let mut rate = RateMatch::new(AUDIO_SAMPLE_RATE);
        let out: Vec<_> = (0..5).map(|_| rate.next(&rx)).collect();
        assert_eq!(out, vec![(0, 0), (1, -1), (2, -2), (3, -3), (0, 0)]);
    }

    #[test]
    fn faster_device_repeats_frames() {
        let (tx, rx) = audio_queue(8);
        tx.push_stereo(10, 10);
        tx.push_stereo(20, 20);
        let mut rate = RateMatch::new(AUDIO_SAMPLE_RATE * 2);
        let out: Vec<_> = (0..4).map(|_| rate.next(&rx).0).collect();
        assert_eq!(out, vec![10, 10, 20, 20]);
    }
}
