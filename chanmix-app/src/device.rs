//! Playback sink on the default output device
//!
//! The engine thread pushes `f32` samples into a lock-free ring that the cpal
//! callback drains. `write` sleeps while the ring is full, `finish` waits
//! until it is empty. Stream errors from the callback thread arrive over a
//! channel and fail the next call.

use std::thread;
use std::time::{Duration, Instant};

use chanmix_dsp::{AudioSink, RemixError, Result, SpeakerPosition};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, SupportedStreamConfigRange};
use crossbeam_channel::{Receiver, Sender};
use ringbuf::{traits::*, HeapProd, HeapRb};
use rubato::{FftFixedInOut, Resampler};

/// Ring capacity in seconds of audio
const RING_SECONDS: f64 = 0.5;

/// Sleep between polls while waiting on the callback
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Give up when the device stops consuming for this long
const STALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Resampler chunk length (frames)
const RESAMPLE_CHUNK: usize = 1024;

/// Live playback sink
pub struct DeviceSink {
    stream: Stream,
    producer: HeapProd<f32>,
    errors: Receiver<String>,
    channels: usize,
    converter: Option<RateConverter>,
    scratch: Vec<f32>,
}

impl DeviceSink {
    /// Open the default output device
    ///
    /// When the device cannot run at `sample_rate` for this channel count,
    /// it is opened at the closest rate it supports and the stream is
    /// resampled on the way in.
    pub fn open(channels: usize, sample_rate: u32, positions: &[SpeakerPosition]) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| RemixError::Device("No audio output device found".into()))?;
        let name = device.name().unwrap_or_else(|_| "unknown device".into());

        let supported: Vec<SupportedStreamConfigRange> = device
            .supported_output_configs()
            .map_err(|e| RemixError::Device(e.to_string()))?
            .filter(|c| c.sample_format() == SampleFormat::F32)
            .filter(|c| c.channels() as usize == channels)
            .collect();

        let (range, device_rate) = pick_config(&supported, sample_rate).ok_or_else(|| {
            RemixError::Device(format!("{} does not support {} channel output", name, channels))
        })?;
        let config = range.with_sample_rate(cpal::SampleRate(device_rate)).config();

        let converter = if device_rate != sample_rate {
            tracing::warn!(
                "{} does not support {} Hz, resampling to {} Hz",
                name,
                sample_rate,
                device_rate
            );
            Some(RateConverter::new(sample_rate, device_rate, channels)?)
        } else {
            None
        };

        let capacity = ((device_rate as f64 * RING_SECONDS) as usize).max(RESAMPLE_CHUNK) * channels;
        let (producer, mut consumer) = HeapRb::<f32>::new(capacity).split();
        let (error_tx, errors): (Sender<String>, Receiver<String>) = crossbeam_channel::bounded(16);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let filled = consumer.pop_slice(data);
                    data[filled..].fill(0.0);
                },
                move |err| {
                    let _ = error_tx.try_send(err.to_string());
                },
                None,
            )
            .map_err(|e| RemixError::Device(e.to_string()))?;
        stream.play().map_err(|e| RemixError::Device(e.to_string()))?;

        tracing::info!(
            "Playing on {}: {} channels at {} Hz, speakers {:?}",
            name,
            channels,
            device_rate,
            positions
        );

        Ok(Self {
            stream,
            producer,
            errors,
            channels,
            converter,
            scratch: Vec::new(),
        })
    }

    fn check_errors(&self) -> Result<()> {
        match self.errors.try_recv() {
            Ok(message) => Err(RemixError::Device(message)),
            Err(_) => Ok(()),
        }
    }
}

impl AudioSink for DeviceSink {
    fn write(&mut self, samples: &[f64], frames: usize) -> Result<()> {
        self.check_errors()?;
        let len = (frames * self.channels).min(samples.len());

        match self.converter.as_mut() {
            Some(converter) => {
                converter.push(&samples[..len]);
                while let Some(chunk) = converter.next_chunk()? {
                    push_blocking(&mut self.producer, &self.errors, chunk)?;
                }
            }
            None => {
                self.scratch.clear();
                self.scratch.extend(samples[..len].iter().map(|&s| s as f32));
                push_blocking(&mut self.producer, &self.errors, &self.scratch)?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(converter) = self.converter.as_mut() {
            if let Some(tail) = converter.flush()? {
                push_blocking(&mut self.producer, &self.errors, tail)?;
            }
        }

        let mut last_level = self.producer.occupied_len();
        let mut last_change = Instant::now();
        while self.producer.occupied_len() > 0 {
            self.check_errors()?;
            let level = self.producer.occupied_len();
            if level != last_level {
                last_level = level;
                last_change = Instant::now();
            } else if last_change.elapsed() > STALL_TIMEOUT {
                return Err(RemixError::Device("Playback stalled".into()));
            }
            thread::sleep(POLL_INTERVAL);
        }

        // Let the last callback buffer reach the speakers
        thread::sleep(Duration::from_millis(100));
        self.check_errors()?;
        self.stream
            .pause()
            .map_err(|e| RemixError::Device(e.to_string()))
    }
}

/// Push everything in `data`, sleeping while the ring is full
fn push_blocking(producer: &mut HeapProd<f32>, errors: &Receiver<String>, data: &[f32]) -> Result<()> {
    let mut offset = 0;
    let mut last_progress = Instant::now();
    while offset < data.len() {
        if let Ok(message) = errors.try_recv() {
            return Err(RemixError::Device(message));
        }
        let pushed = producer.push_slice(&data[offset..]);
        if pushed > 0 {
            offset += pushed;
            last_progress = Instant::now();
        } else if last_progress.elapsed() > STALL_TIMEOUT {
            return Err(RemixError::Device("Playback stalled".into()));
        } else {
            thread::sleep(POLL_INTERVAL);
        }
    }
    Ok(())
}

/// Pick the configuration and rate to open
///
/// A range containing `rate` wins; otherwise the range whose nearest
/// supported rate is closest.
fn pick_config(supported: &[SupportedStreamConfigRange], rate: u32) -> Option<(SupportedStreamConfigRange, u32)> {
    supported
        .iter()
        .map(|c| {
            let nearest = rate.clamp(c.min_sample_rate().0, c.max_sample_rate().0);
            (c, nearest)
        })
        .min_by_key(|&(_, nearest)| nearest.abs_diff(rate))
        .map(|(c, nearest)| (c.clone(), nearest))
}

/// Interleaved sample rate conversion in fixed chunks
///
/// The resampler's leading delay is dropped, so output lines up with input
/// and the total length matches the rate ratio.
struct RateConverter {
    resampler: FftFixedInOut<f32>,
    from_rate: u32,
    to_rate: u32,
    channels: usize,
    /// Per-channel input waiting for a full chunk
    pending: Vec<Vec<f32>>,
    /// Interleaved output of the last call
    output: Vec<f32>,
    /// Leading output frames still to drop
    delay: usize,
    frames_in: u64,
    frames_out: u64,
}

impl RateConverter {
    fn new(from_rate: u32, to_rate: u32, channels: usize) -> Result<Self> {
        let resampler = FftFixedInOut::<f32>::new(
            from_rate as usize,
            to_rate as usize,
            RESAMPLE_CHUNK,
            channels,
        )
        .map_err(|e| RemixError::Device(e.to_string()))?;
        let delay = resampler.output_delay();

        Ok(Self {
            resampler,
            from_rate,
            to_rate,
            channels,
            pending: vec![Vec::new(); channels],
            output: Vec::new(),
            delay,
            frames_in: 0,
            frames_out: 0,
        })
    }

    /// Queue interleaved samples
    fn push(&mut self, samples: &[f64]) {
        for frame in samples.chunks_exact(self.channels) {
            for (channel, &sample) in self.pending.iter_mut().zip(frame) {
                channel.push(sample as f32);
            }
            self.frames_in += 1;
        }
    }

    /// Convert one chunk when enough input is queued
    fn next_chunk(&mut self) -> Result<Option<&[f32]>> {
        let needed = self.resampler.input_frames_next();
        if self.pending[0].len() < needed {
            return Ok(None);
        }
        self.output.clear();
        self.process(needed, usize::MAX)?;
        Ok(Some(self.output.as_slice()))
    }

    /// Convert what is left, zero-padding until the output reaches its
    /// expected length
    fn flush(&mut self) -> Result<Option<&[f32]>> {
        let expected = self.frames_in * self.to_rate as u64 / self.from_rate as u64;
        if self.frames_out >= expected {
            for channel in self.pending.iter_mut() {
                channel.clear();
            }
            return Ok(None);
        }

        self.output.clear();
        while self.frames_out < expected {
            let needed = self.resampler.input_frames_next();
            for channel in self.pending.iter_mut() {
                channel.resize(needed.max(channel.len()), 0.0);
            }
            let wanted = (expected - self.frames_out) as usize;
            let delay_before = self.delay;
            if self.process(needed, wanted)? == 0 && delay_before == self.delay {
                break;
            }
        }
        Ok(Some(self.output.as_slice()))
    }

    /// Resample the first `frames` queued frames, dropping any remaining
    /// delay and appending at most `keep` frames to `output`; returns the
    /// number appended
    fn process(&mut self, frames: usize, keep: usize) -> Result<usize> {
        let input: Vec<&[f32]> = self.pending.iter().map(|c| &c[..frames]).collect();
        let resampled = self
            .resampler
            .process(&input, None)
            .map_err(|e| RemixError::Device(e.to_string()))?;
        for channel in self.pending.iter_mut() {
            channel.drain(..frames);
        }

        let produced = resampled.first().map_or(0, |c| c.len());
        let skip = self.delay.min(produced);
        self.delay -= skip;
        let end = produced.min(skip.saturating_add(keep));
        for j in skip..end {
            for channel in &resampled {
                self.output.push(channel[j]);
            }
        }
        let kept = end - skip;
        self.frames_out += kept as u64;
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_converter_length() {
        let mut converter = RateConverter::new(44100, 48000, 2).unwrap();
        let input: Vec<f64> = (0..4410 * 2).map(|i| ((i / 2) as f64 * 0.01).sin()).collect();
        converter.push(&input);

        let mut frames = 0;
        while let Some(chunk) = converter.next_chunk().unwrap() {
            assert_eq!(chunk.len() % 2, 0);
            frames += chunk.len() / 2;
        }
        if let Some(tail) = converter.flush().unwrap() {
            frames += tail.len() / 2;
        }
        assert_eq!(frames, 4800);
    }

    #[test]
    fn test_rate_converter_drops_leading_delay() {
        let mut converter = RateConverter::new(44100, 48000, 1).unwrap();
        let mut input = vec![0.0; 4410];
        // 10 ms in, which lands at output frame 480
        input[441] = 1.0;
        converter.push(&input);

        let mut output = Vec::new();
        while let Some(chunk) = converter.next_chunk().unwrap() {
            output.extend_from_slice(chunk);
        }
        if let Some(tail) = converter.flush().unwrap() {
            output.extend_from_slice(tail);
        }
        assert_eq!(output.len(), 4800);

        let peak = output
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap();
        assert!((peak as i64 - 480).abs() <= 2, "peak at {}", peak);
    }

    #[test]
    fn test_rate_converter_waits_for_full_chunk() {
        let mut converter = RateConverter::new(44100, 48000, 1).unwrap();
        converter.push(&[0.0; 10]);
        assert!(converter.next_chunk().unwrap().is_none());
        assert!(converter.flush().unwrap().is_some());
        assert!(converter.flush().unwrap().is_none());
    }
}
