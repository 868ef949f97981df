//! Streaming overlap-add remixing engine
//!
//! Frames of `window_size` samples are read with `overlap_size` samples of
//! carry from the previous frame, separated and upmixed, scaled and windowed,
//! sent through a transform round trip per emitted channel, then overlap-added
//! against the accumulated tail. Each iteration emits exactly `slide_size`
//! frames, in input order.
//!
//! States:
//! - `Priming`: the first full window is read. An empty first read ends the
//!   run without emitting anything.
//! - `Steady`: `slide_size` new frames follow the carried `overlap_size`.
//! - `Drained`: entered after the frame whose read returned nothing has been
//!   processed, which flushes the pending overlap.

use crate::buffer::{alloc_zeroed, ChannelBuffer, MAX_CHANNELS};
use crate::config::RemixConfig;
use crate::error::Result;
use crate::lfe::LfeSynthesizer;
use crate::sizing::{SizingPolicy, SizingState};
use crate::stages::{FrameStage, Gain, HammingWindow};
use crate::stream::{AudioSink, AudioSource, StreamSpec};
use crate::topology::{check_channel_count, deinterleave, upmix, ChannelLayout, OutputMap};
use crate::transform::RealTransform;

/// Engine lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Priming,
    Steady,
    Drained,
}

/// Frame overlap bookkeeping
#[derive(Debug, Clone)]
pub struct OverlapState {
    overlap_size: usize,
    slide_size: usize,
    /// Accumulated contribution of earlier frames to the next `overlap_size`
    /// output samples, per slot
    tail: ChannelBuffer,
}

impl OverlapState {
    fn new(window_size: usize, overlap_percent: u32, sample_rate: u32) -> Result<Self> {
        let overlap_size = window_size * overlap_percent as usize / 100;
        let slide_size = window_size - overlap_size;
        // Keep at least one sample so a zero overlap still has a valid buffer
        let tail = ChannelBuffer::new(MAX_CHANNELS, overlap_size.max(1), sample_rate)?;
        Ok(Self {
            overlap_size,
            slide_size,
            tail,
        })
    }

    pub fn overlap_size(&self) -> usize {
        self.overlap_size
    }

    pub fn slide_size(&self) -> usize {
        self.slide_size
    }

    /// Add the tail into the first `slide_size` samples of `frame`, then
    /// advance the tail by one slide
    fn overlap_add(&mut self, slot: usize, frame: &mut [f64]) {
        let overlap = self.overlap_size;
        let slide = self.slide_size;
        let tail = &mut self.tail.get_mut(slot)[..overlap];

        for (out, &t) in frame[..slide].iter_mut().zip(tail.iter()) {
            *out += t;
        }

        // Ascending order reads tail[slide + i] before it is overwritten
        for i in 0..overlap {
            let carried = if slide + i < overlap { tail[slide + i] } else { 0.0 };
            tail[i] = frame[slide + i] + carried;
        }
    }
}

/// Totals of a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Input frames read from the source
    pub frames_read: u64,
    /// Output frames written to the sink
    pub frames_written: u64,
    /// Processed frames, including the flush frame
    pub iterations: u64,
}

/// Overlap-add engine owning every working buffer for one run
pub struct OverlapAddEngine {
    input: StreamSpec,
    output_channels: usize,
    layout: ChannelLayout,
    sizing: SizingState,
    overlap: OverlapState,
    state: EngineState,

    /// Interleaved input: carried overlap followed by new frames
    read_buf: Vec<f64>,
    /// Interleaved output of one slide
    write_buf: Vec<f64>,
    /// Time-domain working set
    frame: ChannelBuffer,
    /// Transform-domain working set
    spectrum: Vec<f64>,

    transform: RealTransform,
    stages: Vec<Box<dyn FrameStage>>,
    lfe: LfeSynthesizer,
    output_map: OutputMap,
}

impl OverlapAddEngine {
    /// Build an engine for a stream
    ///
    /// `config` is expected to have been validated; out-of-range channel
    /// counts are still rejected here before anything is allocated.
    pub fn new(config: &RemixConfig, input: StreamSpec) -> Result<Self> {
        Self::with_policy(config, input, SizingPolicy::default())
    }

    pub fn with_policy(config: &RemixConfig, input: StreamSpec, policy: SizingPolicy) -> Result<Self> {
        check_channel_count(input.channels)?;
        let output_channels = resolve_output_channels(config, input.channels);
        check_channel_count(output_channels)?;
        let layout = ChannelLayout::from_channels(output_channels)?;

        let sizing = policy.derive(config.frame_duration_ms, input.sample_rate, config.transform_size)?;
        tracing::debug!(
            "Sizing: {} ms frame, window {} samples, transform {}",
            sizing.frame_duration_ms,
            sizing.window_size,
            sizing.transform_size
        );

        let window_size = sizing.window_size;
        let overlap = OverlapState::new(window_size, config.overlap_percent, input.sample_rate)?;
        let read_buf = alloc_zeroed(window_size * input.channels, "input")?;
        let write_buf = alloc_zeroed(overlap.slide_size * output_channels, "output")?;
        let frame = ChannelBuffer::new(input.channels, window_size, input.sample_rate)?;
        let spectrum = alloc_zeroed(sizing.transform_size, "spectrum")?;
        let transform = RealTransform::plan(sizing.transform_size)?;
        let lfe = LfeSynthesizer::new(sizing.transform_size)?;

        let stages: Vec<Box<dyn FrameStage>> = vec![
            Box::new(Gain::new(config.volume)),
            Box::new(HammingWindow::new(window_size)),
        ];

        tracing::debug!(
            "Buffers ready: {} -> {} channels, overlap {} / slide {} samples, stages {:?}",
            input.channels,
            output_channels,
            overlap.overlap_size,
            overlap.slide_size,
            stages.iter().map(|s| s.name()).collect::<Vec<_>>()
        );

        Ok(Self {
            input,
            output_channels,
            layout,
            sizing,
            overlap,
            state: EngineState::Priming,
            read_buf,
            write_buf,
            frame,
            spectrum,
            transform,
            stages,
            lfe,
            output_map: OutputMap::new(layout, config.lfe_only),
        })
    }

    pub fn sizing(&self) -> SizingState {
        self.sizing
    }

    pub fn overlap(&self) -> &OverlapState {
        &self.overlap
    }

    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Stream `source` through the engine into `sink`
    ///
    /// `on_progress` receives the total number of input frames read after
    /// every iteration. The sink is finished before returning; the engine and
    /// its buffers are dropped with it.
    pub fn run<S, K>(
        mut self,
        source: &mut S,
        sink: &mut K,
        mut on_progress: impl FnMut(u64),
    ) -> Result<RunSummary>
    where
        S: AudioSource + ?Sized,
        K: AudioSink + ?Sized,
    {
        let channels = self.input.channels;
        let window = self.sizing.window_size;
        let overlap = self.overlap.overlap_size;
        let slide = self.overlap.slide_size;
        let mut summary = RunSummary::default();

        while self.state != EngineState::Drained {
            let read = match self.state {
                EngineState::Priming => {
                    let read = source.read(&mut self.read_buf, window)?.min(window);
                    self.read_buf[read * channels..].fill(0.0);
                    if read == 0 {
                        tracing::debug!("Empty input, nothing to process");
                        self.state = EngineState::Drained;
                        break;
                    }
                    self.state = EngineState::Steady;
                    read
                }
                _ => {
                    // Trailing overlap of the previous frame becomes the carry
                    self.read_buf.copy_within(slide * channels.., 0);
                    let fresh = &mut self.read_buf[overlap * channels..];
                    let read = source.read(fresh, slide)?.min(slide);
                    fresh[read * channels..].fill(0.0);
                    if read == 0 {
                        self.state = EngineState::Drained;
                    }
                    read
                }
            };

            summary.frames_read += read as u64;
            self.process_frame()?;
            sink.write(&self.write_buf, slide)?;
            summary.frames_written += slide as u64;
            summary.iterations += 1;

            tracing::trace!(
                "Frame {}: read {} frames, emitted {}",
                summary.iterations,
                read,
                slide
            );
            on_progress(summary.frames_read);
        }

        sink.finish()?;
        tracing::debug!(
            "Processed {} frames in {} iterations, wrote {} frames",
            summary.frames_read,
            summary.iterations,
            summary.frames_written
        );
        Ok(summary)
    }

    /// Run one frame from `read_buf` into `write_buf`
    fn process_frame(&mut self) -> Result<()> {
        let channels = self.input.channels;
        let window = self.sizing.window_size;

        deinterleave(&self.read_buf, channels, window, &mut self.frame)?;
        upmix(&mut self.frame, channels, &mut self.lfe, &mut self.transform);

        for stage in self.stages.iter_mut() {
            if stage.is_active() {
                stage.process(&mut self.frame);
            }
        }

        // Only slots that reach the output go through the round trip
        for &slot in self.output_map.order() {
            let samples = self.frame.channel_mut(slot);
            self.transform.forward(samples, &mut self.spectrum);
            self.transform.inverse_normalized(&self.spectrum, samples);
            self.overlap.overlap_add(slot.index(), samples);
        }

        self.output_map
            .combine(&self.frame, self.overlap.slide_size, &mut self.write_buf)
    }
}

/// Output count after applying the "same as input" and LFE-only rules
fn resolve_output_channels(config: &RemixConfig, input_channels: usize) -> usize {
    if config.lfe_only {
        1
    } else if config.output_channels == 0 {
        input_channels
    } else {
        config.output_channels
    }
}
