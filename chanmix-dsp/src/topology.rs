//! Channel separation, upmix synthesis and output layout mapping
//!
//! Input frames arrive interleaved in canonical slot order. After separation
//! the missing slots are synthesized by cascading rules:
//!
//! | input | action                                   | logical count |
//! |-------|------------------------------------------|---------------|
//! | 1     | FR = FL                                  | 2             |
//! | 2, 4  | C = (FL + FR) / 4                        | 3 (2), 4 (4)  |
//! | 3     | SL = 0.2 FL, SR = 0.2 FR                 | 5             |
//! | 5     | LFE = mean(FL, FR, C, SL, SR), low-pass  | 5             |
//!
//! A quadraphonic input gains a center channel but keeps a logical count of
//! four, so it never reaches LFE synthesis; its fourth channel stays in the
//! LFE slot as read.
//!
//! On the way out each layout is a fixed slot order copied into the
//! interleaved buffer, with FL and LFE exchanged when only LFE is wanted.
//! Quad output reads the surround slots in place of C and LFE, five-channel
//! output reads the LFE slot in place of SR.

use crate::buffer::{ChannelBuffer, ChannelSlot, MAX_CHANNELS};
use crate::error::{RemixError, Result};
use crate::lfe::LfeSynthesizer;
use crate::transform::RealTransform;

use ChannelSlot::*;

/// Gain applied to the summed fronts when deriving the center channel
pub const CENTER_MIX_GAIN: f64 = 0.25;

/// Gain applied to the fronts when deriving the surrounds
pub const SURROUND_MIX_GAIN: f64 = 0.2;

/// Reject channel counts the engine cannot represent
pub fn check_channel_count(count: usize) -> Result<()> {
    if count == 0 || count > MAX_CHANNELS {
        return Err(RemixError::UnsupportedChannelCount { count });
    }
    Ok(())
}

/// Scatter `frames` interleaved frames into per-channel slots
///
/// `channel[c][j] = flat[j * input_channels + c]`. Slots past the input
/// count are zeroed, as are samples past `frames`.
pub fn deinterleave(
    flat: &[f64],
    input_channels: usize,
    frames: usize,
    buffer: &mut ChannelBuffer,
) -> Result<()> {
    check_channel_count(input_channels)?;
    let frames = frames.min(buffer.len()).min(flat.len() / input_channels);

    for c in 0..input_channels {
        let channel = buffer.get_mut(c);
        for (j, sample) in channel.iter_mut().enumerate().take(frames) {
            *sample = flat[j * input_channels + c];
        }
        channel[frames..].fill(0.0);
    }
    buffer.clear_from(input_channels);
    buffer.set_used_channels(input_channels);

    Ok(())
}

/// Synthesize missing slots after separation
///
/// Returns the resulting logical channel count, which is also stored as the
/// buffer's used channel count.
pub fn upmix(
    buffer: &mut ChannelBuffer,
    input_channels: usize,
    lfe: &mut LfeSynthesizer,
    transform: &mut RealTransform,
) -> usize {
    let mut count = input_channels;

    if count == 1 {
        let (fl, fr) = buffer.pair_mut(FrontLeft, FrontRight);
        fr.copy_from_slice(fl);
        count = 2;
    }

    if count == 2 || count == 4 {
        for j in 0..buffer.len() {
            let mixed = (buffer.channel(FrontLeft)[j] + buffer.channel(FrontRight)[j]) * CENTER_MIX_GAIN;
            buffer.channel_mut(Center)[j] = mixed;
        }
        if count == 2 {
            count = 3;
        }
    }

    if count == 3 {
        for (front, surround) in [(FrontLeft, SurroundLeft), (FrontRight, SurroundRight)] {
            let (src, dst) = buffer.pair_mut(front, surround);
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d = s * SURROUND_MIX_GAIN;
            }
        }
        count = 5;
    }

    if count == 5 {
        for j in 0..buffer.len() {
            let sum: f64 = [FrontLeft, FrontRight, Center, SurroundLeft, SurroundRight]
                .iter()
                .map(|&slot| buffer.channel(slot)[j])
                .sum();
            buffer.channel_mut(Lfe)[j] = sum / 5.0;
        }
        let sample_rate = buffer.sample_rate();
        lfe.process(transform, buffer.channel_mut(Lfe), sample_rate);
    }

    buffer.set_used_channels(count);
    count
}

/// Speaker position reported to playback devices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakerPosition {
    /// Plain left (mono playback)
    Left,
    FrontLeft,
    FrontRight,
    FrontCenter,
    LowFrequency,
    RearLeft,
    RearRight,
}

/// Output channel layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
    /// FL, FR, C
    ThreeFront,
    /// FL, FR, RL, RR
    Quad,
    /// FL, FR, C, RL, RR
    FiveZero,
    /// FL, FR, C, LFE, RL, RR
    FiveOne,
}

impl ChannelLayout {
    /// Layout for an output channel count
    pub fn from_channels(channels: usize) -> Result<Self> {
        Ok(match channels {
            1 => ChannelLayout::Mono,
            2 => ChannelLayout::Stereo,
            3 => ChannelLayout::ThreeFront,
            4 => ChannelLayout::Quad,
            5 => ChannelLayout::FiveZero,
            6 => ChannelLayout::FiveOne,
            count => return Err(RemixError::UnsupportedChannelCount { count }),
        })
    }

    pub fn channels(self) -> usize {
        self.slot_order().len()
    }

    /// Source slot for each output position
    ///
    /// Five-channel output takes its last speaker from the LFE slot, which
    /// is where a 5-channel input keeps its fifth channel.
    pub fn slot_order(self) -> &'static [ChannelSlot] {
        match self {
            ChannelLayout::Mono => &[FrontLeft],
            ChannelLayout::Stereo => &[FrontLeft, FrontRight],
            ChannelLayout::ThreeFront => &[FrontLeft, FrontRight, Center],
            ChannelLayout::Quad => &[FrontLeft, FrontRight, SurroundLeft, SurroundRight],
            ChannelLayout::FiveZero => &[FrontLeft, FrontRight, Center, SurroundLeft, Lfe],
            ChannelLayout::FiveOne => &[FrontLeft, FrontRight, Center, Lfe, SurroundLeft, SurroundRight],
        }
    }

    /// Speaker positions for device playback
    pub fn positions(self, lfe_only: bool) -> Vec<SpeakerPosition> {
        use SpeakerPosition as P;
        match self {
            ChannelLayout::Mono if lfe_only => vec![P::LowFrequency],
            ChannelLayout::Mono => vec![P::Left],
            ChannelLayout::Stereo => vec![P::FrontLeft, P::FrontRight],
            ChannelLayout::ThreeFront => vec![P::FrontLeft, P::FrontRight, P::FrontCenter],
            ChannelLayout::Quad => vec![P::FrontLeft, P::FrontRight, P::RearLeft, P::RearRight],
            ChannelLayout::FiveZero => vec![
                P::FrontLeft,
                P::FrontRight,
                P::FrontCenter,
                P::RearLeft,
                P::RearRight,
            ],
            ChannelLayout::FiveOne => vec![
                P::FrontLeft,
                P::FrontRight,
                P::FrontCenter,
                P::LowFrequency,
                P::RearLeft,
                P::RearRight,
            ],
        }
    }
}

/// Output permutation: layout order with FL and LFE exchanged for LFE-only output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputMap {
    order: Vec<ChannelSlot>,
}

impl OutputMap {
    pub fn new(layout: ChannelLayout, lfe_only: bool) -> Self {
        let order = layout
            .slot_order()
            .iter()
            .map(|&slot| match slot {
                FrontLeft if lfe_only => Lfe,
                Lfe if lfe_only => FrontLeft,
                other => other,
            })
            .collect();
        Self { order }
    }

    pub fn channels(&self) -> usize {
        self.order.len()
    }

    pub fn order(&self) -> &[ChannelSlot] {
        &self.order
    }

    /// Interleave the first `frames` samples of each mapped slot into `out`
    ///
    /// `out[j * channels + c] = slot(order[c])[j]`. `out` is resized to fit.
    pub fn combine(&self, buffer: &ChannelBuffer, frames: usize, out: &mut Vec<f64>) -> Result<()> {
        check_channel_count(self.channels())?;
        let frames = frames.min(buffer.len());
        let channels = self.channels();

        out.resize(frames * channels, 0.0);
        for (c, &slot) in self.order.iter().enumerate() {
            let source = buffer.channel(slot);
            for j in 0..frames {
                out[j * channels + c] = source[j];
            }
        }
        Ok(())
    }
}

/// Interleave with the layout for `output_channels`
pub fn combine(
    buffer: &ChannelBuffer,
    output_channels: usize,
    lfe_only: bool,
    frames: usize,
    out: &mut Vec<f64>,
) -> Result<()> {
    let layout = ChannelLayout::from_channels(output_channels)?;
    OutputMap::new(layout, lfe_only).combine(buffer, frames, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synth_parts(size: usize) -> (LfeSynthesizer, RealTransform) {
        (
            LfeSynthesizer::new(size).unwrap(),
            RealTransform::plan(size).unwrap(),
        )
    }

    #[test]
    fn test_deinterleave_stereo() {
        let mut buffer = ChannelBuffer::new(2, 3, 44100).unwrap();
        let flat = [1.0, -1.0, 2.0, -2.0, 3.0, -3.0];
        deinterleave(&flat, 2, 3, &mut buffer).unwrap();
        assert_eq!(buffer.channel(FrontLeft), &[1.0, 2.0, 3.0]);
        assert_eq!(buffer.channel(FrontRight), &[-1.0, -2.0, -3.0]);
        assert!(buffer.channel(Center).iter().all(|&s| s == 0.0));
        assert_eq!(buffer.used_channels(), 2);
    }

    #[test]
    fn test_deinterleave_short_read_zero_fills() {
        let mut buffer = ChannelBuffer::new(1, 4, 44100).unwrap();
        buffer.channel_mut(FrontLeft).fill(9.0);
        deinterleave(&[1.0, 2.0, 0.0, 0.0], 1, 2, &mut buffer).unwrap();
        assert_eq!(buffer.channel(FrontLeft), &[1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_deinterleave_rejects_seven_channels() {
        let mut buffer = ChannelBuffer::new(2, 1, 44100).unwrap();
        let flat = [0.0; 7];
        assert!(matches!(
            deinterleave(&flat, 7, 1, &mut buffer),
            Err(RemixError::UnsupportedChannelCount { count: 7 })
        ));
    }

    #[test]
    fn test_mono_upmix_copies_front_left() {
        let (mut lfe, mut transform) = synth_parts(16);
        let mut buffer = ChannelBuffer::new(1, 3, 44100).unwrap();
        deinterleave(&[0.1, 0.2, 0.3], 1, 3, &mut buffer).unwrap();
        upmix(&mut buffer, 1, &mut lfe, &mut transform);
        assert_eq!(buffer.channel(FrontLeft), &[0.1, 0.2, 0.3]);
        assert_eq!(buffer.channel(FrontRight), &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_stereo_upmix_derives_center() {
        let (mut lfe, mut transform) = synth_parts(16);
        let mut buffer = ChannelBuffer::new(2, 2, 44100).unwrap();
        deinterleave(&[1.0, 3.0, 2.0, 2.0], 2, 2, &mut buffer).unwrap();
        let count = upmix(&mut buffer, 2, &mut lfe, &mut transform);
        // Cascades into the 3-channel rule, then LFE synthesis
        assert_eq!(count, 5);
        assert_eq!(buffer.channel(Center), &[1.0, 1.0]);
        assert_eq!(buffer.channel(SurroundLeft), &[0.2, 0.4]);
    }

    #[test]
    fn test_three_channel_derives_surrounds() {
        let (mut lfe, mut transform) = synth_parts(16);
        let mut buffer = ChannelBuffer::new(3, 2, 44100).unwrap();
        deinterleave(&[1.0, 1.0, 0.5, 1.0, 1.0, 0.5], 3, 2, &mut buffer).unwrap();
        let count = upmix(&mut buffer, 3, &mut lfe, &mut transform);
        assert_eq!(count, 5);
        for slot in [SurroundLeft, SurroundRight] {
            for &s in buffer.channel(slot) {
                assert!((s - 0.2).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_quad_fourth_channel_stays_unfiltered() {
        let (mut lfe, mut transform) = synth_parts(16);
        let mut buffer = ChannelBuffer::new(4, 2, 44100).unwrap();
        let flat = [1.0, 1.0, 0.3, 0.3, 1.0, 1.0, 0.3, 0.3];
        deinterleave(&flat, 4, 2, &mut buffer).unwrap();
        let count = upmix(&mut buffer, 4, &mut lfe, &mut transform);
        assert_eq!(count, 4);
        assert_eq!(buffer.channel(Center), &[0.5, 0.5]);
        // No LFE is synthesized; the fourth input channel is left as read
        assert_eq!(buffer.channel(Lfe), &[0.3, 0.3]);
    }

    #[test]
    fn test_five_channel_populates_lfe() {
        let (mut lfe, mut transform) = synth_parts(64);
        let mut buffer = ChannelBuffer::new(5, 32, 8000).unwrap();
        let flat = vec![0.5; 5 * 32];
        deinterleave(&flat, 5, 32, &mut buffer).unwrap();
        let count = upmix(&mut buffer, 5, &mut lfe, &mut transform);
        assert_eq!(count, 5);
        assert!(buffer.channel(Lfe).iter().any(|&s| s > 0.0));
    }

    #[test]
    fn test_six_channel_passes_through() {
        let (mut lfe, mut transform) = synth_parts(16);
        let mut buffer = ChannelBuffer::new(6, 1, 44100).unwrap();
        deinterleave(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 6, 1, &mut buffer).unwrap();
        assert_eq!(upmix(&mut buffer, 6, &mut lfe, &mut transform), 6);
        for (i, channel) in buffer.iter().enumerate() {
            assert_eq!(channel[0], (i + 1) as f64);
        }
    }

    #[test]
    fn test_layout_orders() {
        let quad = OutputMap::new(ChannelLayout::Quad, false);
        assert_eq!(quad.order(), &[FrontLeft, FrontRight, SurroundLeft, SurroundRight]);
        let five = OutputMap::new(ChannelLayout::FiveZero, false);
        assert_eq!(five.order(), &[FrontLeft, FrontRight, Center, SurroundLeft, Lfe]);
        let six = OutputMap::new(ChannelLayout::FiveOne, true);
        assert_eq!(six.order(), &[Lfe, FrontRight, Center, FrontLeft, SurroundLeft, SurroundRight]);
    }

    #[test]
    fn test_lfe_only_remap() {
        let mut buffer = ChannelBuffer::new(6, 2, 44100).unwrap();
        buffer.channel_mut(FrontLeft).fill(1.0);
        buffer.channel_mut(Lfe).fill(5.0);
        let mut out = Vec::new();
        combine(&buffer, 1, true, 2, &mut out).unwrap();
        assert_eq!(out, vec![5.0, 5.0]);
        // Buffer itself is left untouched
        assert_eq!(buffer.channel(FrontLeft), &[1.0, 1.0]);
    }

    #[test]
    fn test_combine_interleaves_first_frames() {
        let mut buffer = ChannelBuffer::new(2, 4, 44100).unwrap();
        buffer.channel_mut(FrontLeft).copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        buffer.channel_mut(FrontRight).copy_from_slice(&[-1.0, -2.0, -3.0, -4.0]);
        let mut out = Vec::new();
        combine(&buffer, 2, false, 2, &mut out).unwrap();
        assert_eq!(out, vec![1.0, -1.0, 2.0, -2.0]);
    }

    #[test]
    fn test_combine_rejects_bad_counts() {
        let buffer = ChannelBuffer::new(2, 1, 44100).unwrap();
        let mut out = Vec::new();
        assert!(combine(&buffer, 7, false, 1, &mut out).is_err());
        assert!(combine(&buffer, 0, false, 1, &mut out).is_err());
    }

    #[test]
    fn test_positions() {
        assert_eq!(
            ChannelLayout::Mono.positions(true),
            vec![SpeakerPosition::LowFrequency]
        );
        assert_eq!(ChannelLayout::FiveOne.positions(false).len(), 6);
        assert_eq!(
            ChannelLayout::Quad.positions(false)[2],
            SpeakerPosition::RearLeft
        );
    }
}
