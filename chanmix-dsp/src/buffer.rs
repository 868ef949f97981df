//! Fixed-capacity per-channel sample storage

use crate::error::{RemixError, Result};

/// Maximum number of channels handled by the engine
pub const MAX_CHANNELS: usize = 6;

/// Channel slot in canonical interleave order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelSlot {
    /// Front-left, or the mono channel
    FrontLeft = 0,
    FrontRight = 1,
    Center = 2,
    /// Low-frequency effects
    Lfe = 3,
    SurroundLeft = 4,
    SurroundRight = 5,
}

impl ChannelSlot {
    /// All slots in canonical order
    pub const ALL: [ChannelSlot; MAX_CHANNELS] = [
        ChannelSlot::FrontLeft,
        ChannelSlot::FrontRight,
        ChannelSlot::Center,
        ChannelSlot::Lfe,
        ChannelSlot::SurroundLeft,
        ChannelSlot::SurroundRight,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Slot for a buffer index, if in range
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Six equally sized sample arrays plus bookkeeping
///
/// Every array always holds exactly `len()` samples. Slots at or beyond
/// `used_channels()` are kept zeroed by the topology stage and are never
/// emitted unless an output layout asks for them.
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    channels: [Vec<f64>; MAX_CHANNELS],
    length: usize,
    used_channels: usize,
    sample_rate: u32,
}

impl ChannelBuffer {
    /// Allocate a zeroed buffer of `length` samples per slot
    pub fn new(used_channels: usize, length: usize, sample_rate: u32) -> Result<Self> {
        if used_channels > MAX_CHANNELS {
            return Err(RemixError::UnsupportedChannelCount {
                count: used_channels,
            });
        }
        if length == 0 {
            return Err(RemixError::AllocationFailure {
                what: "channel",
                len: 0,
            });
        }

        let mut channels: [Vec<f64>; MAX_CHANNELS] = Default::default();
        for channel in channels.iter_mut() {
            *channel = alloc_zeroed(length, "channel")?;
        }

        Ok(Self {
            channels,
            length,
            used_channels,
            sample_rate,
        })
    }

    /// Samples per slot
    #[inline]
    pub fn len(&self) -> usize {
        self.length
    }

    /// Number of logically populated slots
    #[inline]
    pub fn used_channels(&self) -> usize {
        self.used_channels
    }

    /// Set the populated slot count (clamped to `MAX_CHANNELS`)
    pub fn set_used_channels(&mut self, count: usize) {
        self.used_channels = count.min(MAX_CHANNELS);
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channel(&self, slot: ChannelSlot) -> &[f64] {
        &self.channels[slot.index()]
    }

    #[inline]
    pub fn channel_mut(&mut self, slot: ChannelSlot) -> &mut [f64] {
        &mut self.channels[slot.index()]
    }

    /// Slot by raw index
    #[inline]
    pub fn get(&self, index: usize) -> &[f64] {
        &self.channels[index]
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut [f64] {
        &mut self.channels[index]
    }

    /// Two distinct slots, one borrowed mutably
    pub fn pair_mut(&mut self, read: ChannelSlot, write: ChannelSlot) -> (&[f64], &mut [f64]) {
        debug_assert_ne!(read, write);
        let (r, w) = (read.index(), write.index());
        if r < w {
            let (head, tail) = self.channels.split_at_mut(w);
            (head[r].as_slice(), tail[0].as_mut_slice())
        } else {
            let (head, tail) = self.channels.split_at_mut(r);
            (tail[0].as_slice(), head[w].as_mut_slice())
        }
    }

    /// Iterate over all slots mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut [f64]> {
        self.channels.iter_mut().map(|c| c.as_mut_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64]> {
        self.channels.iter().map(|c| c.as_slice())
    }

    /// Zero every slot from `first` onward
    pub fn clear_from(&mut self, first: usize) {
        for channel in self.channels.iter_mut().skip(first) {
            channel.fill(0.0);
        }
    }
}

/// Allocate a zeroed vector, reporting allocation failure instead of aborting
pub(crate) fn alloc_zeroed(len: usize, what: &'static str) -> Result<Vec<f64>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| RemixError::AllocationFailure { what, len })?;
    data.resize(len, 0.0);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_order() {
        assert_eq!(ChannelSlot::FrontLeft.index(), 0);
        assert_eq!(ChannelSlot::Lfe.index(), 3);
        assert_eq!(ChannelSlot::SurroundRight.index(), 5);
        assert_eq!(ChannelSlot::from_index(2), Some(ChannelSlot::Center));
        assert_eq!(ChannelSlot::from_index(6), None);
    }

    #[test]
    fn test_buffer_allocation() {
        let buffer = ChannelBuffer::new(2, 128, 48000).unwrap();
        assert_eq!(buffer.len(), 128);
        assert_eq!(buffer.used_channels(), 2);
        assert_eq!(buffer.sample_rate(), 48000);
        for channel in buffer.iter() {
            assert_eq!(channel.len(), 128);
            assert!(channel.iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn test_buffer_rejects_too_many_channels() {
        assert!(matches!(
            ChannelBuffer::new(7, 16, 44100),
            Err(RemixError::UnsupportedChannelCount { count: 7 })
        ));
    }

    #[test]
    fn test_pair_mut_both_orders() {
        let mut buffer = ChannelBuffer::new(6, 2, 44100).unwrap();
        buffer.channel_mut(ChannelSlot::Lfe).fill(3.0);

        let (src, dst) = buffer.pair_mut(ChannelSlot::Lfe, ChannelSlot::FrontLeft);
        dst.copy_from_slice(src);
        assert_eq!(buffer.channel(ChannelSlot::FrontLeft), &[3.0, 3.0]);

        let (src, dst) = buffer.pair_mut(ChannelSlot::FrontLeft, ChannelSlot::SurroundRight);
        dst.copy_from_slice(src);
        assert_eq!(buffer.channel(ChannelSlot::SurroundRight), &[3.0, 3.0]);
    }

    #[test]
    fn test_clear_from() {
        let mut buffer = ChannelBuffer::new(6, 4, 44100).unwrap();
        for channel in buffer.iter_mut() {
            channel.fill(1.0);
        }
        buffer.clear_from(3);
        assert!(buffer.get(2).iter().all(|&s| s == 1.0));
        assert!(buffer.get(3).iter().all(|&s| s == 0.0));
        assert!(buffer.get(5).iter().all(|&s| s == 0.0));
    }
}
