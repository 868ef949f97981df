//! Window and transform size derivation
//!
//! The window covers one analysis frame (`frame_duration_ms` of audio, forced
//! to an even sample count). The transform is twice the next power of two
//! above the window, so every frame is zero-padded by at least half. When the
//! transform would exceed [`MAX_TRANSFORM_SIZE`] the frame duration is
//! shortened one millisecond at a time until it fits.

use crate::error::{RemixError, Result};

/// Largest transform the engine will plan
pub const MAX_TRANSFORM_SIZE: usize = 2048;

/// Resolved frame geometry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingState {
    /// Frame duration after any reduction (ms)
    pub frame_duration_ms: u32,
    /// Samples per analysis frame (always even)
    pub window_size: usize,
    /// Transform length (never above the policy maximum)
    pub transform_size: usize,
}

/// Sizing policy with a fixed transform ceiling
#[derive(Debug, Clone, Copy)]
pub struct SizingPolicy {
    max_transform_size: usize,
}

impl Default for SizingPolicy {
    fn default() -> Self {
        Self::new(MAX_TRANSFORM_SIZE)
    }
}

impl SizingPolicy {
    pub fn new(max_transform_size: usize) -> Self {
        Self { max_transform_size }
    }

    /// Derive window and transform size
    ///
    /// `transform_override` is honoured when it fits the window and the
    /// ceiling; otherwise the size is derived from the window.
    pub fn derive(
        &self,
        frame_duration_ms: u32,
        sample_rate: u32,
        transform_override: Option<usize>,
    ) -> Result<SizingState> {
        let mut duration = frame_duration_ms;

        loop {
            let window_size = window_size(duration, sample_rate);
            if duration == 0 || window_size == 0 {
                return Err(RemixError::InvalidTransformSize { size: 0 });
            }

            let transform_size = match transform_override {
                Some(size) if size >= window_size && size <= self.max_transform_size => size,
                _ => optimal_transform_size(window_size),
            };

            if transform_size <= self.max_transform_size {
                if duration != frame_duration_ms {
                    tracing::info!(
                        "Frame duration reduced from {} ms to {} ms (transform limit {})",
                        frame_duration_ms,
                        duration,
                        self.max_transform_size
                    );
                }
                return Ok(SizingState {
                    frame_duration_ms: duration,
                    window_size,
                    transform_size,
                });
            }

            duration -= 1;
        }
    }
}

/// `floor(duration * rate / 1000)` rounded up to an even count
pub fn window_size(frame_duration_ms: u32, sample_rate: u32) -> usize {
    let size = (frame_duration_ms as u64 * sample_rate as u64 / 1000) as usize;
    if size % 2 != 0 {
        size + 1
    } else {
        size
    }
}

/// `2 * 2^ceil(log2(window))`
pub fn optimal_transform_size(window_size: usize) -> usize {
    if window_size == 0 {
        return 0;
    }
    2 * window_size.next_power_of_two()
}
