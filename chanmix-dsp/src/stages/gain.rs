//! Volume scaling

use super::FrameStage;
use crate::buffer::ChannelBuffer;

/// Scalar gain applied to every channel slot
#[derive(Debug, Clone, Copy)]
pub struct Gain {
    volume: f64,
}

impl Gain {
    pub fn new(volume: f64) -> Self {
        Self { volume }
    }
}

impl FrameStage for Gain {
    fn process(&mut self, frame: &mut ChannelBuffer) {
        // Unity gain skips the full-buffer pass
        if !self.is_active() {
            return;
        }
        for channel in frame.iter_mut() {
            for sample in channel.iter_mut() {
                *sample *= self.volume;
            }
        }
    }

    fn is_active(&self) -> bool {
        self.volume != 1.0
    }

    fn name(&self) -> &'static str {
        "Gain"
    }
}
