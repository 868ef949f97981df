//! Per-frame processing stages applied between separation and transform

mod gain;
mod window;

pub use gain::Gain;
pub use window::HammingWindow;

use crate::buffer::ChannelBuffer;

/// Trait for stages that process a whole frame in place
pub trait FrameStage: Send {
    /// Process every channel slot of the frame in place
    fn process(&mut self, frame: &mut ChannelBuffer);

    /// Whether the stage changes the signal at all
    fn is_active(&self) -> bool {
        true
    }

    /// Get stage name
    fn name(&self) -> &'static str;
}
