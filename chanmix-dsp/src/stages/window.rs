//! Hamming analysis window

use std::f64::consts::PI;

use super::FrameStage;
use crate::buffer::ChannelBuffer;

/// Pre-computed Hamming window `0.54 - 0.46 cos(2 pi j / (N - 1))`
#[derive(Debug, Clone)]
pub struct HammingWindow {
    coefficients: Vec<f64>,
}

impl HammingWindow {
    /// Create a window of `len` coefficients
    pub fn new(len: usize) -> Self {
        let coefficients = if len <= 1 {
            vec![1.0; len]
        } else {
            let denom = (len - 1) as f64;
            (0..len)
                .map(|j| 0.54 - 0.46 * (2.0 * PI * j as f64 / denom).cos())
                .collect()
        };
        Self { coefficients }
    }

    #[inline]
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    /// Window a single channel in place
    pub fn apply(&self, samples: &mut [f64]) {
        for (sample, coeff) in samples.iter_mut().zip(self.coefficients.iter()) {
            *sample *= coeff;
        }
    }
}

impl FrameStage for HammingWindow {
    fn process(&mut self, frame: &mut ChannelBuffer) {
        // Every slot, used or not; unused slots are never emitted
        for channel in frame.iter_mut() {
            self.apply(channel);
        }
    }

    fn name(&self) -> &'static str {
        "Hamming"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_endpoints_and_peak() {
        let window = HammingWindow::new(101);
        let c = window.coefficients();
        assert!((c[0] - 0.08).abs() < 1e-12);
        assert!((c[100] - 0.08).abs() < 1e-12);
        assert!((c[50] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_window_is_symmetric() {
        let window = HammingWindow::new(64);
        let c = window.coefficients();
        for j in 0..32 {
            assert!((c[j] - c[63 - j]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_windowing_silence_stays_silent() {
        let mut frame = ChannelBuffer::new(6, 160, 8000).unwrap();
        let mut window = HammingWindow::new(160);
        window.process(&mut frame);
        for channel in frame.iter() {
            assert!(channel.iter().all(|&s| s == 0.0));
        }
    }

    #[test]
    fn test_degenerate_lengths() {
        assert!(HammingWindow::new(0).coefficients().is_empty());
        assert_eq!(HammingWindow::new(1).coefficients(), &[1.0]);
    }
}
