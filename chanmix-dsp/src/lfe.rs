//! Spectral low-pass used to derive the LFE channel
//!
//! The channel is transformed, every magnitude bin at or above the cutoff is
//! zeroed, and the spectrum is rebuilt from the filtered magnitude and the
//! original phase before transforming back. DC and Nyquist are rebuilt with
//! zero phase, so a negative offset comes back positive. Each call is independent; any
//! continuity across frames comes from the overlap-add around it.

use crate::buffer::alloc_zeroed;
use crate::error::Result;
use crate::transform::{from_polar, magnitude, phase, RealTransform};

/// Cutoff frequency of the LFE low-pass (Hz)
pub const LFE_CUTOFF_HZ: f64 = 120.0;

/// Frequency-domain LFE synthesizer with reusable scratch buffers
pub struct LfeSynthesizer {
    spectrum: Vec<f64>,
    magnitude: Vec<f64>,
    phase: Vec<f64>,
}

impl LfeSynthesizer {
    /// Create a synthesizer sized for `transform_size`
    pub fn new(transform_size: usize) -> Result<Self> {
        let bins = transform_size / 2 + 1;
        Ok(Self {
            spectrum: alloc_zeroed(transform_size, "LFE spectrum")?,
            magnitude: alloc_zeroed(bins, "LFE magnitude")?,
            phase: alloc_zeroed(bins, "LFE phase")?,
        })
    }

    /// First zeroed bin: `ceil(2 * cutoff * (N/2 - 1) / rate)`
    pub fn cutoff_bin(&self, transform_size: usize, sample_rate: u32) -> usize {
        let half = transform_size as f64 / 2.0 - 1.0;
        let bin = (2.0 * LFE_CUTOFF_HZ * half / sample_rate as f64).ceil();
        bin.max(0.0) as usize
    }

    /// Low-pass `channel` in place
    pub fn process(&mut self, transform: &mut RealTransform, channel: &mut [f64], sample_rate: u32) {
        let n = transform.size();
        debug_assert_eq!(self.spectrum.len(), n);

        transform.forward(channel, &mut self.spectrum);
        magnitude(&self.spectrum, n, &mut self.magnitude);
        phase(&self.spectrum, n, &mut self.phase);

        let first = self.cutoff_bin(n, sample_rate).min(self.magnitude.len());
        self.magnitude[first..].fill(0.0);

        from_polar(&self.magnitude, &self.phase, n, &mut self.spectrum);
        transform.inverse_normalized(&self.spectrum, channel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq: f64, sample_rate: u32, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    fn rms(samples: &[f64]) -> f64 {
        (samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64).sqrt()
    }

    #[test]
    fn test_cutoff_bin() {
        let lfe = LfeSynthesizer::new(2048).unwrap();
        // 2 * 120 * 1023 / 44100 = 5.567 -> 6
        assert_eq!(lfe.cutoff_bin(2048, 44100), 6);
        // 2 * 120 * 255 / 8000 = 7.65 -> 8
        assert_eq!(lfe.cutoff_bin(512, 8000), 8);
    }

    #[test]
    fn test_removes_high_frequencies() {
        let rate = 8000;
        let mut transform = RealTransform::plan(512).unwrap();
        let mut lfe = LfeSynthesizer::new(512).unwrap();

        let mut high = tone(2000.0, rate, 160);
        lfe.process(&mut transform, &mut high, rate);
        assert!(rms(&high) < 0.05, "high tone leaked: {}", rms(&high));
    }

    #[test]
    fn test_keeps_low_frequencies() {
        let rate = 8000;
        let mut transform = RealTransform::plan(512).unwrap();
        let mut lfe = LfeSynthesizer::new(512).unwrap();

        // Constant offset sits entirely in the DC region
        let mut dc = vec![0.5; 160];
        let before = rms(&dc);
        lfe.process(&mut transform, &mut dc, rate);
        assert!(rms(&dc) > before * 0.3);
        assert!(dc[80] > 0.0);
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut transform = RealTransform::plan(256).unwrap();
        let mut lfe = LfeSynthesizer::new(256).unwrap();
        let mut silent = vec![0.0; 100];
        lfe.process(&mut transform, &mut silent, 44100);
        assert!(silent.iter().all(|&s| s == 0.0));
    }
}
