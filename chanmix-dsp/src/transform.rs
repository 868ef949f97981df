//! Real-to-real transform in half-complex packed layout
//!
//! The spectrum of a real frame of length `N` is stored in `N` reals:
//! `r0, r1, ..., r(N/2), i((N+1)/2 - 1), ..., i1`, i.e. the real part of bin
//! `k` at index `k` and its imaginary part at index `N - k`. The inverse is
//! unnormalized; [`RealTransform::inverse_normalized`] divides by `N` and
//! replaces non-finite samples with zero.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::error::{RemixError, Result};

/// Planned forward/inverse transform with owned working buffers
pub struct RealTransform {
    size: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    /// Complex working buffer (reused for every call)
    work: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl RealTransform {
    /// Plan a transform of `size` points
    pub fn plan(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(RemixError::InvalidTransformSize { size });
        }

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Ok(Self {
            size,
            forward,
            inverse,
            work: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Forward transform of `input` (zero-padded to the transform size)
    ///
    /// `spectrum` receives `size()` half-complex values.
    pub fn forward(&mut self, input: &[f64], spectrum: &mut [f64]) {
        debug_assert!(input.len() <= self.size);
        debug_assert!(spectrum.len() >= self.size);

        let n = self.size;
        for (i, slot) in self.work.iter_mut().enumerate() {
            let re = input.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(re, 0.0);
        }

        self.forward
            .process_with_scratch(&mut self.work, &mut self.scratch);

        for k in 0..=n / 2 {
            spectrum[k] = self.work[k].re;
        }
        for k in 1..(n + 1) / 2 {
            spectrum[n - k] = self.work[k].im;
        }
    }

    /// Unnormalized inverse transform, writing the first `output.len()` samples
    pub fn inverse(&mut self, spectrum: &[f64], output: &mut [f64]) {
        self.inverse_into_work(spectrum);
        for (out, value) in output.iter_mut().zip(self.work.iter()) {
            *out = value.re;
        }
    }

    /// Inverse transform divided by the transform size, with non-finite
    /// samples replaced by zero
    pub fn inverse_normalized(&mut self, spectrum: &[f64], output: &mut [f64]) {
        self.inverse_into_work(spectrum);
        let norm = 1.0 / self.size as f64;
        for (out, value) in output.iter_mut().zip(self.work.iter()) {
            *out = sanitize(value.re * norm);
        }
    }

    fn inverse_into_work(&mut self, spectrum: &[f64]) {
        debug_assert!(spectrum.len() >= self.size);

        let n = self.size;
        self.work[0] = Complex::new(spectrum[0], 0.0);
        for k in 1..(n + 1) / 2 {
            let bin = Complex::new(spectrum[k], spectrum[n - k]);
            self.work[k] = bin;
            self.work[n - k] = bin.conj();
        }
        if n % 2 == 0 {
            self.work[n / 2] = Complex::new(spectrum[n / 2], 0.0);
        }

        self.inverse
            .process_with_scratch(&mut self.work, &mut self.scratch);
    }
}

/// Replace NaN and infinities with silence
#[inline]
pub fn sanitize(sample: f64) -> f64 {
    if sample.is_finite() {
        sample
    } else {
        0.0
    }
}

/// True for bins stored without an imaginary part (DC and, for even sizes, Nyquist)
#[inline]
fn is_real_bin(k: usize, n: usize) -> bool {
    k == 0 || (n % 2 == 0 && k == n / 2)
}

/// Magnitude of bins `0..=N/2`
pub fn magnitude(spectrum: &[f64], size: usize, out: &mut [f64]) {
    for k in 0..=size / 2 {
        out[k] = if is_real_bin(k, size) {
            spectrum[k].abs()
        } else {
            spectrum[k].hypot(spectrum[size - k])
        };
    }
}

/// Phase of bins `0..=N/2`; real bins have zero phase
pub fn phase(spectrum: &[f64], size: usize, out: &mut [f64]) {
    for k in 0..=size / 2 {
        out[k] = if is_real_bin(k, size) {
            0.0
        } else {
            spectrum[size - k].atan2(spectrum[k])
        };
    }
}

/// Rebuild a half-complex spectrum from magnitude and phase
///
/// DC and Nyquist take the magnitude as-is, so their sign is not restored.
pub fn from_polar(magnitude: &[f64], phase: &[f64], size: usize, spectrum: &mut [f64]) {
    for k in 0..=size / 2 {
        if is_real_bin(k, size) {
            spectrum[k] = magnitude[k];
        } else {
            let (sin, cos) = phase[k].sin_cos();
            spectrum[k] = magnitude[k] * cos;
            spectrum[size - k] = magnitude[k] * sin;
        }
    }
}
