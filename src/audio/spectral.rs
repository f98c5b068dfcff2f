//! Radix-2 FFT used by every frequency-domain stage.
//!
//! Inputs of any length are zero-padded to the next power of two, transformed,
//! and truncated back to the input length. Bin `k` of the result therefore
//! corresponds to `k * sample_rate / padded_len(n)`, not `k * sample_rate / n`.

use rustfft::num_complex::Complex;
use std::f64::consts::PI;

pub type Complex64 = Complex<f64>;

pub fn padded_len(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

pub fn fft(signal: &[f64]) -> Vec<Complex64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex64> = signal.iter().map(|&s| Complex::new(s, 0.0)).collect();
    buffer.resize(padded_len(n), Complex::new(0.0, 0.0));

    let mut spectrum = transform(buffer);
    spectrum.truncate(n);
    spectrum
}

// Decimation in time: transform even and odd halves, combine with twiddles.
fn transform(input: Vec<Complex64>) -> Vec<Complex64> {
    let n = input.len();
    if n <= 1 {
        return input;
    }

    let (even, odd): (Vec<_>, Vec<_>) = input.chunks_exact(2).map(|p| (p[0], p[1])).unzip();
    let even = transform(even);
    let odd = transform(odd);

    let half = n / 2;
    let mut out = vec![Complex::new(0.0, 0.0); n];
    for k in 0..half {
        let twiddle = Complex::from_polar(1.0, -2.0 * PI * k as f64 / n as f64) * odd[k];
        out[k] = even[k] + twiddle;
        out[k + half] = even[k] - twiddle;
    }
    out
}

pub fn magnitudes(spectrum: &[Complex64]) -> Vec<f64> {
    spectrum.iter().map(|c| (c.re * c.re + c.im * c.im).sqrt()).collect()
}

pub fn phases(spectrum: &[Complex64]) -> Vec<f64> {
    spectrum.iter().map(|c| c.im.atan2(c.re)).collect()
}

pub fn bin_frequency(bin: usize, fft_len: usize, sample_rate: u32) -> f64 {
    bin as f64 * sample_rate as f64 / padded_len(fft_len) as f64
}

/// Sub-bin offset in [-0.5, 0.5] of a peak from its two neighbours.
pub fn parabolic_offset(prev: f64, curr: f64, next: f64) -> f64 {
    let denom = prev - 2.0 * curr + next;
    if denom.abs() < 1e-12 {
        return 0.0;
    }
    (0.5 * (prev - next) / denom).clamp(-0.5, 0.5)
}
