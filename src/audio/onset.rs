//! Multi-feature onset-strength detection.

use rayon::prelude::*;
use std::f64::consts::PI;

use super::features::Onset;
use super::policy::AnalysisPolicy;
use super::spectral::{fft, padded_len};
use super::window::{frame_count, windowed_frame, Window};

const LOW_HZ: f64 = 30.0;
const HIGH_HZ: f64 = 4000.0;

const SPECTRAL_FLUX_WEIGHT: f64 = 0.4;
const COMPLEX_FLUX_WEIGHT: f64 = 0.3;
const PHASE_WEIGHT: f64 = 0.2;
const HFC_WEIGHT: f64 = 0.1;

/// In-band magnitude/phase of one analysis frame.
struct BandSpectrum {
    start: usize,
    mags: Vec<f64>,
    phases: Vec<f64>,
}

/// Quieter material gets stronger pre-emphasis, in [0.95, 0.98].
pub fn pre_emphasis_coefficient(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.98;
    }
    let max_abs = samples.iter().fold(0.0f64, |m, s| m.max(s.abs()));
    let mean_abs = samples.iter().map(|s| s.abs()).sum::<f64>() / samples.len() as f64;
    log::debug!("Onset input: max_abs={:.4}, mean_abs={:.4}", max_abs, mean_abs);
    0.98 - 0.03 * (mean_abs / 0.1).clamp(0.0, 1.0)
}

pub fn pre_emphasize(samples: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(samples.len());
    let mut prev = 0.0;
    for &s in samples {
        out.push(s - alpha * prev);
        prev = s;
    }
    out
}

/// Inclusive bin range covering LOW_HZ..HIGH_HZ for a frame.
fn band_bins(frame_size: usize, sample_rate: u32) -> (usize, usize) {
    let fft_len = padded_len(frame_size);
    let hz_per_bin = sample_rate as f64 / fft_len as f64;
    let lo = ((LOW_HZ / hz_per_bin).ceil() as usize).max(1);
    let hi = ((HIGH_HZ / hz_per_bin).floor() as usize).min(fft_len / 2 - 1);
    (lo, hi.max(lo))
}

fn wrap_phase(p: f64) -> f64 {
    let wrapped = (p + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped.is_finite() {
        wrapped
    } else {
        0.0
    }
}

/// One onset per consecutive frame pair, time-ordered.
pub fn detect_onsets(samples: &[f64], sample_rate: u32, policy: &AnalysisPolicy) -> Vec<Onset> {
    if samples.len() < 2 || sample_rate == 0 {
        return Vec::new();
    }

    let alpha = pre_emphasis_coefficient(samples);
    let emphasized = pre_emphasize(samples, alpha);

    let (lo, hi) = band_bins(policy.frame_size, sample_rate);
    let fft_len = padded_len(policy.frame_size);
    let hz_per_bin = sample_rate as f64 / fft_len as f64;

    // Frames are windowed inside the parallel map so only the in-band
    // spectra are held at once.
    let coefficients = Window::BlackmanHarris.coefficients(policy.frame_size);
    let total_frames = frame_count(emphasized.len(), policy.frame_size, policy.hop_size);

    let spectra: Vec<BandSpectrum> = (0..total_frames)
        .into_par_iter()
        .map(|i| {
            let start = i * policy.hop_size;
            let spectrum = fft(&windowed_frame(&emphasized, start, &coefficients));
            let band = &spectrum[lo..=hi];
            BandSpectrum {
                start,
                mags: band.iter().map(|c| c.norm()).collect(),
                phases: band.iter().map(|c| c.im.atan2(c.re)).collect(),
            }
        })
        .collect();

    let width = hi - lo;
    let hfc_from = hi - (width as f64 * 0.3).floor() as usize;

    let mut onsets = Vec::with_capacity(spectra.len().saturating_sub(1));
    for i in 1..spectra.len() {
        let prev = &spectra[i - 1];
        let curr = &spectra[i];
        // Phase advance of the previous pair, used to predict this frame.
        let before = if i >= 2 { Some(&spectra[i - 2]) } else { None };

        let mut spectral_flux = 0.0;
        let mut complex_flux = 0.0;
        let mut phase_deviation = 0.0;
        let mut high_freq_content = 0.0;
        let mut magnitude = 0.0;
        let mut weighted_freq = 0.0;

        for j in 0..curr.mags.len() {
            let bin = lo + j;
            let mag = curr.mags[j];
            let prev_mag = prev.mags[j];

            spectral_flux += (mag - prev_mag).max(0.0);

            let advance = before.map_or(0.0, |b| prev.phases[j] - b.phases[j]);
            let predicted_phase = prev.phases[j] + advance;
            let (pr, pi) = (prev_mag * predicted_phase.cos(), prev_mag * predicted_phase.sin());
            let (ar, ai) = (mag * curr.phases[j].cos(), mag * curr.phases[j].sin());
            complex_flux += ((ar - pr).powi(2) + (ai - pi).powi(2)).sqrt();

            phase_deviation += wrap_phase(curr.phases[j] - prev.phases[j]).abs() * mag;

            if bin >= hfc_from && width > 0 {
                high_freq_content += mag * (bin - lo) as f64 / width as f64;
            }

            magnitude += mag;
            weighted_freq += bin as f64 * hz_per_bin * mag;
        }

        let flux = SPECTRAL_FLUX_WEIGHT * spectral_flux
            + COMPLEX_FLUX_WEIGHT * complex_flux
            + PHASE_WEIGHT * phase_deviation
            + HFC_WEIGHT * high_freq_content;

        onsets.push(Onset {
            time: curr.start as f64 / sample_rate as f64,
            flux,
            spectral_flux,
            complex_flux,
            phase_deviation,
            high_freq_content,
            magnitude,
            centroid: if magnitude > 1e-12 { weighted_freq / magnitude } else { 0.0 },
        });
    }

    log::debug!(
        "Onset detection: {} frames ({}/{}), bins {}..={}, alpha={:.3}",
        spectra.len(),
        policy.frame_size,
        policy.hop_size,
        lo,
        hi,
        alpha
    );

    onsets
}
