//! Major/minor classification by chroma correlation against
//! Krumhansl-Schmuckler key profiles.

use rayon::prelude::*;

use super::features::{Tonality, TonalityResult};
use super::music::{pitch_class, KS_MAJOR, KS_MINOR, NOTE_NAMES};
use super::spectral::{fft, magnitudes, padded_len};
use super::window::{frame_count, Frames, Window};

const LOW_HZ: f64 = 80.0;
const HIGH_HZ: f64 = 2000.0;

/// 12-bin chroma normalised to a maximum of 1, or `None` without in-band energy.
pub fn chroma_vector(
    samples: &[f64],
    sample_rate: u32,
    frame_size: usize,
    max_frames: usize,
) -> Option<[f64; 12]> {
    if samples.is_empty() || sample_rate == 0 || frame_size < 2 {
        return None;
    }

    let hop = (frame_size / 2).max(1);
    let total = frame_count(samples.len(), frame_size, hop);
    let stride = total.div_ceil(max_frames.max(1)).max(1);

    let frames: Vec<Vec<f64>> = Frames::new(samples, frame_size, hop, Window::Hann)
        .step_by(stride)
        .map(|(_, frame)| frame)
        .collect();

    let fft_len = padded_len(frame_size);
    let hz_per_bin = sample_rate as f64 / fft_len as f64;
    let lo = ((LOW_HZ / hz_per_bin).ceil() as usize).max(1);
    let hi = ((HIGH_HZ / hz_per_bin).floor() as usize).min(fft_len / 2 - 1);
    let classes: Vec<Option<usize>> = (0..=hi)
        .map(|k| if k < lo { None } else { pitch_class(k as f64 * hz_per_bin) })
        .collect();

    let per_frame: Vec<[f64; 12]> = frames
        .par_iter()
        .map(|frame| {
            let mags = magnitudes(&fft(frame));
            let mut chroma = [0.0; 12];
            for (k, class) in classes.iter().enumerate() {
                if let Some(c) = class {
                    chroma[*c] += mags[k];
                }
            }
            chroma
        })
        .collect();

    let mut chroma = [0.0; 12];
    for frame in &per_frame {
        for (acc, v) in chroma.iter_mut().zip(frame) {
            *acc += v;
        }
    }

    let max = chroma.iter().copied().fold(0.0, f64::max);
    if max <= 1e-12 || !max.is_finite() {
        return None;
    }
    for v in chroma.iter_mut() {
        *v /= max;
    }
    Some(chroma)
}

/// Pearson correlation of `chroma` against `profile` with its tonic on `root`.
pub fn key_correlation(chroma: &[f64; 12], profile: &[f64; 12], root: usize) -> f64 {
    let template: Vec<f64> = (0..12).map(|i| profile[(i + 12 - root) % 12]).collect();
    let mean_x = chroma.iter().sum::<f64>() / 12.0;
    let mean_y = template.iter().sum::<f64>() / 12.0;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in chroma.iter().zip(&template) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
        var_y += (y - mean_y).powi(2);
    }

    let denom = (var_x * var_y).sqrt();
    if denom < 1e-12 {
        0.0
    } else {
        cov / denom
    }
}

fn best_root(chroma: &[f64; 12], profile: &[f64; 12]) -> (usize, f64) {
    (0..12)
        .map(|root| (root, key_correlation(chroma, profile, root)))
        .fold((0, f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best })
}

pub fn detect_tonality(
    samples: &[f64],
    sample_rate: u32,
    frame_size: usize,
    max_frames: usize,
) -> TonalityResult {
    let Some(chroma) = chroma_vector(samples, sample_rate, frame_size, max_frames) else {
        return TonalityResult::unknown();
    };

    let (major_root, major_corr) = best_root(&chroma, &KS_MAJOR);
    let (minor_root, minor_corr) = best_root(&chroma, &KS_MINOR);
    if !major_corr.is_finite() || !minor_corr.is_finite() {
        return TonalityResult::unknown();
    }

    let (tonality, root, winner) = if major_corr >= minor_corr {
        (Tonality::Major, major_root, major_corr)
    } else {
        (Tonality::Minor, minor_root, minor_corr)
    };
    if winner <= 0.0 {
        return TonalityResult {
            major_correlation: major_corr,
            minor_correlation: minor_corr,
            ..TonalityResult::unknown()
        };
    }

    let result = TonalityResult {
        tonality,
        key_note: NOTE_NAMES[root].to_string(),
        confidence: winner.clamp(0.0, 1.0),
        major_correlation: major_corr,
        minor_correlation: minor_corr,
    };
    log::info!(
        "Tonality: {} {:?} (major r={:.3}, minor r={:.3})",
        result.key_note,
        result.tonality,
        major_corr,
        minor_corr
    );
    result
}
