use rayon::prelude::*;

use super::features::StatsResult;
use super::spectral::{bin_frequency, fft, magnitudes, padded_len};
use super::window::Window;

const CENTROID_FRAME_SIZE: usize = 2048;

/// Loudness and brightness summary.
///
/// Amplitude statistics visit at most ~`sample_cap` samples (evenly strided),
/// so on long files they are representative rather than exhaustive. The
/// spectral centroid averages `centroid_frames` Hann-windowed frames spread
/// across the buffer.
pub fn compute_stats(
    samples: &[f64],
    sample_rate: u32,
    sample_cap: usize,
    centroid_frames: usize,
) -> StatsResult {
    if samples.is_empty() || sample_rate == 0 {
        return StatsResult::zeroed(sample_rate);
    }

    let duration = samples.len() as f64 / sample_rate as f64;
    let stride = (samples.len() / sample_cap.max(1)).max(1);

    let mut sum_sq = 0.0;
    let mut peak = 0.0f64;
    let mut crossings = 0usize;
    let mut visited = 0usize;
    let mut prev: Option<f64> = None;

    for &s in samples.iter().step_by(stride) {
        sum_sq += s * s;
        peak = peak.max(s.abs());
        if let Some(p) = prev {
            if (s >= 0.0) != (p >= 0.0) {
                crossings += 1;
            }
        }
        prev = Some(s);
        visited += 1;
    }

    let rms = (sum_sq / visited as f64).sqrt();
    // Each visited crossing stands in for `stride` samples of signal.
    let zero_crossing_rate = (crossings * stride) as f64 / duration;

    let spectral_centroid_hz = spectral_centroid(samples, sample_rate, centroid_frames);

    let stats = StatsResult {
        duration_seconds: duration,
        rms,
        peak,
        dynamic_range: peak - rms,
        zero_crossing_rate,
        spectral_centroid_hz,
        sample_rate,
    };

    if stats.is_finite() {
        stats
    } else {
        log::warn!("Statistics produced non-finite values, reporting zeros");
        StatsResult::zeroed(sample_rate)
    }
}

fn spectral_centroid(samples: &[f64], sample_rate: u32, frame_count: usize) -> f64 {
    let frame_size = CENTROID_FRAME_SIZE.min(samples.len());
    if frame_size < 2 || frame_count == 0 {
        return 0.0;
    }

    let span = samples.len() - frame_size;
    let offsets: Vec<usize> = if frame_count == 1 || span == 0 {
        vec![span / 2]
    } else {
        (0..frame_count)
            .map(|i| i * span / (frame_count - 1))
            .collect()
    };

    let per_frame: Vec<Option<f64>> = offsets
        .par_iter()
        .map(|&start| {
            let frame = Window::Hann.apply(&samples[start..start + frame_size]);
            let mags = magnitudes(&fft(&frame));
            let bins = padded_len(frame_size) / 2;

            let mut weighted = 0.0;
            let mut total = 0.0;
            for (k, &m) in mags.iter().take(bins).enumerate() {
                weighted += bin_frequency(k, frame_size, sample_rate) * m;
                total += m;
            }
            (total > 1e-12).then(|| weighted / total)
        })
        .collect();

    let voiced: Vec<f64> = per_frame.into_iter().flatten().collect();
    if voiced.is_empty() {
        0.0
    } else {
        voiced.iter().sum::<f64>() / voiced.len() as f64
    }
}
