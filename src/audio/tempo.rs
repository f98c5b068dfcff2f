//! Tempo estimation from picked onset peaks.
//!
//! Three estimators run independently (onset autocorrelation, multi-hypothesis
//! interval tracking, and direct interval analysis for short clips). Their
//! candidates are grouped by agreement, the strongest group is averaged, and
//! the result is snapped to a common tempo and refined against the peak grid.

use super::features::{Peak, TempoCandidate, TempoMethod, TempoResult};
use super::music::COMMON_TEMPI;
use super::policy::{policy_for, AnalysisPolicy, MAX_BPM, MIN_BPM};
use super::spectral::parabolic_offset;

pub const DEFAULT_BPM: f64 = 120.0;
pub const DEFAULT_CONFIDENCE: f64 = 0.1;
const MIN_DURATION: f64 = 0.5;

const MIN_CORRELATION: f64 = 0.1;
/// Share of the strongest correlogram peak a shorter lag needs to be preferred.
const SHORTEST_LAG_RATIO: f64 = 0.9;
const GROUP_TOLERANCE: f64 = 3.0;
const MAX_GROUP_CONFIDENCE: f64 = 0.95;
const SNAP_MIN_CONFIDENCE: f64 = 0.3;
/// Anchors tried when aligning a beat grid to the peaks.
const ALIGNMENT_ANCHORS: usize = 8;

/// (multiple of the inter-peak tempo, prior weight)
const HYPOTHESES: [(f64, f64); 7] = [
    (1.0, 1.0),
    (2.0, 0.5),
    (0.5, 0.5),
    (3.0, 0.25),
    (1.0 / 3.0, 0.25),
    (1.5, 0.3),
    (2.0 / 3.0, 0.3),
];

fn in_band(bpm: f64) -> bool {
    bpm.is_finite() && (MIN_BPM..=MAX_BPM).contains(&bpm)
}

pub fn default_tempo(peak_count: usize, duration: f64) -> TempoResult {
    TempoResult {
        bpm: DEFAULT_BPM,
        confidence: DEFAULT_CONFIDENCE,
        method: "default".to_string(),
        peak_count,
        audio_duration_seconds: duration,
    }
}

pub fn estimate_tempo(peaks: &[Peak], sample_rate: u32, duration: f64) -> TempoResult {
    if sample_rate == 0 || duration < MIN_DURATION || peaks.len() < 2 {
        log::debug!(
            "Tempo: insufficient data ({} peaks, {:.2}s), using default",
            peaks.len(),
            duration
        );
        return default_tempo(peaks.len(), duration);
    }

    let policy = policy_for(duration);
    let mut candidates = Vec::new();

    if let Some(c) = autocorrelation_tempo(peaks, duration, policy.onset_resolution) {
        candidates.push(c);
    }
    if let Some(c) = interval_tempo(peaks) {
        candidates.push(c);
    }
    if policy.short_clip {
        if let Some(c) = direct_interval_tempo(peaks) {
            candidates.push(c);
        }
    }

    for c in &candidates {
        log::debug!(
            "Tempo candidate: {:.2} BPM (confidence {:.3}, {})",
            c.bpm,
            c.confidence,
            c.method.name()
        );
    }

    let Some((bpm, confidence, method)) = reconcile(&candidates) else {
        return default_tempo(peaks.len(), duration);
    };

    let snapped = snap_to_common(bpm, confidence, policy.snap_tolerance);
    let (bpm, confidence) = match refine_with_beats(peaks, snapped, &policy) {
        Some((refined, score)) => (refined, 0.7 * confidence + 0.3 * score),
        None => (snapped, confidence),
    };

    let result = TempoResult {
        bpm: bpm.clamp(MIN_BPM, MAX_BPM),
        confidence: confidence.clamp(0.05, 1.0),
        method,
        peak_count: peaks.len(),
        audio_duration_seconds: duration,
    };
    log::info!(
        "Tempo: {:.2} BPM (confidence {:.2}, {}, {} peaks)",
        result.bpm,
        result.confidence,
        result.method,
        result.peak_count
    );
    result
}

/// Peak fluxes spread onto a uniform time grid by linear interpolation,
/// then smoothed with a 3-tap triangle.
fn onset_strength_signal(peaks: &[Peak], duration: f64, resolution: f64) -> Vec<f64> {
    let len = (duration / resolution).ceil() as usize + 2;
    let mut raw = vec![0.0; len];
    for p in peaks {
        let pos = p.time / resolution;
        let i = pos.floor() as usize;
        let frac = pos - i as f64;
        if i + 1 < len {
            raw[i] += p.flux * (1.0 - frac);
            raw[i + 1] += p.flux * frac;
        }
    }

    (0..len)
        .map(|i| {
            let left = if i > 0 { raw[i - 1] } else { 0.0 };
            let right = if i + 1 < len { raw[i + 1] } else { 0.0 };
            0.25 * left + 0.5 * raw[i] + 0.25 * right
        })
        .collect()
}

pub fn autocorrelation_tempo(
    peaks: &[Peak],
    duration: f64,
    resolution: f64,
) -> Option<TempoCandidate> {
    if peaks.len() < 3 || resolution <= 0.0 {
        return None;
    }

    let signal = onset_strength_signal(peaks, duration, resolution);
    let n = signal.len();
    let energy: f64 = signal.iter().map(|x| x * x).sum();
    if energy < 1e-12 {
        return None;
    }

    let min_lag = ((60.0 / (MAX_BPM * resolution)).floor() as usize).max(2);
    let max_lag = ((60.0 / (MIN_BPM * resolution)).ceil() as usize).min(n.saturating_sub(2));
    if min_lag + 2 > max_lag {
        return None;
    }

    let corr_at = |lag: usize| -> f64 {
        signal[..n - lag]
            .iter()
            .zip(signal[lag..].iter())
            .map(|(a, b)| a * b)
            .sum::<f64>()
            / energy
    };
    // Index 0 holds lag `min_lag - 1`.
    let correlogram: Vec<f64> = (min_lag - 1..=max_lag + 1).map(corr_at).collect();

    let maxima: Vec<(usize, f64)> = (1..correlogram.len() - 1)
        .filter(|&idx| {
            let r = correlogram[idx];
            r > correlogram[idx - 1] && r >= correlogram[idx + 1] && r >= MIN_CORRELATION
        })
        .map(|idx| (idx, correlogram[idx]))
        .collect();
    let top = maxima.iter().map(|&(_, r)| r).fold(f64::NEG_INFINITY, f64::max);
    // Multiples of the beat period correlate about as well as the period itself
    // (better when it falls between grid steps); take the shortest strong lag.
    let (idx, r) = maxima
        .into_iter()
        .find(|&(_, r)| r >= SHORTEST_LAG_RATIO * top)?;

    let offset = parabolic_offset(correlogram[idx - 1], r, correlogram[idx + 1]);
    let lag = (min_lag - 1 + idx) as f64 + offset;
    let bpm = 60.0 / (lag * resolution);
    if !in_band(bpm) {
        return None;
    }

    Some(TempoCandidate {
        bpm,
        confidence: r.clamp(0.0, 1.0),
        method: TempoMethod::Autocorrelation,
    })
}

pub fn interval_tempo(peaks: &[Peak]) -> Option<TempoCandidate> {
    let buckets = (MAX_BPM - MIN_BPM) as usize + 1;
    let mut weights = vec![0.0; buckets];
    let mut counts = vec![0usize; buckets];
    let mut bpm_sums = vec![0.0; buckets];
    let mut intervals = 0usize;

    for pair in peaks.windows(2) {
        let dt = pair[1].time - pair[0].time;
        if dt <= 0.0 {
            continue;
        }
        intervals += 1;
        let base = 60.0 / dt;
        let pair_weight = pair[0].flux * pair[1].flux;

        for (multiple, prior) in HYPOTHESES {
            let bpm = base * multiple;
            if !in_band(bpm) {
                continue;
            }
            let b = (bpm - MIN_BPM).round() as usize;
            let w = pair_weight * prior;
            weights[b] += w;
            counts[b] += 1;
            bpm_sums[b] += bpm * w;
        }
    }

    let total_weight: f64 = weights.iter().sum();
    if intervals == 0 || total_weight <= 0.0 {
        return None;
    }

    let neighbourhood = |b: usize| b.saturating_sub(1)..=(b + 1).min(buckets - 1);

    let mut best: Option<(usize, f64)> = None;
    for b in 0..buckets {
        let w: f64 = neighbourhood(b).map(|i| weights[i]).sum();
        let c: usize = neighbourhood(b).map(|i| counts[i]).sum();
        let score = w * ((c + 1) as f64).ln();
        if score > 0.0 && best.map_or(true, |(_, s)| score > s) {
            best = Some((b, score));
        }
    }
    let (b, _) = best?;

    let w: f64 = neighbourhood(b).map(|i| weights[i]).sum();
    let c: usize = neighbourhood(b).map(|i| counts[i]).sum();
    let bpm = neighbourhood(b).map(|i| bpm_sums[i]).sum::<f64>() / w;

    let support = (c as f64 / intervals as f64).min(1.0);
    let dominance = w / total_weight;

    Some(TempoCandidate {
        bpm,
        confidence: (0.5 * support + 0.5 * dominance).clamp(0.0, 1.0),
        method: TempoMethod::IntervalTracking,
    })
}

pub fn direct_interval_tempo(peaks: &[Peak]) -> Option<TempoCandidate> {
    let mut bpms: Vec<f64> = peaks
        .windows(2)
        .map(|pair| pair[1].time - pair[0].time)
        .filter(|&dt| dt > 0.0)
        .map(|dt| 60.0 / dt)
        .filter(|&bpm| in_band(bpm))
        .collect();
    if bpms.is_empty() {
        return None;
    }

    bpms.sort_by(|a, b| a.total_cmp(b));
    let median = bpms[bpms.len() / 2];
    let mean = bpms.iter().sum::<f64>() / bpms.len() as f64;
    let variance = bpms.iter().map(|b| (b - mean).powi(2)).sum::<f64>() / bpms.len() as f64;
    let relative_std = variance.sqrt() / mean;

    Some(TempoCandidate {
        bpm: median,
        confidence: (1.0 - relative_std).clamp(0.1, 0.9),
        method: TempoMethod::DirectInterval,
    })
}

fn method_weight(method: TempoMethod) -> f64 {
    match method {
        TempoMethod::Autocorrelation => 1.0,
        TempoMethod::IntervalTracking => 0.9,
        TempoMethod::DirectInterval => 0.8,
    }
}

/// Moves candidates lying a factor of 2 away from the strongest interval-based
/// estimate onto its octave, so double/half-time readings join its group.
fn fold_octaves(candidates: &[TempoCandidate]) -> Vec<TempoCandidate> {
    let reference = candidates
        .iter()
        .filter(|c| c.method != TempoMethod::Autocorrelation)
        .max_by(|a, b| {
            (a.confidence * method_weight(a.method))
                .total_cmp(&(b.confidence * method_weight(b.method)))
        });
    let Some(reference) = reference else {
        return candidates.to_vec();
    };

    candidates
        .iter()
        .map(|c| {
            let mut folded = c.clone();
            if (c.bpm - reference.bpm).abs() > GROUP_TOLERANCE {
                if let Some(factor) = [2.0, 0.5]
                    .into_iter()
                    .find(|f| (c.bpm * f - reference.bpm).abs() <= GROUP_TOLERANCE)
                {
                    log::debug!(
                        "Folding {} candidate {:.2} -> {:.2} BPM",
                        c.method.name(),
                        c.bpm,
                        c.bpm * factor
                    );
                    folded.bpm = c.bpm * factor;
                }
            }
            folded
        })
        .collect()
}

/// Confidence-weighted average of the best-supported agreement group, after
/// octave folding. Returns (bpm, confidence, methods).
pub fn reconcile(candidates: &[TempoCandidate]) -> Option<(f64, f64, String)> {
    let folded = fold_octaves(candidates);
    let mut best: Option<(f64, Vec<&TempoCandidate>)> = None;
    for seed in &folded {
        let group: Vec<&TempoCandidate> = folded
            .iter()
            .filter(|c| (c.bpm - seed.bpm).abs() <= GROUP_TOLERANCE)
            .collect();
        let score: f64 = group.iter().map(|c| c.confidence * method_weight(c.method)).sum();
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, group));
        }
    }
    let (score, group) = best?;

    let bpm = if score > 0.0 {
        group
            .iter()
            .map(|c| c.bpm * c.confidence * method_weight(c.method))
            .sum::<f64>()
            / score
    } else {
        group.iter().map(|c| c.bpm).sum::<f64>() / group.len() as f64
    };

    let total_weight: f64 = group.iter().map(|c| method_weight(c.method)).sum();
    let boost = 1.0 + 0.15 * (group.len() - 1) as f64;
    let confidence = (score / total_weight * boost).min(MAX_GROUP_CONFIDENCE);

    let method = group
        .iter()
        .map(|c| c.method.name())
        .collect::<Vec<_>>()
        .join("+");

    Some((bpm, confidence, method))
}

pub fn snap_to_common(bpm: f64, confidence: f64, tolerance: f64) -> f64 {
    if confidence < SNAP_MIN_CONFIDENCE {
        return bpm;
    }
    let nearest = COMMON_TEMPI
        .iter()
        .copied()
        .min_by(|a, b| (a - bpm).abs().total_cmp(&(b - bpm).abs()))
        .unwrap_or(bpm);
    if (nearest - bpm).abs() <= tolerance {
        nearest
    } else {
        bpm
    }
}

/// Flux-weighted fraction of peaks falling on a beat grid at `bpm`, in [0, 1].
pub fn beat_alignment_score(peaks: &[Peak], bpm: f64) -> f64 {
    if peaks.is_empty() || bpm <= 0.0 {
        return 0.0;
    }
    let period = 60.0 / bpm;
    let tolerance = 0.1 * period;

    let total_flux: f64 = peaks.iter().map(|p| p.flux).sum();
    let uniform = total_flux <= 0.0;
    let weight = |p: &Peak| if uniform { 1.0 } else { p.flux };
    let total = if uniform { peaks.len() as f64 } else { total_flux };

    let mut best = 0.0f64;
    for anchor in peaks.iter().take(ALIGNMENT_ANCHORS) {
        let score: f64 = peaks
            .iter()
            .map(|p| {
                let beats = (p.time - anchor.time) / period;
                let distance = (beats - beats.round()).abs() * period;
                if distance < tolerance {
                    weight(p) * (1.0 - distance / tolerance)
                } else {
                    0.0
                }
            })
            .sum();
        best = best.max(score);
    }
    (best / total).clamp(0.0, 1.0)
}

/// Best-aligned BPM near `bpm` and its alignment score.
fn refine_with_beats(peaks: &[Peak], bpm: f64, policy: &AnalysisPolicy) -> Option<(f64, f64)> {
    if peaks.len() < 3 || policy.refine_step <= 0.0 {
        return None;
    }

    let steps = (policy.refine_span / policy.refine_step).round() as i64;
    let mut best_bpm = bpm;
    let mut best_score = beat_alignment_score(peaks, bpm);

    for s in -steps..=steps {
        let candidate = bpm + s as f64 * policy.refine_step;
        if s == 0 || !in_band(candidate) {
            continue;
        }
        let score = beat_alignment_score(peaks, candidate);
        if score > best_score + 1e-9 {
            best_score = score;
            best_bpm = candidate;
        }
    }

    log::debug!(
        "Beat refinement: {:.2} -> {:.2} BPM (alignment {:.3})",
        bpm,
        best_bpm,
        best_score
    );
    Some((best_bpm, best_score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::Onset;

    fn peak(time: f64, flux: f64) -> Peak {
        Onset {
            time,
            flux,
            spectral_flux: flux,
            complex_flux: flux,
            phase_deviation: flux,
            high_freq_content: flux,
            magnitude: flux,
            centroid: 1000.0,
        }
    }

    fn candidate(bpm: f64, confidence: f64, method: TempoMethod) -> TempoCandidate {
        TempoCandidate {
            bpm,
            confidence,
            method,
        }
    }

    fn grid(bpm: f64, seconds: f64) -> Vec<Peak> {
        let period = 60.0 / bpm;
        let mut peaks = Vec::new();
        let mut t = 0.1;
        while t < seconds {
            peaks.push(peak(t, 1.0));
            t += period;
        }
        peaks
    }

    #[test]
    fn too_few_peaks_gives_default() {
        let result = estimate_tempo(&[peak(1.0, 1.0)], 44100, 10.0);
        assert_eq!(result.bpm, DEFAULT_BPM);
        assert!(result.confidence <= 0.2);
        assert_eq!(result.method, "default");
    }

    #[test]
    fn very_short_audio_gives_default() {
        let peaks = grid(120.0, 0.45);
        let result = estimate_tempo(&peaks, 44100, 0.45);
        assert_eq!(result.bpm, DEFAULT_BPM);
        assert_eq!(result.confidence, DEFAULT_CONFIDENCE);
    }

    #[test]
    fn autocorrelation_finds_grid_period() {
        let peaks = grid(100.0, 12.0);
        let c = autocorrelation_tempo(&peaks, 12.0, 0.01).unwrap();
        assert!((c.bpm - 100.0).abs() < 1.5, "bpm {}", c.bpm);
        assert!(c.confidence > 0.5);
    }

    #[test]
    fn autocorrelation_prefers_period_over_its_multiple() {
        // Beat periods falling between grid steps (62.5 and 37.5 at 10 ms).
        for bpm in [96.0, 110.0, 160.0, 174.0] {
            let peaks = grid(bpm, 20.0);
            let c = autocorrelation_tempo(&peaks, 20.0, 0.01).unwrap();
            assert!((c.bpm - bpm).abs() < 1.0, "{} vs {}", c.bpm, bpm);
            assert!(c.confidence > 0.8);
        }
    }

    #[test]
    fn interval_tracking_prefers_base_hypothesis() {
        let peaks = grid(128.0, 10.0);
        let c = interval_tempo(&peaks).unwrap();
        assert!((c.bpm - 128.0).abs() < 1.0, "bpm {}", c.bpm);
        assert!(c.confidence > 0.5);
    }

    #[test]
    fn direct_interval_on_short_clip() {
        let peaks = grid(150.0, 2.5);
        let c = direct_interval_tempo(&peaks).unwrap();
        assert!((c.bpm - 150.0).abs() < 0.5);
        assert!(c.confidence >= 0.85);
    }

    #[test]
    fn reconcile_prefers_agreeing_group() {
        let candidates = vec![
            candidate(120.0, 0.6, TempoMethod::Autocorrelation),
            candidate(121.0, 0.6, TempoMethod::IntervalTracking),
            candidate(90.0, 0.9, TempoMethod::DirectInterval),
        ];
        let (bpm, confidence, method) = reconcile(&candidates).unwrap();
        assert!(bpm > 119.9 && bpm < 121.0);
        assert!(confidence > 0.6 && confidence <= 0.95);
        assert_eq!(method, "autocorrelation+interval");
    }

    #[test]
    fn reconcile_folds_half_time_onto_interval_estimate() {
        let candidates = vec![
            candidate(48.0, 0.94, TempoMethod::Autocorrelation),
            candidate(96.0, 0.69, TempoMethod::IntervalTracking),
        ];
        let (bpm, confidence, method) = reconcile(&candidates).unwrap();
        assert!((bpm - 96.0).abs() < 1e-9, "bpm {}", bpm);
        assert!(confidence > 0.9);
        assert_eq!(method, "autocorrelation+interval");

        // Without an interval-based reference nothing is folded.
        let lone = [candidate(80.0, 0.96, TempoMethod::Autocorrelation)];
        assert_eq!(reconcile(&lone).unwrap().0, 80.0);
    }

    #[test]
    fn reconcile_of_nothing_is_none() {
        assert!(reconcile(&[]).is_none());
    }

    #[test]
    fn snapping_needs_confidence_and_proximity() {
        assert_eq!(snap_to_common(118.7, 0.8, 2.0), 120.0);
        assert_eq!(snap_to_common(118.7, 0.2, 2.0), 118.7);
        assert_eq!(snap_to_common(117.5, 0.8, 2.0), 117.5);
        assert_eq!(snap_to_common(127.5, 0.8, 3.0), 125.0);
    }

    #[test]
    fn alignment_is_highest_at_true_tempo() {
        let peaks = grid(120.0, 10.0);
        let exact = beat_alignment_score(&peaks, 120.0);
        assert!(exact > 0.99);
        assert!(beat_alignment_score(&peaks, 123.0) < exact);
        assert!(beat_alignment_score(&peaks, 97.0) < exact);
    }

    #[test]
    fn full_estimate_on_grid_is_bounded_and_accurate() {
        for bpm in [60.0, 72.0, 96.0, 110.0, 120.0, 128.0, 140.0, 160.0, 174.0, 190.0] {
            for seconds in [2.5, 8.0, 20.0] {
                let peaks = grid(bpm, seconds);
                let result = estimate_tempo(&peaks, 44100, seconds);
                assert!((MIN_BPM..=MAX_BPM).contains(&result.bpm));
                assert!((0.05..=1.0).contains(&result.confidence));
                assert!(
                    (result.bpm - bpm).abs() < 2.0,
                    "{} vs {} over {}s",
                    result.bpm,
                    bpm,
                    seconds
                );
            }
        }
    }
}
