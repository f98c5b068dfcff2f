use super::features::{Onset, Peak};

/// Onsets shorter than this count as a "short sequence".
const SHORT_SEQUENCE: usize = 20;
/// Candidate rate above which material counts as dense.
const DENSE_PER_SECOND: f64 = 4.0;
const DENSE_GAP_SCALE: f64 = 0.75;

fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Adaptive flux threshold from the onset flux distribution.
pub fn adaptive_threshold(fluxes: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = fluxes.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = percentile(&sorted, 0.5);
    let p75 = percentile(&sorted, 0.75);
    let p90 = percentile(&sorted, 0.9);
    let max = sorted.last().copied().unwrap_or(0.0);
    if max <= 0.0 {
        return 0.0;
    }

    let low_dynamic = (max - median) / max < 0.3;
    let short = fluxes.len() < 50;
    let k = if low_dynamic {
        0.25
    } else if short {
        0.35
    } else if fluxes.len() > 500 {
        0.6
    } else {
        0.5
    };

    let mut threshold = median + k * (p90 - median);
    // Short sequences never demand more than the upper quartile.
    if short && !low_dynamic {
        threshold = threshold.min(p75);
    }
    threshold.max(0.05 * max)
}

fn is_local_max(onsets: &[Onset], i: usize, radius: usize) -> bool {
    let from = i.saturating_sub(radius);
    let to = (i + radius).min(onsets.len() - 1);
    let flux = onsets[i].flux;
    // Ties resolve to the earliest index of a plateau.
    (from..i).all(|j| onsets[j].flux < flux) && (i + 1..=to).all(|j| onsets[j].flux <= flux)
}

fn validation_votes(onset: &Onset) -> usize {
    let mut votes = 0;
    if onset.high_freq_content > 0.0 {
        votes += 1;
    }
    if onset.phase_deviation > 0.1 * onset.flux {
        votes += 1;
    }
    if onset.spectral_flux > 0.3 * onset.flux {
        votes += 1;
    }
    votes
}

/// `min_gap` shortened for dense material, judged by how many candidates
/// cross the threshold per second of onset span.
fn density_gap(candidates: usize, onsets: &[Onset], min_gap: f64) -> f64 {
    let span = match (onsets.first(), onsets.last()) {
        (Some(first), Some(last)) => last.time - first.time,
        _ => 0.0,
    };
    if span > 0.0 && candidates as f64 / span > DENSE_PER_SECOND {
        min_gap * DENSE_GAP_SCALE
    } else {
        min_gap
    }
}

/// Keep candidates at least `min_gap` apart, preferring the stronger one.
fn enforce_gap(mut candidates: Vec<Peak>, min_gap: f64) -> Vec<Peak> {
    candidates.sort_by(|a, b| a.time.total_cmp(&b.time));
    let mut accepted: Vec<Peak> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        match accepted.last_mut() {
            Some(last) if candidate.time - last.time < min_gap => {
                if candidate.flux > last.flux {
                    *last = candidate;
                }
            }
            _ => accepted.push(candidate),
        }
    }
    accepted
}

/// Musically significant subset of `onsets`, time-sorted and spaced at least
/// `min_gap` seconds apart, or three quarters of it for dense material (fewer
/// than 3 onsets pass through untouched).
pub fn pick_peaks(onsets: &[Onset], min_gap: f64) -> Vec<Peak> {
    if onsets.len() < 3 {
        return onsets.to_vec();
    }

    let fluxes: Vec<f64> = onsets.iter().map(|o| o.flux).collect();
    let max = fluxes.iter().copied().fold(0.0, f64::max);
    if max <= 0.0 {
        return Vec::new();
    }

    let threshold = adaptive_threshold(&fluxes);
    let short = onsets.len() < SHORT_SEQUENCE;
    let required_votes = if short { 1 } else { 2 };

    let radius = if short { 2 } else { 4 };
    let passes = [(radius, threshold), ((radius / 2).max(1), threshold * 0.7)];

    let mut taken = vec![false; onsets.len()];
    let mut candidates: Vec<Peak> = Vec::new();
    for (radius, threshold) in passes {
        for i in 0..onsets.len() {
            if taken[i] || onsets[i].flux <= threshold {
                continue;
            }
            if is_local_max(onsets, i, radius) && validation_votes(&onsets[i]) >= required_votes {
                taken[i] = true;
                candidates.push(onsets[i].clone());
            }
        }
    }

    let min_gap = density_gap(candidates.len(), onsets, min_gap);
    let mut peaks = enforce_gap(candidates, min_gap);

    if peaks.len() < 4 && onsets.len() > 10 {
        let mut sorted = fluxes.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let floor = percentile(&sorted, 0.5);

        let mut weaker: Vec<&Onset> = (0..onsets.len())
            .filter(|&i| !taken[i] && onsets[i].flux > floor && is_local_max(onsets, i, 1))
            .map(|i| &onsets[i])
            .collect();
        weaker.sort_by(|a, b| b.flux.total_cmp(&a.flux));

        let mut added = 0;
        for onset in weaker {
            if added == 3 {
                break;
            }
            if peaks.iter().all(|p| (p.time - onset.time).abs() >= 2.0 * min_gap) {
                peaks.push(onset.clone());
                added += 1;
            }
        }
        peaks.sort_by(|a, b| a.time.total_cmp(&b.time));
        log::debug!("Relaxed peak pass added {} peaks", added);
    }

    log::debug!(
        "Peak picking: {} of {} onsets (threshold {:.4}, gap {:.3}s)",
        peaks.len(),
        onsets.len(),
        threshold,
        min_gap
    );
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn onset(time: f64, flux: f64) -> Onset {
        Onset {
            time,
            flux,
            spectral_flux: flux * 0.5,
            complex_flux: flux * 0.5,
            phase_deviation: flux * 0.3,
            high_freq_content: flux * 0.1,
            magnitude: flux,
            centroid: 1000.0,
        }
    }

    fn pulse_train(count: usize, every: usize, dt: f64) -> Vec<Onset> {
        (0..count)
            .map(|i| {
                let flux = if i % every == 0 { 1.0 } else { 0.01 };
                onset(i as f64 * dt, flux)
            })
            .collect()
    }

    #[test]
    fn fewer_than_three_pass_through() {
        let onsets = vec![onset(0.1, 0.0), onset(0.2, 5.0)];
        assert_eq!(pick_peaks(&onsets, 0.1), onsets);
    }

    #[test]
    fn picks_regular_pulses() {
        let onsets = pulse_train(400, 40, 0.0125);
        let peaks = pick_peaks(&onsets, 0.1);
        assert_eq!(peaks.len(), 10);
        for w in peaks.windows(2) {
            assert!((w[1].time - w[0].time - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn adjacent_peaks_respect_min_gap() {
        let mut onsets = pulse_train(300, 10, 0.01);
        // A competing spike just after each pulse.
        for i in (3..300).step_by(10) {
            onsets[i].flux = 0.8;
        }
        let gap = 0.05;
        let peaks = pick_peaks(&onsets, gap);
        assert!(!peaks.is_empty());
        for w in peaks.windows(2) {
            assert!(w[1].time - w[0].time >= gap - 1e-12);
        }
        // The stronger pulse wins every conflict.
        assert!(peaks.iter().all(|p| p.flux == 1.0));
    }

    #[test]
    fn dense_material_shortens_the_gap() {
        // Ten pulses per second: a 0.12 s gap would drop every other one.
        let onsets = pulse_train(400, 10, 0.01);
        let peaks = pick_peaks(&onsets, 0.12);
        assert_eq!(peaks.len(), 40);
        for w in peaks.windows(2) {
            assert!(w[1].time - w[0].time >= 0.12 * DENSE_GAP_SCALE - 1e-9);
        }

        // Two pulses per second keep the full gap.
        let sparse = pulse_train(400, 50, 0.01);
        assert_eq!(density_gap(8, &sparse, 0.12), 0.12);
    }

    #[test]
    fn all_zero_flux_gives_no_peaks() {
        let onsets: Vec<Onset> = (0..50).map(|i| onset(i as f64 * 0.01, 0.0)).collect();
        assert!(pick_peaks(&onsets, 0.1).is_empty());
    }

    #[test]
    fn relaxed_pass_recovers_weak_maxima() {
        // One dominant spike, several modest ones that fail the main threshold.
        let mut onsets: Vec<Onset> = (0..60).map(|i| onset(i as f64 * 0.05, 0.01)).collect();
        onsets[5].flux = 10.0;
        for i in [20, 35, 50] {
            onsets[i] = onset(i as f64 * 0.05, 0.3);
        }
        let peaks = pick_peaks(&onsets, 0.1);
        assert!(peaks.len() >= 2);
        assert!(peaks.windows(2).all(|w| w[0].time < w[1].time));
    }

    #[test]
    fn short_sequences_cap_threshold_at_upper_quartile() {
        // Three quarters of the frames are quiet, the rest ten times louder.
        let short: Vec<f64> = (0..30).map(|i| if i < 23 { 1.0 } else { 10.0 }).collect();
        assert!((adaptive_threshold(&short) - 1.0).abs() < 1e-12);

        let long: Vec<f64> = (0..60).map(|i| if i < 46 { 1.0 } else { 10.0 }).collect();
        assert!((adaptive_threshold(&long) - 5.5).abs() < 1e-12);
    }

    #[test]
    fn threshold_floors_at_five_percent_of_max() {
        let mut fluxes = vec![0.0; 100];
        fluxes[10] = 2.0;
        assert!((adaptive_threshold(&fluxes) - 0.1).abs() < 1e-12);
    }
}
