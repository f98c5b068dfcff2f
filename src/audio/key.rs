use super::features::KeyResult;
use super::music::{half_steps_from_c0, NOTE_NAMES};
use super::spectral::{fft, magnitudes, padded_len, parabolic_offset};
use super::window::Window;

const LOW_HZ: f64 = 80.0;
const HIGH_HZ: f64 = 2000.0;
const MIN_SEGMENT: usize = 64;
/// Bins on each side of the dominant bin counted towards its energy share.
const PEAK_SPREAD: usize = 2;

/// Dominant pitch of the middle half of the signal.
///
/// The segment is capped at `max_segment` samples around the centre. Confidence
/// is the fraction of 80-2000 Hz spectral energy that lies within two bins of
/// the dominant bin.
pub fn detect_key(samples: &[f64], sample_rate: u32, max_segment: usize) -> KeyResult {
    if sample_rate == 0 {
        return KeyResult::unknown();
    }

    let start = samples.len() / 4;
    let end = samples.len() * 3 / 4;
    let mut segment = &samples[start..end];
    if segment.len() > max_segment {
        let trim = (segment.len() - max_segment) / 2;
        segment = &segment[trim..trim + max_segment];
    }
    if segment.len() < MIN_SEGMENT {
        return KeyResult::unknown();
    }

    let windowed = Window::Hann.apply(segment);
    let mags = magnitudes(&fft(&windowed));
    let fft_len = padded_len(segment.len());
    let hz_per_bin = sample_rate as f64 / fft_len as f64;

    let lo = ((LOW_HZ / hz_per_bin).ceil() as usize).max(1);
    let hi = ((HIGH_HZ / hz_per_bin).floor() as usize).min(fft_len / 2 - 1);
    if lo >= hi {
        return KeyResult::unknown();
    }

    let Some(peak) = (lo..=hi).max_by(|&a, &b| mags[a].total_cmp(&mags[b])) else {
        return KeyResult::unknown();
    };
    let band_energy: f64 = mags[lo..=hi].iter().map(|m| m * m).sum();
    if mags[peak] <= 1e-9 || band_energy <= 0.0 {
        return KeyResult::unknown();
    }

    let offset = parabolic_offset(mags[peak - 1], mags[peak], mags[peak + 1]);
    let frequency = (peak as f64 + offset) * hz_per_bin;

    let around = peak.saturating_sub(PEAK_SPREAD).max(lo)..=(peak + PEAK_SPREAD).min(hi);
    let peak_energy: f64 = mags[around].iter().map(|m| m * m).sum();
    let confidence = (peak_energy / band_energy).clamp(0.0, 1.0);

    let Some(half_steps) = half_steps_from_c0(frequency) else {
        return KeyResult::unknown();
    };
    let class = NOTE_NAMES[half_steps.rem_euclid(12) as usize];
    let octave = half_steps.div_euclid(12);

    let result = KeyResult {
        dominant_frequency_hz: frequency,
        note_name: format!("{}{}", class, octave),
        note_class: class.to_string(),
        octave,
        confidence,
    };
    log::info!(
        "Key: {} ({:.2} Hz, confidence {:.2})",
        result.note_name,
        result.dominant_frequency_hz,
        result.confidence
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq: f64, sample_rate: u32, seconds: f64) -> Vec<f64> {
        let len = (seconds * sample_rate as f64) as usize;
        (0..len)
            .map(|i| 0.8 * (2.0 * PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    #[test]
    fn a440_tone() {
        let key = detect_key(&tone(440.0, 44100, 5.0), 44100, 65_536);
        assert_eq!(key.note_name, "A4");
        assert_eq!(key.note_class, "A");
        assert_eq!(key.octave, 4);
        assert!((key.dominant_frequency_hz - 440.0).abs() < 1.0);
        assert!(key.confidence > 0.8 && key.confidence <= 1.0);
    }

    #[test]
    fn e3_tone_at_other_rate() {
        let key = detect_key(&tone(164.81, 48000, 3.0), 48000, 65_536);
        assert_eq!(key.note_name, "E3");
    }

    #[test]
    fn silence_is_unknown() {
        let key = detect_key(&vec![0.0; 44100], 44100, 65_536);
        assert_eq!(key, KeyResult::unknown());
    }

    #[test]
    fn too_short_is_unknown() {
        let key = detect_key(&tone(440.0, 44100, 0.001), 44100, 65_536);
        assert_eq!(key.note_name, "Unknown");
        assert_eq!(key.confidence, 0.0);
    }

    #[test]
    fn out_of_band_tone_is_ignored() {
        // 40 Hz rumble plus a quieter 1 kHz tone: the dominant in-band pitch is B5.
        let rumble = tone(40.0, 44100, 2.0);
        let high = tone(987.77, 44100, 2.0);
        let mixed: Vec<f64> = rumble.iter().zip(&high).map(|(a, b)| a + 0.2 * b).collect();
        let key = detect_key(&mixed, 44100, 65_536);
        assert_eq!(key.note_name, "B5");
    }
}
