use std::f32::consts::PI;

use audiolens::audio::policy::{policy_for, MAX_BPM, MIN_BPM};
use audiolens::audio::{onset, peaks};
use audiolens::{
    analyze, run, spawn_analysis, AnalysisError, AnalysisEvent, AnalysisOptions, Tonality,
};

/// Decaying 2 kHz bursts every `60 / bpm` seconds.
fn click_track(bpm: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
    let len = (seconds * sample_rate as f32) as usize;
    let step = (60.0 / bpm * sample_rate as f32) as usize;
    let mut samples = vec![0.0; len];
    let mut pos = step / 2;
    while pos + 400 < len {
        for k in 0..400 {
            samples[pos + k] = 0.8
                * (-(k as f32) / 60.0).exp()
                * (2.0 * PI * 2000.0 * k as f32 / sample_rate as f32).sin();
        }
        pos += step;
    }
    samples
}

fn chord(freqs: &[f32], sample_rate: u32, seconds: f32) -> Vec<f32> {
    let len = (seconds * sample_rate as f32) as usize;
    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum::<f32>() / freqs.len() as f32
        })
        .collect()
}

#[test]
fn click_track_at_120_bpm() {
    let samples = click_track(120.0, 44100, 10.0);
    let result = analyze(&samples, 44100, &AnalysisOptions::default()).unwrap();

    assert!(
        (result.tempo.bpm - 120.0).abs() <= 2.0,
        "bpm was {}",
        result.tempo.bpm
    );
    assert!(result.tempo.confidence > 0.5, "confidence was {}", result.tempo.confidence);
    assert!(result.tempo.peak_count >= 10);
    assert!((result.tempo.audio_duration_seconds - 10.0).abs() < 1e-6);
}

#[test]
fn click_tracks_away_from_120_bpm() {
    for bpm in [96.0, 110.0, 160.0, 174.0] {
        let samples = click_track(bpm, 44100, 20.0);
        let result = analyze(&samples, 44100, &AnalysisOptions::default()).unwrap();
        assert!(
            (result.tempo.bpm - bpm as f64).abs() <= 2.0,
            "{} BPM clicks gave {} ({})",
            bpm,
            result.tempo.bpm,
            result.tempo.method
        );
        assert!(result.tempo.confidence > 0.5);
    }
}

#[test]
fn a440_sine_is_a4() {
    let samples = chord(&[440.0], 44100, 5.0);
    let result = analyze(&samples, 44100, &AnalysisOptions::default()).unwrap();

    assert_eq!(result.key.note_name, "A4");
    assert!((result.key.dominant_frequency_hz - 440.0).abs() < 1.0);
    assert!(result.key.confidence > 0.5 && result.key.confidence <= 1.0);
}

#[test]
fn c_major_chord_is_major_in_c() {
    let samples = chord(&[261.63, 329.63, 392.0], 44100, 4.0);
    let result = analyze(&samples, 44100, &AnalysisOptions::default()).unwrap();

    assert_eq!(result.tonality.tonality, Tonality::Major);
    assert_eq!(result.tonality.key_note, "C");
}

#[test]
fn silence_degrades_gracefully() {
    let samples = vec![0.0f32; 2 * 44100];
    let result = analyze(&samples, 44100, &AnalysisOptions::default()).unwrap();

    assert!((result.stats.duration_seconds - 2.0).abs() < 1e-9);
    assert_eq!(result.stats.peak, 0.0);
    assert_eq!(result.stats.rms, 0.0);
    assert!(result.tempo.confidence <= 0.1);
    assert!(result.tempo.bpm >= MIN_BPM && result.tempo.bpm <= MAX_BPM);
    assert_eq!(result.key.note_name, "Unknown");
    assert_eq!(result.tonality.tonality, Tonality::Unknown);
}

#[test]
fn very_short_buffer_completes() {
    let samples = vec![0.0f32; 100];
    let result = analyze(&samples, 44100, &AnalysisOptions::default()).unwrap();
    assert_eq!(result.tempo.bpm, 120.0);
    assert_eq!(result.waveform.len(), 100);
}

#[test]
fn empty_buffer_is_rejected() {
    let err = analyze(&[], 44100, &AnalysisOptions::default()).unwrap_err();
    assert_eq!(err, AnalysisError::EmptyBuffer);

    let mut events = Vec::new();
    run(&[], 44100, &AnalysisOptions::default(), |e| events.push(e));
    assert!(matches!(events.last(), Some(AnalysisEvent::Error { .. })));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
}

#[test]
fn analysis_is_deterministic() {
    let samples = click_track(100.0, 22050, 6.0);
    let options = AnalysisOptions::default();
    let first = analyze(&samples, 22050, &options).unwrap();
    let second = analyze(&samples, 22050, &options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn onsets_are_ordered_and_peaks_spaced() {
    let samples: Vec<f64> = click_track(140.0, 22050, 8.0)
        .into_iter()
        .map(f64::from)
        .collect();
    let policy = policy_for(8.0);
    let onsets = onset::detect_onsets(&samples, 22050, &policy);
    assert!(onsets.windows(2).all(|w| w[0].time < w[1].time));
    assert!(onsets.iter().all(|o| o.flux >= 0.0 && o.flux.is_finite()));

    let picked = peaks::pick_peaks(&onsets, policy.min_peak_gap);
    assert!(!picked.is_empty());
    // Dense material may shorten the gap to three quarters.
    let gap = 0.75 * policy.min_peak_gap;
    assert!(picked.windows(2).all(|w| w[1].time - w[0].time >= gap - 1e-9));
}

#[test]
fn tempo_stays_in_band_for_extreme_clicks() {
    for bpm in [30.0, 45.0, 220.0, 260.0] {
        let samples = click_track(bpm, 22050, 12.0);
        let result = analyze(&samples, 22050, &AnalysisOptions::default()).unwrap();
        assert!(
            result.tempo.bpm >= MIN_BPM && result.tempo.bpm <= MAX_BPM,
            "{} BPM clicks gave {}",
            bpm,
            result.tempo.bpm
        );
        assert!(result.tempo.confidence >= 0.0 && result.tempo.confidence <= 1.0);
    }
}

#[test]
fn spawned_run_streams_to_completion() {
    let samples = chord(&[330.0], 22050, 3.0);
    let handle = spawn_analysis(samples, 22050, AnalysisOptions::default());
    let events: Vec<AnalysisEvent> = handle.events.iter().collect();
    handle.join();

    let percents: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            AnalysisEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(percents.last(), Some(&100));
    assert!(matches!(events.last(), Some(AnalysisEvent::Complete(_))));
}
