use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use super::features::{
    AnalysisResult, KeyResult, StatsResult, TempoResult, TonalityResult, WaveformPoint,
};
use super::{key, onset, peaks, policy, stats, tempo, tonality};
use crate::error::{validate_input, AnalysisError};

/// Tunables for one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    /// Target length of the downsampled display waveform.
    pub waveform_points: usize,
    /// Points per progressive waveform chunk.
    pub waveform_chunk: usize,
    /// Approximate number of samples visited by the amplitude statistics.
    pub stats_sample_cap: usize,
    pub centroid_frames: usize,
    pub key_segment_max: usize,
    pub tonality_frame_size: usize,
    pub tonality_max_frames: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            waveform_points: 4000,
            waveform_chunk: 1000,
            stats_sample_cap: 50_000,
            centroid_frames: 10,
            key_segment_max: 65_536,
            tonality_frame_size: 8192,
            tonality_max_frames: 64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    Initializing,
    Statistics,
    Waveform,
    Tempo,
    Key,
    Tonality,
    Finalizing,
}

impl Stage {
    pub fn percent(self) -> u8 {
        match self {
            Stage::Initializing => 5,
            Stage::Statistics => 10,
            Stage::Waveform => 20,
            Stage::Tempo => 40,
            Stage::Key => 60,
            Stage::Tonality => 80,
            Stage::Finalizing => 100,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Initializing => "Initializing",
            Stage::Statistics => "Audio Statistics",
            Stage::Waveform => "Generating waveform",
            Stage::Tempo => "BPM Detection",
            Stage::Key => "Key Detection",
            Stage::Tonality => "Tonality Detection",
            Stage::Finalizing => "Finalizing",
        }
    }
}

/// A stage result delivered as soon as the stage completes.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats_result: Option<StatsResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo_result: Option<TempoResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_result: Option<KeyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tonality_result: Option<TonalityResult>,
}

impl PartialResult {
    fn empty() -> Self {
        Self {
            stats_result: None,
            tempo_result: None,
            key_result: None,
            tonality_result: None,
        }
    }
}

/// Messages of one analysis run, in emission order. Exactly one `Complete`
/// or `Error` ends the stream.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AnalysisEvent {
    Progress { stage: Stage, percent: u8 },
    PartialResult(PartialResult),
    #[serde(rename_all = "camelCase")]
    WaveformChunk {
        points: Vec<WaveformPoint>,
        chunk_index: usize,
        total_chunks: usize,
    },
    Waveform { points: Vec<WaveformPoint> },
    Complete(AnalysisResult),
    Error { message: String },
}

impl AnalysisEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AnalysisEvent::Complete(_) | AnalysisEvent::Error { .. })
    }
}

/// Every `factor`-th sample, with `factor` chosen so the result has at most
/// `target_points` points.
pub fn downsample_waveform(samples: &[f32], target_points: usize) -> Vec<WaveformPoint> {
    let factor = samples.len().div_ceil(target_points.max(1)).max(1);
    samples
        .iter()
        .step_by(factor)
        .enumerate()
        .map(|(x, &y)| WaveformPoint { x, y })
        .collect()
}

/// Runs `stage`, substituting `fallback` if it panics.
fn guarded<T>(stage: Stage, fallback: impl FnOnce() -> T, run: impl FnOnce() -> T) -> T {
    match catch_unwind(AssertUnwindSafe(run)) {
        Ok(value) => value,
        Err(_) => {
            log::error!("{} failed internally, using default result", stage.label());
            fallback()
        }
    }
}

struct Emitter<F: FnMut(AnalysisEvent)> {
    sink: F,
}

impl<F: FnMut(AnalysisEvent)> Emitter<F> {
    fn progress(&mut self, stage: Stage) {
        log::debug!("{} ({}%)", stage.label(), stage.percent());
        (self.sink)(AnalysisEvent::Progress {
            stage,
            percent: stage.percent(),
        });
    }

    fn partial(&mut self, partial: PartialResult) {
        (self.sink)(AnalysisEvent::PartialResult(partial));
    }

    fn send(&mut self, event: AnalysisEvent) {
        (self.sink)(event);
    }
}

/// Runs the full pipeline, reporting through `sink`.
///
/// Stages run in a fixed order (statistics, waveform, tempo, key, tonality).
/// Only invalid input aborts the run; the final event is always either
/// `Complete` or `Error`.
pub fn run<F: FnMut(AnalysisEvent)>(
    samples: &[f32],
    sample_rate: u32,
    options: &AnalysisOptions,
    sink: F,
) {
    let mut emitter = Emitter { sink };
    emitter.progress(Stage::Initializing);

    match analyze_with(samples, sample_rate, options, &mut emitter) {
        Ok(result) => {
            emitter.progress(Stage::Finalizing);
            emitter.send(AnalysisEvent::Complete(result));
        }
        Err(err) => {
            log::error!("Analysis failed: {}", err);
            emitter.send(AnalysisEvent::Error {
                message: err.to_string(),
            });
        }
    }
}

/// Runs the pipeline synchronously without progress reporting.
pub fn analyze(
    samples: &[f32],
    sample_rate: u32,
    options: &AnalysisOptions,
) -> Result<AnalysisResult, AnalysisError> {
    let mut emitter = Emitter {
        sink: |_: AnalysisEvent| {},
    };
    analyze_with(samples, sample_rate, options, &mut emitter)
}

fn analyze_with<F: FnMut(AnalysisEvent)>(
    samples: &[f32],
    sample_rate: u32,
    options: &AnalysisOptions,
    emitter: &mut Emitter<F>,
) -> Result<AnalysisResult, AnalysisError> {
    validate_input(samples, sample_rate)?;

    let buffer: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
    let duration = buffer.len() as f64 / sample_rate as f64;
    log::info!(
        "Analyzing {} samples at {} Hz ({:.2}s)",
        buffer.len(),
        sample_rate,
        duration
    );

    // Statistics
    emitter.progress(Stage::Statistics);
    let stats = guarded(
        Stage::Statistics,
        || StatsResult::zeroed(sample_rate),
        || {
            stats::compute_stats(
                &buffer,
                sample_rate,
                options.stats_sample_cap,
                options.centroid_frames,
            )
        },
    );
    log::info!(
        "Stats: rms={:.4}, peak={:.4}, zcr={:.0}/s, centroid={:.0} Hz",
        stats.rms,
        stats.peak,
        stats.zero_crossing_rate,
        stats.spectral_centroid_hz
    );
    emitter.partial(PartialResult {
        stats_result: Some(stats.clone()),
        ..PartialResult::empty()
    });

    // Progressive waveform
    emitter.progress(Stage::Waveform);
    let waveform = downsample_waveform(samples, options.waveform_points);
    let chunk_size = options.waveform_chunk.max(1);
    let total_chunks = waveform.len().div_ceil(chunk_size);
    for (chunk_index, chunk) in waveform.chunks(chunk_size).enumerate() {
        emitter.send(AnalysisEvent::WaveformChunk {
            points: chunk.to_vec(),
            chunk_index,
            total_chunks,
        });
    }
    emitter.send(AnalysisEvent::Waveform {
        points: waveform.clone(),
    });

    // Onsets, peaks, tempo
    emitter.progress(Stage::Tempo);
    let tempo = guarded(
        Stage::Tempo,
        || tempo::default_tempo(0, duration),
        || {
            let policy = policy::policy_for(duration);
            let onsets = onset::detect_onsets(&buffer, sample_rate, &policy);
            let peaks = peaks::pick_peaks(&onsets, policy.min_peak_gap);
            log::debug!("{} onsets, {} peaks", onsets.len(), peaks.len());
            tempo::estimate_tempo(&peaks, sample_rate, duration)
        },
    );
    let tempo = if tempo.bpm.is_finite() && tempo.confidence.is_finite() {
        tempo
    } else {
        log::warn!("Tempo estimate was not finite, using default");
        tempo::default_tempo(tempo.peak_count, duration)
    };
    emitter.partial(PartialResult {
        tempo_result: Some(tempo.clone()),
        ..PartialResult::empty()
    });

    // Dominant pitch
    emitter.progress(Stage::Key);
    let key = guarded(Stage::Key, KeyResult::unknown, || {
        key::detect_key(&buffer, sample_rate, options.key_segment_max)
    });
    let key = if key.dominant_frequency_hz.is_finite() && key.confidence.is_finite() {
        key
    } else {
        KeyResult::unknown()
    };
    emitter.partial(PartialResult {
        key_result: Some(key.clone()),
        ..PartialResult::empty()
    });

    // Tonality
    emitter.progress(Stage::Tonality);
    let tonality = guarded(Stage::Tonality, TonalityResult::unknown, || {
        tonality::detect_tonality(
            &buffer,
            sample_rate,
            options.tonality_frame_size,
            options.tonality_max_frames,
        )
    });
    emitter.partial(PartialResult {
        tonality_result: Some(tonality.clone()),
        ..PartialResult::empty()
    });

    Ok(AnalysisResult {
        waveform,
        stats,
        tempo,
        key,
        tonality,
    })
}

/// A pipeline running on its own thread.
pub struct AnalysisHandle {
    pub events: Receiver<AnalysisEvent>,
    thread: JoinHandle<()>,
}

impl AnalysisHandle {
    /// Blocks until the worker thread exits.
    pub fn join(self) {
        if self.thread.join().is_err() {
            log::error!("Analysis worker thread panicked");
        }
    }
}

/// Moves `samples` to a worker thread and streams its events back.
///
/// Dropping the receiver abandons the run; the worker finishes without
/// delivering further events.
pub fn spawn_analysis(
    samples: Vec<f32>,
    sample_rate: u32,
    options: AnalysisOptions,
) -> AnalysisHandle {
    let (tx, rx) = mpsc::channel();
    let thread = thread::spawn(move || {
        run(&samples, sample_rate, &options, |event| {
            let _ = tx.send(event);
        });
    });
    AnalysisHandle { events: rx, thread }
}
