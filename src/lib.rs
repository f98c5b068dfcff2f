//! Musical and statistical descriptors for decoded mono PCM audio.
//!
//! The pipeline takes a sample buffer and sample rate and produces loudness
//! statistics, a display waveform, a tempo estimate, the dominant pitch and a
//! major/minor classification, streamed as [`AnalysisEvent`]s.

pub mod audio;
pub mod error;

pub use audio::analysis::{
    analyze, run, spawn_analysis, AnalysisEvent, AnalysisHandle, AnalysisOptions,
    PartialResult, Stage,
};
pub use audio::features::{
    AnalysisResult, KeyResult, Onset, Peak, StatsResult, TempoResult, Tonality, TonalityResult,
    WaveformPoint,
};
pub use error::AnalysisError;
