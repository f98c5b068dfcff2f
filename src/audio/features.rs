use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResult {
    pub duration_seconds: f64,
    pub rms: f64,
    pub peak: f64,
    /// Peak minus RMS, both linear amplitude.
    pub dynamic_range: f64,
    /// Zero crossings per second.
    pub zero_crossing_rate: f64,
    pub spectral_centroid_hz: f64,
    pub sample_rate: u32,
}

impl StatsResult {
    pub fn zeroed(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn is_finite(&self) -> bool {
        [
            self.duration_seconds,
            self.rms,
            self.peak,
            self.dynamic_range,
            self.zero_crossing_rate,
            self.spectral_centroid_hz,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// One inter-frame comparison of the onset detector.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Onset {
    pub time: f64,
    /// Weighted combination of the four features below.
    pub flux: f64,
    pub spectral_flux: f64,
    pub complex_flux: f64,
    pub phase_deviation: f64,
    pub high_freq_content: f64,
    /// Total in-band magnitude of the later frame.
    pub magnitude: f64,
    /// In-band magnitude-weighted mean frequency of the later frame (Hz).
    pub centroid: f64,
}

/// Onsets that survived peak picking.
pub type Peak = Onset;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TempoMethod {
    Autocorrelation,
    IntervalTracking,
    DirectInterval,
}

impl TempoMethod {
    pub fn name(self) -> &'static str {
        match self {
            TempoMethod::Autocorrelation => "autocorrelation",
            TempoMethod::IntervalTracking => "interval",
            TempoMethod::DirectInterval => "direct",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoCandidate {
    pub bpm: f64,
    pub confidence: f64,
    pub method: TempoMethod,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TempoResult {
    pub bpm: f64,
    /// In [0.05, 1].
    pub confidence: f64,
    /// Estimators that agreed on the result, joined with '+', or "default".
    pub method: String,
    pub peak_count: usize,
    pub audio_duration_seconds: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyResult {
    pub dominant_frequency_hz: f64,
    /// Note with octave, e.g. "A4", or "Unknown".
    pub note_name: String,
    /// Note without octave, e.g. "A", or "Unknown".
    pub note_class: String,
    pub octave: i32,
    /// Share of in-band spectral energy around the dominant bin, in [0, 1].
    pub confidence: f64,
}

impl KeyResult {
    pub fn unknown() -> Self {
        Self {
            dominant_frequency_hz: 0.0,
            note_name: "Unknown".to_string(),
            note_class: "Unknown".to_string(),
            octave: 0,
            confidence: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Tonality {
    Major,
    Minor,
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TonalityResult {
    pub tonality: Tonality,
    pub key_note: String,
    /// Winning correlation clamped to [0, 1].
    pub confidence: f64,
    pub major_correlation: f64,
    pub minor_correlation: f64,
}

impl TonalityResult {
    pub fn unknown() -> Self {
        Self {
            tonality: Tonality::Unknown,
            key_note: "Unknown".to_string(),
            confidence: 0.0,
            major_correlation: 0.0,
            minor_correlation: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct WaveformPoint {
    pub x: usize,
    pub y: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub waveform: Vec<WaveformPoint>,
    pub stats: StatsResult,
    pub tempo: TempoResult,
    pub key: KeyResult,
    pub tonality: TonalityResult,
}
