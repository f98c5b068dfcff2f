//! Duration-dependent analysis parameters, kept in one table.

/// Authoritative tempo band used by every tempo estimator and the final clamp.
pub const MIN_BPM: f64 = 40.0;
pub const MAX_BPM: f64 = 200.0;

/// Clips shorter than this take the direct interval-analysis path.
pub const SHORT_CLIP_SECONDS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalysisPolicy {
    pub frame_size: usize,
    pub hop_size: usize,
    /// Time step of the interpolated onset-strength signal (seconds).
    pub onset_resolution: f64,
    /// Maximum distance (BPM) to a common tempo for snapping.
    pub snap_tolerance: f64,
    /// Half-width (BPM) of the beat-alignment search around the estimate.
    pub refine_span: f64,
    pub refine_step: f64,
    /// Minimum spacing between accepted peaks (seconds). Peak picking
    /// shortens it further when candidates are dense.
    pub min_peak_gap: f64,
    pub short_clip: bool,
}

pub fn policy_for(duration_seconds: f64) -> AnalysisPolicy {
    let short_clip = duration_seconds < SHORT_CLIP_SECONDS;
    if duration_seconds < 2.0 {
        AnalysisPolicy {
            frame_size: 256,
            hop_size: 64,
            onset_resolution: 0.005,
            snap_tolerance: 3.0,
            refine_span: 8.0,
            refine_step: 0.25,
            min_peak_gap: 0.08,
            short_clip,
        }
    } else if duration_seconds < 10.0 {
        AnalysisPolicy {
            frame_size: 512,
            hop_size: 128,
            onset_resolution: 0.01,
            snap_tolerance: 2.0,
            refine_span: 4.0,
            refine_step: 0.5,
            min_peak_gap: 0.1,
            short_clip,
        }
    } else {
        AnalysisPolicy {
            frame_size: 1024,
            hop_size: 256,
            onset_resolution: 0.01,
            snap_tolerance: 2.0,
            refine_span: 4.0,
            refine_step: 0.5,
            min_peak_gap: 0.12,
            short_clip,
        }
    }
}
