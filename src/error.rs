use thiserror::Error;

/// Conditions under which an analysis run cannot start at all.
///
/// Everything else (too few onsets, silence, numeric trouble inside a stage)
/// degrades to a low-confidence default instead of surfacing here.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("invalid or empty audio data: no samples")]
    EmptyBuffer,

    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(u32),

    #[error("invalid audio data: non-finite sample at index {index}")]
    NonFiniteSamples { index: usize },
}

pub fn validate_input(samples: &[f32], sample_rate: u32) -> Result<(), AnalysisError> {
    if samples.is_empty() {
        return Err(AnalysisError::EmptyBuffer);
    }
    if sample_rate == 0 {
        return Err(AnalysisError::InvalidSampleRate(sample_rate));
    }
    if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
        return Err(AnalysisError::NonFiniteSamples { index });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_buffer() {
        assert_eq!(validate_input(&[], 44100), Err(AnalysisError::EmptyBuffer));
    }

    #[test]
    fn rejects_zero_sample_rate() {
        assert_eq!(
            validate_input(&[0.0; 16], 0),
            Err(AnalysisError::InvalidSampleRate(0))
        );
    }

    #[test]
    fn rejects_nan() {
        let mut samples = vec![0.1f32; 8];
        samples[5] = f32::NAN;
        assert_eq!(
            validate_input(&samples, 44100),
            Err(AnalysisError::NonFiniteSamples { index: 5 })
        );
    }

    #[test]
    fn accepts_silence() {
        assert!(validate_input(&[0.0; 100], 8000).is_ok());
    }
}
