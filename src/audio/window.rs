use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Hann,
    BlackmanHarris,
}

impl Window {
    pub fn coefficients(self, size: usize) -> Vec<f64> {
        let n = size as f64;
        (0..size)
            .map(|i| {
                let x = 2.0 * PI * i as f64 / n;
                match self {
                    Window::Hann => 0.5 - 0.5 * x.cos(),
                    Window::BlackmanHarris => {
                        0.35875 - 0.48829 * x.cos() + 0.14128 * (2.0 * x).cos()
                            - 0.01168 * (3.0 * x).cos()
                    }
                }
            })
            .collect()
    }

    pub fn apply(self, frame: &[f64]) -> Vec<f64> {
        frame
            .iter()
            .zip(self.coefficients(frame.len()))
            .map(|(s, w)| s * w)
            .collect()
    }
}

/// Windowed frames over a sample slice.
///
/// Frames advance by `hop_size`; the last frame is the first one reaching the
/// end of the buffer and is zero-padded past it.
pub struct Frames<'a> {
    samples: &'a [f64],
    frame_size: usize,
    hop_size: usize,
    coefficients: Vec<f64>,
    position: usize,
    done: bool,
}

impl<'a> Frames<'a> {
    pub fn new(samples: &'a [f64], frame_size: usize, hop_size: usize, window: Window) -> Self {
        Self {
            samples,
            frame_size: frame_size.max(1),
            hop_size: hop_size.max(1),
            coefficients: window.coefficients(frame_size.max(1)),
            position: 0,
            done: samples.is_empty(),
        }
    }
}

impl Iterator for Frames<'_> {
    /// (start sample, windowed frame)
    type Item = (usize, Vec<f64>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let start = self.position;
        let frame = windowed_frame(self.samples, start, &self.coefficients);

        if start + self.frame_size >= self.samples.len() {
            self.done = true;
        }
        self.position += self.hop_size;
        Some((start, frame))
    }
}

/// The frame of `coefficients.len()` samples at `start`, windowed and
/// zero-padded past the end of `samples`.
pub fn windowed_frame(samples: &[f64], start: usize, coefficients: &[f64]) -> Vec<f64> {
    let mut frame = vec![0.0; coefficients.len()];
    if start < samples.len() {
        let end = (start + coefficients.len()).min(samples.len());
        for (i, &s) in samples[start..end].iter().enumerate() {
            frame[i] = s * coefficients[i];
        }
    }
    frame
}

/// Number of frames `Frames` yields for a buffer of `len` samples.
pub fn frame_count(len: usize, frame_size: usize, hop_size: usize) -> usize {
    if len == 0 {
        return 0;
    }
    if len <= frame_size {
        return 1;
    }
    (len - frame_size).div_ceil(hop_size.max(1)) + 1
}
