//! Read-only musical lookup tables shared by the tempo and tonal stages.

pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

pub const A4_HZ: f64 = 440.0;

/// C0, 4.75 octaves below A4 (~16.35 Hz).
pub fn c0_hz() -> f64 {
    A4_HZ * 2f64.powf(-4.75)
}

/// Nearest semitone above C0, or `None` for frequencies at or below C0.
pub fn half_steps_from_c0(freq_hz: f64) -> Option<i32> {
    if !freq_hz.is_finite() || freq_hz <= c0_hz() {
        return None;
    }
    Some((12.0 * (freq_hz / c0_hz()).log2()).round() as i32)
}

/// Pitch class 0..12 (C = 0) of the nearest semitone.
pub fn pitch_class(freq_hz: f64) -> Option<usize> {
    half_steps_from_c0(freq_hz).map(|h| h.rem_euclid(12) as usize)
}

/// Krumhansl-Schmuckler major key profile, tonic first.
pub const KS_MAJOR: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];

/// Krumhansl-Schmuckler minor key profile, tonic first.
pub const KS_MINOR: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Tempi a confident estimate is snapped to: 60, 65, ..., 190.
pub const COMMON_TEMPI: [f64; 27] = [
    60.0, 65.0, 70.0, 75.0, 80.0, 85.0, 90.0, 95.0, 100.0, 105.0, 110.0, 115.0, 120.0, 125.0,
    130.0, 135.0, 140.0, 145.0, 150.0, 155.0, 160.0, 165.0, 170.0, 175.0, 180.0, 185.0, 190.0,
];
