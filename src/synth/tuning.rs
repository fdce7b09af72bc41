//! Pitch and level conversions

/// Reference pitch of A4 (MIDI note 69)
pub const A4_FREQUENCY: f64 = 440.0;

/// Frequency in Hz of a MIDI note number, equal temperament
pub fn midi_pitch_to_frequency(note: u8) -> f64 {
    A4_FREQUENCY * 2f64.powf((note as f64 - 69.0) / 12.0)
}

/// Convert a level in dBFS to a linear amplitude factor
pub fn dbfs_to_linear_amplitude(dbfs: f64) -> f64 {
    10f64.powf(dbfs / 20.0)
}

/// Convert a linear amplitude factor to dBFS
pub fn linear_amplitude_to_dbfs(amplitude: f64) -> f64 {
    if amplitude <= 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * amplitude.log10()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_a4() {
        assert_eq!(midi_pitch_to_frequency(69), 440.0);
    }

    #[test]
    fn test_middle_c() {
        assert!((midi_pitch_to_frequency(60) - 261.625_565_300_598_6).abs() < 1e-9);
    }

    #[test]
    fn test_octaves() {
        assert!((midi_pitch_to_frequency(81) - 880.0).abs() < 1e-9);
        assert!((midi_pitch_to_frequency(57) - 220.0).abs() < 1e-9);
    }

    #[test]
    fn test_dbfs_conversion() {
        assert_eq!(dbfs_to_linear_amplitude(0.0), 1.0);
        assert!((dbfs_to_linear_amplitude(-20.0) - 0.1).abs() < 1e-12);
        assert!((dbfs_to_linear_amplitude(-6.0) - 0.501_187).abs() < 1e-6);
    }

    #[test]
    fn test_dbfs_roundtrip_and_silence() {
        assert!((linear_amplitude_to_dbfs(dbfs_to_linear_amplitude(-12.0)) + 12.0).abs() < 1e-9);
        assert_eq!(linear_amplitude_to_dbfs(0.0), f64::NEG_INFINITY);
    }
}
