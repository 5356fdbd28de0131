/// Normalized RMS level (0.0 to 1.0) of 16-bit PCM samples.
///
/// Silence is 0.0, a full-scale sine is about 0.707.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    (sum_squares / samples.len() as f64).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_silence() {
        assert_eq!(calculate_rms(&[]), 0.0);
        assert_eq!(calculate_rms(&[0; 160]), 0.0);
    }

    #[test]
    fn test_rms_full_scale() {
        let level = calculate_rms(&[i16::MAX, -i16::MAX]);
        assert!((level - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rms_quiet_signal_below_default_threshold() {
        let level = calculate_rms(&[300, -300, 300, -300]);
        assert!(level < 0.04);
    }
}
