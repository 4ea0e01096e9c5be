// Resampler - windowed-sinc sample rate conversion
//
// Every waveform is analysed at the canonical 48 kHz rate. Sources recorded
// at other rates are converted in a single pass with rubato's fixed-input
// sinc resampler; same-rate input is copied through untouched.

use rubato::{
    Resampler as RubatoResampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use crate::error::AudioError;

const SINC_LEN: usize = 256;

/// Output length for `len` input samples: `ceil(len * to_rate / from_rate)`
pub fn expected_len(len: usize, from_rate: u32, to_rate: u32) -> usize {
    (len as u64 * to_rate as u64).div_ceil(from_rate as u64) as usize
}

/// Stateless sample rate converter
pub struct Resampler;

impl Resampler {
    /// Resample mono audio from `from_rate` to `to_rate`
    ///
    /// # Returns
    /// Samples at `to_rate`, exactly `expected_len(len, from_rate, to_rate)` long
    pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
        if from_rate == to_rate || samples.is_empty() {
            return Ok(samples.to_vec());
        }
        if from_rate == 0 || to_rate == 0 {
            return Err(AudioError::ResampleFailed {
                reason: format!("cannot convert {} Hz to {} Hz", from_rate, to_rate),
            });
        }

        let params = SincInterpolationParameters {
            sinc_len: SINC_LEN,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        // zero tail flushes the filter delay
        let mut padded = Vec::with_capacity(samples.len() + SINC_LEN);
        padded.extend_from_slice(samples);
        padded.resize(samples.len() + SINC_LEN, 0.0);

        let ratio = to_rate as f64 / from_rate as f64;
        let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, padded.len(), 1)
            .map_err(|err| AudioError::ResampleFailed {
                reason: err.to_string(),
            })?;
        let delay = resampler.output_delay();

        let output = resampler
            .process(&[padded], None)
            .map_err(|err| AudioError::ResampleFailed {
                reason: err.to_string(),
            })?;

        let target_len = expected_len(samples.len(), from_rate, to_rate);
        let mut resampled: Vec<f32> = output
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .skip(delay)
            .take(target_len)
            .collect();
        resampled.resize(target_len, 0.0);

        tracing::debug!(
            "[Resampler] {} samples @ {} Hz -> {} samples @ {} Hz (delay {})",
            samples.len(),
            from_rate,
            resampled.len(),
            to_rate,
            delay
        );

        Ok(resampled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_rate_is_passthrough() {
        let samples = vec![0.1, -0.2, 0.3];
        let out = Resampler::resample(&samples, 48_000, 48_000).unwrap();
        assert_eq!(out, samples);
    }

    #[test]
    fn test_upsample_length_scales_with_ratio() {
        let samples: Vec<f32> = (0..24_000)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 24_000.0).sin())
            .collect();
        let out = Resampler::resample(&samples, 24_000, 48_000).unwrap();

        let expected = 48_000.0;
        let ratio = out.len() as f32 / expected;
        assert!(
            (0.95..=1.05).contains(&ratio),
            "expected ~{} samples, got {}",
            expected,
            out.len()
        );
    }

    #[test]
    fn test_cd_rate_keeps_exact_duration() {
        let samples: Vec<f32> = (0..132_300)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 1_000.0 * i as f32 / 44_100.0).sin())
            .collect();
        let out = Resampler::resample(&samples, 44_100, 48_000).unwrap();
        assert_eq!(out.len(), 144_000);

        // the tail survives: last 10 ms still carry the tone
        let tail_peak = out[out.len() - 480..]
            .iter()
            .fold(0.0f32, |acc, v| acc.max(v.abs()));
        assert!(tail_peak > 0.3, "tail peak {}", tail_peak);
    }

    #[test]
    fn test_output_is_aligned_with_input() {
        let mut samples = vec![0.0f32; 16_000];
        samples[8_000] = 1.0;
        let out = Resampler::resample(&samples, 16_000, 48_000).unwrap();
        assert_eq!(out.len(), 48_000);

        let peak = out
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap();
        assert!((peak as i64 - 24_000).abs() <= 2, "peak at {}", peak);
    }

    #[test]
    fn test_expected_len_rounds_up() {
        assert_eq!(expected_len(132_300, 44_100, 48_000), 144_000);
        assert_eq!(expected_len(1, 44_100, 48_000), 2);
        assert_eq!(expected_len(3, 48_000, 16_000), 1);
    }

    #[test]
    fn test_zero_rate_is_rejected() {
        let err = Resampler::resample(&[0.0; 8], 0, 48_000).unwrap_err();
        assert!(matches!(err, AudioError::ResampleFailed { .. }));
    }
}
