// Alarm Finder Core - alarm sound detection from spectrogram images
// Windowing, multi-transform spectrogram rendering, training-data synthesis

// Module declarations
pub mod audio;
pub mod config;
pub mod detection;
pub mod error;
pub mod spectrogram;
pub mod training;

// Re-exports for convenience
pub use audio::{build_clip_set, Clip, Mixer, SampleCache, WindowingParams, SAMPLE_RATE};
pub use config::{DetectorConfig, TrainingConfig};
pub use detection::{DetectionEvent, InferenceDriver, ALARM_LABEL};
pub use spectrogram::{RenderTarget, SpectrogramRenderer, Transform, FREQ_LIMIT};
pub use training::{GenerationReport, TrainingSetGenerator};

use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber used by the binaries
///
/// The filter comes from `RUST_LOG` and defaults to `info`. `log` records
/// from dependencies are forwarded too. Calling this twice is harmless.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging();
        init_logging();
        tracing::info!("[Test] logging initialized");
    }
}
