//! Configuration for the detector and the training-data generator
//!
//! The detector reads its settings from environment variables, matching how
//! it is deployed next to the upload bucket. The generator reads an optional
//! JSON file and falls back to defaults for anything missing or unreadable.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::audio::{WindowingParams, SAMPLE_RATE};
use crate::detection::retry::RetryPolicy;
use crate::error::ConfigError;
use crate::spectrogram::{RenderOptions, Transform};

pub const ENV_OVERLAP: &str = "SAMPLE_OVERLAP";
pub const ENV_CLIP_LENGTH: &str = "SAMPLE_LENGTH";
pub const ENV_MIN_CONFIDENCE: &str = "MIN_CONFIDENCE";
pub const ENV_BUCKET: &str = "AUDIO_BUCKET";
pub const ENV_MODEL_ARN: &str = "REK_MODEL_ARN";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_CLASSIFIER_ENDPOINT: &str = "CLASSIFIER_ENDPOINT";

/// Inference-side settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Fraction of a clip shared with the next one, 0 <= overlap < 1
    pub overlap: f64,
    /// Clip length in whole seconds
    pub clip_length_secs: u32,
    /// Minimum alarm confidence (0..=1) that triggers a notification
    pub min_confidence: f64,
    /// Default bucket for single-object checks
    pub bucket: Option<String>,
    /// Classifier model reference
    pub model_arn: String,
    /// Deployment region of the upload bucket
    ///
    /// Accepted from `AWS_REGION` for compatibility with existing
    /// deployments. The local store and HTTP classifier do not use it; the
    /// detector only logs it at startup.
    pub region: String,
    /// HTTP classifier endpoint
    pub classifier_endpoint: Option<String>,
    /// Retry budget for classifier calls
    pub max_retry_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            overlap: 0.25,
            clip_length_secs: 3,
            min_confidence: 0.90,
            bucket: None,
            model_arn: String::new(),
            region: "us-east-1".to_string(),
            classifier_endpoint: None,
            max_retry_secs: 60,
        }
    }
}

impl DetectorConfig {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings from any key -> value source; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_OVERLAP) {
            config.overlap = parse_value(ENV_OVERLAP, &value)?;
        }
        if let Some(value) = lookup(ENV_CLIP_LENGTH) {
            config.clip_length_secs = parse_value(ENV_CLIP_LENGTH, &value)?;
        }
        if let Some(value) = lookup(ENV_MIN_CONFIDENCE) {
            config.min_confidence = parse_value(ENV_MIN_CONFIDENCE, &value)?;
        }
        config.bucket = lookup(ENV_BUCKET).filter(|v| !v.is_empty());
        if let Some(value) = lookup(ENV_MODEL_ARN) {
            config.model_arn = value;
        }
        if let Some(value) = lookup(ENV_REGION).filter(|v| !v.is_empty()) {
            config.region = value;
        }
        config.classifier_endpoint = lookup(ENV_CLASSIFIER_ENDPOINT).filter(|v| !v.is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Check every value against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(invalid(ENV_OVERLAP, self.overlap, "a fraction in [0, 1)"));
        }
        if self.clip_length_secs == 0 {
            return Err(invalid(ENV_CLIP_LENGTH, self.clip_length_secs, "at least 1 second"));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(invalid(ENV_MIN_CONFIDENCE, self.min_confidence, "a value in [0, 1]"));
        }
        Ok(())
    }

    /// Window geometry at the canonical sample rate
    pub fn windowing(&self) -> WindowingParams {
        WindowingParams::new(SAMPLE_RATE, self.clip_length_secs, self.overlap)
    }

    pub fn window_samples(&self) -> usize {
        self.windowing().window_samples
    }

    pub fn step_samples(&self) -> usize {
        self.windowing().step_samples
    }

    /// Backoff policy for classifier calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default().with_max_elapsed(Duration::from_secs(self.max_retry_secs))
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Unparsable {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn invalid(key: &str, value: impl ToString, expected: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        expected: expected.to_string(),
    }
}

/// Training-data generator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Folder of alarm recordings (*.wav)
    pub alarm_dir: PathBuf,
    /// Folder of background recordings (*.wav)
    pub background_dir: PathBuf,
    /// Root of the generated image tree
    pub output_root: PathBuf,
    /// Upper bound on background layers per example (capped by the number of files)
    pub max_background_layers: usize,
    /// Images per class, per split, per transform
    pub images_per_class: usize,
    pub transforms: Vec<Transform>,
    pub splits: Vec<String>,
    pub alarm_class: String,
    pub no_alarm_class: String,
    pub clip_length_secs: u32,
    pub image: RenderOptions,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            alarm_dir: PathBuf::from("../audio/alarms"),
            background_dir: PathBuf::from("../audio/background"),
            output_root: PathBuf::from("../training-data"),
            max_background_layers: 4,
            images_per_class: 10,
            transforms: vec![
                Transform::Standard,
                Transform::Mel,
                Transform::ConstantQFrequency,
                Transform::Reassigned,
                Transform::Harmonic,
            ],
            splits: vec!["train".to_string(), "test".to_string(), "validate".to_string()],
            alarm_class: "alarm".to_string(),
            no_alarm_class: "no_alarm".to_string(),
            clip_length_secs: 3,
            image: RenderOptions::default(),
            seed: None,
        }
    }
}

impl TrainingConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults if the file is missing or invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Canonical clip length in samples
    pub fn window_samples(&self) -> usize {
        SAMPLE_RATE as usize * self.clip_length_secs as usize
    }

    /// Check every value the generator depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clip_length_secs == 0 {
            return Err(invalid("clip_length_secs", self.clip_length_secs, "at least 1 second"));
        }
        if self.max_background_layers == 0 {
            return Err(invalid(
                "max_background_layers",
                self.max_background_layers,
                "at least 1 layer",
            ));
        }
        if self.image.width == 0 || self.image.height == 0 {
            return Err(invalid(
                "image",
                format!("{}x{}", self.image.width, self.image.height),
                "non-zero width and height",
            ));
        }
        if self.splits.is_empty() || self.splits.iter().any(|split| split.is_empty()) {
            return Err(invalid("splits", self.splits.join(","), "non-empty split names"));
        }
        if self.alarm_class.is_empty()
            || self.no_alarm_class.is_empty()
            || self.alarm_class == self.no_alarm_class
        {
            return Err(invalid(
                "alarm_class",
                format!("{}/{}", self.alarm_class, self.no_alarm_class),
                "two distinct non-empty class names",
            ));
        }
        Ok(())
    }
}
