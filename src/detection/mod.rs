// Detection module - per-upload inference pipeline
//
// For each uploaded object:
//   fetch -> decode + window -> for every clip:
//     render mel spectrogram -> classify (with retry) -> threshold -> notify
// Every clip is evaluated; one upload can produce several events.

pub mod retry;
pub mod services;
pub mod trigger;

use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::audio::{build_clip_set, WindowingParams};
use crate::config::DetectorConfig;
use crate::error::{log_detection_error, DetectionError};
use crate::spectrogram::{RenderOptions, SpectrogramRenderer, Transform};
use retry::{Clock, RetryPolicy, SystemClock};
use services::{Attributes, LabelClassifier, Notifier, ObjectStore};
use trigger::ObjectRef;

/// Classifier label that marks an alarm
pub const ALARM_LABEL: &str = "alarm";

/// Transform every clip is rendered with before classification
pub const INFERENCE_TRANSFORM: Transform = Transform::Mel;

/// A clip whose alarm confidence met the threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionEvent {
    /// Object key of the upload
    pub source: String,
    pub clip_index: usize,
    /// 0..=1
    pub confidence: f64,
    pub start: Duration,
    pub end: Duration,
}

impl DetectionEvent {
    /// Notification attributes in publish order
    pub fn attributes(&self) -> Attributes {
        vec![
            ("Confidence".to_string(), format!("{:.2}", self.confidence)),
            ("Start_Time".to_string(), format_time_delta(self.start)),
            ("End_Time".to_string(), format_time_delta(self.end)),
        ]
    }

    /// Notification text: headline plus the attributes in dict form
    pub fn message(&self) -> String {
        let attributes = self
            .attributes()
            .iter()
            .map(|(key, value)| format!("'{}': '{}'", key, value))
            .collect::<Vec<_>>()
            .join(", ");
        format!("Found alarm in {}\n{{{}}}", self.source, attributes)
    }
}

/// Format a duration as `H:MM:SS`, with `.ffffff` microseconds when non-zero
/// and a leading day count past 24 hours
pub fn format_time_delta(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    let micros = duration.subsec_micros();

    let mut text = String::new();
    if days > 0 {
        let plural = if days == 1 { "" } else { "s" };
        text.push_str(&format!("{} day{}, ", days, plural));
    }
    text.push_str(&format!("{}:{:02}:{:02}", hours, minutes, seconds));
    if micros > 0 {
        text.push_str(&format!(".{:06}", micros));
    }
    text
}

/// Runs the inference pipeline against injected collaborators
pub struct InferenceDriver<S, C, N, K = SystemClock> {
    store: S,
    classifier: C,
    notifier: N,
    clock: K,
    rng: StdRng,
    renderer: SpectrogramRenderer,
    windowing: WindowingParams,
    retry: RetryPolicy,
    model_ref: String,
    min_confidence: f64,
}

impl<S, C, N> InferenceDriver<S, C, N, SystemClock>
where
    S: ObjectStore,
    C: LabelClassifier,
    N: Notifier,
{
    pub fn new(config: &DetectorConfig, store: S, classifier: C, notifier: N) -> Self {
        let windowing = config.windowing();
        Self {
            store,
            classifier,
            notifier,
            clock: SystemClock,
            rng: StdRng::from_entropy(),
            renderer: SpectrogramRenderer::new(windowing.sample_rate),
            windowing,
            retry: config.retry_policy(),
            model_ref: config.model_arn.clone(),
            min_confidence: config.min_confidence,
        }
    }
}

impl<S, C, N, K> InferenceDriver<S, C, N, K>
where
    S: ObjectStore,
    C: LabelClassifier,
    N: Notifier,
    K: Clock,
{
    /// Replace the clock used for retry waits
    pub fn with_clock<K2: Clock>(self, clock: K2) -> InferenceDriver<S, C, N, K2> {
        InferenceDriver {
            store: self.store,
            classifier: self.classifier,
            notifier: self.notifier,
            clock,
            rng: self.rng,
            renderer: self.renderer,
            windowing: self.windowing,
            retry: self.retry,
            model_ref: self.model_ref,
            min_confidence: self.min_confidence,
        }
    }

    /// Seed the jitter source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.renderer = self.renderer.with_options(options);
        self
    }

    pub fn windowing(&self) -> &WindowingParams {
        &self.windowing
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Check one uploaded object, publishing and returning every detection
    pub fn check_audio_for_event(
        &mut self,
        bucket: &str,
        key: &str,
    ) -> Result<Vec<DetectionEvent>, DetectionError> {
        let raw = self.store.fetch(bucket, key)?;
        let clips = build_clip_set(&raw, &self.windowing)?;
        tracing::info!(
            "[InferenceDriver] Checking {}/{}: {} clips",
            bucket,
            key,
            clips.len()
        );

        let mut events = Vec::new();
        for clip in &clips {
            let image = self
                .renderer
                .render_to_buffer(&clip.samples, INFERENCE_TRANSFORM)?;

            let classifier = &self.classifier;
            let model_ref = self.model_ref.as_str();
            let labels = self.retry.run(&self.clock, &mut self.rng, |attempt| {
                if attempt > 1 {
                    tracing::debug!("[InferenceDriver] Classifier attempt {}", attempt);
                }
                classifier.classify(&image, model_ref, 0.0)
            })?;

            let label = labels
                .iter()
                .find(|label| label.name == ALARM_LABEL)
                .ok_or_else(|| DetectionError::LabelMissing {
                    label: ALARM_LABEL.to_string(),
                    available: labels.iter().map(|label| label.name.clone()).collect(),
                })?;
            let confidence = label.confidence / 100.0;

            tracing::debug!(
                "[InferenceDriver] Clip {} alarm confidence {:.3}",
                clip.index,
                confidence
            );

            if confidence >= self.min_confidence {
                let event = DetectionEvent {
                    source: key.to_string(),
                    clip_index: clip.index,
                    confidence,
                    start: self.windowing.clip_start(clip.index),
                    end: self.windowing.clip_end(clip.index),
                };
                tracing::info!(
                    "[InferenceDriver] Alarm in {} clip {} ({:.2})",
                    key,
                    clip.index,
                    confidence
                );
                self.notifier.publish(&event.message(), &event.attributes())?;
                events.push(event);
            }
        }

        Ok(events)
    }

    /// Check a batch of uploads in order, stopping at the first failure
    pub fn process_batch(&mut self, objects: &[ObjectRef]) -> Result<Vec<DetectionEvent>, DetectionError> {
        let mut events = Vec::new();
        for object in objects {
            tracing::info!(
                "[InferenceDriver] Checking file {} in bucket {} for audio event",
                object.key,
                object.bucket
            );
            match self.check_audio_for_event(&object.bucket, &object.key) {
                Ok(found) => events.extend(found),
                Err(err) => {
                    log_detection_error(&err, &format!("{}/{}", object.bucket, object.key));
                    return Err(err);
                }
            }
        }
        Ok(events)
    }
}
