use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::rc::Rc;
use std::time::Duration;

use alarm_finder::config::DetectorConfig;
use alarm_finder::detection::retry::{Jitter, ManualClock, RetryPolicy};
use alarm_finder::detection::services::{
    Attributes, CustomLabel, LabelClassifier, Notifier, ObjectStore,
};
use alarm_finder::detection::trigger::ObjectRef;
use alarm_finder::detection::InferenceDriver;
use alarm_finder::error::{DetectionError, ServiceError};
use alarm_finder::spectrogram::RenderOptions;
use alarm_finder::SAMPLE_RATE;

#[derive(Default)]
struct MemoryStore {
    objects: HashMap<(String, String), Vec<u8>>,
}

impl MemoryStore {
    fn with(mut self, bucket: &str, key: &str, bytes: Vec<u8>) -> Self {
        self.objects
            .insert((bucket.to_string(), key.to_string()), bytes);
        self
    }
}

impl ObjectStore for MemoryStore {
    fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ServiceError> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| ServiceError::fatal("store", format!("no such key {bucket}/{key}")))
    }
}

type Reply = Result<Vec<CustomLabel>, ServiceError>;

/// Replays queued replies, then repeats the fallback forever
#[derive(Clone)]
struct ScriptedClassifier {
    queued: Rc<RefCell<VecDeque<Reply>>>,
    fallback: Reply,
    calls: Rc<RefCell<usize>>,
}

impl ScriptedClassifier {
    fn always(reply: Reply) -> Self {
        Self {
            queued: Rc::default(),
            fallback: reply,
            calls: Rc::default(),
        }
    }

    fn then(self, reply: Reply) -> Self {
        self.queued.borrow_mut().push_back(reply);
        self
    }

    fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl LabelClassifier for ScriptedClassifier {
    fn classify(
        &self,
        image: &[u8],
        _model_ref: &str,
        _min_confidence: f64,
    ) -> Result<Vec<CustomLabel>, ServiceError> {
        assert_eq!(&image[..8], b"\x89PNG\r\n\x1a\n");
        *self.calls.borrow_mut() += 1;
        self.queued
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    published: Rc<RefCell<Vec<(String, Attributes)>>>,
}

impl Notifier for RecordingNotifier {
    fn publish(&self, message: &str, attributes: &Attributes) -> Result<(), ServiceError> {
        self.published
            .borrow_mut()
            .push((message.to_string(), attributes.clone()));
        Ok(())
    }
}

fn labels(alarm: f64) -> Reply {
    Ok(vec![
        CustomLabel::new("no_alarm", 100.0 - alarm),
        CustomLabel::new("alarm", alarm),
    ])
}

fn wav_seconds(seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let len = (seconds * SAMPLE_RATE as f32) as usize;
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..len {
            let t = i as f32 / SAMPLE_RATE as f32;
            let value = 0.4 * (2.0 * std::f32::consts::PI * 2_000.0 * t).sin();
            writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn driver(
    store: MemoryStore,
    classifier: ScriptedClassifier,
    notifier: RecordingNotifier,
) -> InferenceDriver<MemoryStore, ScriptedClassifier, RecordingNotifier, ManualClock> {
    InferenceDriver::new(&DetectorConfig::default(), store, classifier, notifier)
        .with_clock(ManualClock::new())
        .with_retry_policy(RetryPolicy::default().with_jitter(Jitter::None))
        .with_render_options(RenderOptions {
            width: 64,
            height: 32,
        })
        .with_seed(7)
}

#[test]
fn confident_clip_is_published() {
    let store = MemoryStore::default().with("uploads", "kitchen.wav", wav_seconds(2.0));
    let notifier = RecordingNotifier::default();
    let mut driver = driver(store, ScriptedClassifier::always(labels(95.0)), notifier.clone());

    let events = driver.check_audio_for_event("uploads", "kitchen.wav").unwrap();

    assert_eq!(events.len(), 1);
    assert!((events[0].confidence - 0.95).abs() < 1e-9);
    assert_eq!(events[0].start, Duration::ZERO);
    assert_eq!(events[0].end, Duration::from_secs(3));

    let published = notifier.published.borrow();
    assert_eq!(published.len(), 1);
    assert!(published[0].0.starts_with("Found alarm in kitchen.wav\n"));
    assert!(published[0]
        .1
        .contains(&("Confidence".to_string(), "0.95".to_string())));
}

#[test]
fn clip_below_threshold_is_not_published() {
    let store = MemoryStore::default().with("uploads", "hall.wav", wav_seconds(2.0));
    let notifier = RecordingNotifier::default();
    let mut driver = driver(store, ScriptedClassifier::always(labels(80.0)), notifier.clone());

    let events = driver.check_audio_for_event("uploads", "hall.wav").unwrap();

    assert!(events.is_empty());
    assert!(notifier.published.borrow().is_empty());
}

#[test]
fn missing_alarm_label_is_an_error() {
    let store = MemoryStore::default().with("uploads", "a.wav", wav_seconds(1.0));
    let classifier =
        ScriptedClassifier::always(Ok(vec![CustomLabel::new("siren", 99.0)]));
    let mut driver = driver(store, classifier, RecordingNotifier::default());

    let err = driver.check_audio_for_event("uploads", "a.wav").unwrap_err();
    match err {
        DetectionError::LabelMissing { label, available } => {
            assert_eq!(label, "alarm");
            assert_eq!(available, vec!["siren".to_string()]);
        }
        other => panic!("Expected LabelMissing, got {:?}", other),
    }
}

#[test]
fn transient_classifier_failures_are_retried_with_backoff() {
    let store = MemoryStore::default().with("uploads", "a.wav", wav_seconds(1.0));
    let throttled = || Err(ServiceError::transient("classifier", "throttled"));
    let classifier = ScriptedClassifier::always(labels(97.0))
        .then(throttled())
        .then(throttled())
        .then(throttled());
    let notifier = RecordingNotifier::default();
    let mut driver = driver(store, classifier.clone(), notifier.clone());

    let events = driver.check_audio_for_event("uploads", "a.wav").unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(classifier.calls(), 4);
    assert_eq!(
        driver.clock().waits(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
    assert_eq!(driver.clock().elapsed(), Duration::from_secs(7));
}

#[test]
fn exhausted_retries_abort_without_notification() {
    let store = MemoryStore::default().with("uploads", "a.wav", wav_seconds(1.0));
    let classifier =
        ScriptedClassifier::always(Err(ServiceError::transient("classifier", "unavailable")));
    let notifier = RecordingNotifier::default();
    let mut driver = driver(store, classifier, notifier.clone());

    let err = driver.check_audio_for_event("uploads", "a.wav").unwrap_err();

    assert!(matches!(
        err,
        DetectionError::Service(ServiceError::RetryExhausted { .. })
    ));
    assert!(driver.clock().elapsed() <= Duration::from_secs(60));
    assert!(notifier.published.borrow().is_empty());
}

#[test]
fn fatal_classifier_error_is_not_retried() {
    let store = MemoryStore::default().with("uploads", "a.wav", wav_seconds(1.0));
    let classifier =
        ScriptedClassifier::always(Err(ServiceError::fatal("classifier", "bad model")));
    let mut driver = driver(store, classifier.clone(), RecordingNotifier::default());

    let err = driver.check_audio_for_event("uploads", "a.wav").unwrap_err();

    assert!(matches!(err, DetectionError::Service(ServiceError::Fatal { .. })));
    assert_eq!(classifier.calls(), 1);
    assert!(driver.clock().waits().is_empty());
}

#[test]
fn every_window_of_a_long_upload_is_checked() {
    let store = MemoryStore::default().with("uploads", "long.wav", wav_seconds(7.0));
    let classifier = ScriptedClassifier::always(labels(92.0));
    let mut driver = driver(store, classifier.clone(), RecordingNotifier::default());

    let events = driver.check_audio_for_event("uploads", "long.wav").unwrap();

    assert_eq!(classifier.calls(), 4);
    let starts: Vec<Duration> = events.iter().map(|e| e.start).collect();
    assert_eq!(
        starts,
        vec![
            Duration::ZERO,
            Duration::from_millis(2_250),
            Duration::from_millis(4_500),
            Duration::from_millis(6_750)
        ]
    );
    let indices: Vec<usize> = events.iter().map(|e| e.clip_index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
}

#[test]
fn batch_stops_at_first_failing_object() {
    let store = MemoryStore::default()
        .with("uploads", "one.wav", wav_seconds(1.0))
        .with("uploads", "three.wav", wav_seconds(1.0));
    let classifier = ScriptedClassifier::always(labels(99.0));
    let notifier = RecordingNotifier::default();
    let mut driver = driver(store, classifier.clone(), notifier.clone());

    let batch = vec![
        ObjectRef::new("uploads", "one.wav"),
        ObjectRef::new("uploads", "missing.wav"),
        ObjectRef::new("uploads", "three.wav"),
    ];
    let err = driver.process_batch(&batch).unwrap_err();

    assert!(matches!(err, DetectionError::Service(ServiceError::Fatal { .. })));
    assert_eq!(classifier.calls(), 1);
    assert_eq!(notifier.published.borrow().len(), 1);
}

#[test]
fn batch_collects_events_across_objects() {
    let store = MemoryStore::default()
        .with("uploads", "one.wav", wav_seconds(1.0))
        .with("uploads", "two.wav", wav_seconds(4.0));
    let mut driver = driver(
        store,
        ScriptedClassifier::always(labels(91.0)),
        RecordingNotifier::default(),
    );

    let events = driver
        .process_batch(&[
            ObjectRef::new("uploads", "one.wav"),
            ObjectRef::new("uploads", "two.wav"),
        ])
        .unwrap();

    let sources: Vec<&str> = events.iter().map(|e| e.source.as_str()).collect();
    assert_eq!(sources, vec!["one.wav", "two.wav", "two.wav"]);
}
