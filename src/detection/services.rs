// Services - external collaborators of the inference driver
//
// The driver only sees three traits: where uploads come from, who labels a
// spectrogram image, and where detections are announced. Implementations
// here cover local files, an HTTP classifier endpoint, and log output.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Ordered notification attributes (key, value)
pub type Attributes = Vec<(String, String)>;

/// One label confidence from the classifier, confidence on a 0-100 scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomLabel {
    pub name: String,
    pub confidence: f64,
}

impl CustomLabel {
    pub fn new(name: impl Into<String>, confidence: f64) -> Self {
        Self {
            name: name.into(),
            confidence,
        }
    }
}

/// Full-object download
pub trait ObjectStore {
    fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Image classifier returning label confidences
pub trait LabelClassifier {
    fn classify(
        &self,
        image: &[u8],
        model_ref: &str,
        min_confidence: f64,
    ) -> Result<Vec<CustomLabel>, ServiceError>;
}

/// Publish a detection message
pub trait Notifier {
    fn publish(&self, message: &str, attributes: &Attributes) -> Result<(), ServiceError>;
}

/// Objects stored as `{root}/{bucket}/{key}` on the local filesystem
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ObjectStore for FsObjectStore {
    fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, ServiceError> {
        let path = self.root.join(relative_part(bucket)?).join(relative_part(key)?);
        std::fs::read(&path).map_err(|e| {
            let reason = format!("{}: {}", path.display(), e);
            match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied | ErrorKind::InvalidInput => {
                    ServiceError::fatal("object-store", reason)
                }
                _ => ServiceError::transient("object-store", reason),
            }
        })
    }
}

/// Bucket or key as a path that cannot leave the store root
fn relative_part(part: &str) -> Result<&Path, ServiceError> {
    let path = Path::new(part);
    let confined = !part.is_empty()
        && path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    if confined {
        Ok(path)
    } else {
        Err(ServiceError::fatal(
            "object-store",
            format!("refusing path outside the store: {part:?}"),
        ))
    }
}

#[derive(Deserialize)]
struct ClassifyResponse {
    #[serde(rename = "CustomLabels", default)]
    custom_labels: Vec<CustomLabel>,
}

/// Classifier reached over HTTP
///
/// The PNG is posted as the request body to
/// `{endpoint}?model={model_ref}&min_confidence={percent}` and the reply is
/// `{"CustomLabels": [{"Name": ..., "Confidence": ...}]}`.
pub struct HttpLabelClassifier {
    client: Client,
    endpoint: String,
}

impl HttpLabelClassifier {
    pub fn new(endpoint: &str) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ServiceError::fatal("classifier", e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_url(&self, model_ref: &str, min_confidence: f64) -> String {
        format!(
            "{}?model={}&min_confidence={}",
            self.endpoint,
            urlencoding::encode(model_ref),
            min_confidence * 100.0
        )
    }
}

impl LabelClassifier for HttpLabelClassifier {
    fn classify(
        &self,
        image: &[u8],
        model_ref: &str,
        min_confidence: f64,
    ) -> Result<Vec<CustomLabel>, ServiceError> {
        let response = self
            .client
            .post(self.request_url(model_ref, min_confidence))
            .header(reqwest::header::CONTENT_TYPE, "image/png")
            .body(image.to_vec())
            .send()
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    ServiceError::transient("classifier", e.to_string())
                } else {
                    ServiceError::fatal("classifier", e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP {}", status);
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(ServiceError::transient("classifier", reason));
            }
            return Err(ServiceError::fatal("classifier", reason));
        }

        let body: ClassifyResponse = response.json().map_err(|e| ServiceError::MalformedResponse {
            service: "classifier".to_string(),
            reason: e.to_string(),
        })?;

        Ok(body.custom_labels)
    }
}

/// Notifier that writes detections to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn publish(&self, message: &str, attributes: &Attributes) -> Result<(), ServiceError> {
        tracing::info!("[Notifier] {} {:?}", message, attributes);
        Ok(())
    }
}
