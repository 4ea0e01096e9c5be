// Trigger - upload notification batches
//
// A batch is the storage service's event document:
//   {"Records": [{"s3": {"bucket": {"name": ...}, "object": {"key": ...}}}]}
// Keys arrive form-encoded ('+' for space, %XX escapes) and are decoded
// before use.

use serde::Deserialize;

use crate::error::DetectionError;

/// Location of one uploaded object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

#[derive(Deserialize)]
struct UploadEvent {
    #[serde(rename = "Records", default)]
    records: Vec<UploadRecord>,
}

#[derive(Deserialize)]
struct UploadRecord {
    s3: StorageEntity,
}

#[derive(Deserialize)]
struct StorageEntity {
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Deserialize)]
struct BucketEntity {
    name: String,
}

#[derive(Deserialize)]
struct ObjectEntity {
    key: String,
}

/// Parse an upload event document into decoded object references, in delivery order
pub fn parse_upload_event(json: &str) -> Result<Vec<ObjectRef>, DetectionError> {
    let event: UploadEvent = serde_json::from_str(json).map_err(|e| DetectionError::InvalidEvent {
        reason: e.to_string(),
    })?;

    Ok(event
        .records
        .into_iter()
        .map(|record| ObjectRef {
            bucket: record.s3.bucket.name,
            key: unquote_plus(&record.s3.object.key),
        })
        .collect())
}

/// Decode a form-encoded string: '+' becomes a space, then %XX escapes are resolved
///
/// Escapes that do not form valid UTF-8 become U+FFFD.
pub fn unquote_plus(encoded: &str) -> String {
    let spaced = encoded.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}
