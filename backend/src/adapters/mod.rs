//! Classifier adapters.
//!
//! Each adapter wraps one remote classification service and reduces its wire
//! format to a plain label or grade. Adapters never apply their own deadline for
//! the whole call; the aggregator wraps every invocation in
//! [`crate::invoker::with_deadline`].

pub mod detector;
pub mod direct;
pub mod generative;
pub mod genai;
pub mod severity;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::imaging::NormalizedImage;

pub use detector::DetectorAdapter;
pub use direct::DirectClassifierAdapter;
pub use generative::GenerativeAdapter;
pub use severity::SeverityGraderAdapter;

/// Label used whenever a source has no usable opinion.
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AdapterName {
    Detector,
    DirectClassifier,
    Generative,
    SeverityGrader,
}

impl AdapterName {
    pub const ALL: [AdapterName; 4] = [
        AdapterName::Detector,
        AdapterName::DirectClassifier,
        AdapterName::Generative,
        AdapterName::SeverityGrader,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterName::Detector => "detector",
            AdapterName::DirectClassifier => "directClassifier",
            AdapterName::Generative => "generative",
            AdapterName::SeverityGrader => "severityGrader",
        }
    }
}

impl fmt::Display for AdapterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    Timeout,
    HttpError,
    MalformedResponse,
    Unknown,
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Request timed out{}", after.map(|d| format!(" after {:?}", d)).unwrap_or_default())]
    Timeout { after: Option<Duration> },
    #[error("HTTP {status}")]
    Http { status: u16 },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    #[error("{0}")]
    Unknown(String),
}

impl AdapterError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AdapterError::Timeout { .. } => FailureKind::Timeout,
            AdapterError::Http { .. } | AdapterError::Transport(_) => FailureKind::HttpError,
            AdapterError::MalformedResponse(_) => FailureKind::MalformedResponse,
            AdapterError::Unknown(_) => FailureKind::Unknown,
        }
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AdapterError::Timeout { after: None }
        } else if err.is_decode() {
            AdapterError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            AdapterError::Http {
                status: status.as_u16(),
            }
        } else {
            AdapterError::Transport(err.to_string())
        }
    }
}

/// A source that names the condition visible in the image.
#[async_trait]
pub trait LabelAdapter: Send + Sync {
    fn name(&self) -> AdapterName;

    async fn classify(&self, image: &NormalizedImage) -> Result<String, AdapterError>;
}

/// A source that grades severity on the 0-3 scale.
#[async_trait]
pub trait SeverityAdapter: Send + Sync {
    fn name(&self) -> AdapterName {
        AdapterName::SeverityGrader
    }

    async fn grade(&self, image: &NormalizedImage) -> Result<i64, AdapterError>;
}

/// Fails with `Http` on non-2xx, otherwise decodes the body as JSON. Decode
/// failures are contract violations and map to `MalformedResponse`.
pub(crate) async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, AdapterError> {
    let status = response.status();
    if !status.is_success() {
        return Err(AdapterError::Http {
            status: status.as_u16(),
        });
    }
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| AdapterError::MalformedResponse(e.to_string()))
}

pub(crate) fn image_part(image: &NormalizedImage) -> Result<reqwest::multipart::Part, AdapterError> {
    reqwest::multipart::Part::bytes(image.jpeg.clone())
        .file_name("image.jpg")
        .mime_str(image.mime_type())
        .map_err(|e| AdapterError::Unknown(e.to_string()))
}
