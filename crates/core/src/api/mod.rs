mod http;

use crate::config::{ChunkMs, EmotionMap, Model};
use bytes::Bytes;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::{fmt, path::Path};

pub use http::HttpEmotionApi;

/// Audio file as submitted in the `audio` multipart field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioFile {
    pub file_name: String,
    pub bytes: Bytes,
}

impl AudioFile {
    pub async fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_owned());
        Ok(Self {
            file_name,
            bytes: Bytes::from(bytes),
        })
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AnalyzeRequest {
    pub filename: Option<String>,
    pub chunk_ms: ChunkMs,
    pub emotion_map: EmotionMap,
    pub model: Model,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    pub filename: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct ClearResponse {
    #[serde(default)]
    pub deleted: u64,
}

/// Time marker of a timeline entry: seconds, or a preformatted label such
/// as `"01:30"`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TimeMarker {
    Seconds(Number),
    Label(String),
}

impl fmt::Display for TimeMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeMarker::Seconds(n) => write!(f, "{n}"),
            TimeMarker::Label(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimelineEntry {
    pub time: TimeMarker,
    pub emotion: String,
    pub confidence: Number,
}

#[derive(Deserialize)]
struct TimelineShape {
    timeline: Vec<TimelineEntry>,
}

/// Validated analyze response. The untouched body is kept for the raw JSON
/// view so extra fields survive in server order.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisPayload {
    pub timeline: Vec<TimelineEntry>,
    raw: Value,
}

impl AnalysisPayload {
    pub fn from_value(raw: Value) -> Result<Self, ApiError> {
        let shape = TimelineShape::deserialize(&raw)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))?;
        Ok(Self {
            timeline: shape.timeline,
            raw,
        })
    }

    pub fn pretty_json(&self) -> String {
        // Serializing a `Value` cannot fail.
        serde_json::to_string_pretty(&self.raw).unwrap_or_default()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("http error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server returned {status}")]
    Server { status: u16, message: Option<String> },

    #[error("invalid response shape: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Text shown in the status region. The server's own `error` text wins;
    /// otherwise the workflow's generic fallback is used.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Server {
                message: Some(message),
                ..
            } => message.clone(),
            ApiError::Server { message: None, .. } => fallback.to_owned(),
            ApiError::Transport(e) => format!("{fallback}: {e}"),
            ApiError::InvalidResponse(detail) => {
                format!("{fallback}: invalid response shape ({detail})")
            }
        }
    }
}

/// The three endpoints of the analysis server.
pub trait EmotionApi: Send + Sync {
    fn upload(&self, file: AudioFile) -> BoxFuture<'_, Result<UploadResponse, ApiError>>;

    fn analyze(&self, request: AnalyzeRequest) -> BoxFuture<'_, Result<AnalysisPayload, ApiError>>;

    fn clear(&self) -> BoxFuture<'_, Result<ClearResponse, ApiError>>;
}
