use crate::api::{
    AnalysisPayload, AnalyzeRequest, ApiError, AudioFile, ClearResponse, EmotionApi,
    UploadResponse,
};
use crate::config::{ConfigError, ServerUrl};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

const LOG_TARGET: &str = "api::http";

#[derive(Clone)]
pub struct HttpEmotionApi {
    client: Client,
    upload_url: Url,
    analyze_url: Url,
    clear_url: Url,
}

impl HttpEmotionApi {
    pub fn new(server: &ServerUrl) -> Result<Self, ConfigError> {
        Self::with_client(server, Client::new())
    }

    pub fn with_client(server: &ServerUrl, client: Client) -> Result<Self, ConfigError> {
        Ok(Self {
            client,
            upload_url: server.endpoint("upload")?,
            analyze_url: server.endpoint("analyze")?,
            clear_url: server.endpoint("clear")?,
        })
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Maps a status and raw body to the success JSON or an `ApiError`.
/// A failure body that is not JSON, or lacks a non-empty `error` string,
/// yields `Server { message: None }` so callers use their fallback text.
fn decode_body(status: StatusCode, body: &[u8]) -> Result<Value, ApiError> {
    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.trim().is_empty());
        return Err(ApiError::Server {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_slice(body).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

fn decode_typed<T: DeserializeOwned>(status: StatusCode, body: &[u8]) -> Result<T, ApiError> {
    let value = decode_body(status, body)?;
    serde_json::from_value(value).map_err(|e| ApiError::InvalidResponse(e.to_string()))
}

fn decode_upload(status: StatusCode, body: &[u8]) -> Result<UploadResponse, ApiError> {
    let response: UploadResponse = decode_typed(status, body)?;
    if response.filename.trim().is_empty() {
        return Err(ApiError::InvalidResponse("filename is empty".to_owned()));
    }
    Ok(response)
}

fn decode_analysis(status: StatusCode, body: &[u8]) -> Result<AnalysisPayload, ApiError> {
    AnalysisPayload::from_value(decode_body(status, body)?)
}

impl EmotionApi for HttpEmotionApi {
    fn upload(&self, file: AudioFile) -> BoxFuture<'_, Result<UploadResponse, ApiError>> {
        let this = self.clone();
        async move {
            tracing::debug!(
                target: LOG_TARGET,
                file_name = %file.file_name,
                size = file.bytes.len(),
                "uploading audio"
            );
            let length = file.bytes.len() as u64;
            let part =
                Part::stream_with_length(Body::from(file.bytes), length).file_name(file.file_name);
            let form = Form::new().part("audio", part);

            let response = this
                .client
                .post(this.upload_url.clone())
                .multipart(form)
                .send()
                .await?;
            let status = response.status();
            let body = response.bytes().await?;
            tracing::debug!(target: LOG_TARGET, %status, "upload response");

            decode_upload(status, &body)
        }
        .boxed()
    }

    fn analyze(&self, request: AnalyzeRequest) -> BoxFuture<'_, Result<AnalysisPayload, ApiError>> {
        let this = self.clone();
        async move {
            tracing::debug!(target: LOG_TARGET, ?request, "requesting analysis");
            let response = this
                .client
                .post(this.analyze_url.clone())
                .json(&request)
                .send()
                .await?;
            let status = response.status();
            let body = response.bytes().await?;
            tracing::debug!(target: LOG_TARGET, %status, "analyze response");

            decode_analysis(status, &body)
        }
        .boxed()
    }

    fn clear(&self) -> BoxFuture<'_, Result<ClearResponse, ApiError>> {
        let this = self.clone();
        async move {
            let response = this.client.post(this.clear_url.clone()).send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            tracing::debug!(target: LOG_TARGET, %status, "clear response");

            decode_typed(status, &body)
        }
        .boxed()
    }
}
