//! Gemini REST client.
//!
//! Small clips travel inline as base64; anything over the inline limit goes
//! through the resumable Files API and is polled until the service reports
//! it `ACTIVE`.

use crate::error::ExtractionError;
use crate::extract::{video_mime_type, VideoAnalyzer};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use synthforge_core::{ApiKey, GeminiSettings};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: ApiKey,
    settings: GeminiSettings,
}

impl GeminiClient {
    pub fn new(api_key: ApiKey, settings: GeminiSettings) -> Result<Self, ExtractionError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(ExtractionError::Client)?;
        Ok(Self { http, api_key, settings })
    }

    pub fn settings(&self) -> &GeminiSettings {
        &self.settings
    }

    fn generate_endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.api_base.trim_end_matches('/'),
            self.settings.model
        )
    }

    fn upload_endpoint(&self) -> String {
        format!("{}/upload/v1beta/files", self.settings.api_base.trim_end_matches('/'))
    }

    fn file_endpoint(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.settings.api_base.trim_end_matches('/'), name)
    }

    fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: self.settings.temperature,
            max_output_tokens: self.settings.max_output_tokens,
            response_mime_type: "application/json",
        }
    }

    /// Get the video into a part the model can see
    async fn video_part(&self, video: &Path) -> Result<Part, ExtractionError> {
        let bytes = tokio::fs::read(video)
            .await
            .map_err(|source| ExtractionError::ReadVideo { path: video.to_path_buf(), source })?;
        let mime_type = video_mime_type(video).to_string();

        if bytes.len() as u64 <= self.settings.inline_limit_bytes {
            tracing::debug!("Sending {} bytes inline ({})", bytes.len(), mime_type);
            let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
            return Ok(Part::InlineData { inline_data: InlineData { mime_type, data } });
        }

        let display_name = video
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());
        let file = self.upload(bytes, &mime_type, &display_name).await?;
        let file = self.wait_until_active(file).await?;
        Ok(Part::FileData {
            file_data: FileData { mime_type, file_uri: file.uri },
        })
    }

    async fn upload(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, ExtractionError> {
        let endpoint = self.upload_endpoint();
        tracing::info!("Uploading {} ({:.1} MB)", display_name, bytes.len() as f64 / 1e6);

        let start = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, self.api_key.expose())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&UploadStart { file: UploadMetadata { display_name } })
            .send()
            .await
            .map_err(|source| ExtractionError::Http { endpoint: endpoint.clone(), source })?;
        let start = check_status(&endpoint, start).await?;

        let session_url = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(ExtractionError::UploadSession)?;

        let finished = self
            .http
            .post(&session_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|source| ExtractionError::Http { endpoint: endpoint.clone(), source })?;
        let finished = check_status(&endpoint, finished).await?;

        let envelope: FileEnvelope = finished
            .json()
            .await
            .map_err(|source| ExtractionError::Http { endpoint, source })?;
        tracing::info!("Uploaded as {}", envelope.file.name);
        Ok(envelope.file)
    }

    async fn wait_until_active(&self, mut file: RemoteFile) -> Result<RemoteFile, ExtractionError> {
        let started = Instant::now();
        loop {
            let state = file.state.clone().unwrap_or_else(|| "ACTIVE".to_string());
            match state.as_str() {
                "ACTIVE" => return Ok(file),
                "PROCESSING" | "STATE_UNSPECIFIED" => {}
                _ => return Err(ExtractionError::ProcessingFailed { name: file.name, state }),
            }

            let waited = started.elapsed();
            if waited >= self.settings.processing_timeout {
                return Err(ExtractionError::ProcessingTimeout { name: file.name, waited });
            }
            tracing::debug!("{} still processing ({:.0?} elapsed)", file.name, waited);
            tokio::time::sleep(self.settings.poll_interval).await;

            let endpoint = self.file_endpoint(&file.name);
            let response = self
                .http
                .get(&endpoint)
                .header(API_KEY_HEADER, self.api_key.expose())
                .send()
                .await
                .map_err(|source| ExtractionError::Http { endpoint: endpoint.clone(), source })?;
            let response = check_status(&endpoint, response).await?;
            file = response
                .json()
                .await
                .map_err(|source| ExtractionError::Http { endpoint, source })?;
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, ExtractionError> {
        let endpoint = self.generate_endpoint();
        tracing::info!("Requesting analysis from {}", self.settings.model);

        let response = self
            .http
            .post(&endpoint)
            .header(API_KEY_HEADER, self.api_key.expose())
            .json(request)
            .send()
            .await
            .map_err(|source| ExtractionError::Http { endpoint: endpoint.clone(), source })?;
        let response = check_status(&endpoint, response).await?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|source| ExtractionError::Http { endpoint, source })?;
        body.into_text()
    }
}

impl VideoAnalyzer for GeminiClient {
    async fn analyze(&self, video: &Path, instruction: &str) -> Result<String, ExtractionError> {
        let video_part = self.video_part(video).await?;
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part::Text { text: instruction.to_string() }, video_part],
            }],
            generation_config: self.generation_config(),
        };
        self.generate(&request).await
    }
}

async fn check_status(
    endpoint: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ExtractionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ExtractionError::Service {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body: body.chars().take(1000).collect(),
    })
}

// Wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Serialize)]
struct UploadStart<'a> {
    file: UploadMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct UploadMetadata<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    file: RemoteFile,
}

#[derive(Debug, Deserialize)]
struct RemoteFile {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate
    fn into_text(self) -> Result<String, ExtractionError> {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Err(ExtractionError::EmptyResponse { reason: block_reason });
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyResponse {
                reason: candidate.finish_reason.or(block_reason),
            });
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> GeminiClient {
        let settings = GeminiSettings {
            api_base: "https://example.invalid/".to_string(),
            ..GeminiSettings::default()
        };
        GeminiClient::new(ApiKey::new("test-key"), settings).unwrap()
    }

    #[test]
    fn test_endpoints() {
        let c = client();
        assert_eq!(
            c.generate_endpoint(),
            format!("https://example.invalid/v1beta/models/{}:generateContent", c.settings().model)
        );
        assert_eq!(c.upload_endpoint(), "https://example.invalid/upload/v1beta/files");
        assert_eq!(c.file_endpoint("files/abc"), "https://example.invalid/v1beta/files/abc");
    }

    #[test]
    fn test_request_shape() {
        let c = client();
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::Text { text: "describe".to_string() },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "video/mp4".to_string(),
                            data: "AAAA".to_string(),
                        },
                    },
                ],
            }],
            generation_config: c.generation_config(),
        };
        let value = serde_json::to_value(&request).unwrap();
        let parts = &value["contents"][0]["parts"];
        assert_eq!(parts[0], json!({"text": "describe"}));
        assert_eq!(parts[1]["inlineData"]["mimeType"], "video/mp4");
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 4096);
    }

    #[test]
    fn test_file_part_shape() {
        let part = Part::FileData {
            file_data: FileData {
                mime_type: "video/quicktime".to_string(),
                file_uri: "https://example.invalid/files/abc".to_string(),
            },
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["fileData"]["fileUri"], "https://example.invalid/files/abc");
    }

    #[test]
    fn test_response_text_is_concatenated() {
        let body: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": {"parts": [{"text": "{\"a\":"}, {"text": " 1}"}]},
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(body.into_text().unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_blocked_prompt_is_empty_response() {
        let body: GenerateResponse = serde_json::from_value(json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        match body.into_text() {
            Err(ExtractionError::EmptyResponse { reason }) => assert_eq!(reason.as_deref(), Some("SAFETY")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_candidate_without_text() {
        let body: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "MAX_TOKENS"}]
        }))
        .unwrap();
        match body.into_text() {
            Err(ExtractionError::EmptyResponse { reason }) => {
                assert_eq!(reason.as_deref(), Some("MAX_TOKENS"))
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_api_key_not_in_debug() {
        let c = client();
        assert!(!format!("{:?}", c.api_key).contains("test-key"));
    }
}
