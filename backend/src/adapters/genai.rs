//! Minimal REST client for the generative-language API.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use super::{AdapterError, read_json};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub uri: String,
    pub mime_type: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: UploadedFile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Part<'a> {
    Text(&'a str),
    FileData {
        #[serde(rename = "mimeType")]
        mime_type: &'a str,
        #[serde(rename = "fileUri")]
        file_uri: &'a str,
    },
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text of the first candidate, if it has any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() { None } else { Some(text) }
    }
}

/// Operations the generative classifier and the plan writer need from a model.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn upload_file(&self, bytes: Vec<u8>, mime_type: &str) -> Result<UploadedFile, AdapterError>;

    async fn generate_text(&self, prompt: &str, file: Option<&UploadedFile>) -> Result<String, AdapterError>;
}

#[derive(Clone)]
pub struct GenAiClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl GenAiClient {
    pub fn new(http_client: Client, base_url: String, api_key: Option<String>, model: String) -> Self {
        Self {
            http_client,
            base_url,
            api_key,
            model,
        }
    }

    fn with_key(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.query(&[("key", key)]),
            None => request,
        }
    }
}

#[async_trait]
impl GenerativeModel for GenAiClient {
    async fn upload_file(&self, bytes: Vec<u8>, mime_type: &str) -> Result<UploadedFile, AdapterError> {
        let url = format!("{}/upload/v1beta/files", self.base_url);
        let request = self
            .http_client
            .post(url)
            .header("X-Goog-Upload-Protocol", "raw")
            .header(CONTENT_TYPE, mime_type)
            .body(bytes);
        let response = self.with_key(request).send().await?;
        let parsed: UploadResponse = read_json(response).await?;
        Ok(parsed.file)
    }

    async fn generate_text(&self, prompt: &str, file: Option<&UploadedFile>) -> Result<String, AdapterError> {
        let mut parts = Vec::with_capacity(2);
        if let Some(file) = file {
            parts.push(Part::FileData {
                mime_type: &file.mime_type,
                file_uri: &file.uri,
            });
        }
        parts.push(Part::Text(prompt));
        let body = GenerateRequest {
            contents: vec![Content { role: "user", parts }],
        };

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let request = self.http_client.post(url).json(&body);
        let response = self.with_key(request).send().await?;
        let parsed: GenerateResponse = read_json(response).await?;
        parsed
            .text()
            .ok_or_else(|| AdapterError::MalformedResponse("response carried no text".to_string()))
    }
}
