use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

use crate::config::AiConfig;
use crate::error::{AppError, Result};
use crate::models::{
    CardMetadata, FileMetadata, FolderSuggestions, GenerateContentRequest,
    GenerateContentResponse,
};

/// Header carrying the Gemini key, kept out of URLs and error text
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Client for the Gemini `generateContent` endpoint
#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    model: String,
    metadata_api_key: Option<String>,
    folder_suggestions_api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            metadata_api_key: config.metadata_api_key.clone(),
            folder_suggestions_api_key: config.folder_suggestions_api_key.clone(),
        })
    }

    /// Propose a card name, description and tags for a set of files
    pub async fn generate_card_metadata(&self, files: &[FileMetadata]) -> Result<CardMetadata> {
        if files.is_empty() {
            return Err(AppError::BadRequest("File metadata is required.".to_string()));
        }
        let text = self
            .generate(self.metadata_api_key.as_deref(), card_metadata_prompt(files))
            .await?;
        parse_model_json(&text)
    }

    /// Propose folders for a set of files
    pub async fn generate_folder_suggestions(
        &self,
        files: &[FileMetadata],
    ) -> Result<FolderSuggestions> {
        if files.is_empty() {
            return Err(AppError::BadRequest("File metadata is required.".to_string()));
        }
        let text = self
            .generate(
                self.folder_suggestions_api_key.as_deref(),
                folder_suggestions_prompt(files),
            )
            .await?;
        let suggestions: FolderSuggestions = parse_model_json(&text)?;
        Ok(retain_known_files(suggestions, files))
    }

    async fn generate(&self, api_key: Option<&str>, prompt: String) -> Result<String> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::Internal("AI service is not configured.".to_string()))?;

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, api_key)
            .json(&GenerateContentRequest::from_prompt(prompt))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Gemini request failed: {}", e.without_url());
                AppError::Internal("AI generation failed.".to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Gemini request failed: {} {}", status, body);
            return Err(AppError::Internal(format!(
                "AI generation failed. Status: {}",
                status.as_u16()
            )));
        }

        let result: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| {
                tracing::error!("Gemini response could not be read: {}", e.without_url());
                AppError::Internal("AI response could not be read.".to_string())
            })?;

        result
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| AppError::Internal("AI response contained no text.".to_string()))
    }
}

/// Proxy for the Chat-PDF backend
#[derive(Debug, Clone)]
pub struct ChatPdfClient {
    client: Client,
    base_url: String,
}

impl ChatPdfClient {
    pub fn new(config: &AiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.chat_pdf_base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `GET /list-pdfs`
    pub async fn list(&self) -> Result<Value> {
        let request = self.client.get(format!("{}/list-pdfs", self.base_url));
        Self::forward(request).await
    }

    /// `POST /chat-with-pdfs`
    pub async fn ask(&self, body: &Value) -> Result<Value> {
        let request = self
            .client
            .post(format!("{}/chat-with-pdfs", self.base_url))
            .json(body);
        Self::forward(request).await
    }

    async fn forward(request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(Self::unreachable)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        response.json().await.map_err(Self::unreachable)
    }

    fn unreachable(e: reqwest::Error) -> AppError {
        AppError::BadGateway(format!("Failed to reach Chat-PDF backend: {}", e.without_url()))
    }
}

fn card_metadata_prompt(files: &[FileMetadata]) -> String {
    let file_list = files
        .iter()
        .map(|f| format!("- {} ({} KB)", f.name, (f.size as f64 / 1024.0).round() as u64))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Based on the following list of files, generate a concise, professional card name, a 2-3 sentence description and an array of relevant tags for the collection.

File List:
{file_list}

Guidelines:
- The name is a short descriptive title for the whole collection, at most 50 characters.
- The description summarizes the purpose and content of the files in 2-3 sentences.
- The tags are 3-5 relevant single-word lowercase strings.
- Look at file relationships and naming patterns (e.g. "Q1", "Report", "ClientX").
- Return a single minified JSON object with the keys "name", "description" and "tags" and nothing else.

Example Output:
{{"name":"Q1 Business Intelligence Package","description":"Q1 analysis collection with the sales report, market analysis and competitor research.","tags":["q1","business","finance","report"]}}"#
    )
}

fn folder_suggestions_prompt(files: &[FileMetadata]) -> String {
    let file_list = files
        .iter()
        .map(|f| format!("- {}", f.name))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Based on the following list of file names, suggest folder categories to organize them.

File List:
{file_list}

Guidelines:
- Group files by project, date, file type or content.
- Suggest 2-5 folder names.
- For each folder list the file names that belong in it. Files that fit no folder may be left out.
- Return a single minified JSON object mapping folder names to arrays of file names and nothing else.

Example Output:
{{"Project Alpha":["project_alpha_report.docx","project_alpha_data.xlsx"],"Vacation Photos":["vacation_photo_1.jpg","vacation_photo_2.png"]}}"#
    )
}

/// Remove Markdown code fences the model sometimes wraps its JSON in
fn strip_code_fences(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        text = rest.trim_start();
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim_end();
    }
    text
}

fn parse_model_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(strip_code_fences(text)).map_err(|e| {
        tracing::warn!("Unreadable model output: {}", e);
        AppError::Internal("AI returned an unreadable response.".to_string())
    })
}

/// Keep only file names that were submitted, and only folders that still hold files
fn retain_known_files(suggestions: FolderSuggestions, files: &[FileMetadata]) -> FolderSuggestions {
    let known: HashSet<&str> = files.iter().map(|f| f.name.as_str()).collect();
    suggestions
        .into_iter()
        .filter_map(|(folder, names)| {
            let names: Vec<String> = names
                .into_iter()
                .filter(|n| known.contains(n.as_str()))
                .collect();
            (!folder.trim().is_empty() && !names.is_empty()).then_some((folder, names))
        })
        .collect()
}
