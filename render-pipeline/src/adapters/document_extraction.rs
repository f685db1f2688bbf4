use async_trait::async_trait;
use common::{error::AppError, storage::store::StorageManager, utils::config::AppConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::http::{build_client, check_status, with_bearer};
use crate::types::ParsedDocument;

/// Turns a stored statement into text.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, bucket: &str, object_path: &str) -> Result<ParsedDocument, AppError>;
}

/// Guesses the mime type from the object path; only PDFs are accepted.
pub fn ensure_supported_mime(object_path: &str) -> Result<mime::Mime, AppError> {
    let guessed = mime_guess::from_path(object_path).first_or_octet_stream();
    if guessed == mime::APPLICATION_PDF {
        Ok(guessed)
    } else {
        Err(AppError::Validation(format!(
            "unsupported mime type {guessed} for {object_path}"
        )))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    processor_name: &'a str,
    source_reference: String,
    mime_type: &'a str,
}

#[derive(Deserialize)]
struct ProcessResponse {
    document: ProcessedDocument,
}

#[derive(Deserialize)]
struct ProcessedDocument {
    #[serde(default)]
    text: String,
    #[serde(default)]
    entities: Vec<serde_json::Value>,
}

/// Calls a remote document-understanding processor.
pub struct DocumentAiExtractor {
    http: reqwest::Client,
    endpoint: String,
    processor: String,
    api_key: Option<String>,
    uri_scheme: String,
}

impl DocumentAiExtractor {
    pub fn new(
        endpoint: impl Into<String>,
        processor: impl Into<String>,
        api_key: Option<String>,
        uri_scheme: impl Into<String>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            http: build_client()?,
            endpoint: endpoint.into(),
            processor: processor.into(),
            api_key,
            uri_scheme: uri_scheme.into(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let endpoint = config.document_ai_endpoint.clone().ok_or_else(|| {
            AppError::Config("document_ai_endpoint is required for document extraction".into())
        })?;
        Self::new(
            endpoint,
            config.document_ai_processor.clone(),
            config.document_ai_api_key.clone(),
            config.source_uri_scheme.clone(),
        )
    }
}

#[async_trait]
impl DocumentExtractor for DocumentAiExtractor {
    async fn extract(&self, bucket: &str, object_path: &str) -> Result<ParsedDocument, AppError> {
        let mime_type = ensure_supported_mime(object_path)?;
        let body = ProcessRequest {
            processor_name: &self.processor,
            source_reference: format!("{}://{bucket}/{object_path}", self.uri_scheme),
            mime_type: mime_type.essence_str(),
        };

        let request = with_bearer(self.http.post(&self.endpoint), self.api_key.as_deref());
        let response = check_status(request.json(&body).send().await?, "document extraction")
            .await?;
        let parsed: ProcessResponse = response.json().await?;

        info!(
            source = %body.source_reference,
            chars = parsed.document.text.len(),
            entities = parsed.document.entities.len(),
            "Document extraction finished"
        );

        Ok(ParsedDocument {
            text: parsed.document.text,
            entities: parsed.document.entities,
        })
    }
}

/// Reads the PDF from the artifact store and extracts its text layer locally.
///
/// Objects are addressed as `{bucket}/{object_path}` inside the store.
pub struct PdfTextExtractor {
    storage: StorageManager,
}

impl PdfTextExtractor {
    pub fn new(storage: StorageManager) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl DocumentExtractor for PdfTextExtractor {
    async fn extract(&self, bucket: &str, object_path: &str) -> Result<ParsedDocument, AppError> {
        ensure_supported_mime(object_path)?;
        let location = format!("{bucket}/{object_path}");
        let bytes = self.storage.get(&location).await?;
        debug!(%location, size = bytes.len(), "Loaded statement for local extraction");

        let text = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem(&bytes).map(|s| s.trim().to_string())
        })
        .await?
        .map_err(|err| AppError::Processing(format!("Failed to extract text from PDF: {err}")))?;

        Ok(ParsedDocument::from_text(text))
    }
}
