use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use url::Url;

use crate::error::AppError;

#[derive(Clone, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Local,
    Memory,
}

/// Which document extraction adapter the worker wires into the pipeline.
#[derive(Clone, Deserialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Remote document-understanding service.
    #[default]
    DocumentAi,
    /// In-process extraction of the PDF text layer.
    LocalPdf,
}

fn default_storage_kind() -> StorageKind {
    StorageKind::Local
}

#[derive(Clone, Deserialize, Debug, Default)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_storage_kind")]
    pub storage: StorageKind,
    #[serde(default = "default_scene_model")]
    pub scene_model: String,
    #[serde(default)]
    pub extraction_mode: ExtractionMode,
    pub document_ai_endpoint: Option<String>,
    #[serde(default = "default_document_ai_processor")]
    pub document_ai_processor: String,
    pub document_ai_api_key: Option<String>,
    #[serde(default = "default_source_scheme")]
    pub source_uri_scheme: String,
    pub video_generation_endpoint: Option<String>,
    pub video_generation_api_key: Option<String>,
    pub slate_endpoint: Option<String>,
    pub stitch_endpoint: Option<String>,
    pub render_api_key: Option<String>,
    #[serde(default = "default_render_resolution")]
    pub render_resolution: String,
    #[serde(default = "default_render_concurrency")]
    pub render_concurrency: usize,
    #[serde(default = "default_adapter_retry_attempts")]
    pub adapter_retry_attempts: usize,
    #[serde(default = "default_adapter_retry_base_ms")]
    pub adapter_retry_base_ms: u64,
    pub brand_name: Option<String>,
    pub brand_logo_path: Option<String>,
    #[serde(default)]
    pub burn_in_captions: bool,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_scene_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_document_ai_processor() -> String {
    "statement-parser".to_string()
}

fn default_source_scheme() -> String {
    "gs".to_string()
}

fn default_render_resolution() -> String {
    "1280x720".to_string()
}

fn default_render_concurrency() -> usize {
    3
}

fn default_adapter_retry_attempts() -> usize {
    3
}

fn default_adapter_retry_base_ms() -> u64 {
    250
}

impl AppConfig {
    /// Checks that every service the pipeline will call is reachable by configuration,
    /// so a worker refuses to start instead of failing jobs halfway through.
    pub fn validate(&self) -> Result<(), AppError> {
        let Some(stitch) = self.stitch_endpoint.as_deref() else {
            return Err(AppError::Config("stitch_endpoint is required".into()));
        };
        check_url("stitch_endpoint", stitch)?;

        match self.video_generation_endpoint.as_deref() {
            Some(endpoint) => check_url("video_generation_endpoint", endpoint)?,
            None => {
                let Some(slate) = self.slate_endpoint.as_deref() else {
                    return Err(AppError::Config(
                        "slate_endpoint is required when video_generation_endpoint is unset"
                            .into(),
                    ));
                };
                check_url("slate_endpoint", slate)?;
            }
        }

        if self.extraction_mode == ExtractionMode::DocumentAi {
            let Some(endpoint) = self.document_ai_endpoint.as_deref() else {
                return Err(AppError::Config(
                    "document_ai_endpoint is required for the document_ai extraction mode".into(),
                ));
            };
            check_url("document_ai_endpoint", endpoint)?;
        }

        if self.render_concurrency == 0 {
            return Err(AppError::Config(
                "render_concurrency must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

fn check_url(name: &str, value: &str) -> Result<(), AppError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|err| AppError::Config(format!("{name} is not a valid URL ({value}): {err}")))
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}
