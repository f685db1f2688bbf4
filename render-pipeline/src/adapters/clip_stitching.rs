use async_trait::async_trait;
use common::{error::AppError, utils::config::AppConfig};
use serde::Serialize;
use tracing::info;

use super::http::{build_client, with_bearer};

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Branding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Captions {
    pub burn_in: bool,
    /// One caption per clip, in clip order.
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StitchOptions {
    pub branding: Branding,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captions: Option<Captions>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StitchRequest {
    pub clip_paths: Vec<String>,
    pub output_path: String,
    pub options: StitchOptions,
}

/// Concatenates stored clips into the final video at `output_path`.
#[async_trait]
pub trait ClipStitcher: Send + Sync {
    async fn stitch(&self, request: &StitchRequest) -> Result<(), AppError>;
}

pub struct HttpClipStitcher {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpClipStitcher {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Result<Self, AppError> {
        Ok(Self {
            http: build_client()?,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let endpoint = config
            .stitch_endpoint
            .clone()
            .ok_or_else(|| AppError::Config("stitch_endpoint is required".into()))?;
        Self::new(endpoint, config.render_api_key.clone())
    }
}

#[async_trait]
impl ClipStitcher for HttpClipStitcher {
    async fn stitch(&self, request: &StitchRequest) -> Result<(), AppError> {
        let response = with_bearer(self.http.post(&self.endpoint), self.api_key.as_deref())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::Stitch {
                status: status.as_u16(),
                message,
            });
        }

        info!(
            clips = request.clip_paths.len(),
            output = %request.output_path,
            "Stitched final video"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::adapters::test_server::spawn;

    fn request() -> StitchRequest {
        StitchRequest {
            clip_paths: vec![
                "renders/acme/monthly/2025-06/j1/clips/scene-1.mp4".into(),
                "renders/acme/monthly/2025-06/j1/clips/scene-2.mp4".into(),
            ],
            output_path: "renders/acme/monthly/2025-06/j1/final.mp4".into(),
            options: StitchOptions {
                branding: Branding {
                    name: Some("Acme Wealth".into()),
                    logo_path: None,
                },
                captions: None,
            },
        }
    }

    #[tokio::test]
    async fn posts_clip_paths_in_order() {
        let captured: Arc<Mutex<Vec<Value>>> = Arc::default();
        let app = Router::new()
            .route(
                "/concat",
                post(
                    |State(captured): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                        captured.lock().expect("lock").push(body);
                        StatusCode::OK
                    },
                ),
            )
            .with_state(Arc::clone(&captured));
        let base = spawn(app).await;

        let stitcher = HttpClipStitcher::new(format!("{base}/concat"), None).expect("stitcher");
        stitcher.stitch(&request()).await.expect("stitch");

        let requests = captured.lock().expect("lock");
        assert_eq!(
            requests.first(),
            Some(&json!({
                "clipPaths": [
                    "renders/acme/monthly/2025-06/j1/clips/scene-1.mp4",
                    "renders/acme/monthly/2025-06/j1/clips/scene-2.mp4"
                ],
                "outputPath": "renders/acme/monthly/2025-06/j1/final.mp4",
                "options": { "branding": { "name": "Acme Wealth" } }
            }))
        );
    }

    #[tokio::test]
    async fn failure_surfaces_status_and_message_verbatim() {
        let app = Router::new().route(
            "/concat",
            post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "codec mismatch in clip 2") }),
        );
        let base = spawn(app).await;
        let stitcher = HttpClipStitcher::new(format!("{base}/concat"), None).expect("stitcher");

        let err = stitcher.stitch(&request()).await.expect_err("422");
        match &err {
            AppError::Stitch { status, message } => {
                assert_eq!(*status, 422);
                assert_eq!(message, "codec mismatch in clip 2");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!err.is_transient());
    }
}
