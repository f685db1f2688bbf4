use async_trait::async_trait;
use bytes::Bytes;
use common::{error::AppError, utils::config::AppConfig};
use reqwest::{header::CONTENT_TYPE, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::http::{build_client, check_status, with_bearer};
use crate::types::{Clip, Scene};

pub const CLIP_DURATION_SECS: u32 = 8;
const DURATION_HEADER: &str = "x-duration-seconds";
const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// Renders one scene into a complete clip held in memory.
#[async_trait]
pub trait ClipRenderer: Send + Sync {
    async fn render(&self, scene: &Scene) -> Result<Clip, AppError>;
}

/// Which service produces the footage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderTarget {
    /// Text-to-video generation from the scene's visual prompt.
    Generated {
        endpoint: String,
        api_key: Option<String>,
    },
    /// A plain text slate, used when no generation service is configured.
    Slate {
        endpoint: String,
        api_key: Option<String>,
    },
}

impl RenderTarget {
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        if let Some(endpoint) = &config.video_generation_endpoint {
            return Ok(Self::Generated {
                endpoint: endpoint.clone(),
                api_key: config.video_generation_api_key.clone(),
            });
        }
        config
            .slate_endpoint
            .as_ref()
            .map(|endpoint| Self::Slate {
                endpoint: endpoint.clone(),
                api_key: config.render_api_key.clone(),
            })
            .ok_or_else(|| {
                AppError::Config(
                    "either video_generation_endpoint or slate_endpoint must be set".into(),
                )
            })
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Generated { .. } => "video generation",
            Self::Slate { .. } => "slate rendering",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    duration_seconds: u32,
    resolution: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClipReference {
    uri: String,
    duration_seconds: Option<f64>,
}

pub struct HttpClipRenderer {
    http: reqwest::Client,
    target: RenderTarget,
    resolution: String,
}

impl HttpClipRenderer {
    pub fn new(target: RenderTarget, resolution: impl Into<String>) -> Result<Self, AppError> {
        Ok(Self {
            http: build_client()?,
            target,
            resolution: resolution.into(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        Self::new(
            RenderTarget::from_config(config)?,
            config.render_resolution.clone(),
        )
    }

    fn request_for<'a>(&'a self, scene: &'a Scene) -> (&'a str, Option<&'a str>, RenderRequest<'a>) {
        match &self.target {
            RenderTarget::Generated { endpoint, api_key } => (
                endpoint,
                api_key.as_deref(),
                RenderRequest {
                    prompt: Some(&scene.visual_prompt),
                    text: None,
                    duration_seconds: CLIP_DURATION_SECS,
                    resolution: &self.resolution,
                },
            ),
            RenderTarget::Slate { endpoint, api_key } => (
                endpoint,
                api_key.as_deref(),
                RenderRequest {
                    prompt: None,
                    text: Some(scene.slate_text()),
                    duration_seconds: CLIP_DURATION_SECS,
                    resolution: &self.resolution,
                },
            ),
        }
    }

    async fn fetch_reference(&self, reference: ClipReference) -> Result<Clip, AppError> {
        let duration = checked_duration(reference.duration_seconds)?;
        debug!(uri = %reference.uri, "Fetching rendered clip");
        let response = check_status(
            self.http.get(&reference.uri).send().await?,
            "clip download",
        )
        .await?;
        let content_type = content_type_of(&response);
        let bytes = read_complete(response).await?;
        Ok(Clip {
            bytes,
            duration_secs: duration,
            content_type,
        })
    }
}

fn checked_duration(reported: Option<f64>) -> Result<f64, AppError> {
    let limit = f64::from(CLIP_DURATION_SECS);
    match reported {
        Some(secs) if !secs.is_finite() || secs <= 0.0 || secs > limit => Err(
            AppError::Processing(format!(
                "rendered clip reports {secs} seconds; expected at most {CLIP_DURATION_SECS}"
            )),
        ),
        Some(secs) => Ok(secs),
        None => Ok(limit),
    }
}

fn content_type_of(response: &Response) -> String {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string()
}

/// Reads the whole body, refusing empty or short payloads.
async fn read_complete(response: Response) -> Result<Bytes, AppError> {
    let declared = response.content_length();
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(AppError::Processing("rendered clip is empty".into()));
    }
    if let Some(expected) = declared {
        let received = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        if received < expected {
            return Err(AppError::Processing(format!(
                "rendered clip truncated: received {received} of {expected} bytes"
            )));
        }
    }
    Ok(bytes)
}

#[async_trait]
impl ClipRenderer for HttpClipRenderer {
    async fn render(&self, scene: &Scene) -> Result<Clip, AppError> {
        let (endpoint, api_key, body) = self.request_for(scene);
        let service = self.target.name();
        let request = with_bearer(self.http.post(endpoint), api_key);
        let response = check_status(request.json(&body).send().await?, service).await?;

        let content_type = content_type_of(&response);
        let clip = if content_type.starts_with("application/json") {
            let reference: ClipReference = response.json().await?;
            self.fetch_reference(reference).await?
        } else {
            let reported = response
                .headers()
                .get(DURATION_HEADER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<f64>().ok());
            let duration = checked_duration(reported)?;
            Clip {
                bytes: read_complete(response).await?,
                duration_secs: duration,
                content_type,
            }
        };

        info!(
            scene = %scene.title,
            service,
            size = clip.bytes.len(),
            duration_secs = clip.duration_secs,
            "Rendered clip"
        );
        Ok(clip)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::State,
        http::{header, StatusCode},
        response::IntoResponse,
        routing::{get, post},
        Json, Router,
    };
    use serde_json::{json, Value};

    use super::*;
    use crate::adapters::test_server::spawn;

    const FAKE_MP4: &[u8] = b"\x00\x00\x00\x18ftypmp42fake-clip-bytes";

    fn scene() -> Scene {
        Scene {
            title: "Performance".into(),
            on_screen_text: vec!["Up 2.4% this month".into()],
            voiceover: "Your portfolio rose this month.".into(),
            visual_prompt: "rising line over a calm ocean".into(),
            kpi_callouts: Vec::new(),
        }
    }

    async fn binary_clip() -> impl IntoResponse {
        ([(header::CONTENT_TYPE, "video/mp4")], FAKE_MP4)
    }

    #[tokio::test]
    async fn generated_clip_uses_prompt_and_fixed_duration() {
        let captured: Arc<Mutex<Vec<Value>>> = Arc::default();
        let app = Router::new()
            .route(
                "/generate",
                post(
                    |State(captured): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                        captured.lock().expect("lock").push(body);
                        binary_clip().await
                    },
                ),
            )
            .with_state(Arc::clone(&captured));
        let base = spawn(app).await;

        let renderer = HttpClipRenderer::new(
            RenderTarget::Generated {
                endpoint: format!("{base}/generate"),
                api_key: Some("secret".into()),
            },
            "1280x720",
        )
        .expect("renderer");
        let clip = renderer.render(&scene()).await.expect("clip");

        assert_eq!(clip.bytes.as_ref(), FAKE_MP4);
        assert!(clip.duration_secs <= f64::from(CLIP_DURATION_SECS));
        assert_eq!(clip.content_type, "video/mp4");
        let requests = captured.lock().expect("lock");
        assert_eq!(
            requests.first(),
            Some(&json!({
                "prompt": "rising line over a calm ocean",
                "durationSeconds": 8,
                "resolution": "1280x720"
            }))
        );
    }

    #[tokio::test]
    async fn slate_fallback_sends_scene_text() {
        let captured: Arc<Mutex<Vec<Value>>> = Arc::default();
        let app = Router::new()
            .route(
                "/slate",
                post(
                    |State(captured): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                        captured.lock().expect("lock").push(body);
                        binary_clip().await
                    },
                ),
            )
            .with_state(Arc::clone(&captured));
        let base = spawn(app).await;

        let config = AppConfig {
            slate_endpoint: Some(format!("{base}/slate")),
            render_resolution: "640x360".into(),
            ..Default::default()
        };
        let renderer = HttpClipRenderer::from_config(&config).expect("renderer");
        renderer.render(&scene()).await.expect("clip");

        let requests = captured.lock().expect("lock");
        let body = requests.first().expect("request");
        assert_eq!(body["text"], "Performance\nUp 2.4% this month");
        assert!(body.get("prompt").is_none());
        assert_eq!(body["resolution"], "640x360");
    }

    #[tokio::test]
    async fn json_reference_is_downloaded() {
        let files = spawn(Router::new().route("/files/clip.mp4", get(binary_clip))).await;
        let uri = format!("{files}/files/clip.mp4");
        let app = Router::new().route(
            "/generate",
            post(move || async move { Json(json!({ "uri": uri, "durationSeconds": 7.5 })) }),
        );
        let base = spawn(app).await;

        let renderer = HttpClipRenderer::new(
            RenderTarget::Generated {
                endpoint: format!("{base}/generate"),
                api_key: None,
            },
            "1280x720",
        )
        .expect("renderer");
        let clip = renderer.render(&scene()).await.expect("clip");
        assert_eq!(clip.bytes.as_ref(), FAKE_MP4);
        assert_eq!(clip.duration_secs, 7.5);
    }

    #[tokio::test]
    async fn overlong_clip_is_rejected() {
        let app = Router::new().route(
            "/generate",
            post(|| async { Json(json!({ "uri": "http://127.0.0.1:9/never", "durationSeconds": 12 })) }),
        );
        let base = spawn(app).await;
        let renderer = HttpClipRenderer::new(
            RenderTarget::Generated {
                endpoint: format!("{base}/generate"),
                api_key: None,
            },
            "1280x720",
        )
        .expect("renderer");
        let err = renderer.render(&scene()).await.expect_err("too long");
        assert!(matches!(err, AppError::Processing(_)));
    }

    #[tokio::test]
    async fn empty_body_is_rejected() {
        let app = Router::new().route(
            "/generate",
            post(|| async { ([(header::CONTENT_TYPE, "video/mp4")], Vec::<u8>::new()) }),
        );
        let base = spawn(app).await;
        let renderer = HttpClipRenderer::new(
            RenderTarget::Generated {
                endpoint: format!("{base}/generate"),
                api_key: None,
            },
            "1280x720",
        )
        .expect("renderer");
        let err = renderer.render(&scene()).await.expect_err("empty");
        assert!(err.to_string().contains("empty"));
    }

    #[tokio::test]
    async fn throttling_is_transient() {
        let app = Router::new().route(
            "/generate",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let base = spawn(app).await;
        let renderer = HttpClipRenderer::new(
            RenderTarget::Generated {
                endpoint: format!("{base}/generate"),
                api_key: None,
            },
            "1280x720",
        )
        .expect("renderer");
        let err = renderer.render(&scene()).await.expect_err("429");
        assert!(err.is_transient());
    }

    #[test]
    fn duration_limits() {
        assert_eq!(checked_duration(None).expect("default"), 8.0);
        assert!(checked_duration(Some(8.0)).is_ok());
        assert!(checked_duration(Some(8.01)).is_err());
        assert!(checked_duration(Some(0.0)).is_err());
    }
}
