use std::sync::Arc;

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use common::{
    error::AppError,
    storage::store::StorageManager,
    utils::config::{AppConfig, ExtractionMode},
};

use crate::{
    adapters::{
        ClipRenderer, ClipStitcher, DocumentAiExtractor, DocumentExtractor, HttpClipRenderer,
        HttpClipStitcher, OpenAiSceneModel, PdfTextExtractor, PlanningRequest, ScenePlanner,
        StitchRequest,
    },
    types::{Clip, KpiSet, ParsedDocument, Scene, ScenePlan},
};

/// The external calls a render job makes, one per stage.
#[async_trait]
pub trait RenderServices: Send + Sync {
    async fn extract_document(
        &self,
        bucket: &str,
        object_path: &str,
    ) -> Result<ParsedDocument, AppError>;

    async fn plan_scenes(
        &self,
        kpis: &KpiSet,
        request: PlanningRequest<'_>,
    ) -> Result<ScenePlan, AppError>;

    async fn render_clip(&self, scene: &Scene) -> Result<Clip, AppError>;

    async fn stitch_clips(&self, request: &StitchRequest) -> Result<(), AppError>;
}

/// Routes each call to the injected adapter.
pub struct DefaultRenderServices {
    extractor: Arc<dyn DocumentExtractor>,
    planner: ScenePlanner,
    renderer: Arc<dyn ClipRenderer>,
    stitcher: Arc<dyn ClipStitcher>,
}

impl DefaultRenderServices {
    pub fn new(
        extractor: Arc<dyn DocumentExtractor>,
        planner: ScenePlanner,
        renderer: Arc<dyn ClipRenderer>,
        stitcher: Arc<dyn ClipStitcher>,
    ) -> Self {
        Self {
            extractor,
            planner,
            renderer,
            stitcher,
        }
    }

    /// Builds the HTTP and model adapters described by `config`.
    pub fn from_config(
        config: &AppConfig,
        openai_client: Arc<Client<OpenAIConfig>>,
        storage: StorageManager,
    ) -> Result<Self, AppError> {
        let extractor: Arc<dyn DocumentExtractor> = match config.extraction_mode {
            ExtractionMode::DocumentAi => Arc::new(DocumentAiExtractor::from_config(config)?),
            ExtractionMode::LocalPdf => Arc::new(PdfTextExtractor::new(storage)),
        };
        let planner = ScenePlanner::new(Arc::new(OpenAiSceneModel::new(
            openai_client,
            config.scene_model.clone(),
        )));

        Ok(Self::new(
            extractor,
            planner,
            Arc::new(HttpClipRenderer::from_config(config)?),
            Arc::new(HttpClipStitcher::from_config(config)?),
        ))
    }
}

#[async_trait]
impl RenderServices for DefaultRenderServices {
    async fn extract_document(
        &self,
        bucket: &str,
        object_path: &str,
    ) -> Result<ParsedDocument, AppError> {
        self.extractor.extract(bucket, object_path).await
    }

    async fn plan_scenes(
        &self,
        kpis: &KpiSet,
        request: PlanningRequest<'_>,
    ) -> Result<ScenePlan, AppError> {
        self.planner.plan(kpis, request).await
    }

    async fn render_clip(&self, scene: &Scene) -> Result<Clip, AppError> {
        self.renderer.render(scene).await
    }

    async fn stitch_clips(&self, request: &StitchRequest) -> Result<(), AppError> {
        self.stitcher.stitch(request).await
    }
}
