use std::fmt;

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, store::StorageManager, types::render_job::RenderJob},
};
use tracing::error;

use super::{config::RenderConfig, services::RenderServices};
use crate::{
    paths::ArtifactPlan,
    types::{KpiSet, ParsedDocument, ScenePlan},
};

/// Pipeline phase a failure is attributed to; persisted as `failed_stage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Parse,
    Kpis,
    Scripting,
    Rendering,
    Stitch,
    Finalize,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validate => "validate",
            Stage::Parse => "parse",
            Stage::Kpis => "kpis",
            Stage::Scripting => "scripting",
            Stage::Rendering => "rendering",
            Stage::Stitch => "stitch",
            Stage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error together with the stage that produced it.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: AppError,
}

impl StageFailure {
    pub fn new(stage: Stage, error: AppError) -> Self {
        Self { stage, error }
    }
}

pub struct PipelineContext<'a> {
    /// Latest stored version of the job; replaced after every status change.
    pub job: RenderJob,
    pub worker_id: &'a str,
    pub db: &'a SurrealDbClient,
    pub storage: &'a StorageManager,
    pub config: &'a RenderConfig,
    pub services: &'a dyn RenderServices,
    pub plan: ArtifactPlan,
    pub document: Option<ParsedDocument>,
    pub kpis: Option<KpiSet>,
    pub scenes: Option<ScenePlan>,
    pub clip_paths: Vec<String>,
}

impl<'a> PipelineContext<'a> {
    pub fn new(
        job: RenderJob,
        worker_id: &'a str,
        db: &'a SurrealDbClient,
        storage: &'a StorageManager,
        config: &'a RenderConfig,
        services: &'a dyn RenderServices,
    ) -> Self {
        let plan = ArtifactPlan::for_job(&job);
        Self {
            job,
            worker_id,
            db,
            storage,
            config,
            services,
            plan,
            document: None,
            kpis: None,
            scenes: None,
            clip_paths: Vec::new(),
        }
    }

    pub fn document(&self) -> Result<&ParsedDocument, AppError> {
        self.document
            .as_ref()
            .ok_or_else(|| AppError::InternalError("parsed document expected to be available".into()))
    }

    pub fn kpis(&self) -> Result<&KpiSet, AppError> {
        self.kpis
            .as_ref()
            .ok_or_else(|| AppError::InternalError("KPI set expected to be available".into()))
    }

    pub fn scenes(&self) -> Result<&ScenePlan, AppError> {
        self.scenes
            .as_ref()
            .ok_or_else(|| AppError::InternalError("scene plan expected to be available".into()))
    }

    pub fn abort(&self, stage: Stage, err: AppError) -> StageFailure {
        error!(
            job_id = %self.job.id,
            worker_id = self.worker_id,
            stage = stage.as_str(),
            error = %err,
            "render pipeline aborted"
        );
        StageFailure::new(stage, err)
    }
}
