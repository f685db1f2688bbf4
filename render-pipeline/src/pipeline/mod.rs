mod config;
mod context;
mod retry;
mod services;
mod stages;
mod state;

pub use config::{RenderConfig, RenderTuning};
pub use context::{Stage, StageFailure};
pub use retry::with_retry;
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultRenderServices, RenderServices};

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        store::StorageManager,
        types::render_job::{RenderJob, RenderStatus},
    },
};
use tracing::{info, warn};

use self::{
    context::PipelineContext,
    stages::{finalize, kpis, parse, render, script, stitch},
    state::locked,
};

#[allow(clippy::module_name_repetitions)]
pub struct RenderPipeline {
    db: Arc<SurrealDbClient>,
    storage: StorageManager,
    config: RenderConfig,
    services: Arc<dyn RenderServices>,
    worker_id: String,
}

impl RenderPipeline {
    pub fn with_services(
        db: Arc<SurrealDbClient>,
        storage: StorageManager,
        config: RenderConfig,
        services: Arc<dyn RenderServices>,
        worker_id: impl Into<String>,
    ) -> Self {
        Self {
            db,
            storage,
            config,
            services,
            worker_id: worker_id.into(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Runs one job from `queued` to `complete`.
    ///
    /// The job is locked first; losing the lock race returns [`AppError::Conflict`] and leaves
    /// the job untouched. After the lock, any failure marks the job `failed` with the stage it
    /// happened in, and the stage error is returned.
    #[tracing::instrument(skip_all, fields(job_id = %job_id, worker_id = %self.worker_id))]
    pub async fn process_job(&self, job_id: &str) -> Result<RenderJob, AppError> {
        let job = match RenderJob::lock(&self.db, job_id, &self.worker_id).await {
            Ok(job) => job,
            Err(AppError::MalformedJob(reason)) => {
                self.record_failure_by_id(job_id, Stage::Validate, &reason)
                    .await;
                return Err(AppError::MalformedJob(reason));
            }
            Err(err) => return Err(err),
        };
        info!(job_id, "render job locked");

        if let Err(err) = job.validate() {
            self.record_failure(&job, Stage::Validate, &err).await;
            return Err(err);
        }

        match self.drive_pipeline(job).await {
            Ok(done) => {
                info!(
                    job_id = %done.id,
                    output = done.artifacts.output_video_path.as_deref().unwrap_or_default(),
                    "render job complete"
                );
                Ok(done)
            }
            Err((job, failure)) => {
                self.record_failure(&job, failure.stage, &failure.error)
                    .await;
                Err(failure.error)
            }
        }
    }

    fn duration_millis(duration: Duration) -> u64 {
        u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
    }

    /// Drives the stages in order. On failure, hands back the last stored version of the job
    /// so the failure can be recorded against its current status.
    async fn drive_pipeline(
        &self,
        job: RenderJob,
    ) -> Result<RenderJob, (RenderJob, StageFailure)> {
        let mut ctx = PipelineContext::new(
            job,
            &self.worker_id,
            self.db.as_ref(),
            &self.storage,
            &self.config,
            self.services.as_ref(),
        );
        info!(job_id = %ctx.job.id, base = ctx.plan.base(), "artifact namespace resolved");

        let machine = locked();
        let pipeline_started = Instant::now();

        macro_rules! run_stage {
            ($stage:expr, $call:expr) => {
                match $call.await {
                    Ok(next) => next,
                    Err(err) => {
                        let failure = ctx.abort($stage, err);
                        return Err((ctx.job, failure));
                    }
                }
            };
        }

        let stage_start = Instant::now();
        let machine = run_stage!(Stage::Parse, parse(machine, &mut ctx));
        let parse_ms = Self::duration_millis(stage_start.elapsed());

        let stage_start = Instant::now();
        let machine = run_stage!(Stage::Kpis, kpis(machine, &mut ctx));
        let kpis_ms = Self::duration_millis(stage_start.elapsed());

        let stage_start = Instant::now();
        let machine = run_stage!(Stage::Scripting, script(machine, &mut ctx));
        let scripting_ms = Self::duration_millis(stage_start.elapsed());

        let stage_start = Instant::now();
        let machine = run_stage!(Stage::Rendering, render(machine, &mut ctx));
        let rendering_ms = Self::duration_millis(stage_start.elapsed());

        let stage_start = Instant::now();
        let machine = run_stage!(Stage::Stitch, stitch(machine, &mut ctx));
        let stitch_ms = Self::duration_millis(stage_start.elapsed());

        let _machine = run_stage!(Stage::Finalize, finalize(machine, &mut ctx));

        info!(
            job_id = %ctx.job.id,
            total_ms = Self::duration_millis(pipeline_started.elapsed()),
            parse_ms,
            kpis_ms,
            scripting_ms,
            rendering_ms,
            stitch_ms,
            "render pipeline finished"
        );

        Ok(ctx.job)
    }

    async fn record_failure(&self, job: &RenderJob, stage: Stage, err: &AppError) {
        if let Err(update_err) = job.mark_failed(stage.as_str(), &err.to_string(), &self.db).await
        {
            warn!(
                job_id = %job.id,
                stage = stage.as_str(),
                error = %update_err,
                "could not record render job failure"
            );
        }
    }

    /// Used when the locked record could not be decoded; it is known to be in `parsing`.
    async fn record_failure_by_id(&self, job_id: &str, stage: Stage, reason: &str) {
        if let Err(update_err) = RenderJob::fail_by_id(
            &self.db,
            job_id,
            RenderStatus::Parsing,
            &self.worker_id,
            stage.as_str(),
            reason,
        )
        .await
        {
            warn!(
                job_id,
                stage = stage.as_str(),
                error = %update_err,
                "could not record render job failure"
            );
        }
    }
}
