#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod adapters;
pub mod kpis;
pub mod paths;
pub mod pipeline;
pub mod types;
pub mod utils;

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::render_job::RenderJob},
};
pub use pipeline::{RenderConfig, RenderPipeline, RenderTuning};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub fn new_worker_id() -> String {
    format!("render-worker-{}", Uuid::new_v4())
}

/// Polls for queued jobs, oldest first, and runs each through the pipeline.
pub async fn run_worker_loop(
    db: Arc<SurrealDbClient>,
    render_pipeline: Arc<RenderPipeline>,
) -> Result<(), AppError> {
    let worker_id = render_pipeline.worker_id().to_string();
    let idle_backoff = Duration::from_millis(500);

    loop {
        match RenderJob::next_queued(&db, 1).await {
            Ok(job_ids) if job_ids.is_empty() => {
                sleep(idle_backoff).await;
            }
            Ok(job_ids) => {
                for job_id in job_ids {
                    info!(%worker_id, %job_id, "picked up render job");
                    match render_pipeline.process_job(&job_id).await {
                        Ok(_) => {}
                        Err(AppError::Conflict(reason)) => {
                            debug!(%worker_id, %job_id, %reason, "render job taken by another worker");
                        }
                        Err(err) => {
                            error!(%worker_id, %job_id, error = %err, "render job failed");
                        }
                    }
                }
            }
            Err(err) => {
                error!(%worker_id, error = %err, "failed to poll render jobs");
                warn!("Backing off for 1s after poll error");
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
