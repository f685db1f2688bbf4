use common::error::AppError;
use futures::{stream, StreamExt, TryStreamExt};
use state_machines::core::GuardError;
use tracing::{debug, info, instrument};

use super::{
    context::PipelineContext,
    retry::with_retry,
    state::{Completed, KpisComputed, Locked, Parsed, RenderMachine, Rendered, Scripted, Stitched},
};
use crate::{
    adapters::{clip_rendering::CLIP_DURATION_SECS, PlanningRequest, StitchRequest},
    kpis::compute_kpis,
};

#[instrument(level = "trace", skip_all, fields(job_id = %ctx.job.id, worker_id = ctx.worker_id))]
pub async fn parse(
    machine: RenderMachine<(), Locked>,
    ctx: &mut PipelineContext<'_>,
) -> Result<RenderMachine<(), Parsed>, AppError> {
    let services = ctx.services;
    let bucket = ctx.job.source_bucket.as_str();
    let path = ctx.job.source_path.as_str();
    let document = with_retry(&ctx.config.tuning, "document extraction", || {
        services.extract_document(bucket, path)
    })
    .await?;

    let location = ctx.plan.parse_result();
    ctx.storage.put_json(&location, &document).await?;
    let artifacts = ctx.job.artifacts.clone().with_parse_result(location)?;
    ctx.job = ctx.job.advance(artifacts, ctx.db).await?;

    info!(
        job_id = %ctx.job.id,
        text_chars = document.text.chars().count(),
        entities = document.entities.len(),
        "statement parsed"
    );
    ctx.document = Some(document);

    machine
        .parse()
        .map_err(|(_, guard)| map_guard_error("parse", &guard))
}

#[instrument(level = "trace", skip_all, fields(job_id = %ctx.job.id, worker_id = ctx.worker_id))]
pub async fn kpis(
    machine: RenderMachine<(), Parsed>,
    ctx: &mut PipelineContext<'_>,
) -> Result<RenderMachine<(), KpisComputed>, AppError> {
    let kpis = compute_kpis(ctx.document()?, ctx.job.statement_type, &ctx.job.period)?;

    let location = ctx.plan.kpis();
    ctx.storage.put_json(&location, &kpis).await?;
    let artifacts = ctx.job.artifacts.clone().with_kpis(location)?;
    ctx.job = ctx.job.advance(artifacts, ctx.db).await?;

    debug!(job_id = %ctx.job.id, notes = %kpis.notes, "KPIs computed");
    ctx.kpis = Some(kpis);

    machine
        .compute_kpis()
        .map_err(|(_, guard)| map_guard_error("compute_kpis", &guard))
}

#[instrument(level = "trace", skip_all, fields(job_id = %ctx.job.id, worker_id = ctx.worker_id))]
pub async fn script(
    machine: RenderMachine<(), KpisComputed>,
    ctx: &mut PipelineContext<'_>,
) -> Result<RenderMachine<(), Scripted>, AppError> {
    let services = ctx.services;
    let kpis = ctx.kpis()?;
    let request = PlanningRequest {
        client_name: &ctx.job.client_name,
        statement_type: ctx.job.statement_type,
        period: &ctx.job.period,
    };
    let plan = with_retry(&ctx.config.tuning, "scene planning", || {
        services.plan_scenes(kpis, request)
    })
    .await?;

    let location = ctx.plan.scenes();
    ctx.storage.put_json(&location, &plan).await?;
    let artifacts = ctx.job.artifacts.clone().with_scenes(location)?;
    ctx.job = ctx.job.advance(artifacts, ctx.db).await?;

    info!(job_id = %ctx.job.id, scenes = plan.scenes.len(), "scene plan accepted");
    ctx.scenes = Some(plan);

    machine
        .script()
        .map_err(|(_, guard)| map_guard_error("script", &guard))
}

/// Renders every scene with bounded concurrency and stores each clip under its scene number.
#[instrument(level = "trace", skip_all, fields(job_id = %ctx.job.id, worker_id = ctx.worker_id))]
pub async fn render(
    machine: RenderMachine<(), Scripted>,
    ctx: &mut PipelineContext<'_>,
) -> Result<RenderMachine<(), Rendered>, AppError> {
    let services = ctx.services;
    let storage = ctx.storage;
    let tuning = &ctx.config.tuning;
    let plan = &ctx.plan;
    let scenes = &ctx.scenes()?.scenes;
    let max_duration = f64::from(CLIP_DURATION_SECS);

    let mut rendered: Vec<(usize, String)> = stream::iter(scenes.iter().enumerate())
        .map(|(index, scene)| async move {
            let clip = with_retry(tuning, "clip rendering", || services.render_clip(scene)).await?;
            if clip.duration_secs > max_duration {
                return Err(AppError::Processing(format!(
                    "clip for scene {} runs {} seconds; limit is {CLIP_DURATION_SECS}",
                    index.saturating_add(1),
                    clip.duration_secs
                )));
            }
            let location = plan.clip(index);
            storage
                .put_new(&location, clip.bytes, &clip.content_type)
                .await?;
            debug!(scene = index, %location, "clip stored");
            Ok((index, location))
        })
        .buffer_unordered(tuning.render_concurrency.max(1))
        .try_collect()
        .await?;

    rendered.sort_by_key(|(index, _)| *index);
    let clip_paths: Vec<String> = rendered.into_iter().map(|(_, path)| path).collect();
    info!(job_id = %ctx.job.id, clips = clip_paths.len(), "scenes rendered");
    ctx.clip_paths = clip_paths;

    machine
        .render()
        .map_err(|(_, guard)| map_guard_error("render", &guard))
}

#[instrument(level = "trace", skip_all, fields(job_id = %ctx.job.id, worker_id = ctx.worker_id))]
pub async fn stitch(
    machine: RenderMachine<(), Rendered>,
    ctx: &mut PipelineContext<'_>,
) -> Result<RenderMachine<(), Stitched>, AppError> {
    let services = ctx.services;
    let captions = ctx
        .scenes()?
        .scenes
        .iter()
        .map(|scene| scene.voiceover.clone())
        .collect();
    let request = StitchRequest {
        clip_paths: ctx.clip_paths.clone(),
        output_path: ctx.plan.final_video(),
        options: ctx.config.stitch_options(captions),
    };

    with_retry(&ctx.config.tuning, "clip stitching", || {
        services.stitch_clips(&request)
    })
    .await?;

    machine
        .stitch()
        .map_err(|(_, guard)| map_guard_error("stitch", &guard))
}

#[instrument(level = "trace", skip_all, fields(job_id = %ctx.job.id, worker_id = ctx.worker_id))]
pub async fn finalize(
    machine: RenderMachine<(), Stitched>,
    ctx: &mut PipelineContext<'_>,
) -> Result<RenderMachine<(), Completed>, AppError> {
    let artifacts = ctx
        .job
        .artifacts
        .clone()
        .with_output(ctx.clip_paths.clone(), ctx.plan.final_video())?;
    ctx.job = ctx.job.mark_complete(artifacts, ctx.db).await?;

    machine
        .finalize()
        .map_err(|(_, guard)| map_guard_error("finalize", &guard))
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid render pipeline transition during {event}: {guard:?}"
    ))
}
