use std::sync::Arc;

use anyhow::Context;
use common::{
    storage::{db::SurrealDbClient, store::StorageManager},
    utils::config::get_config,
};
use render_pipeline::{
    new_worker_id,
    pipeline::{DefaultRenderServices, RenderConfig, RenderPipeline},
    run_worker_loop,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config().context("loading configuration")?;
    config.validate().context("validating configuration")?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await
        .context("connecting to SurrealDB")?,
    );
    db.ensure_initialized()
        .await
        .context("initializing render job indexes")?;

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    let storage = StorageManager::new(&config)
        .await
        .context("opening artifact storage")?;

    let services = DefaultRenderServices::from_config(&config, openai_client, storage.clone())
        .context("building service adapters")?;

    let worker_id = new_worker_id();
    info!(%worker_id, extraction = ?config.extraction_mode, "render worker starting");

    let render_pipeline = Arc::new(RenderPipeline::with_services(
        Arc::clone(&db),
        storage,
        RenderConfig::from_app_config(&config),
        Arc::new(services),
        worker_id,
    ));

    run_worker_loop(db, render_pipeline)
        .await
        .context("render worker stopped")
}
