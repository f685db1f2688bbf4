use state_machines::state_machine;
use surrealdb::sql::Datetime as SurrealDatetime;
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatementType {
    Monthly,
    Quarterly,
    Annual,
}

impl StatementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementType::Monthly => "monthly",
            StatementType::Quarterly => "quarterly",
            StatementType::Annual => "annual",
        }
    }

    /// Checks that `period` has the shape this statement type expects:
    /// `YYYY-MM` for monthly, `YYYY-Q#` for quarterly and `YYYY` for annual.
    pub fn accepts_period(&self, period: &str) -> bool {
        let Some((year, rest)) = split_year(period) else {
            return false;
        };
        if year.is_empty() {
            return false;
        }
        match self {
            StatementType::Monthly => rest
                .strip_prefix('-')
                .filter(|month| month.len() == 2)
                .and_then(|month| month.parse::<u8>().ok())
                .is_some_and(|month| (1..=12).contains(&month)),
            StatementType::Quarterly => matches!(rest, "-Q1" | "-Q2" | "-Q3" | "-Q4"),
            StatementType::Annual => rest.is_empty(),
        }
    }
}

fn split_year(period: &str) -> Option<(&str, &str)> {
    let year = period.get(..4)?;
    if !year.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((year, period.get(4..)?))
}

#[derive(Debug, Default, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RenderStatus {
    #[default]
    Queued,
    Parsing,
    Kpis,
    Scripting,
    Rendering,
    Complete,
    Failed,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::Queued => "queued",
            RenderStatus::Parsing => "parsing",
            RenderStatus::Kpis => "kpis",
            RenderStatus::Scripting => "scripting",
            RenderStatus::Rendering => "rendering",
            RenderStatus::Complete => "complete",
            RenderStatus::Failed => "failed",
        }
    }
}

/// Artifact locations written by the pipeline. Each slot is filled exactly once.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct JobArtifacts {
    #[serde(default)]
    pub parse_result_path: Option<String>,
    #[serde(default)]
    pub kpis_path: Option<String>,
    #[serde(default)]
    pub scenes_path: Option<String>,
    #[serde(default)]
    pub clip_paths: Vec<String>,
    #[serde(default)]
    pub output_video_path: Option<String>,
}

impl JobArtifacts {
    pub fn with_parse_result(self, path: String) -> Result<Self, AppError> {
        let parse_result_path = Some(fill_once(self.parse_result_path, path, "parse result")?);
        Ok(Self {
            parse_result_path,
            ..self
        })
    }

    pub fn with_kpis(self, path: String) -> Result<Self, AppError> {
        let kpis_path = Some(fill_once(self.kpis_path, path, "kpis")?);
        Ok(Self { kpis_path, ..self })
    }

    pub fn with_scenes(self, path: String) -> Result<Self, AppError> {
        let scenes_path = Some(fill_once(self.scenes_path, path, "scenes")?);
        Ok(Self {
            scenes_path,
            ..self
        })
    }

    pub fn with_output(self, clip_paths: Vec<String>, path: String) -> Result<Self, AppError> {
        if !self.clip_paths.is_empty() {
            return Err(AppError::ArtifactExists(format!(
                "clip paths already recorded ({} clips)",
                self.clip_paths.len()
            )));
        }
        let output_video_path = Some(fill_once(self.output_video_path, path, "final video")?);
        Ok(Self {
            clip_paths,
            output_video_path,
            ..self
        })
    }
}

fn fill_once(slot: Option<String>, path: String, label: &str) -> Result<String, AppError> {
    match slot {
        Some(existing) => Err(AppError::ArtifactExists(format!(
            "{label} already recorded at {existing}"
        ))),
        None => Ok(path),
    }
}

#[derive(Debug, Clone, Copy)]
enum JobTransition {
    Lock,
    Advance,
    Complete,
    Fail,
}

impl JobTransition {
    fn as_str(&self) -> &'static str {
        match self {
            JobTransition::Lock => "lock",
            JobTransition::Advance => "advance",
            JobTransition::Complete => "complete",
            JobTransition::Fail => "fail",
        }
    }
}

mod lifecycle {
    use super::state_machine;

    state_machine! {
        name: RenderLifecycleMachine,
        state: RenderLifecycleState,
        initial: Queued,
        states: [Queued, Parsing, Kpis, Scripting, Rendering, Complete, Failed],
        events {
            lock {
                transition: { from: Queued, to: Parsing }
            }
            parsed {
                transition: { from: Parsing, to: Kpis }
            }
            kpis_computed {
                transition: { from: Kpis, to: Scripting }
            }
            scripted {
                transition: { from: Scripting, to: Rendering }
            }
            complete {
                transition: { from: Rendering, to: Complete }
            }
            fail {
                transition: { from: Parsing, to: Failed }
                transition: { from: Kpis, to: Failed }
                transition: { from: Scripting, to: Failed }
                transition: { from: Rendering, to: Failed }
            }
        }
    }

    pub(super) fn queued() -> RenderLifecycleMachine<(), Queued> {
        RenderLifecycleMachine::new(())
    }

    pub(super) fn parsing() -> Option<RenderLifecycleMachine<(), Parsing>> {
        queued().lock().ok()
    }

    pub(super) fn kpis() -> Option<RenderLifecycleMachine<(), Kpis>> {
        parsing()?.parsed().ok()
    }

    pub(super) fn scripting() -> Option<RenderLifecycleMachine<(), Scripting>> {
        kpis()?.kpis_computed().ok()
    }

    pub(super) fn rendering() -> Option<RenderLifecycleMachine<(), Rendering>> {
        scripting()?.scripted().ok()
    }
}

fn invalid_transition(status: &RenderStatus, event: JobTransition) -> AppError {
    AppError::Validation(format!(
        "Invalid render job transition: {} -> {}",
        status.as_str(),
        event.as_str()
    ))
}

fn compute_next_status(
    status: &RenderStatus,
    event: JobTransition,
) -> Result<RenderStatus, AppError> {
    use lifecycle::{kpis, parsing, queued, rendering, scripting};
    let next = match (status, event) {
        (RenderStatus::Queued, JobTransition::Lock) => {
            queued().lock().ok().map(|_| RenderStatus::Parsing)
        }
        (RenderStatus::Parsing, JobTransition::Advance) => parsing()
            .and_then(|m| m.parsed().ok())
            .map(|_| RenderStatus::Kpis),
        (RenderStatus::Kpis, JobTransition::Advance) => kpis()
            .and_then(|m| m.kpis_computed().ok())
            .map(|_| RenderStatus::Scripting),
        (RenderStatus::Scripting, JobTransition::Advance) => scripting()
            .and_then(|m| m.scripted().ok())
            .map(|_| RenderStatus::Rendering),
        (RenderStatus::Rendering, JobTransition::Complete) => rendering()
            .and_then(|m| m.complete().ok())
            .map(|_| RenderStatus::Complete),
        (RenderStatus::Parsing, JobTransition::Fail) => parsing()
            .and_then(|m| m.fail().ok())
            .map(|_| RenderStatus::Failed),
        (RenderStatus::Kpis, JobTransition::Fail) => kpis()
            .and_then(|m| m.fail().ok())
            .map(|_| RenderStatus::Failed),
        (RenderStatus::Scripting, JobTransition::Fail) => scripting()
            .and_then(|m| m.fail().ok())
            .map(|_| RenderStatus::Failed),
        (RenderStatus::Rendering, JobTransition::Fail) => rendering()
            .and_then(|m| m.fail().ok())
            .map(|_| RenderStatus::Failed),
        _ => None,
    };
    next.ok_or_else(|| invalid_transition(status, event))
}

stored_object!(RenderJob, "render_job", {
    source_bucket: String,
    source_path: String,
    client_name: String,
    statement_type: StatementType,
    period: String,
    status: RenderStatus,
    worker_id: Option<String>,
    #[serde(
        serialize_with = "serialize_option_datetime",
        deserialize_with = "deserialize_option_datetime",
        default
    )]
    locked_at: Option<chrono::DateTime<chrono::Utc>>,
    error: Option<String>,
    failed_stage: Option<String>,
    #[serde(default)]
    artifacts: JobArtifacts
});

impl RenderJob {
    pub fn new(
        source_bucket: String,
        source_path: String,
        client_name: String,
        statement_type: StatementType,
        period: String,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            source_bucket,
            source_path,
            client_name,
            statement_type,
            period,
            status: RenderStatus::Queued,
            worker_id: None,
            locked_at: None,
            error: None,
            failed_stage: None,
            artifacts: JobArtifacts::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Intake entry point: stores a new queued job.
    pub async fn create_and_add_to_db(
        source_bucket: String,
        source_path: String,
        client_name: String,
        statement_type: StatementType,
        period: String,
        db: &SurrealDbClient,
    ) -> Result<RenderJob, AppError> {
        let job = Self::new(
            source_bucket,
            source_path,
            client_name,
            statement_type,
            period,
        );
        db.store_item(job.clone()).await?;
        Ok(job)
    }

    /// Rejects records whose fields would make the pipeline produce nonsense.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.source_bucket.trim().is_empty() || self.source_path.trim().is_empty() {
            return Err(AppError::MalformedJob(format!(
                "job {} has no source document",
                self.id
            )));
        }
        if self.client_name.trim().is_empty() {
            return Err(AppError::MalformedJob(format!(
                "job {} has an empty client name",
                self.id
            )));
        }
        if !self.statement_type.accepts_period(&self.period) {
            return Err(AppError::MalformedJob(format!(
                "job {} has period '{}' which does not match statement type {}",
                self.id,
                self.period,
                self.statement_type.as_str()
            )));
        }
        Ok(())
    }

    /// Ids of queued jobs, oldest first.
    ///
    /// Only ids are read so one undecodable record cannot block the queue; decoding happens
    /// when the job is locked.
    pub async fn next_queued(db: &SurrealDbClient, limit: usize) -> Result<Vec<String>, AppError> {
        #[derive(serde::Deserialize)]
        struct QueuedRow {
            id: String,
        }

        let rows: Vec<QueuedRow> = db
            .query(
                "SELECT meta::id(id) AS id, created_at FROM type::table($table)
                 WHERE status = $queued
                 ORDER BY created_at ASC
                 LIMIT $limit",
            )
            .bind(("table", Self::table_name()))
            .bind(("queued", RenderStatus::Queued.as_str()))
            .bind(("limit", limit))
            .await?
            .take(0)?;

        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    /// Takes ownership of a queued job for `worker_id`.
    ///
    /// The update only applies while the stored status is still `queued`, so two workers racing
    /// for the same job cannot both win. The loser gets [`AppError::Conflict`].
    pub async fn lock(
        db: &SurrealDbClient,
        id: &str,
        worker_id: &str,
    ) -> Result<RenderJob, AppError> {
        debug_assert!(compute_next_status(&RenderStatus::Queued, JobTransition::Lock).is_ok());

        const LOCK_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $parsing,
                worker_id = $worker_id,
                locked_at = $now,
                updated_at = $now
            WHERE status = $queued
            RETURN *;
        "#;

        let now = Utc::now();
        let mut result = db
            .client
            .query(LOCK_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_string()))
            .bind(("parsing", RenderStatus::Parsing.as_str()))
            .bind(("queued", RenderStatus::Queued.as_str()))
            .bind(("worker_id", worker_id.to_string()))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let locked: Option<RenderJob> = result.take(0).map_err(|err| {
            AppError::MalformedJob(format!("job {id} could not be decoded: {err}"))
        })?;

        match locked {
            Some(job) => Ok(job),
            None => Err(Self::lock_refusal(db, id).await),
        }
    }

    async fn lock_refusal(db: &SurrealDbClient, id: &str) -> AppError {
        match Self::current_status(db, id).await {
            Ok(Some(status)) => {
                AppError::Conflict(format!("job {id} is already {status}; not locking"))
            }
            Ok(None) => AppError::NotFound(format!("render job {id}")),
            Err(err) => err,
        }
    }

    async fn current_status(db: &SurrealDbClient, id: &str) -> Result<Option<String>, AppError> {
        let status: Option<String> = db
            .client
            .query("SELECT VALUE status FROM type::thing($table, $id)")
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_string()))
            .await?
            .take(0)?;
        Ok(status)
    }

    /// Moves the job one stage forward, replacing the whole artifact record.
    pub async fn advance(
        &self,
        artifacts: JobArtifacts,
        db: &SurrealDbClient,
    ) -> Result<RenderJob, AppError> {
        let next = compute_next_status(&self.status, JobTransition::Advance)?;
        self.conditional_update(next, JobTransition::Advance, artifacts, db)
            .await
    }

    pub async fn mark_complete(
        &self,
        artifacts: JobArtifacts,
        db: &SurrealDbClient,
    ) -> Result<RenderJob, AppError> {
        let next = compute_next_status(&self.status, JobTransition::Complete)?;
        debug_assert_eq!(next, RenderStatus::Complete);
        self.conditional_update(next, JobTransition::Complete, artifacts, db)
            .await
    }

    async fn conditional_update(
        &self,
        next: RenderStatus,
        event: JobTransition,
        artifacts: JobArtifacts,
        db: &SurrealDbClient,
    ) -> Result<RenderJob, AppError> {
        const ADVANCE_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $next,
                artifacts = $artifacts,
                updated_at = $now
            WHERE status = $expected AND worker_id = $worker_id
            RETURN *;
        "#;

        let now = Utc::now();
        let mut result = db
            .client
            .query(ADVANCE_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("next", next.as_str()))
            .bind(("expected", self.status.as_str()))
            .bind(("artifacts", artifacts))
            .bind(("now", SurrealDatetime::from(now)))
            .bind(("worker_id", self.worker_id.clone().unwrap_or_default()))
            .await?;

        let updated: Option<RenderJob> = result.take(0)?;
        updated.ok_or_else(|| invalid_transition(&self.status, event))
    }

    pub async fn mark_failed(
        &self,
        stage: &str,
        message: &str,
        db: &SurrealDbClient,
    ) -> Result<RenderJob, AppError> {
        Self::fail_by_id(
            db,
            &self.id,
            self.status,
            self.worker_id.as_deref().unwrap_or_default(),
            stage,
            message,
        )
        .await?;
        db.get_item::<RenderJob>(&self.id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("render job {}", self.id)))
    }

    /// Fails a job whose record may not be decodable any more.
    ///
    /// Applies only while the stored status equals `expected` and the job is held by
    /// `worker_id`. Only the id of the updated row is read back, so the rest of the record
    /// never has to decode.
    pub async fn fail_by_id(
        db: &SurrealDbClient,
        id: &str,
        expected: RenderStatus,
        worker_id: &str,
        stage: &str,
        message: &str,
    ) -> Result<(), AppError> {
        compute_next_status(&expected, JobTransition::Fail)?;

        const FAIL_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $failed,
                error = $error,
                failed_stage = $stage,
                updated_at = $now
            WHERE status = $expected AND worker_id = $worker_id
            RETURN meta::id(id) AS id;
        "#;

        #[derive(serde::Deserialize)]
        struct UpdatedRow {
            #[allow(dead_code)]
            id: String,
        }

        let now = Utc::now();
        let updated: Vec<UpdatedRow> = db
            .client
            .query(FAIL_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_string()))
            .bind(("failed", RenderStatus::Failed.as_str()))
            .bind(("expected", expected.as_str()))
            .bind(("error", message.to_string()))
            .bind(("stage", stage.to_string()))
            .bind(("now", SurrealDatetime::from(now)))
            .bind(("worker_id", worker_id.to_string()))
            .await?
            .take(0)?;

        if updated.is_empty() {
            return Err(invalid_transition(&expected, JobTransition::Fail));
        }
        Ok(())
    }
}
