use std::sync::Arc;

use async_openai::types::{
    ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
    CreateChatCompletionRequestArgs, ResponseFormat, ResponseFormatJsonSchema,
};
use async_trait::async_trait;
use chrono::Month;
use common::{error::AppError, storage::types::render_job::StatementType};
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    types::{KpiSet, ScenePlan},
    utils::llm_instructions::{get_scene_plan_schema, SCENE_PLANNING_SYSTEM_MESSAGE},
};

/// A language model that answers a system instruction and a user payload with raw text.
#[async_trait]
pub trait SceneModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AppError>;
}

pub struct OpenAiSceneModel {
    client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
    model: String,
}

impl OpenAiSceneModel {
    pub fn new(
        client: Arc<async_openai::Client<async_openai::config::OpenAIConfig>>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl SceneModel for OpenAiSceneModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AppError> {
        let response_format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: Some("Storyboard for a statement summary video".into()),
                name: "scene_plan".into(),
                schema: Some(get_scene_plan_schema()),
                strict: Some(true),
            },
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([
                ChatCompletionRequestSystemMessage::from(system).into(),
                ChatCompletionRequestUserMessage::from(user).into(),
            ])
            .response_format(response_format)
            .build()?;

        let response = self.client.chat().create(request).await?;

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(AppError::LLMParsing(
                "No content found in LLM response".into(),
            ))
    }
}

/// Job metadata the storyboard is written for.
#[derive(Debug, Clone, Copy)]
pub struct PlanningRequest<'a> {
    pub client_name: &'a str,
    pub statement_type: StatementType,
    pub period: &'a str,
}

/// Formats a period for display: `2025-06` becomes `June 2025`, `2025-Q2` becomes `2025 Q2`,
/// and annual periods are shown as given.
pub fn period_label(statement_type: StatementType, period: &str) -> Result<String, AppError> {
    let invalid = || AppError::Validation(format!("invalid {} period '{period}'", statement_type.as_str()));
    if !statement_type.accepts_period(period) {
        return Err(invalid());
    }
    match statement_type {
        StatementType::Monthly => {
            let (year, month) = period.split_once('-').ok_or_else(invalid)?;
            let month: u8 = month.parse().map_err(|_| invalid())?;
            let month = Month::try_from(month).map_err(|_| invalid())?;
            Ok(format!("{} {year}", month.name()))
        }
        StatementType::Quarterly => Ok(period.replacen('-', " ", 1)),
        StatementType::Annual => Ok(period.to_string()),
    }
}

/// Produces a validated scene plan from a KPI set.
///
/// The model output is parsed strictly, the closing scene is replaced with the fixed
/// disclosure, and the plan is rejected if any rule is broken.
#[derive(Clone)]
pub struct ScenePlanner {
    model: Arc<dyn SceneModel>,
}

impl ScenePlanner {
    pub fn new(model: Arc<dyn SceneModel>) -> Self {
        Self { model }
    }

    pub async fn plan(
        &self,
        kpis: &KpiSet,
        request: PlanningRequest<'_>,
    ) -> Result<ScenePlan, AppError> {
        let label = period_label(request.statement_type, request.period)?;
        let payload = json!({
            "clientName": request.client_name,
            "statementType": request.statement_type.as_str(),
            "period": request.period,
            "periodLabel": label,
            "kpis": kpis,
        });

        let raw = self
            .model
            .complete(SCENE_PLANNING_SYSTEM_MESSAGE, &payload.to_string())
            .await?;
        debug!(chars = raw.len(), "Received scene plan from model");

        let mut plan = ScenePlan::parse(&raw)?;
        plan.apply_disclosure();
        if let Err(err) = plan.validate(kpis, request.client_name, &label) {
            warn!(error = %err, "Scene plan rejected");
            return Err(err);
        }
        Ok(plan)
    }
}
