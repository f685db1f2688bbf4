use serde_json::json;

use crate::types::scene_plan::{MAX_LINE_CHARS, MAX_ON_SCREEN_LINES, MAX_SCENES, MIN_SCENES};

pub static SCENE_PLANNING_SYSTEM_MESSAGE: &str = r#"You are a storyboard writer for short financial statement summary videos.

You receive a JSON object with the client name, the statement type, the period label and a KPI set. Produce between 4 and 6 scenes.

Rules:
1. The first scene introduces the video. Its title or on-screen text must contain the client name and the period label exactly as given.
2. Every scene has a title, at most 2 on-screen text lines of at most 50 characters each, a voiceover of exactly one sentence, and a visual prompt describing calm, abstract, brand-safe footage without people or text.
3. KPI callouts may only use numbers present in the KPI set. Each callout names the KPI field by its dotted path (for example "performance.period_return_pct") and repeats its value unchanged.
4. Never invent figures, forecasts or advice.
5. The last scene is reserved for the legal disclosure; keep it short, it will be replaced with fixed text.

Respond only with the JSON object described by the schema."#;

pub fn get_scene_plan_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "scenes": {
                "type": "array",
                "minItems": MIN_SCENES,
                "maxItems": MAX_SCENES,
                "items": {
                    "type": "object",
                    "properties": {
                        "title": { "type": "string" },
                        "on_screen_text": {
                            "type": "array",
                            "maxItems": MAX_ON_SCREEN_LINES,
                            "items": { "type": "string", "maxLength": MAX_LINE_CHARS }
                        },
                        "voiceover": { "type": "string" },
                        "visual_prompt": { "type": "string" },
                        "kpi_callouts": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "label": { "type": "string" },
                                    "field": { "type": "string" },
                                    "value": { "type": "number" }
                                },
                                "required": ["label", "field", "value"],
                                "additionalProperties": false
                            }
                        }
                    },
                    "required": ["title", "on_screen_text", "voiceover", "visual_prompt", "kpi_callouts"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["scenes"],
        "additionalProperties": false
    })
}
