use common::error::AppError;
use serde::{Deserialize, Serialize};

use super::KpiSet;

pub const MIN_SCENES: usize = 4;
pub const MAX_SCENES: usize = 6;
pub const MAX_ON_SCREEN_LINES: usize = 2;
pub const MAX_LINE_CHARS: usize = 50;
/// Callout values are shown with two decimals, so they only need to agree to that precision.
const CALLOUT_TOLERANCE: f64 = 0.005;

pub const DISCLOSURE_TITLE: &str = "Important information";
pub const DISCLOSURE_LINES: [&str; 2] = [
    "For informational purposes only.",
    "Past performance does not guarantee results.",
];
pub const DISCLOSURE_VOICEOVER: &str = "This summary is for informational purposes only, and past performance does not guarantee future results.";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct KpiCallout {
    pub label: String,
    /// Dotted path into the KPI set, e.g. `performance.period_return_pct`.
    pub field: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    pub title: String,
    pub on_screen_text: Vec<String>,
    pub voiceover: String,
    pub visual_prompt: String,
    pub kpi_callouts: Vec<KpiCallout>,
}

impl Scene {
    /// Text shown on a slate when no generated footage is available.
    pub fn slate_text(&self) -> String {
        std::iter::once(self.title.as_str())
            .chain(self.on_screen_text.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenePlan {
    pub scenes: Vec<Scene>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPlan {
    Bare(Vec<Scene>),
    Wrapped { scenes: Vec<Scene> },
}

impl ScenePlan {
    /// Parses model output as a scene list, either a bare array or `{"scenes": [...]}`.
    ///
    /// Anything else is an error; the text is never repaired.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let parsed: RawPlan = serde_json::from_str(raw).map_err(|err| {
            AppError::LLMParsing(format!("scene plan does not match the Scene[] schema: {err}"))
        })?;
        let scenes = match parsed {
            RawPlan::Bare(scenes) | RawPlan::Wrapped { scenes } => scenes,
        };
        Ok(Self { scenes })
    }

    /// Replaces the last scene with the fixed closing disclosure.
    pub fn apply_disclosure(&mut self) {
        if let Some(last) = self.scenes.last_mut() {
            last.title = DISCLOSURE_TITLE.to_string();
            last.on_screen_text = DISCLOSURE_LINES.iter().map(ToString::to_string).collect();
            last.voiceover = DISCLOSURE_VOICEOVER.to_string();
            last.kpi_callouts.clear();
        }
    }

    /// Checks the storyboard contract: scene count, text limits, a single voiceover sentence,
    /// an intro naming the client and period, and callouts that match the KPI set.
    pub fn validate(
        &self,
        kpis: &KpiSet,
        client_name: &str,
        period_label: &str,
    ) -> Result<(), AppError> {
        let count = self.scenes.len();
        if !(MIN_SCENES..=MAX_SCENES).contains(&count) {
            return Err(AppError::Validation(format!(
                "scene plan has {count} scenes; expected {MIN_SCENES} to {MAX_SCENES}"
            )));
        }

        for (index, scene) in self.scenes.iter().enumerate() {
            let number = index.saturating_add(1);
            validate_scene(number, scene, kpis)?;
        }

        let Some(intro) = self.scenes.first() else {
            return Err(AppError::Validation("scene plan is empty".into()));
        };
        let intro_text = format!(
            "{} {} {}",
            intro.title,
            intro.on_screen_text.join(" "),
            intro.voiceover
        )
        .to_lowercase();
        if !intro_text.contains(&client_name.trim().to_lowercase()) {
            return Err(AppError::Validation(format!(
                "intro scene does not name the client '{client_name}'"
            )));
        }
        if !intro_text.contains(&period_label.to_lowercase()) {
            return Err(AppError::Validation(format!(
                "intro scene does not mention the period '{period_label}'"
            )));
        }

        Ok(())
    }
}

fn validate_scene(number: usize, scene: &Scene, kpis: &KpiSet) -> Result<(), AppError> {
    if scene.title.trim().is_empty() {
        return Err(AppError::Validation(format!("scene {number} has no title")));
    }
    if scene.on_screen_text.len() > MAX_ON_SCREEN_LINES {
        return Err(AppError::Validation(format!(
            "scene {number} has {} on-screen lines; at most {MAX_ON_SCREEN_LINES} allowed",
            scene.on_screen_text.len()
        )));
    }
    if let Some(line) = scene
        .on_screen_text
        .iter()
        .find(|line| line.chars().count() > MAX_LINE_CHARS)
    {
        return Err(AppError::Validation(format!(
            "scene {number} on-screen line exceeds {MAX_LINE_CHARS} characters: '{line}'"
        )));
    }
    if !is_single_sentence(&scene.voiceover) {
        return Err(AppError::Validation(format!(
            "scene {number} voiceover must be exactly one sentence"
        )));
    }
    if scene.visual_prompt.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "scene {number} has no visual prompt"
        )));
    }
    for callout in &scene.kpi_callouts {
        let Some(actual) = kpis.lookup(&callout.field) else {
            return Err(AppError::Validation(format!(
                "scene {number} callout '{}' references unknown KPI field '{}'",
                callout.label, callout.field
            )));
        };
        if (actual - callout.value).abs() > CALLOUT_TOLERANCE {
            return Err(AppError::Validation(format!(
                "scene {number} callout '{}' shows {} but {} is {actual}",
                callout.label, callout.value, callout.field
            )));
        }
    }
    Ok(())
}

/// Words that end in a period without ending the sentence.
const ABBREVIATIONS: [&str; 10] = [
    "vs", "approx", "inc", "corp", "co", "ltd", "mr", "mrs", "ms", "dr",
];

/// A sentence break is a terminator followed by whitespace and a capitalised word, unless the
/// period closes an abbreviation such as "vs." or "U.S.".
fn is_single_sentence(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() || text.contains('\n') {
        return false;
    }
    let words: Vec<&str> = text.split_whitespace().collect();
    !words.windows(2).any(|pair| match pair {
        [word, next] => ends_sentence(word) && next.starts_with(char::is_uppercase),
        _ => false,
    })
}

fn ends_sentence(word: &str) -> bool {
    let word = word.trim_end_matches(['"', '\'', ')']);
    if word.ends_with(['!', '?']) {
        return true;
    }
    let Some(stem) = word.strip_suffix('.') else {
        return false;
    };
    let is_initialism = stem.contains('.');
    let is_abbreviation = ABBREVIATIONS
        .iter()
        .any(|abbr| stem.eq_ignore_ascii_case(abbr));
    !(is_initialism || is_abbreviation)
}
