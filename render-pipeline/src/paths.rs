//! Deterministic artifact locations for a render job.
//!
//! Every component can rebuild a job's artifact paths from the job metadata alone, without
//! reading the job record back.

use common::storage::types::render_job::{RenderJob, StatementType};

const ARTIFACT_ROOT: &str = "renders";
const EMPTY_CLIENT_FALLBACK: &str = "unknown-client";

/// Reduces a client name to a safe path segment.
///
/// Trims, drops characters outside `[A-Za-z0-9_\- ]` and collapses whitespace runs into a
/// single hyphen. Applying it twice yields the same result as applying it once.
pub fn sanitize_client_name(raw: &str) -> String {
    let kept: String = raw
        .trim()
        .chars()
        .filter_map(|c| match c {
            c if c.is_whitespace() => Some(' '),
            c if c.is_ascii_alphanumeric() || matches!(c, '_' | '-') => Some(c),
            _ => None,
        })
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Storage namespace for one job: `renders/{client}/{statement_type}/{period}/{job_id}`.
pub fn base_path(
    client_name: &str,
    statement_type: StatementType,
    period: &str,
    job_id: &str,
) -> String {
    let client = sanitize_client_name(client_name);
    let client = if client.is_empty() {
        EMPTY_CLIENT_FALLBACK.to_string()
    } else {
        client
    };
    format!(
        "{ARTIFACT_ROOT}/{client}/{}/{period}/{job_id}",
        statement_type.as_str()
    )
}

/// All artifact locations of a job, derived from its base path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPlan {
    base: String,
}

impl ArtifactPlan {
    pub fn for_job(job: &RenderJob) -> Self {
        Self {
            base: base_path(&job.client_name, job.statement_type, &job.period, &job.id),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn parse_result(&self) -> String {
        format!("{}/parse.json", self.base)
    }

    pub fn kpis(&self) -> String {
        format!("{}/kpis.json", self.base)
    }

    pub fn scenes(&self) -> String {
        format!("{}/scenes.json", self.base)
    }

    /// Clip path for the zero-based scene `index`; files are numbered from 1.
    pub fn clip(&self, index: usize) -> String {
        format!("{}/clips/scene-{}.mp4", self.base, index.saturating_add(1))
    }

    pub fn final_video(&self) -> String {
        format!("{}/final.mp4", self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_safe(segment: &str) -> bool {
        segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ' '))
    }

    #[test]
    fn sanitizes_punctuation_and_whitespace() {
        assert_eq!(sanitize_client_name("  Acme & Sons, LLC  "), "Acme-Sons-LLC");
        assert_eq!(sanitize_client_name("O'Brien\tFamily   Trust"), "OBrien-Family-Trust");
        assert_eq!(sanitize_client_name("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_client_name("Zoë Müller"), "Zo-Mller");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in [
            "Acme Holdings",
            " & leading symbol",
            "tabs\tand\nnewlines",
            "already-clean_name",
            "!!!",
            "",
        ] {
            let once = sanitize_client_name(raw);
            assert_eq!(sanitize_client_name(&once), once, "input {raw:?}");
            assert!(is_safe(&once), "unsafe output {once:?}");
        }
    }

    #[test]
    fn base_path_is_deterministic() {
        let a = base_path("Acme Holdings", StatementType::Monthly, "2025-06", "job-1");
        let b = base_path("Acme Holdings", StatementType::Monthly, "2025-06", "job-1");
        assert_eq!(a, b);
        assert_eq!(a, "renders/Acme-Holdings/monthly/2025-06/job-1");
    }

    #[test]
    fn job_id_separates_colliding_clients() {
        let a = base_path("Acme, Inc.", StatementType::Annual, "2024", "job-1");
        let b = base_path("Acme Inc", StatementType::Annual, "2024", "job-2");
        assert_ne!(a, b);
        assert!(a.ends_with("/job-1"));
        assert!(b.ends_with("/job-2"));
    }

    #[test]
    fn empty_client_gets_placeholder() {
        let path = base_path("***", StatementType::Quarterly, "2025-Q2", "job-9");
        assert_eq!(path, "renders/unknown-client/quarterly/2025-Q2/job-9");
    }

    #[test]
    fn clip_paths_are_one_based() {
        let plan = ArtifactPlan {
            base: "renders/a/monthly/2025-06/j".into(),
        };
        assert_eq!(plan.clip(0), "renders/a/monthly/2025-06/j/clips/scene-1.mp4");
        assert_eq!(plan.clip(4), "renders/a/monthly/2025-06/j/clips/scene-5.mp4");
        assert_eq!(plan.final_video(), "renders/a/monthly/2025-06/j/final.mp4");
    }
}
