//! KPI computation from extracted statement text.
//!
//! The formulas are placeholders: labelled figures are scanned out of the text and copied into
//! the fixed KPI shape. The function is pure so the same document always yields the same set.

use std::sync::OnceLock;

use common::{error::AppError, storage::types::render_job::StatementType};
use regex::Regex;

use crate::types::{KpiSet, ParsedDocument};

/// Labels that may precede each figure, matched case-insensitively.
const FIELD_LABELS: [(&str, &str); 12] = [
    (
        "performance.period_return_pct",
        r"(?:period|monthly|quarterly|annual) return|return for the period",
    ),
    (
        "performance.ytd_return_pct",
        r"ytd return|year[- ]to[- ]date return",
    ),
    ("performance.benchmark_return_pct", r"benchmark(?: return)?"),
    ("flows.contributions", r"contributions|deposits"),
    ("flows.withdrawals", r"withdrawals"),
    ("flows.dividends", r"dividends(?: received)?"),
    ("fees.period", r"(?:period )?fees(?: this period| paid)?"),
    ("fees.ytd", r"ytd fees|year[- ]to[- ]date fees"),
    ("allocation.equities_pct", r"equities|stocks"),
    ("allocation.fixed_income_pct", r"fixed income|bonds"),
    ("allocation.cash_pct", r"cash(?: equivalents)?"),
    ("allocation.alternatives_pct", r"alternatives"),
];

/// A signed number, optionally in accounting parentheses, with currency symbol and separators.
const NUMBER: &str = r"(\(?[-+]?\$?\s?[0-9][0-9,]*(?:\.[0-9]+)?\)?)";

type FieldPattern = (&'static str, Regex);

static PATTERNS: OnceLock<Result<Vec<FieldPattern>, regex::Error>> = OnceLock::new();

fn patterns() -> Result<&'static [FieldPattern], AppError> {
    let compiled = PATTERNS.get_or_init(|| {
        FIELD_LABELS
            .iter()
            .map(|(field, labels)| {
                let pattern = format!(r"(?i)\b(?:{labels})\b\s*[:=]?\s*{NUMBER}\s*%?");
                Regex::new(&pattern).map(|re| (*field, re))
            })
            .collect()
    });
    compiled
        .as_ref()
        .map(Vec::as_slice)
        .map_err(|err| AppError::InternalError(format!("invalid KPI pattern: {err}")))
}

/// Whether the label match starting at `start` belongs to a year-to-date figure, as in the
/// "Fees" of "YTD Fees".
fn follows_ytd_qualifier(text: &str, start: usize) -> bool {
    let before = text.get(..start).unwrap_or_default().trim_end().to_ascii_lowercase();
    ["ytd", "year-to-date", "year to date"]
        .iter()
        .any(|qualifier| before.ends_with(qualifier))
}

fn parse_number(raw: &str) -> Option<f64> {
    let negative = raw.starts_with('(') || raw.contains('-');
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = digits.parse().ok()?;
    Some(if negative { -value } else { value })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn assign(kpis: &mut KpiSet, field: &str, value: f64) {
    let slot = match field {
        "performance.period_return_pct" => &mut kpis.performance.period_return_pct,
        "performance.ytd_return_pct" => &mut kpis.performance.ytd_return_pct,
        "performance.benchmark_return_pct" => &mut kpis.performance.benchmark_return_pct,
        "flows.contributions" => &mut kpis.flows.contributions,
        "flows.withdrawals" => &mut kpis.flows.withdrawals,
        "flows.dividends" => &mut kpis.flows.dividends,
        "fees.period" => &mut kpis.fees.period,
        "fees.ytd" => &mut kpis.fees.ytd,
        "allocation.equities_pct" => &mut kpis.allocation.equities_pct,
        "allocation.fixed_income_pct" => &mut kpis.allocation.fixed_income_pct,
        "allocation.cash_pct" => &mut kpis.allocation.cash_pct,
        "allocation.alternatives_pct" => &mut kpis.allocation.alternatives_pct,
        _ => return,
    };
    *slot = value;
}

/// Computes the KPI set for a statement.
///
/// Figures that cannot be found are zero. Annual statements cover the whole year, so missing
/// year-to-date figures take the period figures.
pub fn compute_kpis(
    document: &ParsedDocument,
    statement_type: StatementType,
    period: &str,
) -> Result<KpiSet, AppError> {
    let mut kpis = KpiSet::default();
    let mut found: Vec<&'static str> = Vec::new();

    for (field, re) in patterns()? {
        let is_ytd_field = field.contains("ytd");
        let value = re
            .captures_iter(&document.text)
            .filter(|caps| {
                is_ytd_field
                    || !caps
                        .get(0)
                        .is_some_and(|m| follows_ytd_qualifier(&document.text, m.start()))
            })
            .find_map(|caps| caps.get(1).and_then(|m| parse_number(m.as_str())));
        if let Some(value) = value {
            assign(&mut kpis, field, round2(value));
            found.push(*field);
        }
    }

    if statement_type == StatementType::Annual {
        if !found.contains(&"performance.ytd_return_pct") {
            kpis.performance.ytd_return_pct = kpis.performance.period_return_pct;
        }
        if !found.contains(&"fees.ytd") {
            kpis.fees.ytd = kpis.fees.period;
        }
    }

    let total = FIELD_LABELS.len();
    let mut notes = format!(
        "Extracted {} of {total} metrics from the {} statement for {period}.",
        found.len(),
        statement_type.as_str()
    );
    if document.text.trim().is_empty() {
        notes.push_str(" The document had no readable text, so every metric is zero.");
    } else if !found.is_empty() && found.len() < total {
        let missing: Vec<&str> = FIELD_LABELS
            .iter()
            .map(|(field, _)| *field)
            .filter(|field| !found.contains(field))
            .collect();
        notes.push_str(&format!(" Missing: {}.", missing.join(", ")));
    }
    kpis.notes = notes;

    Ok(kpis)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATEMENT: &str = "\
Account Summary - June 2025
Period Return: 2.437%
YTD Return 7.1%
Benchmark Return 1.9%
Contributions $12,500.00
Withdrawals ($3,000.00)
Dividends received $410.25
Fees paid $85.10
YTD Fees $512.40
Asset allocation: Equities 60% Fixed Income 30% Cash 7.5% Alternatives 2.5%
";

    #[test]
    fn extracts_labelled_figures() {
        let kpis = compute_kpis(
            &ParsedDocument::from_text(STATEMENT),
            StatementType::Monthly,
            "2025-06",
        )
        .expect("kpis");

        assert_eq!(kpis.performance.period_return_pct, 2.44);
        assert_eq!(kpis.performance.ytd_return_pct, 7.1);
        assert_eq!(kpis.performance.benchmark_return_pct, 1.9);
        assert_eq!(kpis.flows.contributions, 12_500.0);
        assert_eq!(kpis.flows.withdrawals, -3_000.0);
        assert_eq!(kpis.flows.dividends, 410.25);
        assert_eq!(kpis.fees.period, 85.1);
        assert_eq!(kpis.fees.ytd, 512.4);
        assert_eq!(kpis.allocation.equities_pct, 60.0);
        assert_eq!(kpis.allocation.fixed_income_pct, 30.0);
        assert_eq!(kpis.allocation.cash_pct, 7.5);
        assert_eq!(kpis.allocation.alternatives_pct, 2.5);
        assert!(kpis.notes.starts_with("Extracted 12 of 12 metrics"));
    }

    #[test]
    fn identical_inputs_give_identical_output() {
        let doc = ParsedDocument::from_text(STATEMENT);
        let first = compute_kpis(&doc, StatementType::Quarterly, "2025-Q2").expect("first");
        let second = compute_kpis(&doc, StatementType::Quarterly, "2025-Q2").expect("second");
        assert_eq!(
            serde_json::to_vec(&first).expect("serialize"),
            serde_json::to_vec(&second).expect("serialize")
        );
    }

    #[test]
    fn empty_text_yields_zeroed_set() {
        let kpis = compute_kpis(&ParsedDocument::default(), StatementType::Monthly, "2025-06")
            .expect("kpis");
        assert!(kpis.fields().iter().all(|(_, value)| *value == 0.0));
        assert!(kpis.notes.contains("no readable text"));
    }

    #[test]
    fn annual_ytd_defaults_to_period() {
        let doc = ParsedDocument::from_text("Annual Return 9.25%\nFees paid $1,020");
        let kpis = compute_kpis(&doc, StatementType::Annual, "2024").expect("kpis");
        assert_eq!(kpis.performance.ytd_return_pct, 9.25);
        assert_eq!(kpis.fees.ytd, 1_020.0);
        assert!(kpis.notes.contains("Missing:"));
    }

    #[test]
    fn keeps_sign_of_unpunctuated_negative_figures() {
        let doc = ParsedDocument::from_text("Period Return -1.2%\nBenchmark Return: -0.75%");
        let kpis = compute_kpis(&doc, StatementType::Monthly, "2025-06").expect("kpis");
        assert_eq!(kpis.performance.period_return_pct, -1.2);
        assert_eq!(kpis.performance.benchmark_return_pct, -0.75);
    }

    #[test]
    fn period_fees_ignore_preceding_ytd_line() {
        let doc = ParsedDocument::from_text("YTD Fees $512.40\nFees paid $85.10");
        let kpis = compute_kpis(&doc, StatementType::Monthly, "2025-06").expect("kpis");
        assert_eq!(kpis.fees.period, 85.1);
        assert_eq!(kpis.fees.ytd, 512.4);

        let only_ytd = ParsedDocument::from_text("Year-to-date fees: $512.40");
        let kpis = compute_kpis(&only_ytd, StatementType::Monthly, "2025-06").expect("kpis");
        assert_eq!(kpis.fees.period, 0.0);
        assert_eq!(kpis.fees.ytd, 512.4);
    }

    #[test]
    fn parses_number_shapes() {
        assert_eq!(parse_number("(1,200.50)"), Some(-1_200.5));
        assert_eq!(parse_number("-3.2"), Some(-3.2));
        assert_eq!(parse_number("$ 45"), Some(45.0));
        assert_eq!(parse_number("$"), None);
    }
}
