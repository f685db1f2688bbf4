use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Performance {
    pub period_return_pct: f64,
    pub ytd_return_pct: f64,
    pub benchmark_return_pct: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Flows {
    pub contributions: f64,
    pub withdrawals: f64,
    pub dividends: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Fees {
    pub period: f64,
    pub ytd: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Allocation {
    pub equities_pct: f64,
    pub fixed_income_pct: f64,
    pub cash_pct: f64,
    pub alternatives_pct: f64,
}

/// Fixed-shape metrics handed to scene planning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KpiSet {
    pub performance: Performance,
    pub flows: Flows,
    pub fees: Fees,
    pub allocation: Allocation,
    pub notes: String,
}

impl KpiSet {
    /// Every numeric field addressed by its dotted path, in schema order.
    pub fn fields(&self) -> [(&'static str, f64); 12] {
        [
            ("performance.period_return_pct", self.performance.period_return_pct),
            ("performance.ytd_return_pct", self.performance.ytd_return_pct),
            ("performance.benchmark_return_pct", self.performance.benchmark_return_pct),
            ("flows.contributions", self.flows.contributions),
            ("flows.withdrawals", self.flows.withdrawals),
            ("flows.dividends", self.flows.dividends),
            ("fees.period", self.fees.period),
            ("fees.ytd", self.fees.ytd),
            ("allocation.equities_pct", self.allocation.equities_pct),
            ("allocation.fixed_income_pct", self.allocation.fixed_income_pct),
            ("allocation.cash_pct", self.allocation.cash_pct),
            ("allocation.alternatives_pct", self.allocation.alternatives_pct),
        ]
    }

    pub fn lookup(&self, field: &str) -> Option<f64> {
        self.fields()
            .into_iter()
            .find_map(|(name, value)| (name == field).then_some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_resolves_dotted_paths() {
        let kpis = KpiSet {
            performance: Performance {
                period_return_pct: 1.25,
                ..Default::default()
            },
            fees: Fees {
                period: 42.5,
                ytd: 120.0,
            },
            ..Default::default()
        };
        assert_eq!(kpis.lookup("performance.period_return_pct"), Some(1.25));
        assert_eq!(kpis.lookup("fees.ytd"), Some(120.0));
        assert_eq!(kpis.lookup("fees.total"), None);
        assert_eq!(kpis.lookup("notes"), None);
    }

    #[test]
    fn serialized_shape_is_stable() {
        let value = serde_json::to_value(KpiSet::default()).expect("serialize");
        let keys: Vec<_> = value
            .as_object()
            .expect("object")
            .keys()
            .cloned()
            .collect();
        assert_eq!(
            keys,
            vec!["allocation", "fees", "flows", "notes", "performance"]
        );
        assert!(value["performance"]["benchmark_return_pct"].is_number());
    }
}
