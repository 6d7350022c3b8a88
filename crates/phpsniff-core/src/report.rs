//! Violations and metrics produced by rules

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Severity level for violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Error - must be fixed
    Error,
    /// Warning - should be reviewed
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A single style violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Token position the violation is attached to
    pub position: usize,
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
    /// Rule-scoped code, e.g. `Strings.ConcatenationSpacing.PaddingFound`
    pub code: String,
    pub message: String,
    pub fixable: bool,
}

/// Value recorded for a metric
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(usize),
    Text(String),
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        MetricValue::Int(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(n) => write!(f, "{}", n),
            MetricValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Metric name -> value -> number of positions that recorded it
pub type MetricSummary = BTreeMap<String, BTreeMap<MetricValue, usize>>;

/// Collects violations and metrics for one file pass
#[derive(Debug, Default)]
pub struct Reporter {
    violations: Vec<Violation>,
    /// name -> position -> value; first record per position wins
    metrics: BTreeMap<String, BTreeMap<usize, MetricValue>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    /// Record a metric once per position
    pub fn record_metric(&mut self, position: usize, name: &str, value: MetricValue) {
        self.metrics
            .entry(name.to_string())
            .or_default()
            .entry(position)
            .or_insert(value);
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    pub fn metric(&self, name: &str, position: usize) -> Option<&MetricValue> {
        self.metrics.get(name).and_then(|by_pos| by_pos.get(&position))
    }

    pub fn metric_summary(&self) -> MetricSummary {
        let mut summary = MetricSummary::new();
        for (name, by_pos) in &self.metrics {
            let counts = summary.entry(name.clone()).or_default();
            for value in by_pos.values() {
                *counts.entry(value.clone()).or_insert(0) += 1;
            }
        }
        summary
    }

    pub fn error_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == Severity::Warning)
            .count()
    }
}
