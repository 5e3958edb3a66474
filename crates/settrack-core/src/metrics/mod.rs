//! # Metrics
//!
//! Exported metric families of a release (name, help text, type), their
//! change-set between two releases, and a parser for the text exposition
//! format they are captured in.

pub mod compare;
pub mod exposition;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use compare::{ChangedMetric, ComparedReleaseMetrics, ReleaseMetric, compare_release_metrics};
pub use exposition::parse_exposition;

/// Metric family type as reported by the exposition's `# TYPE` line.
///
/// Anything other than the three common types is kept verbatim, including
/// the empty string for families without a `# TYPE` line.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Other(String),
}

impl MetricType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
            Self::Other(s) => s,
        }
    }
}

impl Default for MetricType {
    fn default() -> Self {
        Self::Other(String::new())
    }
}

impl From<String> for MetricType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "counter" => Self::Counter,
            "gauge" => Self::Gauge,
            "histogram" => Self::Histogram,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for MetricType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<MetricType> for String {
    fn from(value: MetricType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One metric family exported by a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub help: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
}

impl Metric {
    #[must_use]
    pub fn new(name: impl Into<String>, help: impl Into<String>, metric_type: MetricType) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            metric_type,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_types_map_to_variants() {
        assert_eq!(MetricType::from("counter"), MetricType::Counter);
        assert_eq!(MetricType::from("gauge"), MetricType::Gauge);
        assert_eq!(MetricType::from("histogram"), MetricType::Histogram);
        assert_eq!(
            MetricType::from("summary"),
            MetricType::Other("summary".to_string())
        );
    }

    #[test]
    fn metric_json_uses_type_key() {
        let metric = Metric::new("sql_conns", "Open SQL connections", MetricType::Gauge);
        let json = serde_json::to_value(&metric).expect("serialize");
        assert_eq!(json["type"], "gauge");
        let back: Metric = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, metric);
    }
}
