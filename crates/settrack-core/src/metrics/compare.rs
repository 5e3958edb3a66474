//! Metric change-set between two releases.

use super::{Metric, MetricType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A metric as exported by a named release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseMetric {
    pub release: String,
    pub metric: String,
    pub help: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
}

impl ReleaseMetric {
    fn from_metric(release: &str, metric: &Metric) -> Self {
        Self {
            release: release.to_string(),
            metric: metric.name.clone(),
            help: metric.help.clone(),
            metric_type: metric.metric_type.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedMetric {
    pub before: ReleaseMetric,
    pub after: ReleaseMetric,
}

/// Added, removed and changed metric families. Buckets are in traversal
/// order, like the settings diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparedReleaseMetrics {
    pub added: Vec<Metric>,
    pub removed: Vec<Metric>,
    pub changed: Vec<ChangedMetric>,
}

impl ComparedReleaseMetrics {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// Compare the metrics of `r1` against those of `r2`.
///
/// A metric is `changed` when its help text or type differs.
#[must_use]
pub fn compare_release_metrics(
    r1: &str,
    r1_metrics: &[Metric],
    r2: &str,
    r2_metrics: &[Metric],
) -> ComparedReleaseMetrics {
    let index = |metrics: &[Metric]| -> BTreeMap<String, usize> {
        let mut map = BTreeMap::new();
        for (pos, metric) in metrics.iter().enumerate() {
            map.entry(metric.name.clone()).or_insert(pos);
        }
        map
    };
    let before_index = index(r1_metrics);
    let after_index = index(r2_metrics);

    let mut result = ComparedReleaseMetrics::default();

    for before in r1_metrics {
        let Some(after) = after_index
            .get(&before.name)
            .and_then(|&pos| r2_metrics.get(pos))
        else {
            result.removed.push(before.clone());
            continue;
        };
        if before.help != after.help || before.metric_type != after.metric_type {
            result.changed.push(ChangedMetric {
                before: ReleaseMetric::from_metric(r1, before),
                after: ReleaseMetric::from_metric(r2, after),
            });
        }
    }

    for after in r2_metrics {
        if !before_index.contains_key(&after.name) {
            result.added.push(after.clone());
        }
    }

    result
}
