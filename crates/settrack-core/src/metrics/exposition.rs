//! # Text Exposition Parser
//!
//! Extracts metric families from the text format served on a node's
//! metrics endpoint:
//!
//! ```text
//! # HELP sql_conns Number of open SQL connections
//! # TYPE sql_conns gauge
//! sql_conns{node_id="1"} 4
//! ```
//!
//! Each `# HELP` line opens a section that runs until the next one. The
//! section yields one [`Metric`]; its `# TYPE` line sets the type. Sample
//! lines are ignored, as is anything before the first section.

use super::{Metric, MetricType};
use crate::primitives::MAX_EXPOSITION_METRICS;
use crate::types::SettrackError;
use std::collections::BTreeSet;

const HELP_PREFIX: &str = "# HELP ";
const TYPE_PREFIX: &str = "# TYPE ";

/// Parse an exposition into metric families, in order of appearance.
///
/// When a name has several `# HELP` sections the first one wins.
///
/// # Errors
///
/// `InvalidMetric` if a `# HELP` line has no name or the text holds more
/// than [`MAX_EXPOSITION_METRICS`] families.
pub fn parse_exposition(text: &str) -> Result<Vec<Metric>, SettrackError> {
    let mut metrics = Vec::new();
    let mut seen = BTreeSet::new();
    let mut section: Option<Metric> = None;

    for (line_no, line) in text.lines().enumerate() {
        if let Some(rest) = line.strip_prefix(HELP_PREFIX) {
            if let Some(done) = section.take() {
                push_unique(&mut metrics, &mut seen, done)?;
            }
            let (name, help) = rest.split_once(' ').unwrap_or((rest, ""));
            if name.is_empty() {
                return Err(SettrackError::InvalidMetric(format!(
                    "line {}: HELP without a metric name",
                    line_no + 1
                )));
            }
            section = Some(Metric::new(name, unescape_help(help), MetricType::default()));
        } else if let Some(rest) = line.strip_prefix(TYPE_PREFIX) {
            if let Some(current) = section.as_mut() {
                let (name, kind) = rest.split_once(' ').unwrap_or((rest, ""));
                if name == current.name {
                    current.metric_type = MetricType::from(kind.trim());
                }
            }
        }
    }

    if let Some(done) = section.take() {
        push_unique(&mut metrics, &mut seen, done)?;
    }

    Ok(metrics)
}

fn push_unique(
    metrics: &mut Vec<Metric>,
    seen: &mut BTreeSet<String>,
    metric: Metric,
) -> Result<(), SettrackError> {
    if !seen.insert(metric.name.clone()) {
        return Ok(());
    }
    if metrics.len() >= MAX_EXPOSITION_METRICS {
        return Err(SettrackError::InvalidMetric(format!(
            "exposition exceeds {MAX_EXPOSITION_METRICS} metric families"
        )));
    }
    metrics.push(metric);
    Ok(())
}

/// HELP text escapes `\\` and `\n`.
fn unescape_help(help: &str) -> String {
    let mut out = String::with_capacity(help.len());
    let mut chars = help.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
