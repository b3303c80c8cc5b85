use anyhow::{Context, Result};
use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreParseError {
    #[error("scorer report is empty")]
    EmptyReport,
    #[error("scorer report line does not match `METRIC = value, ...`: {0:?}")]
    Malformed(String),
    #[error("expected metric {expected} but scorer reported {found}")]
    UnexpectedMetric { expected: String, found: String },
    #[error("invalid score value {0:?}")]
    InvalidValue(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricScore {
    pub metric: String,
    pub value: f64,
}

/// Parses the first line of a corpus scorer report, e.g.
/// `BLEU = 25.43, 60.1/32.4/19.8/12.6 (BP=0.987, ...)`.
#[derive(Debug, Clone)]
pub struct ReportParser {
    pattern: Regex,
    metric: String,
}

impl ReportParser {
    pub fn new(metric: &str) -> Result<Self> {
        let pattern = Regex::new(r"^\s*([A-Za-z][A-Za-z0-9_-]*)\s*=\s*([^,\s]+)\s*,")
            .context("failed to compile score report regex")?;
        Ok(Self {
            pattern,
            metric: metric.to_string(),
        })
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn parse(&self, report: &str) -> Result<MetricScore, ScoreParseError> {
        let line = report
            .lines()
            .next()
            .filter(|line| !line.trim().is_empty())
            .ok_or(ScoreParseError::EmptyReport)?;

        let captures = self
            .pattern
            .captures(line)
            .ok_or_else(|| ScoreParseError::Malformed(line.to_string()))?;

        let metric = &captures[1];
        if !metric.eq_ignore_ascii_case(&self.metric) {
            return Err(ScoreParseError::UnexpectedMetric {
                expected: self.metric.clone(),
                found: metric.to_string(),
            });
        }

        let raw_value = &captures[2];
        let value = raw_value
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .ok_or_else(|| ScoreParseError::InvalidValue(raw_value.to_string()))?;

        Ok(MetricScore {
            metric: metric.to_string(),
            value,
        })
    }
}
