use serde::Serialize;

use crate::stats::{Tally, WinRates};

#[derive(Debug, Clone, Serialize)]
pub struct InputFile {
    pub column: String,
    pub path: String,
    pub lines: usize,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSettings {
    pub trials: usize,
    pub ratio: f64,
    pub sample_size: usize,
    pub seed: u64,
    pub metric: String,
    pub translator: String,
    pub scorer: String,
    pub work_dir: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntervalReport {
    pub manifest_version: u32,
    pub run_id: String,
    pub mode: String,
    pub started_at: String,
    pub finished_at: String,
    pub model: String,
    pub settings: RunSettings,
    pub inputs: Vec<InputFile>,
    pub scores: Vec<f64>,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrialPair {
    pub trial: usize,
    pub model1: f64,
    pub model2: f64,
    pub outcome: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub manifest_version: u32,
    pub run_id: String,
    pub mode: String,
    pub started_at: String,
    pub finished_at: String,
    pub model1: Option<String>,
    pub model2: Option<String>,
    pub settings: RunSettings,
    pub inputs: Vec<InputFile>,
    pub trials: Vec<TrialPair>,
    pub counts: Tally,
    pub rates: WinRates,
}
