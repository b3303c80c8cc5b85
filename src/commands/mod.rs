pub mod compare;
pub mod interval;

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::cli::{ResampleArgs, ToolArgs};
use crate::corpus::ParallelCorpus;
use crate::model::{InputFile, RunSettings};
use crate::score::ReportParser;
use crate::toolchain::{ExternalToolchain, ToolCommand, TranslateOptions};
use crate::util::{ensure_directory, sha256_file, utc_compact_string};

pub const MANIFEST_VERSION: u32 = 1;

/// Fixed-name scratch files, overwritten on every trial. Runs sharing a
/// work directory clobber each other.
#[derive(Debug, Clone)]
pub struct ScratchFiles {
    dir: PathBuf,
}

impl ScratchFiles {
    pub fn create(dir: &Path) -> Result<Self> {
        ensure_directory(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.join(format!("sigTest_tmp_{name}.txt"))
    }

    pub fn input(&self) -> PathBuf {
        self.file("input")
    }

    pub fn reference(&self) -> PathBuf {
        self.file("ref")
    }

    pub fn pred(&self) -> PathBuf {
        self.file("pred")
    }

    pub fn eval(&self) -> PathBuf {
        self.file("eval")
    }

    pub fn pred1(&self) -> PathBuf {
        self.file("pred1")
    }

    pub fn pred2(&self) -> PathBuf {
        self.file("pred2")
    }

    pub fn sample_pred1(&self) -> PathBuf {
        self.file("sample_pred1")
    }

    pub fn sample_pred2(&self) -> PathBuf {
        self.file("sample_pred2")
    }
}

pub fn run_id(started: DateTime<Utc>) -> String {
    format!("run-{}", utc_compact_string(started))
}

pub fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(rand::random)
}

pub fn build_toolchain(
    tools: &ToolArgs,
    options: TranslateOptions,
    scratch: &ScratchFiles,
) -> Result<ExternalToolchain> {
    Ok(ExternalToolchain::new(
        ToolCommand::parse(&tools.translator, &tools.translator_args)?,
        ToolCommand::parse(&tools.scorer, &tools.scorer_args)?,
        options,
        ReportParser::new(&tools.metric)?,
        scratch.eval(),
    ))
}

pub fn describe_inputs(corpus: &ParallelCorpus) -> Result<Vec<InputFile>> {
    let mut inputs = Vec::new();
    for column in corpus.columns() {
        let Some(path) = &column.path else {
            continue;
        };
        inputs.push(InputFile {
            column: column.name.clone(),
            path: path.display().to_string(),
            lines: column.lines.len(),
            sha256: sha256_file(path)?,
        });
    }
    Ok(inputs)
}

pub fn run_settings(
    resample: &ResampleArgs,
    tools: &ToolArgs,
    sample_size: usize,
    seed: u64,
) -> RunSettings {
    RunSettings {
        trials: resample.trials,
        ratio: resample.ratio,
        sample_size,
        seed,
        metric: tools.metric.clone(),
        translator: tools.translator.clone(),
        scorer: tools.scorer.clone(),
        work_dir: tools.work_dir.display().to_string(),
    }
}

pub fn log_run_start(mode: &str, run_id: &str, resample: &ResampleArgs, seed: u64) {
    info!(
        mode,
        run_id,
        trials = resample.trials,
        ratio = resample.ratio,
        seed,
        "starting significance test"
    );
}
