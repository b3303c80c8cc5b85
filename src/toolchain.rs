use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::score::ReportParser;

/// A program plus its leading arguments, e.g. `th translate.lua`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Splits `raw` on whitespace, then appends `extra` untouched so
    /// arguments containing spaces survive.
    pub fn parse(raw: &str, extra: &[String]) -> Result<Self> {
        let mut parts = raw.split_whitespace().map(ToOwned::to_owned);
        let program = parts
            .next()
            .with_context(|| format!("empty tool command: {raw:?}"))?;
        Ok(Self {
            program,
            args: parts.chain(extra.iter().cloned()).collect(),
        })
    }

    pub fn invocation(&self) -> Invocation {
        let mut invocation = Invocation::new(&self.program);
        for arg in &self.args {
            invocation = invocation.arg(arg);
        }
        invocation
    }
}

/// One subprocess call: argument list plus optional file redirections.
/// Nothing is ever passed through a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
    pub stdin: Option<PathBuf>,
    pub stdout: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            stdin: None,
            stdout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn stdin_from(mut self, path: &Path) -> Self {
        self.stdin = Some(path.to_path_buf());
        self
    }

    pub fn stdout_to(mut self, path: &Path) -> Self {
        self.stdout = Some(path.to_path_buf());
        self
    }

    /// Runs the process to completion; a spawn failure or a non-zero exit
    /// status is an error carrying the trimmed stderr.
    pub fn run(&self, tool: &str) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);

        if let Some(path) = &self.stdin {
            let file = File::open(path)
                .with_context(|| format!("failed to open {tool} input: {}", path.display()))?;
            command.stdin(Stdio::from(file));
        }
        if let Some(path) = &self.stdout {
            let file = File::create(path)
                .with_context(|| format!("failed to create {tool} output: {}", path.display()))?;
            command.stdout(Stdio::from(file));
        }

        let output = command
            .output()
            .with_context(|| format!("failed to execute {tool} ({})", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "{tool} returned non-zero exit status ({}): {}",
                output.status,
                stderr.trim()
            );
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub gpuid: String,
    pub batch_size: usize,
    /// Gating type passed with `-concat` when context concatenation is on.
    pub concat_gating_type: Option<String>,
}

/// The two external collaborators of a significance test.
pub trait Toolchain {
    fn translate(&mut self, model: &str, source: &Path, output: &Path) -> Result<()>;

    fn score(&mut self, reference: &Path, hypothesis: &Path) -> Result<f64>;
}

#[derive(Debug)]
pub struct ExternalToolchain {
    translator: ToolCommand,
    scorer: ToolCommand,
    options: TranslateOptions,
    parser: ReportParser,
    report_path: PathBuf,
}

impl ExternalToolchain {
    pub fn new(
        translator: ToolCommand,
        scorer: ToolCommand,
        options: TranslateOptions,
        parser: ReportParser,
        report_path: PathBuf,
    ) -> Self {
        Self {
            translator,
            scorer,
            options,
            parser,
            report_path,
        }
    }

    pub fn translate_invocation(&self, model: &str, source: &Path, output: &Path) -> Invocation {
        let mut invocation = self
            .translator
            .invocation()
            .arg("-model")
            .arg(model)
            .arg("-src")
            .arg(source)
            .arg("-output")
            .arg(output)
            .arg("-gpuid")
            .arg(&self.options.gpuid)
            .arg("-batch_size")
            .arg(self.options.batch_size.to_string())
            .arg("-replace_unk")
            .arg("-disable_logs");

        if let Some(gating_type) = &self.options.concat_gating_type {
            invocation = invocation
                .arg("-concat")
                .arg("-gating_type")
                .arg(gating_type);
        }

        invocation
    }

    pub fn score_invocation(&self, reference: &Path, hypothesis: &Path) -> Invocation {
        self.scorer
            .invocation()
            .arg(reference)
            .stdin_from(hypothesis)
            .stdout_to(&self.report_path)
    }
}

impl Toolchain for ExternalToolchain {
    fn translate(&mut self, model: &str, source: &Path, output: &Path) -> Result<()> {
        self.translate_invocation(model, source, output)
            .run("translator")
    }

    fn score(&mut self, reference: &Path, hypothesis: &Path) -> Result<f64> {
        self.score_invocation(reference, hypothesis).run("scorer")?;

        let report = fs::read_to_string(&self.report_path)
            .with_context(|| format!("failed to read {}", self.report_path.display()))?;
        let score = self.parser.parse(&report).with_context(|| {
            format!(
                "failed to parse {} score from {}",
                self.parser.metric(),
                self.report_path.display()
            )
        })?;
        debug!(metric = %score.metric, value = score.value, "parsed scorer report");

        Ok(score.value)
    }
}
