use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "sigtest",
    version,
    about = "Bootstrap significance testing for machine translation metrics"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Estimate the empirical 95% interval of a single model's score.
    Interval(IntervalArgs),
    /// Tally win/lose/tie rates of model2 against model1.
    Compare(CompareArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ToolArgs {
    /// Program and leading arguments, split on whitespace.
    #[arg(long, default_value = "th translate.lua")]
    pub translator: String,

    /// Extra translator argument passed verbatim (may contain spaces).
    #[arg(long = "translator-arg", allow_hyphen_values = true)]
    pub translator_args: Vec<String>,

    /// Program and leading arguments, split on whitespace.
    #[arg(long, default_value = "perl ./benchmark/3rdParty/multi-bleu.perl")]
    pub scorer: String,

    /// Extra scorer argument passed verbatim (may contain spaces).
    #[arg(long = "scorer-arg", allow_hyphen_values = true)]
    pub scorer_args: Vec<String>,

    #[arg(long, default_value_t = 400)]
    pub batch_size: usize,

    #[arg(long, default_value = "BLEU")]
    pub metric: String,

    #[arg(long, default_value = "sigTestTmpFiles")]
    pub work_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct ResampleArgs {
    #[arg(short = 'M', long = "trials", alias = "M", default_value_t = 1000)]
    pub trials: usize,

    #[arg(long, default_value_t = 0.5)]
    pub ratio: f64,

    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct IntervalArgs {
    #[arg(long)]
    pub src: PathBuf,

    #[arg(long)]
    pub tgt: PathBuf,

    #[arg(long)]
    pub model: String,

    #[arg(long, default_value_t = false)]
    pub concat: bool,

    #[arg(long, alias = "context_type", default_value = "contextBiEncoder")]
    pub context_type: String,

    #[arg(long, default_value = "1")]
    pub gpuid: String,

    #[command(flatten)]
    pub resample: ResampleArgs,

    #[command(flatten)]
    pub tools: ToolArgs,

    #[arg(long)]
    pub out: PathBuf,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[arg(long)]
    pub src: Option<PathBuf>,

    #[arg(long)]
    pub tgt: PathBuf,

    #[arg(long)]
    pub model1: Option<String>,

    #[arg(long)]
    pub model2: Option<String>,

    #[arg(long)]
    pub pred1: Option<PathBuf>,

    #[arg(long)]
    pub pred2: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub translate: bool,

    #[arg(long, default_value = "1")]
    pub gpuid: String,

    #[command(flatten)]
    pub resample: ResampleArgs,

    #[command(flatten)]
    pub tools: ToolArgs,

    #[arg(long)]
    pub out: PathBuf,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}
