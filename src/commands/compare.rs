use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::CompareArgs;
use crate::commands::{
    MANIFEST_VERSION, ScratchFiles, build_toolchain, describe_inputs, log_run_start, resolve_seed,
    run_id, run_settings,
};
use crate::corpus::ParallelCorpus;
use crate::model::{ComparisonReport, TrialPair};
use crate::resample::{Resampler, sample_size};
use crate::stats::{Tally, WinRates};
use crate::toolchain::{Toolchain, TranslateOptions};
use crate::util::{format_float, now_utc_string, write_json_pretty, write_lines, write_text};

pub fn run(args: CompareArgs) -> Result<()> {
    let scratch = ScratchFiles::create(&args.tools.work_dir)?;
    let options = TranslateOptions {
        gpuid: args.gpuid.clone(),
        batch_size: args.tools.batch_size,
        concat_gating_type: None,
    };
    let mut toolchain = build_toolchain(&args.tools, options, &scratch)?;
    run_with(&args, &scratch, &mut toolchain)
}

/// Optionally translates both models, then runs every trial through
/// `toolchain` and writes the rates (and the optional JSON report).
pub fn run_with(
    args: &CompareArgs,
    scratch: &ScratchFiles,
    toolchain: &mut dyn Toolchain,
) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = run_id(started_ts);
    let seed = resolve_seed(args.resample.seed);
    log_run_start("compare", &run_id, &args.resample, seed);

    sample_size(1, args.resample.ratio)?;

    let pred1 = args.pred1.clone().unwrap_or_else(|| scratch.pred1());
    let pred2 = args.pred2.clone().unwrap_or_else(|| scratch.pred2());

    if args.translate {
        let src = args
            .src
            .as_deref()
            .context("--translate requires --src")?;
        let model1 = args
            .model1
            .as_deref()
            .context("--translate requires --model1")?;
        let model2 = args
            .model2
            .as_deref()
            .context("--translate requires --model2")?;
        translate_full(toolchain, model1, src, &pred1)?;
        translate_full(toolchain, model2, src, &pred2)?;
    }

    let corpus = ParallelCorpus::load(&[
        ("tgt", args.tgt.as_path()),
        ("pred1", pred1.as_path()),
        ("pred2", pred2.as_path()),
    ])?;
    if corpus.is_empty() {
        bail!("reference corpus is empty: {}", args.tgt.display());
    }

    let mut resampler = Resampler::new(corpus.len(), args.resample.ratio, seed)?;
    info!(
        lines = corpus.len(),
        sample_size = resampler.sample_size(),
        "resampling reference and both predictions"
    );

    let (tally, trials) = compare_models(
        &corpus,
        &mut resampler,
        toolchain,
        args.resample.trials,
        scratch,
    )?;
    if tally.total() == 0 {
        warn!("no trials were run; all rates are zero");
    }

    let rates = tally.rates();
    write_text(&args.out, &format_rates(&rates))?;
    info!(
        path = %args.out.display(),
        win = rates.win,
        lose = rates.lose,
        tie = rates.tie,
        "wrote win/lose/tie rates"
    );

    if let Some(report_path) = &args.report_path {
        let report = ComparisonReport {
            manifest_version: MANIFEST_VERSION,
            run_id,
            mode: "compare".to_string(),
            started_at,
            finished_at: now_utc_string(),
            model1: args.model1.clone(),
            model2: args.model2.clone(),
            settings: run_settings(&args.resample, &args.tools, resampler.sample_size(), seed),
            inputs: describe_inputs(&corpus)?,
            trials,
            counts: tally,
            rates,
        };
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote run report");
    }

    Ok(())
}

fn translate_full(
    toolchain: &mut dyn Toolchain,
    model: &str,
    src: &Path,
    output: &Path,
) -> Result<()> {
    info!(model, src = %src.display(), output = %output.display(), "translating full source");
    toolchain
        .translate(model, src, output)
        .with_context(|| format!("failed to translate {} with {model}", src.display()))
}

/// Scores both predictions on one shared resample per trial and tallies
/// model2 against model1. The corpus columns are (reference, pred1, pred2).
pub fn compare_models(
    corpus: &ParallelCorpus,
    resampler: &mut Resampler,
    toolchain: &mut dyn Toolchain,
    trials: usize,
    scratch: &ScratchFiles,
) -> Result<(Tally, Vec<TrialPair>)> {
    let reference_path = scratch.reference();
    let pred1_path = scratch.sample_pred1();
    let pred2_path = scratch.sample_pred2();

    let started = Instant::now();
    let mut tally = Tally::default();
    let mut pairs = Vec::with_capacity(trials);
    for trial in 0..trials {
        let sample = corpus.select(resampler.next_sample());
        write_lines(&reference_path, &sample[0])?;
        write_lines(&pred1_path, &sample[1])?;
        write_lines(&pred2_path, &sample[2])?;

        let model1 = toolchain
            .score(&reference_path, &pred1_path)
            .with_context(|| format!("trial {} scoring of pred1 failed", trial + 1))?;
        let model2 = toolchain
            .score(&reference_path, &pred2_path)
            .with_context(|| format!("trial {} scoring of pred2 failed", trial + 1))?;
        let outcome = tally.record(model1, model2);

        info!(
            trial = trial + 1,
            trials,
            model1,
            model2,
            outcome = outcome.as_str(),
            win = tally.win,
            lose = tally.lose,
            tie = tally.tie,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "trial complete"
        );
        pairs.push(TrialPair {
            trial: trial + 1,
            model1,
            model2,
            outcome: outcome.as_str().to_string(),
        });
    }

    Ok((tally, pairs))
}

pub fn format_rates(rates: &WinRates) -> String {
    format!(
        "win: {} lose: {} tie: {}",
        format_float(rates.win),
        format_float(rates.lose),
        format_float(rates.tie)
    )
}
