use std::time::Instant;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::info;

use crate::cli::IntervalArgs;
use crate::commands::{
    MANIFEST_VERSION, ScratchFiles, build_toolchain, describe_inputs, log_run_start, resolve_seed,
    run_id, run_settings,
};
use crate::corpus::ParallelCorpus;
use crate::model::IntervalReport;
use crate::resample::{Resampler, sample_size};
use crate::stats::percentile_interval_95;
use crate::toolchain::{Toolchain, TranslateOptions};
use crate::util::{format_float, now_utc_string, write_json_pretty, write_lines, write_text};

pub fn run(args: IntervalArgs) -> Result<()> {
    let scratch = ScratchFiles::create(&args.tools.work_dir)?;
    let options = TranslateOptions {
        gpuid: args.gpuid.clone(),
        batch_size: args.tools.batch_size,
        concat_gating_type: args.concat.then(|| args.context_type.clone()),
    };
    let mut toolchain = build_toolchain(&args.tools, options, &scratch)?;
    run_with(&args, &scratch, &mut toolchain)
}

/// Loads the corpus, runs every trial through `toolchain`, and writes the
/// interval (and the optional JSON report).
pub fn run_with(
    args: &IntervalArgs,
    scratch: &ScratchFiles,
    toolchain: &mut dyn Toolchain,
) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = run_id(started_ts);
    let seed = resolve_seed(args.resample.seed);
    log_run_start("interval", &run_id, &args.resample, seed);

    if args.resample.trials == 0 {
        bail!("interval estimation needs at least one trial");
    }
    sample_size(1, args.resample.ratio)?;

    let corpus =
        ParallelCorpus::load(&[("src", args.src.as_path()), ("tgt", args.tgt.as_path())])?;
    if corpus.is_empty() {
        bail!("source corpus is empty: {}", args.src.display());
    }

    let mut resampler = Resampler::new(corpus.len(), args.resample.ratio, seed)?;
    info!(
        lines = corpus.len(),
        sample_size = resampler.sample_size(),
        "resampling source and reference"
    );

    let scores = collect_scores(
        &corpus,
        &mut resampler,
        toolchain,
        &args.model,
        args.resample.trials,
        scratch,
    )?;

    let (lower, upper) =
        percentile_interval_95(&scores).context("no scores collected for interval")?;
    write_text(&args.out, &format_interval(lower, upper))?;
    info!(
        path = %args.out.display(),
        lower,
        upper,
        "wrote 95% confidence interval"
    );

    if let Some(report_path) = &args.report_path {
        let report = IntervalReport {
            manifest_version: MANIFEST_VERSION,
            run_id,
            mode: "interval".to_string(),
            started_at,
            finished_at: now_utc_string(),
            model: args.model.clone(),
            settings: run_settings(&args.resample, &args.tools, resampler.sample_size(), seed),
            inputs: describe_inputs(&corpus)?,
            scores,
            lower,
            upper,
        };
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote run report");
    }

    Ok(())
}

/// Runs `trials` rounds of resample, translate, score over a (source,
/// reference) corpus and returns the per-trial scores in trial order.
pub fn collect_scores(
    corpus: &ParallelCorpus,
    resampler: &mut Resampler,
    toolchain: &mut dyn Toolchain,
    model: &str,
    trials: usize,
    scratch: &ScratchFiles,
) -> Result<Vec<f64>> {
    let input_path = scratch.input();
    let reference_path = scratch.reference();
    let pred_path = scratch.pred();

    let started = Instant::now();
    let mut scores = Vec::with_capacity(trials);
    for trial in 0..trials {
        let sample = corpus.select(resampler.next_sample());
        write_lines(&input_path, &sample[0])?;
        write_lines(&reference_path, &sample[1])?;

        toolchain
            .translate(model, &input_path, &pred_path)
            .with_context(|| format!("trial {} translation failed", trial + 1))?;
        let score = toolchain
            .score(&reference_path, &pred_path)
            .with_context(|| format!("trial {} scoring failed", trial + 1))?;

        info!(
            trial = trial + 1,
            trials,
            score,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "trial complete"
        );
        scores.push(score);
    }

    Ok(scores)
}

pub fn format_interval(lower: f64, upper: f64) -> String {
    format!("[{},{}]", format_float(lower), format_float(upper))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::{collect_scores, format_interval, run_with};
    use crate::cli::{IntervalArgs, ResampleArgs, ToolArgs};
    use crate::commands::ScratchFiles;
    use crate::commands::testing::{FakeToolchain, scratch_dir};
    use crate::corpus::{Column, CorpusError, ParallelCorpus};
    use crate::resample::{ResampleError, Resampler};
    use crate::stats::percentile_interval_95;

    fn write_numbered(path: &Path, prefix: &str, rows: usize) {
        let text: String = (0..rows).map(|row| format!("{prefix}-{row}\n")).collect();
        fs::write(path, text).expect("corpus file written");
    }

    fn interval_args(dir: &Path, trials: usize, ratio: f64) -> IntervalArgs {
        IntervalArgs {
            src: dir.join("src.txt"),
            tgt: dir.join("tgt.txt"),
            model: "model.t7".to_string(),
            concat: false,
            context_type: "contextBiEncoder".to_string(),
            gpuid: "1".to_string(),
            resample: ResampleArgs {
                trials,
                ratio,
                seed: Some(42),
            },
            tools: ToolArgs {
                translator: "th translate.lua".to_string(),
                translator_args: Vec::new(),
                scorer: "perl multi-bleu.perl".to_string(),
                scorer_args: Vec::new(),
                batch_size: 400,
                metric: "BLEU".to_string(),
                work_dir: dir.join("work"),
            },
            out: dir.join("interval.txt"),
            report_path: Some(dir.join("report.json")),
        }
    }

    fn corpus(rows: usize) -> ParallelCorpus {
        let column = |name: &str, prefix: &str| Column {
            name: name.to_string(),
            path: None,
            lines: (0..rows).map(|row| format!("{prefix}-{row}")).collect(),
        };
        ParallelCorpus::new(vec![column("src", "s"), column("tgt", "t")]).expect("aligned corpus")
    }

    #[test]
    fn format_interval_writes_bracketed_pair() {
        assert_eq!(format_interval(10.0, 16.0), "[10.0,16.0]");
        assert_eq!(format_interval(24.51, 27.3), "[24.51,27.3]");
    }

    #[test]
    fn collect_scores_runs_every_trial_on_aligned_samples() {
        let dir = scratch_dir("interval_collect");
        let scratch = ScratchFiles::create(&dir).expect("scratch files");
        let corpus = corpus(10);
        let mut resampler = Resampler::new(corpus.len(), 0.5, 11).expect("valid ratio");
        let mut toolchain = FakeToolchain::default();

        let scores = collect_scores(
            &corpus,
            &mut resampler,
            &mut toolchain,
            "model.t7",
            40,
            &scratch,
        )
        .expect("trials should succeed");
        let _ = fs::remove_dir_all(&dir);

        assert_eq!(scores.len(), 40);
        assert_eq!(toolchain.translations.len(), 40);
        assert!(toolchain.translations.iter().all(|model| model == "model.t7"));
        assert!(toolchain.sample_sizes.iter().all(|&size| size == 5));
        // Mean row id of five distinct rows out of 0..10 lies in [2, 7].
        assert!(scores.iter().all(|&score| (2.0..=7.0).contains(&score)));

        let (lower, upper) = percentile_interval_95(&scores).expect("scores present");
        assert!(lower <= upper);
    }

    #[test]
    fn collect_scores_is_reproducible_for_a_fixed_seed() {
        let dir = scratch_dir("interval_seed");
        let scratch = ScratchFiles::create(&dir).expect("scratch files");
        let corpus = corpus(20);

        let mut first = Vec::new();
        let mut second = Vec::new();
        for scores in [&mut first, &mut second] {
            let mut resampler = Resampler::new(corpus.len(), 0.5, 2024).expect("valid ratio");
            *scores = collect_scores(
                &corpus,
                &mut resampler,
                &mut FakeToolchain::default(),
                "model.t7",
                15,
                &scratch,
            )
            .expect("trials should succeed");
        }
        let _ = fs::remove_dir_all(&dir);

        assert_eq!(first, second);
    }

    #[test]
    fn full_ratio_always_scores_the_whole_corpus() {
        let dir = scratch_dir("interval_full");
        let scratch = ScratchFiles::create(&dir).expect("scratch files");
        let corpus = corpus(4);
        let mut resampler = Resampler::new(corpus.len(), 1.0, 3).expect("valid ratio");

        let scores = collect_scores(
            &corpus,
            &mut resampler,
            &mut FakeToolchain::default(),
            "model.t7",
            4,
            &scratch,
        )
        .expect("trials should succeed");
        let _ = fs::remove_dir_all(&dir);

        assert_eq!(scores, vec![1.5; 4]);
        assert_eq!(percentile_interval_95(&scores), Some((1.5, 1.5)));
    }

    #[test]
    fn run_with_writes_interval_file_and_report() {
        let dir = scratch_dir("interval_run");
        write_numbered(&dir.join("src.txt"), "s", 4);
        write_numbered(&dir.join("tgt.txt"), "t", 4);
        let args = interval_args(&dir, 4, 1.0);
        let scratch = ScratchFiles::create(&args.tools.work_dir).expect("scratch files");
        let mut toolchain = FakeToolchain::default();

        run_with(&args, &scratch, &mut toolchain).expect("interval run should succeed");
        let out = fs::read_to_string(&args.out).expect("interval written");
        let report: serde_json::Value = serde_json::from_slice(
            &fs::read(dir.join("report.json")).expect("report written"),
        )
        .expect("report is json");
        let _ = fs::remove_dir_all(&dir);

        assert_eq!(out, "[1.5,1.5]");
        assert_eq!(toolchain.translations.len(), 4);
        assert_eq!(report["mode"], "interval");
        assert_eq!(report["settings"]["seed"], 42);
        assert_eq!(report["settings"]["sample_size"], 4);
        assert_eq!(report["scores"].as_array().map(Vec::len), Some(4));
        assert_eq!(report["lower"], 1.5);
        assert_eq!(report["inputs"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn run_with_rejects_zero_trials() {
        let dir = scratch_dir("interval_zero");
        write_numbered(&dir.join("src.txt"), "s", 4);
        write_numbered(&dir.join("tgt.txt"), "t", 4);
        let args = interval_args(&dir, 0, 0.5);
        let scratch = ScratchFiles::create(&args.tools.work_dir).expect("scratch files");
        let mut toolchain = FakeToolchain::default();

        let error =
            run_with(&args, &scratch, &mut toolchain).expect_err("zero trials must fail");
        let out_exists = args.out.exists();
        let _ = fs::remove_dir_all(&dir);

        assert!(error.to_string().contains("at least one trial"));
        assert!(!out_exists);
        assert!(toolchain.translations.is_empty());
    }

    #[test]
    fn run_with_fails_fast_on_mismatched_files() {
        let dir = scratch_dir("interval_mismatch");
        write_numbered(&dir.join("src.txt"), "s", 5);
        write_numbered(&dir.join("tgt.txt"), "t", 4);
        let args = interval_args(&dir, 3, 0.5);
        let scratch = ScratchFiles::create(&args.tools.work_dir).expect("scratch files");
        let mut toolchain = FakeToolchain::default();

        let error =
            run_with(&args, &scratch, &mut toolchain).expect_err("mismatch must fail");
        let _ = fs::remove_dir_all(&dir);

        assert!(matches!(
            error.downcast_ref::<CorpusError>(),
            Some(CorpusError::LengthMismatch {
                expected: 5,
                found: 4,
                ..
            })
        ));
        assert!(toolchain.translations.is_empty());
    }

    #[test]
    fn run_with_rejects_invalid_ratio() {
        let dir = scratch_dir("interval_ratio");
        let args = interval_args(&dir, 3, 1.5);
        let scratch = ScratchFiles::create(&args.tools.work_dir).expect("scratch files");

        let error = run_with(&args, &scratch, &mut FakeToolchain::default())
            .expect_err("ratio above one must fail");
        let _ = fs::remove_dir_all(&dir);

        assert_eq!(
            error.downcast_ref::<ResampleError>(),
            Some(&ResampleError::InvalidRatio(1.5))
        );
    }
}
