// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod render;
pub mod store;

use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;

use crate::cli::CliArgs;
use crate::job::{FlagMap, Job, RunContext, RunStatus, StepSource};
use crate::notify::{Notifier, StdoutNotifier};
use crate::render::LINE;
use crate::store::{JobStore, NullStore};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - CLI arguments
/// - the optional flag-override file
/// - the job engine (discovery + execution)
/// - the store and notifier collaborators
pub async fn run(args: CliArgs) -> Result<ExitCode> {
    let source = step_source(&args);
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| default_name(&source));

    let flag_map: FlagMap = match &args.flags {
        Some(path) => config::load_and_validate(path)?.flags,
        None => FlagMap::new(),
    };

    let mut job = Job::new(name, source, flag_map);

    if !args.run {
        return show_plan(&mut job);
    }

    // An email target implies quiet: progress goes to the report, not
    // the console.
    let quiet = args.quiet || args.email.is_some() || args.email_error.is_some();
    let ctx = RunContext::capture(quiet);

    let mut store = NullStore::default();
    let notifier = StdoutNotifier;
    run_job(&mut job, &mut store, &notifier, &ctx, &args).await
}

/// Run a job against explicit collaborators and report its outcome.
///
/// Split out from [`run`] so callers (and tests) can supply their own
/// store and notifier implementations.
pub async fn run_job(
    job: &mut Job,
    store: &mut dyn JobStore,
    notifier: &dyn Notifier,
    ctx: &RunContext,
    args: &CliArgs,
) -> Result<ExitCode> {
    job.discover()?;
    if !ctx.quiet {
        render::print_status(job);
    }

    let status = job.run(store, ctx).await?;

    if status == RunStatus::Ok && args.email_error.is_some() {
        // Failure-only reporting configured; success stays silent.
    } else if args.email.is_some() || args.email_error.is_some() {
        let recipient = args
            .email
            .as_deref()
            .or(args.email_error.as_deref())
            .unwrap_or_default();
        notifier.send(
            &render::report_subject(job),
            &render::report_body(job, ctx),
            recipient,
        )?;
    } else {
        render::print_status(job);
        if status == RunStatus::Ok {
            println!("Job {} completed successfully", job.name);
        } else {
            for step in job.failed_steps() {
                println!("Job {} failed at step {}", job.name, step.name);
                println!("\n{LINE}");
                println!("{}", step.log.as_deref().unwrap_or(""));
                println!("{LINE}");
            }
        }
    }

    Ok(match status {
        RunStatus::Ok => ExitCode::SUCCESS,
        RunStatus::Error => ExitCode::FAILURE,
    })
}

/// Show the steps that would run, without executing or persisting anything.
fn show_plan(job: &mut Job) -> Result<ExitCode> {
    job.discover()?;
    render::print_status(job);

    let argv: Vec<String> = std::env::args().collect();
    let program = argv.first().map(String::as_str).unwrap_or("steprun");
    let rest = argv.get(1..).unwrap_or(&[]).join(" ");
    println!("Showing plan only; add flag --run to really run job:");
    println!("  {program} --run {rest}");
    Ok(ExitCode::SUCCESS)
}

/// Build the step source from the CLI arguments.
///
/// `clap` enforces that exactly one of `--dir` / `--exec` is present, so
/// the both/neither configuration error is unrepresentable past parsing.
fn step_source(args: &CliArgs) -> StepSource {
    match (&args.dir, &args.exec) {
        (Some(dir), _) => StepSource::Dir(dir.clone()),
        (None, Some(cmd)) => StepSource::Exec(cmd.clone()),
        (None, None) => unreachable!("clap requires a source argument"),
    }
}

/// Default job name: the source directory's name, or the command's stem.
fn default_name(source: &StepSource) -> String {
    match source {
        StepSource::Dir(dir) => dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string()),
        StepSource::Exec(cmd) => cmd
            .split_whitespace()
            .next()
            .map(|p| {
                Path::new(p)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| p.to_string())
            })
            .unwrap_or_else(|| "job".to_string()),
    }
}
