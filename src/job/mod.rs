// src/job/mod.rs

//! The job engine: discovery, group-sequential execution, and the
//! SIGCHLD-driven reap loop.
//!
//! A job is an ordered sequence of step groups. Groups run strictly in
//! order; the members of a group run concurrently as independent child
//! processes. The engine learns about terminations from a SIGCHLD stream
//! combined with a short poll tick, because the kernel coalesces signals
//! for simultaneous exits and polling alone would miss fine-grained
//! resource samples.

pub mod discover;
pub mod group;
pub mod step;

use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tracing::{debug, info, warn};

use crate::render;
use crate::store::{JobId, JobRecord, JobStore, StepRecord};

pub use discover::{FlagMap, StepSource, discover};
pub use group::{RunStatus, StepGroup};
pub use step::{Step, StepStatus};

/// How long the reap loop sleeps between poll ticks.
const POLL_TICK: Duration = Duration::from_millis(5);

/// How often the status table is re-rendered while running.
const RENDER_INTERVAL: Duration = Duration::from_secs(5);

/// Per-run context: identity and presentation facts captured once at
/// startup and passed to whoever needs them (no process-wide globals).
#[derive(Debug, Clone)]
pub struct RunContext {
    pub hostname: String,
    pub username: String,
    /// The invoking command line, for plan hints and reports.
    pub argv: Vec<String>,
    pub quiet: bool,
}

impl RunContext {
    pub fn capture(quiet: bool) -> Self {
        Self {
            hostname: hostname(),
            username: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
            argv: std::env::args().collect(),
            quiet,
        }
    }
}

/// System hostname from procfs, `"unknown"` when unreadable.
pub fn hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// A job: named, sourced from a directory or a single command, executed
/// as an ordered sequence of concurrent step groups.
#[derive(Debug)]
pub struct Job {
    pub name: String,
    pub source: StepSource,
    pub flags: FlagMap,
    pub groups: Vec<StepGroup>,
    /// Set once the run finishes (or fails fast).
    pub status: Option<RunStatus>,
    pub duration_ms: u64,
    /// Assigned by the store when the job is persisted.
    pub job_id: Option<JobId>,
}

impl Job {
    pub fn new(name: String, source: StepSource, flags: FlagMap) -> Self {
        Self {
            name,
            source,
            flags,
            groups: Vec::new(),
            status: None,
            duration_ms: 0,
            job_id: None,
        }
    }

    /// Populate `groups` from the source. Safe to call again; the result
    /// only depends on the source contents.
    pub fn discover(&mut self) -> Result<()> {
        self.groups = discover(&self.source, &self.flags)?;
        Ok(())
    }

    /// Run the job to completion or first failing group.
    ///
    /// Persists the job and all steps before anything is spawned, then
    /// executes group after group. A failing group stops the run; later
    /// groups are never spawned.
    pub async fn run(&mut self, store: &mut dyn JobStore, ctx: &RunContext) -> Result<RunStatus> {
        if self.groups.is_empty() {
            self.discover()?;
        }
        self.persist(store, ctx)?;

        info!(job = %self.name, groups = self.groups.len(), "job starting");
        let t0 = Instant::now();
        let mut status = RunStatus::Ok;

        for group_idx in 0..self.groups.len() {
            self.run_group(group_idx, store, ctx).await?;
            if self.groups[group_idx].status() == RunStatus::Error {
                warn!(job = %self.name, group = group_idx + 1, "group failed, stopping job");
                status = RunStatus::Error;
                break;
            }
        }

        self.duration_ms = t0.elapsed().as_millis() as u64;
        self.status = Some(status);

        let job_id = self.job_id.context("job not persisted")?;
        store.job_finished(job_id, status, self.duration_ms)?;

        info!(
            job = %self.name,
            status = status.as_str(),
            duration_ms = self.duration_ms,
            "job finished"
        );
        Ok(status)
    }

    /// All failed steps across groups, in id order.
    pub fn failed_steps(&self) -> Vec<&Step> {
        self.groups.iter().flat_map(|g| g.failed_steps()).collect()
    }

    fn persist(&mut self, store: &mut dyn JobStore, ctx: &RunContext) -> Result<()> {
        let job_id = store.create_job(&JobRecord {
            name: self.name.clone(),
            hostname: ctx.hostname.clone(),
            username: ctx.username.clone(),
            started: SystemTime::now(),
            status: "running",
        })?;
        self.job_id = Some(job_id);

        for group in &self.groups {
            for step in &group.steps {
                store.create_step(
                    job_id,
                    &StepRecord {
                        id: step.id,
                        number: step.number,
                        name: step.name.clone(),
                        status: step.status,
                        flags: step.flags.clone(),
                    },
                )?;
            }
        }
        Ok(())
    }

    /// Spawn every member of a group, then block until all of them are
    /// terminal, reaping children and sampling resources as they run.
    async fn run_group(
        &mut self,
        group_idx: usize,
        store: &mut dyn JobStore,
        ctx: &RunContext,
    ) -> Result<()> {
        let job_id = self.job_id.context("job not persisted")?;

        debug!(
            group = group_idx + 1,
            members = self.groups[group_idx].steps.len(),
            "starting step group"
        );
        for step in &mut self.groups[group_idx].steps {
            step.spawn(job_id, store)?;
        }

        let mut sigchld =
            signal(SignalKind::child()).context("registering SIGCHLD handler")?;
        let mut last_render = Instant::now();

        loop {
            self.reap_group(group_idx, job_id, store)?;
            if self.groups[group_idx].all_terminal() {
                break;
            }

            for step in &mut self.groups[group_idx].steps {
                step.poll_sample(false);
            }

            if !ctx.quiet && last_render.elapsed() >= RENDER_INTERVAL {
                render::print_status(self);
                last_render = Instant::now();
            }

            // Wake on child state change or after one poll tick, whichever
            // comes first. Coalesced SIGCHLDs are harmless: the reap pass
            // above always sweeps every running member.
            tokio::select! {
                _ = sigchld.recv() => {}
                _ = tokio::time::sleep(POLL_TICK) => {}
            }
        }

        Ok(())
    }

    /// One non-blocking reap pass over a group: every running member is
    /// checked for an exit, and each exited child is handed to its step.
    fn reap_group(
        &mut self,
        group_idx: usize,
        job_id: JobId,
        store: &mut dyn JobStore,
    ) -> Result<()> {
        for step in &mut self.groups[group_idx].steps {
            if step.status != StepStatus::Running {
                continue;
            }
            if let Some(exit) = step.try_wait()? {
                step.on_terminated(exit, job_id, store)?;
            }
        }
        Ok(())
    }
}
