// src/job/step.rs

//! A single executable step of a job.
//!
//! Lifecycle is strictly pending → running → {ok | error}. A step is
//! spawned once, sampled while running, and terminated exactly once by
//! the reap loop; the captured log and duration are set at termination
//! and never rewritten.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Instant, SystemTime};

use anyhow::{Context, Result, ensure};
use tempfile::NamedTempFile;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::metrics::ResourceMonitor;
use crate::store::{JobId, JobStore};

/// Step lifecycle state. `Ok` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Ok,
    Error,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Ok | StepStatus::Error)
    }

    /// Uppercase form for tables and reports.
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Pending => "PENDING",
            StepStatus::Running => "RUNNING",
            StepStatus::Ok => "OK",
            StepStatus::Error => "ERROR",
        }
    }
}

/// One executable unit of a job, backed by one child process.
#[derive(Debug)]
pub struct Step {
    /// Sequential id in discovery order, starting at 1 across the whole job.
    pub id: u32,
    /// Position number parsed from the leading numeric prefix; steps with
    /// the same number form one concurrent group.
    pub number: u32,
    /// Display name: file name without its extension (prefix kept).
    pub name: String,
    pub path: PathBuf,
    pub flags: Vec<String>,

    pub status: StepStatus,
    pub started_at: Option<SystemTime>,
    pub duration_ms: Option<u64>,
    /// Recorded once at spawn; kept for display and store records only.
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    /// Combined stdout+stderr, available only after termination.
    pub log: Option<String>,

    pub monitor: ResourceMonitor,

    started: Option<Instant>,
    child: Option<Child>,
    log_file: Option<NamedTempFile>,
}

impl Step {
    pub fn new(id: u32, number: u32, path: PathBuf, name: String, flags: Vec<String>) -> Self {
        Self {
            id,
            number,
            name,
            path,
            flags,
            status: StepStatus::Pending,
            started_at: None,
            duration_ms: None,
            pid: None,
            exit_code: None,
            log: None,
            monitor: ResourceMonitor::new(),
            started: None,
            child: None,
            log_file: None,
        }
    }

    /// Spawn the step's child process.
    ///
    /// The child's stdout and stderr both go into a private temp file,
    /// read back at termination. A spawn failure is fatal to the run and
    /// propagates to the caller.
    pub fn spawn(&mut self, job_id: JobId, store: &mut dyn JobStore) -> Result<()> {
        ensure!(
            self.status == StepStatus::Pending,
            "step '{}' spawned twice",
            self.name
        );

        let log_file = NamedTempFile::new()
            .with_context(|| format!("creating log file for step '{}'", self.name))?;
        let stdout = log_file
            .as_file()
            .try_clone()
            .context("cloning log handle for stdout")?;
        let stderr = log_file
            .as_file()
            .try_clone()
            .context("cloning log handle for stderr")?;

        let child = Command::new(&self.path)
            .args(&self.flags)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning step '{}' ({:?})", self.name, self.path))?;

        self.pid = child.id();
        self.status = StepStatus::Running;
        self.started = Some(Instant::now());
        self.started_at = Some(SystemTime::now());
        self.child = Some(child);
        self.log_file = Some(log_file);

        info!(step = %self.name, pid = ?self.pid, "step started");
        if let Some(started_at) = self.started_at {
            store.step_started(job_id, self.id, started_at)?;
        }
        Ok(())
    }

    /// Milliseconds since spawn; 0 before spawn.
    pub fn elapsed_ms(&self) -> u64 {
        self.started
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    /// Refresh duration and take a resource sample if one is due.
    ///
    /// No-op unless the step is running. Called from the reap loop on
    /// every poll tick, and with `forced = true` when termination is
    /// handled (the process is usually gone by then, in which case the
    /// sampler skips silently).
    pub fn poll_sample(&mut self, forced: bool) {
        if self.status != StepStatus::Running {
            return;
        }
        let elapsed = self.elapsed_ms();
        self.duration_ms = Some(elapsed);
        if let Some(pid) = self.pid {
            self.monitor.sample(pid, elapsed, forced);
        }
    }

    /// Non-blocking check whether the child has exited.
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => child
                .try_wait()
                .with_context(|| format!("waiting for step '{}'", self.name)),
            None => Ok(None),
        }
    }

    /// Handle the child's termination. Must be called exactly once, while
    /// the step is running.
    pub fn on_terminated(
        &mut self,
        exit: ExitStatus,
        job_id: JobId,
        store: &mut dyn JobStore,
    ) -> Result<()> {
        ensure!(
            self.status == StepStatus::Running,
            "step '{}' terminated while not running",
            self.name
        );

        // Final sample; the pid is usually unreadable by now and the
        // sampler skips it, but this keeps the series current for steps
        // that outlived the last cadence window.
        self.poll_sample(true);

        let code = exit.code().unwrap_or(-1);
        self.exit_code = Some(code);
        self.status = if exit.success() {
            StepStatus::Ok
        } else {
            StepStatus::Error
        };
        self.duration_ms = Some(self.elapsed_ms());
        self.child = None;

        self.log = Some(self.read_log()?);

        match self.status {
            StepStatus::Ok => debug!(step = %self.name, "step succeeded"),
            _ => warn!(step = %self.name, exit_code = code, "step failed"),
        }

        store.step_finished(
            job_id,
            self.id,
            self.status,
            self.duration_ms.unwrap_or(0),
            self.log.as_deref().unwrap_or(""),
        )?;
        Ok(())
    }

    /// Fractional cores in use: rate over the last sampling interval while
    /// running, average over the whole run once terminal.
    pub fn current_cpu_usage(&self) -> f64 {
        if self.status == StepStatus::Running {
            self.monitor.cpu.current_rate()
        } else {
            self.monitor.cpu.total_rate()
        }
    }

    /// Duration in seconds for display; 0.0 before spawn.
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms.unwrap_or(0) as f64 / 1_000.0
    }

    fn read_log(&mut self) -> Result<String> {
        use std::io::Read;

        let Some(log_file) = self.log_file.take() else {
            return Ok(String::new());
        };
        let mut contents = String::new();
        log_file
            .reopen()
            .and_then(|mut f| f.read_to_string(&mut contents))
            .with_context(|| format!("reading log of step '{}'", self.name))?;
        Ok(contents)
    }
}
