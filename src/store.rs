// src/store.rs

//! Persistent-store collaborator interface.
//!
//! The engine records jobs and steps at their lifecycle transitions:
//! job creation (pre-run), one row per discovered step (before any step
//! runs), step start, step completion, and the final job outcome. The
//! actual storage backend is out of scope here; the engine only depends
//! on this trait and treats a store error as fatal to the run.

use std::time::SystemTime;

use anyhow::Result;

use crate::job::{RunStatus, StepStatus};

/// Identifier assigned by the store when a job is created.
pub type JobId = i64;

/// Job row as created at the start of a run.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub name: String,
    pub hostname: String,
    pub username: String,
    pub started: SystemTime,
    /// Initial status; always `"running"` at creation time, replaced by
    /// the terminal status via `job_finished`.
    pub status: &'static str,
}

/// Step row as created before any step runs.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub id: u32,
    pub number: u32,
    pub name: String,
    pub status: StepStatus,
    pub flags: Vec<String>,
}

/// Store interface covering the five call shapes the engine needs.
pub trait JobStore {
    /// Create the job row and return its identifier.
    fn create_job(&mut self, job: &JobRecord) -> Result<JobId>;

    /// Create a step row under `job_id`.
    fn create_step(&mut self, job_id: JobId, step: &StepRecord) -> Result<()>;

    /// Mark a step as running with its start time.
    fn step_started(&mut self, job_id: JobId, step_id: u32, started: SystemTime) -> Result<()>;

    /// Record a step's terminal status, duration and captured log.
    fn step_finished(
        &mut self,
        job_id: JobId,
        step_id: u32,
        status: StepStatus,
        duration_ms: u64,
        log: &str,
    ) -> Result<()>;

    /// Record the job's terminal status and duration.
    fn job_finished(&mut self, job_id: JobId, status: RunStatus, duration_ms: u64) -> Result<()>;
}

/// Store used when persistence is not configured; accepts everything.
#[derive(Debug, Default)]
pub struct NullStore {
    jobs_created: JobId,
}

impl JobStore for NullStore {
    fn create_job(&mut self, _job: &JobRecord) -> Result<JobId> {
        self.jobs_created += 1;
        Ok(self.jobs_created)
    }

    fn create_step(&mut self, _job_id: JobId, _step: &StepRecord) -> Result<()> {
        Ok(())
    }

    fn step_started(&mut self, _job_id: JobId, _step_id: u32, _started: SystemTime) -> Result<()> {
        Ok(())
    }

    fn step_finished(
        &mut self,
        _job_id: JobId,
        _step_id: u32,
        _status: StepStatus,
        _duration_ms: u64,
        _log: &str,
    ) -> Result<()> {
        Ok(())
    }

    fn job_finished(&mut self, _job_id: JobId, _status: RunStatus, _duration_ms: u64) -> Result<()> {
        Ok(())
    }
}

/// In-memory store that records every call, for tests and dry inspection.
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: JobId,
    pub jobs: Vec<(JobId, JobRecord)>,
    pub steps: Vec<(JobId, StepRecord)>,
    pub started: Vec<(JobId, u32, SystemTime)>,
    pub finished: Vec<(JobId, u32, StepStatus, u64, String)>,
    pub job_results: Vec<(JobId, RunStatus, u64)>,
}

impl JobStore for MemoryStore {
    fn create_job(&mut self, job: &JobRecord) -> Result<JobId> {
        self.next_id += 1;
        self.jobs.push((self.next_id, job.clone()));
        Ok(self.next_id)
    }

    fn create_step(&mut self, job_id: JobId, step: &StepRecord) -> Result<()> {
        self.steps.push((job_id, step.clone()));
        Ok(())
    }

    fn step_started(&mut self, job_id: JobId, step_id: u32, started: SystemTime) -> Result<()> {
        self.started.push((job_id, step_id, started));
        Ok(())
    }

    fn step_finished(
        &mut self,
        job_id: JobId,
        step_id: u32,
        status: StepStatus,
        duration_ms: u64,
        log: &str,
    ) -> Result<()> {
        self.finished
            .push((job_id, step_id, status, duration_ms, log.to_string()));
        Ok(())
    }

    fn job_finished(&mut self, job_id: JobId, status: RunStatus, duration_ms: u64) -> Result<()> {
        self.job_results.push((job_id, status, duration_ms));
        Ok(())
    }
}
