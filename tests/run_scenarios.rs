use std::error::Error;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use steprun::job::{FlagMap, Job, RunContext, RunStatus, StepSource, StepStatus};
use steprun::metrics::{ResourceMonitor, sampler, sampler::CpuMemUsage};
use steprun::store::MemoryStore;
use tempfile::TempDir;

type TestResult = Result<(), Box<dyn Error>>;

fn write_script(dir: &Path, name: &str, body: &str) -> Result<(), Box<dyn Error>> {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n"))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

fn job_for(dir: &TempDir) -> Job {
    Job::new(
        "test-job".to_string(),
        StepSource::Dir(dir.path().to_path_buf()),
        FlagMap::new(),
    )
}

fn quiet_ctx() -> RunContext {
    RunContext::capture(true)
}

#[tokio::test]
async fn failing_group_stops_the_job() -> TestResult {
    let dir = TempDir::new()?;
    write_script(dir.path(), "001_ok.sh", "echo fine")?;
    write_script(dir.path(), "002_fail.sh", "echo boom >&2; exit 1")?;
    let marker = dir.path().join("ran_003");
    write_script(
        dir.path(),
        "003_never.sh",
        &format!("touch {}", marker.display()),
    )?;

    let mut job = job_for(&dir);
    let mut store = MemoryStore::default();
    let status = job.run(&mut store, &quiet_ctx()).await?;

    assert_eq!(status, RunStatus::Error);
    assert_eq!(job.groups[0].status(), RunStatus::Ok);
    assert_eq!(job.groups[1].status(), RunStatus::Error);

    // Group 3 was never spawned.
    assert_eq!(job.groups[2].steps[0].status, StepStatus::Pending);
    assert!(!marker.exists());

    // The failing step kept its exit code and captured stderr.
    let failed = &job.groups[1].steps[0];
    assert_eq!(failed.exit_code, Some(1));
    assert!(failed.log.as_deref().unwrap_or("").contains("boom"));

    // The job row was created first, with its initial status.
    assert_eq!(store.jobs.len(), 1);
    assert_eq!(store.jobs[0].1.status, "running");

    // All three steps were persisted before any ran; only two finished.
    assert_eq!(store.steps.len(), 3);
    assert_eq!(store.started.len(), 2);
    assert_eq!(store.finished.len(), 2);
    assert_eq!(store.job_results.len(), 1);
    assert_eq!(store.job_results[0].1, RunStatus::Error);

    Ok(())
}

#[tokio::test]
async fn same_prefix_steps_run_concurrently() -> TestResult {
    let dir = TempDir::new()?;
    write_script(dir.path(), "001_a.sh", "sleep 0.4")?;
    write_script(dir.path(), "001_b.sh", "sleep 0.4")?;

    let mut job = job_for(&dir);
    let mut store = MemoryStore::default();
    let status = job.run(&mut store, &quiet_ctx()).await?;

    assert_eq!(status, RunStatus::Ok);
    assert_eq!(job.groups.len(), 1);
    assert_eq!(job.groups[0].steps.len(), 2);

    for step in &job.groups[0].steps {
        assert_eq!(step.status, StepStatus::Ok);
        assert!(step.started_at.is_some());
        assert!(step.duration_ms.unwrap_or(0) >= 300);
        assert!(step.pid.is_some());
    }
    assert_ne!(job.groups[0].steps[0].pid, job.groups[0].steps[1].pid);

    // Two 400 ms sleeps in well under 800 ms: they overlapped.
    assert!(job.duration_ms < 800, "job took {} ms", job.duration_ms);

    Ok(())
}

#[tokio::test]
async fn nonzero_exit_codes_are_preserved() -> TestResult {
    let dir = TempDir::new()?;
    write_script(dir.path(), "001_odd.sh", "exit 7")?;

    let mut job = job_for(&dir);
    let mut store = MemoryStore::default();
    let status = job.run(&mut store, &quiet_ctx()).await?;

    assert_eq!(status, RunStatus::Error);
    let step = &job.groups[0].steps[0];
    assert_eq!(step.status, StepStatus::Error);
    assert_eq!(step.exit_code, Some(7));
    assert_eq!(store.finished[0].2, StepStatus::Error);

    Ok(())
}

#[tokio::test]
async fn step_output_is_captured_in_order() -> TestResult {
    let dir = TempDir::new()?;
    write_script(dir.path(), "001_out.sh", "echo first; echo second >&2; echo third")?;

    let mut job = job_for(&dir);
    let mut store = MemoryStore::default();
    job.run(&mut store, &quiet_ctx()).await?;

    let log = job.groups[0].steps[0].log.clone().unwrap_or_default();
    assert!(log.contains("first"));
    assert!(log.contains("second"));
    assert!(log.contains("third"));

    // The same log reached the store.
    assert_eq!(store.finished[0].4, log);

    Ok(())
}

#[tokio::test]
async fn unspawnable_step_is_fatal() -> TestResult {
    let mut job = Job::new(
        "broken".to_string(),
        StepSource::Exec("/nonexistent/step_binary".to_string()),
        FlagMap::new(),
    );

    let mut store = MemoryStore::default();
    let err = job.run(&mut store, &quiet_ctx()).await.unwrap_err();
    assert!(err.to_string().contains("spawning step"));

    Ok(())
}

#[test]
fn sampling_a_vanished_process_records_nothing() {
    let mut monitor = ResourceMonitor::new();
    // A pid far beyond any real pid range; /proc has no entry for it.
    monitor.sample(3_999_999_999, 500, true);

    // Only the origin seeds remain; no error surfaced.
    assert_eq!(monitor.cpu.len(), 1);
    assert_eq!(monitor.rss.len(), 1);
    assert_eq!(monitor.cpu_ms, 0);
}

#[test]
fn unreadable_io_counters_keep_the_cpu_half_of_a_tick() {
    let mut monitor = ResourceMonitor::new();
    monitor.record(
        300,
        Ok(CpuMemUsage {
            cpu_ms: 40,
            rss_bytes: 8_192,
        }),
        Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        )),
    );

    // CPU/RSS recorded despite the io failure.
    assert_eq!(monitor.cpu.len(), 2);
    assert_eq!(monitor.rss.len(), 2);
    assert_eq!(monitor.cpu_ms, 40);
    assert_eq!(monitor.rss_bytes, 8_192);

    // The io half of the tick was skipped.
    assert_eq!(monitor.reads.len(), 1);
    assert_eq!(monitor.writes.len(), 1);
    assert_eq!(monitor.bytes_read, 0);
    assert_eq!(monitor.bytes_written, 0);
}

#[test]
fn sampling_a_live_process_fills_the_series() {
    let mut monitor = ResourceMonitor::new();
    monitor.sample(std::process::id(), 200, true);

    assert_eq!(monitor.cpu.len(), 2);
    assert!(monitor.rss_bytes > 0);
}

#[test]
fn cadence_widens_with_step_age() {
    assert_eq!(sampler::cadence_ms(0), 100);
    assert_eq!(sampler::cadence_ms(10_000), 100);
    assert_eq!(sampler::cadence_ms(10_001), 1_000);
    assert_eq!(sampler::cadence_ms(600_000), 1_000);
    assert_eq!(sampler::cadence_ms(600_001), 10_000);

    let monitor = ResourceMonitor::new();
    assert!(!monitor.due(99));
    assert!(monitor.due(100));
}
