use std::error::Error;
use std::path::PathBuf;

use steprun::job::{FlagMap, Job, RunContext, RunStatus, Step, StepGroup, StepSource, StepStatus};
use steprun::render::{self, MAX_REPORT_LOG_BYTES};

type TestResult = Result<(), Box<dyn Error>>;

fn finished_job(failed_log: &str) -> Job {
    let mut ok_step = Step::new(1, 1, PathBuf::from("/steps/001_ok.sh"), "001_ok".into(), vec![]);
    ok_step.status = StepStatus::Ok;
    ok_step.duration_ms = Some(1_500);

    let mut bad_step = Step::new(
        2,
        2,
        PathBuf::from("/steps/002_bad.sh"),
        "002_bad".into(),
        vec!["--retries=0".into()],
    );
    bad_step.status = StepStatus::Error;
    bad_step.exit_code = Some(1);
    bad_step.duration_ms = Some(250);
    bad_step.log = Some(failed_log.to_string());

    let mut job = Job::new(
        "nightly".to_string(),
        StepSource::Dir(PathBuf::from("/steps")),
        FlagMap::new(),
    );
    job.groups = vec![StepGroup::new(vec![ok_step]), StepGroup::new(vec![bad_step])];
    job.status = Some(RunStatus::Error);
    job.duration_ms = 1_750;
    job.job_id = Some(12);
    job
}

fn ctx() -> RunContext {
    RunContext {
        hostname: "buildhost".to_string(),
        username: "builder".to_string(),
        argv: vec!["steprun".to_string(), "--dir".to_string(), "/steps".to_string()],
        quiet: true,
    }
}

#[test]
fn markers_depend_on_position_within_group() -> TestResult {
    // Unicode glyph set.
    assert_eq!(render::marker_glyph(true, true, true), "");
    assert_eq!(render::marker_glyph(true, false, true), "╒");
    assert_eq!(render::marker_glyph(false, false, true), "╞");
    assert_eq!(render::marker_glyph(false, true, true), "╘");

    // ASCII fallback.
    assert_eq!(render::marker_glyph(true, true, false), "");
    assert_eq!(render::marker_glyph(true, false, false), "");
    assert_eq!(render::marker_glyph(false, false, false), "=");
    assert_eq!(render::marker_glyph(false, true, false), "=");

    Ok(())
}

#[test]
fn sizes_format_as_bytes_k_or_m() -> TestResult {
    assert_eq!(render::format_size(0), "0");
    assert_eq!(render::format_size(1_023), "1023");
    assert_eq!(render::format_size(1_024), "1K");
    assert_eq!(render::format_size(1_024 * 1_024 - 1), "1023K");
    assert_eq!(render::format_size(5 * 1_024 * 1_024), "5M");

    Ok(())
}

#[test]
fn subject_names_status_and_duration() -> TestResult {
    let job = finished_job("boom");
    assert_eq!(render::report_subject(&job), "Job ERROR: nightly (1.75s)");

    Ok(())
}

#[test]
fn report_body_lists_failures_and_identity() -> TestResult {
    let job = finished_job("something broke\n");
    let body = render::report_body(&job, &ctx());

    assert!(body.contains("Job nightly failed at step 002_bad"));
    assert!(body.contains("Hostname: buildhost"));
    assert!(body.contains("Username: builder"));
    assert!(body.contains("Status: ERROR"));
    assert!(body.contains("Job id: 12"));
    assert!(body.contains("Command: steprun --dir /steps"));
    assert!(body.contains("something broke"));

    Ok(())
}

#[test]
fn failed_step_logs_are_truncated_in_reports() -> TestResult {
    // 'é' is two bytes, so the byte cap admits exactly half as many
    // characters and the cut must land on a character boundary.
    let huge = "é".repeat(MAX_REPORT_LOG_BYTES);
    let job = finished_job(&huge);
    let body = render::report_body(&job, &ctx());

    assert_eq!(body.matches('é').count(), MAX_REPORT_LOG_BYTES / 2);

    Ok(())
}

#[test]
fn status_table_shows_every_step() -> TestResult {
    let job = finished_job("boom");
    let table = render::status_table(&job);

    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("001_ok"));
    assert!(lines[0].contains("OK"));
    assert!(lines[0].contains("1.50s"));
    assert!(lines[1].contains("002_bad"));
    assert!(lines[1].contains("ERROR"));
    assert!(lines[1].contains("--retries=0"));

    Ok(())
}
