// src/render.rs

//! Human-readable status rendering: the step table, group markers, and
//! the completion report handed to the notifier.
//!
//! Everything here is presentation only; nothing in this module affects
//! execution.

use chrono::Local;

use crate::job::{Job, RunContext, Step, StepGroup};

/// 80-dash rule used to delimit step logs in console output and reports.
pub const LINE: &str = "--------------------------------------------------------------------------------";

/// Per-step log bytes included in a report, to bound the report size.
pub const MAX_REPORT_LOG_BYTES: usize = 100_000;

/// Marker glyph for a step's position within its group.
///
/// Sole member → no marker; otherwise box-drawing glyphs under a UTF-8
/// locale, with an ASCII fallback elsewhere.
pub fn marker_glyph(is_first: bool, is_last: bool, unicode: bool) -> &'static str {
    if unicode {
        match (is_first, is_last) {
            (true, true) => "",
            (true, false) => "╒",
            (false, false) => "╞",
            (false, true) => "╘",
        }
    } else {
        match (is_first, is_last) {
            (true, true) | (true, false) => "",
            (false, _) => "=",
        }
    }
}

/// Whether the active locale is a UTF-8 locale, per the first set value
/// among `LC_ALL`, `LC_CTYPE`, `LANG`.
pub fn utf8_locale() -> bool {
    ["LC_ALL", "LC_CTYPE", "LANG"]
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .map(|v| v.to_lowercase().replace('-', "").contains("utf8"))
        .unwrap_or(false)
}

/// Format a byte count as bytes, K, or M.
pub fn format_size(size: u64) -> String {
    if size >= 1024 * 1024 {
        format!("{}M", size / 1024 / 1024)
    } else if size >= 1024 {
        format!("{}K", size / 1024)
    } else {
        format!("{size}")
    }
}

/// Render the job's step table.
pub fn status_table(job: &Job) -> String {
    let unicode = utf8_locale();
    let mut out = String::new();
    for group in &job.groups {
        for (idx, step) in group.steps.iter().enumerate() {
            out.push_str(&table_row(step, group, idx, unicode));
        }
    }
    out
}

fn table_row(step: &Step, group: &StepGroup, idx: usize, unicode: bool) -> String {
    let marker = marker_glyph(idx == 0, idx == group.steps.len() - 1, unicode);
    format!(
        "  {:1} {:<40} {:<10} {:>8.2}s {:>5.2}c {:>6}  {}\n",
        marker,
        step.name,
        step.status.as_str(),
        step.duration_secs(),
        step.current_cpu_usage(),
        format_size(step.monitor.rss_bytes),
        step.flags.join(" "),
    )
}

/// Print the current status table with a timestamped header.
pub fn print_status(job: &Job) {
    println!(
        "{} Running job {} (from {})\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        job.name,
        job.source,
    );
    print!("{}", status_table(job));
    println!();
}

/// Report subject: `Job <STATUS>: <name> (<secs>s)`.
pub fn report_subject(job: &Job) -> String {
    let status = job.status.map(|s| s.as_str()).unwrap_or("UNKNOWN");
    format!(
        "Job {}: {} ({:.2}s)",
        status,
        job.name,
        job.duration_ms as f64 / 1_000.0
    )
}

/// Report body: outcome lines, run identity, the status table, and each
/// failed step's log truncated to [`MAX_REPORT_LOG_BYTES`].
pub fn report_body(job: &Job, ctx: &RunContext) -> String {
    let failed = job.failed_steps();
    let mut body = String::new();

    if failed.is_empty() {
        body.push_str(&format!("Job {} completed successfully\n\n", job.name));
    } else {
        for step in &failed {
            body.push_str(&format!("Job {} failed at step {}\n\n", job.name, step.name));
        }
    }

    let status = job.status.map(|s| s.as_str()).unwrap_or("UNKNOWN");
    body.push_str(&format!("Hostname: {}\n", ctx.hostname));
    body.push_str(&format!("Username: {}\n", ctx.username));
    body.push_str(&format!("Status: {status}\n"));
    body.push_str(&format!(
        "Duration: {:.3}s\n\n",
        job.duration_ms as f64 / 1_000.0
    ));
    body.push_str(&status_table(job));
    body.push_str(&format!("{LINE}\n"));
    if let Some(job_id) = job.job_id {
        body.push_str(&format!("Job id: {job_id}\n"));
    }
    body.push_str(&format!("Command: {}\n", ctx.argv.join(" ")));
    let pwd = std::env::current_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| "?".to_string());
    body.push_str(&format!("PWD: {pwd}\n\n"));

    for step in &failed {
        let log = step.log.as_deref().unwrap_or("");
        body.push_str(&format!(
            "{LINE}\n{}\n{LINE}\n",
            truncate_bytes(log, MAX_REPORT_LOG_BYTES)
        ));
    }
    body
}

/// Truncate to at most `max` bytes without splitting a UTF-8 character.
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
