// src/metrics/sampler.rs

//! Adaptive-cadence sampling of `/proc/<pid>` accounting for one step.
//!
//! Cadence is a function of the step's own elapsed duration, not wall
//! clock: young processes are sampled every 100 ms, long-running ones
//! back off to 1 s and then 10 s. A "forced" sample is attempted once
//! more when the child's termination is handled.
//!
//! Sampling races with process exit by design. If the process is gone
//! when `/proc/<pid>/stat` is read, the tick is skipped silently. If only
//! `/proc/<pid>/io` is unreadable (ownership of the accounting file flips
//! to root during exit teardown), the CPU/RSS half of the tick is kept
//! and just the I/O half is skipped.

use std::fs;
use std::io;

use tracing::trace;

use crate::metrics::series::TimeSeries;

/// Sampling interval for a step that has been running `duration_ms`.
pub fn cadence_ms(duration_ms: u64) -> u64 {
    if duration_ms <= 10_000 {
        100
    } else if duration_ms <= 600_000 {
        1_000
    } else {
        10_000
    }
}

/// Per-step monitoring state: latest counter values plus one series per
/// counter. Owned by `Step`; all mutation happens from the reap loop.
#[derive(Debug, Clone)]
pub struct ResourceMonitor {
    last_sample_ms: u64,

    /// Accumulated user+system CPU time, milliseconds.
    pub cpu_ms: u64,
    /// Resident set size, bytes.
    pub rss_bytes: u64,
    /// Cumulative bytes read / written by the process.
    pub bytes_read: u64,
    pub bytes_written: u64,

    pub cpu: TimeSeries,
    pub rss: TimeSeries,
    pub reads: TimeSeries,
    pub writes: TimeSeries,
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceMonitor {
    pub fn new() -> Self {
        Self {
            last_sample_ms: 0,
            cpu_ms: 0,
            rss_bytes: 0,
            bytes_read: 0,
            bytes_written: 0,
            cpu: TimeSeries::with_origin(),
            rss: TimeSeries::with_origin(),
            reads: TimeSeries::with_origin(),
            writes: TimeSeries::with_origin(),
        }
    }

    /// Whether a non-forced sample is due at `elapsed_ms`.
    pub fn due(&self, elapsed_ms: u64) -> bool {
        elapsed_ms.saturating_sub(self.last_sample_ms) >= cadence_ms(elapsed_ms)
    }

    /// Take one sample for `pid` at `elapsed_ms` if due (or `forced`).
    ///
    /// A vanished process is not an error: the poll tick simply records
    /// nothing and the caller carries on.
    pub fn sample(&mut self, pid: u32, elapsed_ms: u64, forced: bool) {
        if !forced && !self.due(elapsed_ms) {
            return;
        }
        self.record(elapsed_ms, read_cpu_mem(pid), read_io(pid));
    }

    /// Apply one tick's read results to the series and latest-value
    /// fields.
    ///
    /// Failed CPU/memory reads skip the whole tick; a failed I/O read
    /// skips only the I/O half and keeps the CPU/RSS values gathered
    /// this tick.
    pub fn record(
        &mut self,
        elapsed_ms: u64,
        usage: io::Result<CpuMemUsage>,
        io_counters: io::Result<(u64, u64)>,
    ) {
        let usage = match usage {
            Ok(usage) => usage,
            Err(err) => {
                // Process exited between the poll trigger and the stat
                // read; skip the whole tick.
                trace!(error = %err, "process stats unreadable, skipping sample");
                return;
            }
        };

        self.last_sample_ms = elapsed_ms;
        self.cpu_ms = usage.cpu_ms;
        self.rss_bytes = usage.rss_bytes;
        self.cpu.push(elapsed_ms, usage.cpu_ms);
        self.rss.push(elapsed_ms, usage.rss_bytes);

        match io_counters {
            Ok((read, written)) => {
                self.bytes_read = read;
                self.bytes_written = written;
                self.reads.push(elapsed_ms, read);
                self.writes.push(elapsed_ms, written);
            }
            Err(err) => {
                // /proc/<pid>/io flips to root ownership while the process
                // tears down; keep the CPU/RSS half of this tick.
                trace!(error = %err, "io counters unreadable, skipping io sample");
            }
        }
    }
}

/// CPU and memory usage parsed from `/proc/<pid>/stat` and `statm`.
#[derive(Debug, Clone, Copy)]
pub struct CpuMemUsage {
    pub cpu_ms: u64,
    pub rss_bytes: u64,
}

/// Read user+system CPU time and resident memory for `pid`.
///
/// Fails with `io::Error` when the process no longer exists (or `/proc`
/// is otherwise unreadable); callers treat that as "no sample this tick".
pub fn read_cpu_mem(pid: u32) -> io::Result<CpuMemUsage> {
    let stat = fs::read_to_string(format!("/proc/{pid}/stat"))?;

    // The comm field is parenthesised and may contain spaces; fields
    // after it start at the last ')'.
    let rest = stat
        .rfind(')')
        .map(|i| &stat[i + 1..])
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed /proc stat"))?;
    let fields: Vec<&str> = rest.split_whitespace().collect();

    // fields[0] is the state (field 3 of the file); utime and stime are
    // fields 14 and 15.
    let utime: u64 = parse_field(&fields, 11)?;
    let stime: u64 = parse_field(&fields, 12)?;
    let cpu_ms = (utime + stime) * 1_000 / ticks_per_second();

    let statm = fs::read_to_string(format!("/proc/{pid}/statm"))?;
    let resident_pages: u64 = statm
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed /proc statm"))?;
    let rss_bytes = resident_pages * page_size();

    Ok(CpuMemUsage { cpu_ms, rss_bytes })
}

/// Read cumulative `(read_bytes, write_bytes)` from `/proc/<pid>/io`.
pub fn read_io(pid: u32) -> io::Result<(u64, u64)> {
    let io_stat = fs::read_to_string(format!("/proc/{pid}/io"))?;

    let mut read_bytes = None;
    let mut write_bytes = None;
    for line in io_stat.lines() {
        if let Some(v) = line.strip_prefix("read_bytes: ") {
            read_bytes = v.trim().parse().ok();
        } else if let Some(v) = line.strip_prefix("write_bytes: ") {
            write_bytes = v.trim().parse().ok();
        }
    }

    match (read_bytes, write_bytes) {
        (Some(r), Some(w)) => Ok((r, w)),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "malformed /proc io",
        )),
    }
}

fn parse_field(fields: &[&str], idx: usize) -> io::Result<u64> {
    fields
        .get(idx)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed /proc stat field"))
}

/// Kernel clock ticks per second (`_SC_CLK_TCK`), for tick→ms conversion.
pub fn ticks_per_second() -> u64 {
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if ticks > 0 { ticks as u64 } else { 100 }
}

/// Page size in bytes (`_SC_PAGESIZE`), for page→byte conversion.
pub fn page_size() -> u64 {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as u64 } else { 4_096 }
}
