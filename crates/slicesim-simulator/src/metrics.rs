//! Post-run KPI computation over the traffic record logs.
//!
//! Every call re-reads the logs from disk; nothing is cached between calls.

use serde::Serialize;
use slicesim_abstract::Direction;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::SimError;
use crate::log::TrafficLog;

const COL_SINR: usize = 2;
const COL_MCS: usize = 3;
const COL_PRBS: usize = 5;
const COL_SENT: usize = 6;
const COL_LOST: usize = 7;
const COL_BYTES: usize = 8;

/// KPIs of one direction, rounded for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionKpis {
    pub throughput_mbps: f64,
    pub packet_loss_rate: f64,
    pub avg_sinr_db: f64,
    pub avg_mcs: f64,
    pub avg_resource_use: f64,
    pub total_packets_sent: u64,
    pub total_packets_lost: u64,
}

/// Per-direction KPIs. Serializes as `{"DL": {...}, "UL": {...}}`; a
/// direction without log data is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct KpiSummary(pub BTreeMap<Direction, DirectionKpis>);

impl KpiSummary {
    pub fn get(&self, direction: Direction) -> Option<&DirectionKpis> {
        self.0.get(&direction)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn directions(&self) -> impl Iterator<Item = Direction> + '_ {
        self.0.keys().copied()
    }
}

/// Raw sums over the rows of one or more logs of the same direction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DirectionTotals {
    pub rows: u64,
    pub packets_sent: u64,
    pub packets_lost: u64,
    pub bytes_delivered: u64,
    pub sinr_sum: f64,
    pub mcs_sum: f64,
    pub prbs_sum: f64,
}

impl DirectionTotals {
    fn add_row(&mut self, path: &Path, line: usize, row: &str) -> Result<(), SimError> {
        let fields: Vec<&str> = row.split_whitespace().collect();
        if fields.len() <= COL_BYTES {
            return Err(malformed(
                path,
                line,
                format!("expected {} columns, found {}", COL_BYTES + 1, fields.len()),
            ));
        }
        let sinr: f64 = parse(path, line, &fields, COL_SINR, "SINR")?;
        if !sinr.is_finite() {
            return Err(malformed(path, line, format!("SINR is {sinr}")));
        }
        let mcs: u32 = parse(path, line, &fields, COL_MCS, "MCS")?;
        let prbs: u32 = parse(path, line, &fields, COL_PRBS, "resource blocks")?;
        let sent: u64 = parse(path, line, &fields, COL_SENT, "packets sent")?;
        let lost: u64 = parse(path, line, &fields, COL_LOST, "packets lost")?;
        let bytes: u64 = parse(path, line, &fields, COL_BYTES, "bytes")?;
        if lost > sent {
            return Err(malformed(
                path,
                line,
                format!("{lost} packets lost but only {sent} sent"),
            ));
        }

        let overflow = |what: &str| malformed(path, line, format!("{what} total overflows u64"));
        let packets_sent = self
            .packets_sent
            .checked_add(sent)
            .ok_or_else(|| overflow("packets sent"))?;
        let packets_lost = self
            .packets_lost
            .checked_add(lost)
            .ok_or_else(|| overflow("packets lost"))?;
        let bytes_delivered = self
            .bytes_delivered
            .checked_add(bytes)
            .ok_or_else(|| overflow("bytes"))?;

        self.rows += 1;
        self.sinr_sum += sinr;
        self.mcs_sum += mcs as f64;
        self.prbs_sum += prbs as f64;
        self.packets_sent = packets_sent;
        self.packets_lost = packets_lost;
        self.bytes_delivered = bytes_delivered;
        Ok(())
    }

    /// Derive the rounded KPIs. `None` when no rows were read.
    pub fn kpis(&self, duration_ms: u64) -> Option<DirectionKpis> {
        if self.rows == 0 {
            return None;
        }
        let rows = self.rows as f64;
        let seconds = duration_ms as f64 / 1000.0;
        let throughput = if seconds > 0.0 {
            self.bytes_delivered as f64 * 8.0 / (seconds * 1e6)
        } else {
            0.0
        };
        let loss = if self.packets_sent == 0 {
            0.0
        } else {
            self.packets_lost as f64 / self.packets_sent as f64 * 100.0
        };
        Some(DirectionKpis {
            throughput_mbps: round_to(throughput, 2),
            packet_loss_rate: round_to(loss, 2),
            avg_sinr_db: round_to(self.sinr_sum / rows, 2),
            avg_mcs: round_to(self.mcs_sum / rows, 1),
            avg_resource_use: round_to(self.prbs_sum / rows, 1),
            total_packets_sent: self.packets_sent,
            total_packets_lost: self.packets_lost,
        })
    }
}

fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

fn malformed(path: &Path, line: usize, reason: String) -> SimError {
    SimError::MetricsComputation {
        path: path.to_path_buf(),
        line,
        reason,
    }
}

fn parse<T: std::str::FromStr>(
    path: &Path,
    line: usize,
    fields: &[&str],
    column: usize,
    what: &str,
) -> Result<T, SimError> {
    fields[column]
        .parse()
        .map_err(|_| malformed(path, line, format!("bad {what} value '{}'", fields[column])))
}

/// Add the data rows of one log file to `totals`. A missing file adds nothing.
fn read_log(path: &Path, totals: &mut DirectionTotals) -> Result<(), SimError> {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(SimError::log_io(path, e)),
    };
    let rows_before = totals.rows;
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| SimError::log_io(path, e))?;
        // Line 1 is the header.
        if idx == 0 || line.trim().is_empty() {
            continue;
        }
        totals.add_row(path, idx + 1, &line)?;
    }
    debug!("{}: {} rows", path.display(), totals.rows - rows_before);
    Ok(())
}

/// Log files of one direction in `log_dir`, sorted by name.
fn direction_logs(log_dir: &Path, direction: Direction) -> Result<Vec<PathBuf>, SimError> {
    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SimError::log_io(log_dir, e)),
    };
    let prefix = format!("{}Ststs_", direction.file_prefix());
    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SimError::log_io(log_dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(&prefix) && name.ends_with(".txt") {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Aggregate KPIs per direction over every slice log in `log_dir`.
pub fn compute_metrics(log_dir: &Path, duration_ms: u64) -> Result<KpiSummary, SimError> {
    let mut summary = KpiSummary::default();
    for direction in Direction::ALL {
        let mut totals = DirectionTotals::default();
        for path in direction_logs(log_dir, direction)? {
            read_log(&path, &mut totals)?;
        }
        if let Some(kpis) = totals.kpis(duration_ms) {
            summary.0.insert(direction, kpis);
        }
    }
    Ok(summary)
}

/// KPIs of a single slice.
pub fn compute_slice_metrics(
    log_dir: &Path,
    label: &str,
    duration_ms: u64,
) -> Result<KpiSummary, SimError> {
    let mut summary = KpiSummary::default();
    for direction in Direction::ALL {
        let mut totals = DirectionTotals::default();
        read_log(&log_dir.join(TrafficLog::file_name(label, direction)), &mut totals)?;
        if let Some(kpis) = totals.kpis(duration_ms) {
            summary.0.insert(direction, kpis);
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use slicesim_abstract::RECORD_HEADER;

    fn write_log(dir: &Path, name: &str, rows: &[&str]) {
        let mut content = format!("{RECORD_HEADER}\n");
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_downlink_only_when_uplink_log_missing() {
        let dir = tempfile::tempdir().unwrap();
        write_log(
            dir.path(),
            "dlStsts_eMBB.txt",
            &[
                "0 0 20.00 20 0 50 10 1 10000",
                "0 1 10.00 15 0 50 10 0 9000",
            ],
        );
        let summary = compute_metrics(dir.path(), 1000).unwrap();
        assert!(summary.get(Direction::Uplink).is_none());

        let dl = summary.get(Direction::Downlink).unwrap();
        assert_eq!(dl.total_packets_sent, 20);
        assert_eq!(dl.total_packets_lost, 1);
        assert_eq!(dl.packet_loss_rate, 5.0);
        assert_eq!(dl.throughput_mbps, 0.15);
        assert_eq!(dl.avg_sinr_db, 15.0);
        assert_eq!(dl.avg_mcs, 17.5);
        assert_eq!(dl.avg_resource_use, 50.0);

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("DL").is_some());
        assert!(json.get("UL").is_none());
        assert_eq!(json["DL"]["total_packets_sent"], 20);
    }

    #[test]
    fn test_nothing_sent_means_zero_loss() {
        let dir = tempfile::tempdir().unwrap();
        write_log(
            dir.path(),
            "ulStsts_eMBB.txt",
            &["0 0 5.00 9 0 0 0 0 0", "1000 0 5.00 9 0 0 0 0 0"],
        );
        let summary = compute_metrics(dir.path(), 2000).unwrap();
        let ul = summary.get(Direction::Uplink).unwrap();
        assert_eq!(ul.packet_loss_rate, 0.0);
        assert_eq!(ul.throughput_mbps, 0.0);
    }

    #[test]
    fn test_header_only_log_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        write_log(dir.path(), "dlStsts_eMBB.txt", &[]);
        assert!(compute_metrics(dir.path(), 1000).unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory_yields_empty_summary() {
        let dir = tempfile::tempdir().unwrap();
        let summary = compute_metrics(&dir.path().join("Statistics"), 1000).unwrap();
        assert!(summary.is_empty());
    }

    #[test]
    fn test_aggregates_across_slices() {
        let dir = tempfile::tempdir().unwrap();
        write_log(dir.path(), "dlStsts_a.txt", &["0 0 10.00 10 0 10 4 0 4000"]);
        write_log(dir.path(), "dlStsts_b.txt", &["0 0 20.00 20 0 30 6 3 2000"]);
        let all = compute_metrics(dir.path(), 1000).unwrap();
        let dl = all.get(Direction::Downlink).unwrap();
        assert_eq!(dl.total_packets_sent, 10);
        assert_eq!(dl.packet_loss_rate, 30.0);
        assert_eq!(dl.avg_resource_use, 20.0);

        let b = compute_slice_metrics(dir.path(), "b", 1000).unwrap();
        assert_eq!(b.get(Direction::Downlink).unwrap().packet_loss_rate, 50.0);
    }

    #[test]
    fn test_recomputation_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        write_log(
            dir.path(),
            "dlStsts_eMBB.txt",
            &["0 0 13.37 12 0 7 3 1 1234", "1000 0 -2.10 3 0 9 5 0 777"],
        );
        let first = compute_metrics(dir.path(), 2000).unwrap();
        let second = compute_metrics(dir.path(), 2000).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_malformed_row_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_log(
            dir.path(),
            "dlStsts_eMBB.txt",
            &["0 0 20.00 20 0 50 10 1 10000", "1000 0 abc 20 0 50 10 1 10000"],
        );
        match compute_metrics(dir.path(), 2000) {
            Err(SimError::MetricsComputation { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected metrics error, got {other:?}"),
        }
    }

    #[test]
    fn test_lost_above_sent_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_log(dir.path(), "dlStsts_eMBB.txt", &["0 0 20.00 20 0 50 1 2 10"]);
        assert!(matches!(
            compute_metrics(dir.path(), 1000),
            Err(SimError::MetricsComputation { .. })
        ));
    }

    #[test]
    fn test_counter_overflow_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_log(
            dir.path(),
            "dlStsts_eMBB.txt",
            &[
                "0 0 20.00 20 0 50 18446744073709551615 0 10",
                "1000 0 20.00 20 0 50 1 0 10",
            ],
        );
        match compute_metrics(dir.path(), 2000) {
            Err(SimError::MetricsComputation { line, reason, .. }) => {
                assert_eq!(line, 3);
                assert!(reason.contains("packets sent"), "{reason}");
            }
            other => panic!("expected metrics error, got {other:?}"),
        }
    }

    #[test]
    fn test_overflow_across_slice_logs_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_log(dir.path(), "ulStsts_a.txt", &["0 0 5.00 5 0 10 1 0 18446744073709551615"]);
        write_log(dir.path(), "ulStsts_b.txt", &["0 0 5.00 5 0 10 1 0 1"]);
        assert!(matches!(
            compute_metrics(dir.path(), 1000),
            Err(SimError::MetricsComputation { line: 2, .. })
        ));
        // Each slice on its own still sums fine.
        let a = compute_slice_metrics(dir.path(), "a", 1000).unwrap();
        assert_eq!(a.get(Direction::Uplink).unwrap().total_packets_sent, 1);
    }
}
