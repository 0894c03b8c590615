use serde::Serialize;
use slicesim_abstract::{
    CarrierProfile, Direction, NetworkConfig, SchedulerFactory, SimulationConfig,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Phase, SimError};
use crate::inter_slice::InterSliceScheduler;
use crate::log::TrafficLog;
use crate::slice::SliceSpec;

/// Log handles of one slice. `ul` is absent for slices without uplink.
#[derive(Debug)]
pub struct SliceLogs {
    pub dl: TrafficLog,
    pub ul: Option<TrafficLog>,
}

impl SliceLogs {
    pub fn get(&self, direction: Direction) -> Option<&TrafficLog> {
        match direction {
            Direction::Downlink => Some(&self.dl),
            Direction::Uplink => self.ul.as_ref(),
        }
    }

    pub fn get_mut(&mut self, direction: Direction) -> Option<&mut TrafficLog> {
        match direction {
            Direction::Downlink => Some(&mut self.dl),
            Direction::Uplink => self.ul.as_mut(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliceSnapshot {
    pub label: String,
    pub share_prbs: u32,
    pub dl_rows: u64,
    pub ul_rows: u64,
    pub dl_backlog_bytes: u64,
    pub ul_backlog_bytes: u64,
}

/// Cell state observed by one statistics wake-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellSnapshot {
    pub time_ms: u64,
    pub total_prbs: u32,
    pub allocated_prbs: u64,
    pub slices: Vec<SliceSnapshot>,
}

pub struct Cell {
    id: String,
    carrier: CarrierProfile,
    debug: bool,
    stats_dir: PathBuf,
    inter_slice: InterSliceScheduler,
    slice_logs: BTreeMap<String, SliceLogs>,
    snapshots: Vec<CellSnapshot>,
}

impl Cell {
    pub fn new(
        id: &str,
        network: &NetworkConfig,
        simulation: &SimulationConfig,
        stats_dir: &Path,
        factory: &dyn SchedulerFactory,
    ) -> Result<Self, SimError> {
        let carrier = CarrierProfile::from_network(network)?;
        let policy =
            factory
                .inter_policy(&network.inter_scheduler)
                .map_err(|source| SimError::Process {
                    phase: Phase::Setup,
                    label: id.to_string(),
                    time_ms: 0,
                    source,
                })?;
        info!(
            "Cell {id}: {} MHz {} ({} kHz SCS, {}), {} PRBs, inter-slice {}",
            network.bandwidth,
            network.frequency_range,
            carrier.scs_khz,
            if carrier.tdd { "TDD" } else { "FDD" },
            carrier.total_prbs,
            policy.name()
        );
        let inter_slice = InterSliceScheduler::new(
            policy,
            carrier,
            network.buffer_size,
            simulation.allocation_granularity(),
            simulation.seed,
        );

        Ok(Self {
            id: id.to_string(),
            carrier,
            debug: simulation.debug,
            stats_dir: stats_dir.to_path_buf(),
            inter_slice,
            slice_logs: BTreeMap::new(),
            snapshots: Vec::new(),
        })
    }

    /// Resource blocks available to the inter-slice scheduler. Fixed for the run.
    pub fn total_resource_budget(&self) -> u32 {
        self.carrier.total_prbs
    }

    pub fn inter_slice(&self) -> &InterSliceScheduler {
        &self.inter_slice
    }

    pub(crate) fn inter_slice_mut(&mut self) -> &mut InterSliceScheduler {
        &mut self.inter_slice
    }

    pub fn slice_logs(&self) -> &BTreeMap<String, SliceLogs> {
        &self.slice_logs
    }

    pub(crate) fn log_mut(&mut self, label: &str, direction: Direction) -> Option<&mut TrafficLog> {
        self.slice_logs
            .get_mut(label)
            .and_then(|logs| logs.get_mut(direction))
    }

    pub fn snapshots(&self) -> &[CellSnapshot] {
        &self.snapshots
    }

    /// Register a slice through the inter-slice scheduler and open its logs.
    pub fn create_slice(
        &mut self,
        spec: SliceSpec,
        factory: &dyn SchedulerFactory,
    ) -> Result<(), SimError> {
        let slice = self.inter_slice.create_slice(spec, factory)?;
        let label = slice.label().to_string();
        let has_uplink = slice.has_uplink();

        std::fs::create_dir_all(&self.stats_dir)
            .map_err(|e| SimError::log_io(&self.stats_dir, e))?;
        let dl = TrafficLog::create(&self.stats_dir, &label, Direction::Downlink)?;
        let ul = if has_uplink {
            Some(TrafficLog::create(&self.stats_dir, &label, Direction::Uplink)?)
        } else {
            None
        };
        self.slice_logs.insert(label, SliceLogs { dl, ul });
        Ok(())
    }

    /// Statistics wake-up: record what the cell looks like at `now`.
    pub fn record_snapshot(&mut self, now: u64) -> &CellSnapshot {
        let slices: Vec<SliceSnapshot> = self
            .inter_slice
            .slices()
            .iter()
            .map(|slice| {
                let rows = |direction| {
                    self.slice_logs
                        .get(slice.label())
                        .and_then(|logs| logs.get(direction))
                        .map(TrafficLog::rows)
                        .unwrap_or(0)
                };
                SliceSnapshot {
                    label: slice.label().to_string(),
                    share_prbs: slice.share_prbs(),
                    dl_rows: rows(Direction::Downlink),
                    ul_rows: rows(Direction::Uplink),
                    dl_backlog_bytes: slice.backlog_bytes(Direction::Downlink),
                    ul_backlog_bytes: slice.backlog_bytes(Direction::Uplink),
                }
            })
            .collect();
        let snapshot = CellSnapshot {
            time_ms: now,
            total_prbs: self.carrier.total_prbs,
            allocated_prbs: slices.iter().map(|s| s.share_prbs as u64).sum(),
            slices,
        };
        if self.debug {
            info!("Cell {} snapshot: {:?}", self.id, snapshot);
        } else {
            debug!("Cell {} snapshot at {} ms", self.id, now);
        }
        self.snapshots.push(snapshot);
        &self.snapshots[self.snapshots.len() - 1]
    }

    /// Close every log. A failure on one log does not stop the others from
    /// being closed; the first error is returned.
    pub fn close_logs(&mut self) -> Result<(), SimError> {
        let mut first_error = None;
        for (label, logs) in &mut self.slice_logs {
            for log in std::iter::once(&mut logs.dl).chain(logs.ul.as_mut()) {
                if let Err(e) = log.close() {
                    warn!("Failed to close {} log of slice '{}': {}", log.direction(), label, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
