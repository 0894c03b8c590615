use thiserror::Error;

use crate::carrier::CarrierProfile;
use crate::config::MimoConfig;
use crate::record::{Direction, TrafficRecord};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown {role} scheduler '{kind}'")]
    UnknownKind { role: &'static str, kind: String },
    #[error("invalid SINR pattern '{0}'")]
    InvalidSinrPattern(String),
    #[error("malformed resource request: {0}")]
    MalformedRequest(String),
}

/// The capability handed to an intra-slice scheduler for one interval.
pub trait IntervalContext {
    /// Start of the current interval in ms.
    fn now(&self) -> u64;

    /// Length of the current interval in ms. Shorter than the configured
    /// period only for a final interval cut off by the run duration.
    fn interval_ms(&self) -> u64;

    /// Resource blocks the inter-slice scheduler assigned to this slice.
    fn resource_share(&self) -> u32;

    /// Append a record to this slice's log for the scheduler's direction.
    fn emit_record(&mut self, record: TrafficRecord);

    /// Log a message to the simulator's debug output.
    fn log(&mut self, _message: &str) {}
}

/// Divides one slice's resource share among its UEs.
pub trait IntraSliceScheduler {
    fn name(&self) -> &str;

    fn users(&self) -> u32;

    /// Run one interval. Must emit exactly one record per UE, stamped with
    /// `ctx.now()`, with `packets_lost <= packets_sent`.
    fn step(&mut self, ctx: &mut dyn IntervalContext) -> Result<(), SchedulerError>;

    /// Bytes queued across all UEs.
    fn backlog_bytes(&self) -> u64 {
        0
    }
}

/// What the inter-slice policy sees of a slice.
#[derive(Debug, Clone, Copy)]
pub struct SliceDemand {
    /// Declared requirement weight (min throughput DL + UL, bit/s).
    pub weight: f64,
    pub backlog_bytes: u64,
}

/// Partitions the cell's resource blocks among slices.
pub trait InterSlicePolicy {
    fn name(&self) -> &str;

    /// Returns one share per demand, in the same order. The caller rejects
    /// partitions whose sum exceeds `total_prbs`.
    fn partition(
        &mut self,
        total_prbs: u32,
        demands: &[SliceDemand],
    ) -> Result<Vec<u32>, SchedulerError>;
}

/// Everything needed to build one direction of a slice's UE group.
#[derive(Debug, Clone)]
pub struct IntraSetup {
    pub label: String,
    pub direction: Direction,
    pub users: u32,
    pub packet_size: u32,
    /// Packets per second per UE.
    pub arrival_rate: f64,
    pub sinr_pattern: String,
    pub buffer_size: u64,
    pub mimo: MimoConfig,
    pub carrier: CarrierProfile,
    pub seed: u64,
}

/// Builds schedulers by name. This is the seam where a different scheduling
/// library can be substituted.
pub trait SchedulerFactory {
    fn intra_scheduler(
        &self,
        kind: &str,
        setup: &IntraSetup,
    ) -> Result<Box<dyn IntraSliceScheduler>, SchedulerError>;

    fn inter_policy(&self, kind: &str) -> Result<Box<dyn InterSlicePolicy>, SchedulerError>;

    /// Checked for every slice before a run creates any output.
    fn check_intra_kind(&self, _kind: &str) -> Result<(), SchedulerError> {
        Ok(())
    }

    fn check_inter_kind(&self, _kind: &str) -> Result<(), SchedulerError> {
        Ok(())
    }

    fn check_sinr_pattern(&self, _pattern: &str) -> Result<(), SchedulerError> {
        Ok(())
    }
}
