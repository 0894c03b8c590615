use serde::Serialize;
use slicesim_abstract::MimoConfig;
use std::collections::BTreeMap;

use crate::cell::CellSnapshot;
use crate::inter_slice::AllocationRecord;
use crate::metrics::KpiSummary;
use crate::slice::{Slice, SliceRequirements, UserCounts};

#[derive(Debug, Clone, Serialize)]
pub struct SliceSummary {
    pub label: String,
    pub users: UserCounts,
    pub requirements: SliceRequirements,
    pub intra_scheduler: String,
    pub mimo: MimoConfig,
    pub has_uplink: bool,
}

impl SliceSummary {
    pub fn from_slice(slice: &Slice) -> Self {
        let spec = slice.spec();
        Self {
            label: spec.label.clone(),
            users: spec.users,
            requirements: spec.requirements,
            intra_scheduler: spec.intra_scheduler.clone(),
            mimo: spec.mimo,
            has_uplink: slice.has_uplink(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub name: String,
    pub duration_ms: u64,
    pub seed: u64,
    pub total_prbs: u32,
    pub inter_scheduler: String,
    pub slices: Vec<SliceSummary>,
    pub allocations: Vec<AllocationRecord>,
    pub snapshots: Vec<CellSnapshot>,
    pub kpis: KpiSummary,
    pub slice_kpis: BTreeMap<String, KpiSummary>,
}
