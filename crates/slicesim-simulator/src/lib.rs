pub mod cell;
pub mod engine;
pub mod error;
pub mod inter_slice;
pub mod log;
pub mod metrics;
pub mod orchestrator;
pub mod slice;
pub mod trace;

pub use cell::{Cell, CellSnapshot, SliceSnapshot};
pub use engine::{Process, Simulator};
pub use error::{Phase, SimError};
pub use inter_slice::{AllocationRecord, InterSliceScheduler};
pub use log::TrafficLog;
pub use metrics::{DirectionKpis, KpiSummary, compute_metrics, compute_slice_metrics};
pub use orchestrator::{
    STATISTICS_DIR, build_simulator, check_scheduler_settings, clean_previous_results, execute,
    run_simulation,
};
pub use slice::{Slice, SliceRequirements, SliceSpec, UserCounts};
pub use trace::{SimulationReport, SliceSummary};
