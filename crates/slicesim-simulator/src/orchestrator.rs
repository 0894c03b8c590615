//! Wires a scenario into a cell, runs it and computes the KPIs.

use slicesim_abstract::{ConfigError, ScenarioConfig, SchedulerError, SchedulerFactory};
use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::cell::Cell;
use crate::engine::Simulator;
use crate::error::SimError;
use crate::metrics::{compute_metrics, compute_slice_metrics};
use crate::slice::SliceSpec;
use crate::trace::SimulationReport;

/// Subdirectory of the output directory holding the traffic logs.
pub const STATISTICS_DIR: &str = "Statistics";

/// Remove the logs of a previous run. A missing directory is fine.
pub fn clean_previous_results(output_dir: &Path) -> Result<(), SimError> {
    let stats_dir = output_dir.join(STATISTICS_DIR);
    match std::fs::remove_dir_all(&stats_dir) {
        Ok(()) => {
            info!("Removed previous results in {}", stats_dir.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No previous results in {}", stats_dir.display());
            Ok(())
        }
        Err(e) => Err(SimError::log_io(stats_dir, e)),
    }
}

/// Build the cell and register one slice per traffic entry, in input order.
/// On failure every log opened so far is closed before returning.
pub fn build_simulator(
    scenario: &ScenarioConfig,
    factory: &dyn SchedulerFactory,
    stats_dir: &Path,
) -> Result<Simulator, SimError> {
    let mut cell = Cell::new(
        "cell-0",
        &scenario.network,
        &scenario.simulation,
        stats_dir,
        factory,
    )?;
    for traffic in &scenario.traffic {
        let spec = SliceSpec::from_config(&scenario.network, traffic, scenario.simulation.debug);
        if let Err(e) = cell.create_slice(spec, factory) {
            if let Err(close_err) = cell.close_logs() {
                warn!("Failed to close logs after setup error: {}", close_err);
            }
            return Err(e);
        }
    }
    Ok(Simulator::new(scenario.simulation.clone(), cell))
}

/// Reject scheduler names and SINR patterns the factory cannot build.
pub fn check_scheduler_settings(
    scenario: &ScenarioConfig,
    factory: &dyn SchedulerFactory,
) -> Result<(), SimError> {
    let rejected = |field: String, e: SchedulerError| {
        SimError::Configuration(ConfigError::Validation(format!("{field}: {e}")))
    };
    let network = &scenario.network;
    factory
        .check_inter_kind(&network.inter_scheduler)
        .map_err(|e| rejected("network.inter_scheduler".to_string(), e))?;
    for traffic in &scenario.traffic {
        let label = traffic.label();
        factory
            .check_intra_kind(traffic.intra_scheduler(network))
            .map_err(|e| rejected(format!("traffic '{label}' intra_scheduler"), e))?;
        factory
            .check_sinr_pattern(&traffic.sinr_pattern)
            .map_err(|e| rejected(format!("traffic '{label}' sinr_pattern"), e))?;
    }
    Ok(())
}

/// Validate the scenario, then run it with [`execute`].
pub fn run_simulation(
    scenario: &ScenarioConfig,
    factory: &dyn SchedulerFactory,
    output_dir: &Path,
) -> Result<SimulationReport, SimError> {
    scenario.validate()?;
    check_scheduler_settings(scenario, factory)?;
    execute(scenario, factory, output_dir)
}

/// Run a scenario that has already been validated.
///
/// Logs are closed whether or not the run succeeded; a run error takes
/// precedence over a close error.
pub fn execute(
    scenario: &ScenarioConfig,
    factory: &dyn SchedulerFactory,
    output_dir: &Path,
) -> Result<SimulationReport, SimError> {
    clean_previous_results(output_dir)?;
    let stats_dir = output_dir.join(STATISTICS_DIR);

    let mut sim = build_simulator(scenario, factory, &stats_dir)?;
    let outcome = sim.run_until_complete();
    let closed = sim.close_logs();
    outcome?;
    closed?;

    let duration_ms = scenario.simulation.duration_ms;
    let kpis = compute_metrics(&stats_dir, duration_ms)?;
    let mut slice_kpis = BTreeMap::new();
    for slice in sim.cell().inter_slice().slices() {
        let label = slice.label();
        slice_kpis.insert(
            label.to_string(),
            compute_slice_metrics(&stats_dir, label, duration_ms)?,
        );
    }
    info!(
        "'{}' done: {} direction(s) with data",
        scenario.simulation.name,
        kpis.directions().count()
    );
    Ok(sim.export_report(kpis, slice_kpis))
}
