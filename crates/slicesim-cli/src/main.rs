use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, info};

use slicesim_abstract::{Direction, ScenarioConfig, ScenarioOverride};
use slicesim_schedulers::{BuiltinSchedulers, available_inter_policies, available_intra_schedulers};
use slicesim_simulator::{SimulationReport, run_simulation};

#[derive(Parser, Debug)]
#[command(author, version, about = "RAN slicing scheduler simulator")]
struct Args {
    /// Scenario file (TOML, or YAML with a .yaml/.yml extension).
    config: PathBuf,

    /// Directory that receives the Statistics/ logs.
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,

    /// Print the KPI summary as JSON instead of the text report.
    #[arg(long, default_value_t = false)]
    json: bool,

    #[arg(long)]
    duration_ms: Option<u64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Verbose logging and per-snapshot output.
    #[arg(long, default_value_t = false)]
    debug: bool,

    #[arg(long)]
    inter_scheduler: Option<String>,

    #[arg(long)]
    intra_scheduler: Option<String>,
}

impl Args {
    fn overrides(&self) -> ScenarioOverride {
        ScenarioOverride {
            duration_ms: self.duration_ms,
            seed: self.seed,
            debug: self.debug.then_some(true),
            inter_scheduler: self.inter_scheduler.clone(),
            intra_scheduler: self.intra_scheduler.clone(),
            ..ScenarioOverride::default()
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_scenario(&args.config)?;
    args.overrides().apply_to(&mut config);
    init_logging(config.simulation.debug);
    info!(
        "Starting simulation: {} (intra schedulers: {}; inter policies: {})",
        config.simulation.name,
        available_intra_schedulers().join(", "),
        available_inter_policies().join(", ")
    );

    let report = run_simulation(&config, &BuiltinSchedulers, &args.output_dir)
        .with_context(|| format!("Simulation '{}' failed", config.simulation.name))?;
    info!("Simulation completed");

    if args.json {
        let data =
            serde_json::to_string_pretty(&report.kpis).context("Failed to serialize KPIs")?;
        println!("{data}");
    } else {
        print_results(&config, &report);
    }

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_scenario(path: &Path) -> Result<ScenarioConfig> {
    ScenarioConfig::from_path(path)
        .with_context(|| format!("Failed to load scenario file {}", path.display()))
}

fn print_results(config: &ScenarioConfig, report: &SimulationReport) {
    let rule = "=".repeat(60);
    let dl_users: u32 = config.traffic.iter().map(|t| t.dl_users).sum();
    let ul_users: u32 = config.traffic.iter().map(|t| t.ul_users).sum();
    let network = &config.network;

    println!("\n{rule}");
    println!("RAN slicing simulation results");
    println!("{rule}");
    println!("\nConfiguration: {}", report.name);
    println!("Users: {dl_users} DL, {ul_users} UL");
    println!(
        "Network: {}MHz, {} ({} PRBs)",
        network.bandwidth, report.inter_scheduler, report.total_prbs
    );
    println!(
        "MIMO: {:?}, {} layers",
        network.mimo_mode, network.mimo_layers
    );

    for direction in Direction::ALL {
        let Some(m) = report.kpis.get(direction) else {
            continue;
        };
        println!("\n{} Performance:", direction.tag());
        println!("  Throughput:     {} Mbps", m.throughput_mbps);
        println!("  Packet Loss:    {}%", m.packet_loss_rate);
        println!("  SINR:           {} dB", m.avg_sinr_db);
        println!("  MCS:            {}", m.avg_mcs);
        println!("  Resource Use:   {} PRBs", m.avg_resource_use);
        println!(
            "  Packets:        {} sent, {} lost",
            m.total_packets_sent, m.total_packets_lost
        );
    }

    if report.slice_kpis.len() > 1 {
        println!("\nPer slice:");
        for (label, kpis) in &report.slice_kpis {
            for direction in kpis.directions() {
                if let Some(m) = kpis.get(direction) {
                    println!(
                        "  {label:<12} {}  {:>8} Mbps  {:>6}% loss  {:>6} PRBs",
                        direction.tag(),
                        m.throughput_mbps,
                        m.packet_loss_rate,
                        m.avg_resource_use
                    );
                }
            }
        }
    }
    println!("\n{rule}");
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
