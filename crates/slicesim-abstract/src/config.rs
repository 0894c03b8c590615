//! Scenario configuration.
//!
//! A scenario has three sections: `network` (cell and scheduler selection),
//! `traffic` (one entry per slice / UE group) and `simulation` (timing).
//! Every optional field has a serde default so partially written documents
//! load the same way they always have.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::carrier::CarrierProfile;
use crate::record::Direction;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Top-level scenario document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub network: NetworkConfig,
    #[serde(deserialize_with = "one_or_many")]
    pub traffic: Vec<TrafficConfig>,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Radio cell parameters and scheduler selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Channel bandwidth in MHz.
    pub bandwidth: u32,
    #[serde(default = "default_frequency_range")]
    pub frequency_range: String,
    #[serde(default = "default_band")]
    pub band: String,
    #[serde(default)]
    pub tdd: bool,
    /// Per-UE buffer size in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: u64,
    #[serde(default = "default_scheduler")]
    pub inter_scheduler: String,
    #[serde(default = "default_scheduler")]
    pub intra_scheduler: String,
    #[serde(default)]
    pub mimo_mode: MimoMode,
    #[serde(default = "default_mimo_layers")]
    pub mimo_layers: u8,
}

fn default_frequency_range() -> String {
    "FR1".to_string()
}
fn default_band() -> String {
    "B1".to_string()
}
fn default_buffer_size() -> u64 {
    81920
}
fn default_scheduler() -> String {
    "RR".to_string()
}
fn default_mimo_layers() -> u8 {
    1
}

/// One UE group. Each entry becomes one slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficConfig {
    /// Slice label; falls back to `service_type`.
    #[serde(default)]
    pub label: Option<String>,
    pub dl_users: u32,
    pub ul_users: u32,
    /// Bytes per packet.
    pub dl_packet_size: u32,
    pub ul_packet_size: u32,
    /// Packets per second per UE.
    pub dl_arrival_rate: f64,
    pub ul_arrival_rate: f64,
    #[serde(default = "default_service_type")]
    pub service_type: String,
    /// Delay bound in ms.
    #[serde(default = "default_delay_requirement")]
    pub delay_requirement: u32,
    /// Availability target in percent; an empty string means none.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub availability: Option<f64>,
    #[serde(default = "default_sinr_pattern")]
    pub sinr_pattern: String,
    #[serde(default = "default_has_uplink")]
    pub has_uplink: bool,
    #[serde(default)]
    pub intra_scheduler: Option<String>,
    #[serde(default)]
    pub mimo_mode: Option<MimoMode>,
    #[serde(default)]
    pub mimo_layers: Option<u8>,
}

fn default_service_type() -> String {
    "eMBB".to_string()
}
fn default_delay_requirement() -> u32 {
    20
}
fn default_sinr_pattern() -> String {
    "S30".to_string()
}
fn default_has_uplink() -> bool {
    true
}

impl TrafficConfig {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.service_type)
    }

    pub fn users(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Downlink => self.dl_users,
            Direction::Uplink => self.ul_users,
        }
    }

    pub fn packet_size(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Downlink => self.dl_packet_size,
            Direction::Uplink => self.ul_packet_size,
        }
    }

    pub fn arrival_rate(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Downlink => self.dl_arrival_rate,
            Direction::Uplink => self.ul_arrival_rate,
        }
    }

    pub fn intra_scheduler<'a>(&'a self, network: &'a NetworkConfig) -> &'a str {
        self.intra_scheduler
            .as_deref()
            .unwrap_or(&network.intra_scheduler)
    }

    pub fn mimo(&self, network: &NetworkConfig) -> MimoConfig {
        MimoConfig {
            mode: self.mimo_mode.unwrap_or(network.mimo_mode),
            layers: self.mimo_layers.unwrap_or(network.mimo_layers),
        }
    }
}

/// Run timing. Immutable for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_duration_ms")]
    pub duration_ms: u64,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_measurement_interval_ms")]
    pub measurement_interval_ms: f64,
    #[serde(default = "default_inter_slice_granularity_ms")]
    pub inter_slice_granularity_ms: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_name() -> String {
    "Unnamed Scenario".to_string()
}
fn default_duration_ms() -> u64 {
    30000
}
fn default_measurement_interval_ms() -> f64 {
    1000.0
}
fn default_inter_slice_granularity_ms() -> f64 {
    3000.0
}
fn default_seed() -> u64 {
    42
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            duration_ms: default_duration_ms(),
            debug: false,
            measurement_interval_ms: default_measurement_interval_ms(),
            inter_slice_granularity_ms: default_inter_slice_granularity_ms(),
            seed: default_seed(),
        }
    }
}

impl SimulationConfig {
    /// Measurement interval rounded to whole milliseconds.
    pub fn measurement_interval(&self) -> u64 {
        self.measurement_interval_ms.round() as u64
    }

    /// Inter-slice allocation period rounded to whole milliseconds.
    pub fn allocation_granularity(&self) -> u64 {
        self.inter_slice_granularity_ms.round() as u64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration_ms == 0 {
            return Err(invalid("simulation.duration_ms must be positive"));
        }
        for (name, value) in [
            ("measurement_interval_ms", self.measurement_interval_ms),
            ("inter_slice_granularity_ms", self.inter_slice_granularity_ms),
        ] {
            if !value.is_finite() || value < 1.0 {
                return Err(invalid(format!(
                    "simulation.{name} must be at least 1 ms, got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MimoMode {
    /// Single-user: every UE is served with all layers.
    #[default]
    #[serde(rename = "SU")]
    SingleUser,
    /// Multi-user: layers are spread over co-scheduled UEs.
    #[serde(rename = "MU")]
    MultiUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MimoConfig {
    pub mode: MimoMode,
    pub layers: u8,
}

impl ScenarioConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Load a scenario, picking the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation.validate()?;
        validate_network(&self.network)?;
        if self.traffic.is_empty() {
            return Err(invalid("at least one traffic entry is required"));
        }
        for traffic in &self.traffic {
            validate_traffic(traffic, &self.network)?;
        }
        Ok(())
    }
}

fn validate_network(network: &NetworkConfig) -> Result<(), ConfigError> {
    CarrierProfile::from_network(network)?;
    if network.buffer_size == 0 {
        return Err(invalid("network.buffer_size must be positive"));
    }
    validate_layers(network.mimo_layers)
}

fn validate_layers(layers: u8) -> Result<(), ConfigError> {
    if !(1..=8).contains(&layers) {
        return Err(invalid(format!("mimo_layers must be in 1..=8, got {layers}")));
    }
    Ok(())
}

fn validate_traffic(traffic: &TrafficConfig, network: &NetworkConfig) -> Result<(), ConfigError> {
    let label = traffic.label();
    if label.is_empty()
        || !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(invalid(format!(
            "slice label '{label}' must be non-empty ASCII alphanumerics, '-' or '_'"
        )));
    }
    for direction in Direction::ALL {
        if traffic.packet_size(direction) == 0 {
            return Err(invalid(format!(
                "slice '{label}': {} packet size must be positive",
                direction.tag()
            )));
        }
        let rate = traffic.arrival_rate(direction);
        if !rate.is_finite() || rate <= 0.0 {
            return Err(invalid(format!(
                "slice '{label}': {} arrival rate must be positive, got {rate}",
                direction.tag()
            )));
        }
    }
    if let Some(availability) = traffic.availability
        && !(availability > 0.0 && availability <= 100.0)
    {
        return Err(invalid(format!(
            "slice '{label}': availability must be in (0, 100], got {availability}"
        )));
    }
    validate_layers(traffic.mimo(network).layers)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation(message.into())
}

/// Accepts either a single table or a list of tables.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<TrafficConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Box<TrafficConfig>),
        Many(Vec<TrafficConfig>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(traffic) => vec![*traffic],
        OneOrMany::Many(list) => list,
    })
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(v)) => Ok(Some(v)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
