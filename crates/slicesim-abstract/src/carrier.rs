//! Carrier numerology and resource budget.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, NetworkConfig};
use crate::record::Direction;

/// Share of slots given to DL in TDD (DDDSU-like pattern).
pub const TDD_DL_FRACTION: f64 = 0.75;

/// Maximum transmission bandwidth configuration (MHz, PRBs) per SCS.
const FR1_SCS15: &[(u32, u32)] = &[
    (5, 25),
    (10, 52),
    (15, 79),
    (20, 106),
    (25, 133),
    (30, 160),
    (40, 216),
    (50, 270),
];
const FR1_SCS30: &[(u32, u32)] = &[(60, 162), (70, 189), (80, 217), (90, 245), (100, 273)];
const FR2_SCS120: &[(u32, u32)] = &[(50, 32), (100, 66), (200, 132), (400, 264)];

/// Static description of the cell's carrier, derived once from the network
/// section and fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarrierProfile {
    /// Total resource blocks the inter-slice scheduler may hand out.
    pub total_prbs: u32,
    pub scs_khz: u32,
    pub slots_per_ms: u32,
    pub tdd: bool,
}

impl CarrierProfile {
    pub fn from_network(network: &NetworkConfig) -> Result<Self, ConfigError> {
        let bw = network.bandwidth;
        let (table, scs_khz) = match network.frequency_range.as_str() {
            "FR1" if bw <= 50 => (FR1_SCS15, 15),
            "FR1" => (FR1_SCS30, 30),
            "FR2" => (FR2_SCS120, 120),
            other => {
                return Err(ConfigError::Validation(format!(
                    "unknown frequency_range '{other}'"
                )));
            }
        };
        let total_prbs = table
            .iter()
            .find_map(|&(mhz, prbs)| (mhz == bw).then_some(prbs))
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "bandwidth {bw} MHz is not defined for {}",
                    network.frequency_range
                ))
            })?;

        Ok(Self {
            total_prbs,
            scs_khz,
            slots_per_ms: scs_khz / 15,
            tdd: network.tdd,
        })
    }

    /// Fraction of air time available to `direction`.
    pub fn time_fraction(&self, direction: Direction) -> f64 {
        match (self.tdd, direction) {
            (false, _) => 1.0,
            (true, Direction::Downlink) => TDD_DL_FRACTION,
            (true, Direction::Uplink) => 1.0 - TDD_DL_FRACTION,
        }
    }
}
