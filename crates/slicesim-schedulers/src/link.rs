//! SINR to MCS mapping and per-PRB capacity.

use slicesim_abstract::{CarrierProfile, Direction};

pub const MAX_MCS: u8 = 28;

const SUBCARRIERS_PER_PRB: f64 = 12.0;
const SYMBOLS_PER_SLOT: f64 = 14.0;

/// Spectral efficiency (bits per resource element) for the 64QAM MCS table.
const MCS_EFFICIENCY: [f64; MAX_MCS as usize + 1] = [
    0.2344, 0.3066, 0.3770, 0.4902, 0.6016, 0.7402, 0.8770, 1.0273, 1.1758, 1.3262, 1.3281,
    1.4766, 1.6953, 1.9141, 2.1602, 2.4063, 2.5703, 2.5664, 2.7305, 3.0293, 3.3223, 3.6094,
    3.9023, 4.2129, 4.5234, 4.8164, 5.1152, 5.3320, 5.5547,
];

pub fn mcs_for_sinr(sinr_db: f64) -> u8 {
    if !sinr_db.is_finite() {
        return 0;
    }
    ((sinr_db + 5.0) / 1.05).floor().clamp(0.0, MAX_MCS as f64) as u8
}

pub fn spectral_efficiency(mcs: u8) -> f64 {
    MCS_EFFICIENCY[mcs.min(MAX_MCS) as usize]
}

fn overhead(direction: Direction) -> f64 {
    match direction {
        Direction::Downlink => 0.14,
        Direction::Uplink => 0.08,
    }
}

/// Bytes a UE can move in `interval_ms` with `prbs` resource blocks.
pub fn capacity_bytes(
    prbs: u32,
    mcs: u8,
    layers: u8,
    carrier: &CarrierProfile,
    direction: Direction,
    interval_ms: u64,
) -> u64 {
    let resource_elements = prbs as f64
        * SUBCARRIERS_PER_PRB
        * SYMBOLS_PER_SLOT
        * carrier.slots_per_ms as f64
        * interval_ms as f64;
    let bits = resource_elements
        * spectral_efficiency(mcs)
        * layers as f64
        * carrier.time_fraction(direction)
        * (1.0 - overhead(direction));
    (bits / 8.0).floor() as u64
}
