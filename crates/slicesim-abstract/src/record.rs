use serde::{Deserialize, Serialize};
use std::fmt;

/// Link direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "DL")]
    Downlink,
    #[serde(rename = "UL")]
    Uplink,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Downlink, Direction::Uplink];

    /// Short upper-case tag used in reports ("DL" / "UL").
    pub fn tag(&self) -> &'static str {
        match self {
            Direction::Downlink => "DL",
            Direction::Uplink => "UL",
        }
    }

    /// Prefix of the statistics file name ("dl" / "ul").
    pub fn file_prefix(&self) -> &'static str {
        match self {
            Direction::Downlink => "dl",
            Direction::Uplink => "ul",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Column header written as the first line of every statistics file.
pub const RECORD_HEADER: &str =
    "time_ms ue sinr_db mcs buffer_bytes prbs packets_sent packets_lost bytes";

/// Outcome of scheduling one UE for one interval.
///
/// Written once by an intra-slice scheduler and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficRecord {
    /// Start of the interval this record covers.
    pub time_ms: u64,
    pub ue_id: u32,
    pub sinr_db: f64,
    pub mcs: u8,
    /// Bytes still queued at the UE after the interval. Not used by the KPIs.
    pub buffer_bytes: u64,
    pub prbs: u32,
    pub packets_sent: u64,
    pub packets_lost: u64,
    pub bytes_delivered: u64,
}

impl TrafficRecord {
    /// Render as one whitespace separated row in [`RECORD_HEADER`] order.
    pub fn to_row(&self) -> String {
        format!(
            "{} {} {:.2} {} {} {} {} {} {}",
            self.time_ms,
            self.ue_id,
            self.sinr_db,
            self.mcs,
            self.buffer_bytes,
            self.prbs,
            self.packets_sent,
            self.packets_lost,
            self.bytes_delivered
        )
    }
}
