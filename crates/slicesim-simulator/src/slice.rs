use serde::Serialize;
use slicesim_abstract::{
    Direction, IntraSliceScheduler, MimoConfig, NetworkConfig, SliceDemand, TrafficConfig,
};

/// Declared QoS requirements of a slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SliceRequirements {
    pub delay_ms: u32,
    /// Offered load the slice must carry, in bit/s.
    pub min_throughput_dl_bps: f64,
    pub min_throughput_ul_bps: f64,
    /// Availability target in percent.
    pub availability: Option<f64>,
}

impl SliceRequirements {
    /// Weight used by requirement-aware inter-slice policies.
    pub fn weight(&self) -> f64 {
        self.min_throughput_dl_bps + self.min_throughput_ul_bps
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserCounts {
    pub dl: u32,
    pub ul: u32,
}

impl UserCounts {
    pub fn get(&self, direction: Direction) -> u32 {
        match direction {
            Direction::Downlink => self.dl,
            Direction::Uplink => self.ul,
        }
    }
}

/// Per-direction traffic profile of a UE group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DirectionTraffic {
    pub packet_size: u32,
    /// Packets per second per UE.
    pub arrival_rate: f64,
}

/// Arguments of `InterSliceScheduler::create_slice`.
#[derive(Debug, Clone)]
pub struct SliceSpec {
    pub label: String,
    pub requirements: SliceRequirements,
    pub users: UserCounts,
    pub band: String,
    pub debug: bool,
    pub mimo: MimoConfig,
    pub intra_scheduler: String,
    /// Slices without uplink get no UL scheduler and no UL log.
    pub has_uplink: bool,
    pub dl_traffic: DirectionTraffic,
    pub ul_traffic: DirectionTraffic,
    pub sinr_pattern: String,
}

impl SliceSpec {
    pub fn from_config(network: &NetworkConfig, traffic: &TrafficConfig, debug: bool) -> Self {
        let offered = |direction: Direction| {
            8.0 * traffic.packet_size(direction) as f64
                * traffic.arrival_rate(direction)
                * traffic.users(direction) as f64
        };
        let profile = |direction: Direction| DirectionTraffic {
            packet_size: traffic.packet_size(direction),
            arrival_rate: traffic.arrival_rate(direction),
        };

        Self {
            label: traffic.label().to_string(),
            requirements: SliceRequirements {
                delay_ms: traffic.delay_requirement,
                min_throughput_dl_bps: offered(Direction::Downlink),
                min_throughput_ul_bps: offered(Direction::Uplink),
                availability: traffic.availability,
            },
            users: UserCounts {
                dl: traffic.dl_users,
                ul: traffic.ul_users,
            },
            band: network.band.clone(),
            debug,
            mimo: traffic.mimo(network),
            intra_scheduler: traffic.intra_scheduler(network).to_string(),
            has_uplink: traffic.has_uplink,
            dl_traffic: profile(Direction::Downlink),
            ul_traffic: profile(Direction::Uplink),
            sinr_pattern: traffic.sinr_pattern.clone(),
        }
    }

    pub fn traffic(&self, direction: Direction) -> DirectionTraffic {
        match direction {
            Direction::Downlink => self.dl_traffic,
            Direction::Uplink => self.ul_traffic,
        }
    }
}

/// A registered slice: its declared profile, its schedulers and the share
/// assigned by the most recent inter-slice allocation.
pub struct Slice {
    spec: SliceSpec,
    scheduler_dl: Box<dyn IntraSliceScheduler>,
    scheduler_ul: Option<Box<dyn IntraSliceScheduler>>,
    share_prbs: u32,
}

impl Slice {
    pub(crate) fn new(
        spec: SliceSpec,
        scheduler_dl: Box<dyn IntraSliceScheduler>,
        scheduler_ul: Option<Box<dyn IntraSliceScheduler>>,
    ) -> Self {
        Self {
            spec,
            scheduler_dl,
            scheduler_ul,
            share_prbs: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.spec.label
    }

    pub fn spec(&self) -> &SliceSpec {
        &self.spec
    }

    pub fn has_uplink(&self) -> bool {
        self.scheduler_ul.is_some()
    }

    pub fn share_prbs(&self) -> u32 {
        self.share_prbs
    }

    pub(crate) fn set_share(&mut self, prbs: u32) {
        self.share_prbs = prbs;
    }

    pub fn scheduler(&self, direction: Direction) -> Option<&dyn IntraSliceScheduler> {
        match direction {
            Direction::Downlink => Some(self.scheduler_dl.as_ref()),
            Direction::Uplink => self.scheduler_ul.as_deref(),
        }
    }

    pub fn scheduler_mut(
        &mut self,
        direction: Direction,
    ) -> Option<&mut (dyn IntraSliceScheduler + 'static)> {
        match direction {
            Direction::Downlink => Some(self.scheduler_dl.as_mut()),
            Direction::Uplink => self.scheduler_ul.as_deref_mut(),
        }
    }

    pub fn backlog_bytes(&self, direction: Direction) -> u64 {
        self.scheduler(direction)
            .map(|s| s.backlog_bytes())
            .unwrap_or(0)
    }

    pub fn demand(&self) -> SliceDemand {
        SliceDemand {
            weight: self.spec.requirements.weight(),
            backlog_bytes: Direction::ALL.iter().map(|&d| self.backlog_bytes(d)).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slicesim_abstract::ScenarioConfig;

    #[test]
    fn test_spec_from_config_derives_requirements() {
        let config = ScenarioConfig::from_toml_str(
            r#"
[network]
bandwidth = 20
mimo_layers = 2

[traffic]
dl_users = 5
ul_users = 2
dl_packet_size = 1000
ul_packet_size = 200
dl_arrival_rate = 10.0
ul_arrival_rate = 5.0
availability = 99.9
has_uplink = false
"#,
        )
        .unwrap();
        let spec = SliceSpec::from_config(&config.network, &config.traffic[0], false);
        assert_eq!(spec.label, "eMBB");
        assert_eq!(spec.requirements.min_throughput_dl_bps, 400_000.0);
        assert_eq!(spec.requirements.min_throughput_ul_bps, 16_000.0);
        assert_eq!(spec.requirements.weight(), 416_000.0);
        assert_eq!(spec.requirements.availability, Some(99.9));
        assert_eq!(spec.mimo.layers, 2);
        assert_eq!(spec.intra_scheduler, "RR");
        assert!(!spec.has_uplink);
        assert_eq!(spec.traffic(Direction::Uplink).packet_size, 200);
    }

    struct Queued(u64);

    impl IntraSliceScheduler for Queued {
        fn name(&self) -> &str {
            "Queued"
        }

        fn users(&self) -> u32 {
            1
        }

        fn step(
            &mut self,
            _ctx: &mut dyn slicesim_abstract::IntervalContext,
        ) -> Result<(), slicesim_abstract::SchedulerError> {
            Ok(())
        }

        fn backlog_bytes(&self) -> u64 {
            self.0
        }
    }

    #[test]
    fn test_demand_sums_backlog_of_both_directions() {
        let config = ScenarioConfig::from_toml_str(
            r#"
[network]
bandwidth = 20

[traffic]
dl_users = 1
ul_users = 1
dl_packet_size = 1000
ul_packet_size = 500
dl_arrival_rate = 10.0
ul_arrival_rate = 4.0
"#,
        )
        .unwrap();
        let spec = SliceSpec::from_config(&config.network, &config.traffic[0], false);
        let weight = spec.requirements.weight();
        let slice = Slice::new(spec, Box::new(Queued(3000)), Some(Box::new(Queued(700))));
        let demand = slice.demand();
        assert_eq!(demand.weight, weight);
        assert_eq!(demand.backlog_bytes, 3700);
        assert_eq!(slice.backlog_bytes(Direction::Uplink), 700);
    }
}
