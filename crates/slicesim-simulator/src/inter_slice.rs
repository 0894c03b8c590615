//! Slice registry and the periodic inter-slice allocation step.

use serde::Serialize;
use slicesim_abstract::{
    CarrierProfile, Direction, InterSlicePolicy, IntraSetup, SchedulerFactory, SliceDemand,
};
use tracing::{debug, info};

use crate::error::{Phase, SimError};
use crate::slice::{Slice, SliceSpec};

/// Shares handed out by one allocation wake-up, in registration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationRecord {
    pub time_ms: u64,
    pub shares: Vec<(String, u32)>,
}

impl AllocationRecord {
    pub fn total(&self) -> u64 {
        self.shares.iter().map(|(_, prbs)| *prbs as u64).sum()
    }
}

/// Owns every slice and partitions the cell's resource blocks among them.
pub struct InterSliceScheduler {
    policy: Box<dyn InterSlicePolicy>,
    carrier: CarrierProfile,
    buffer_size: u64,
    granularity_ms: u64,
    seed: u64,
    slices: Vec<Slice>,
    history: Vec<AllocationRecord>,
}

impl InterSliceScheduler {
    pub fn new(
        policy: Box<dyn InterSlicePolicy>,
        carrier: CarrierProfile,
        buffer_size: u64,
        granularity_ms: u64,
        seed: u64,
    ) -> Self {
        Self {
            policy,
            carrier,
            buffer_size,
            granularity_ms,
            seed,
            slices: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    pub fn total_prbs(&self) -> u32 {
        self.carrier.total_prbs
    }

    pub fn granularity_ms(&self) -> u64 {
        self.granularity_ms
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub(crate) fn slices_mut(&mut self) -> &mut [Slice] {
        &mut self.slices
    }

    pub fn slice(&self, label: &str) -> Option<&Slice> {
        self.slices.iter().find(|s| s.label() == label)
    }

    pub fn history(&self) -> &[AllocationRecord] {
        &self.history
    }

    /// Register a new slice and build its DL (and, if enabled, UL)
    /// schedulers. Labels must be unique; the first registration wins.
    pub fn create_slice(
        &mut self,
        spec: SliceSpec,
        factory: &dyn SchedulerFactory,
    ) -> Result<&Slice, SimError> {
        if self.slice(&spec.label).is_some() {
            return Err(SimError::DuplicateSlice(spec.label));
        }

        let index = self.slices.len() as u64;
        let build = |direction: Direction| {
            let traffic = spec.traffic(direction);
            let setup = IntraSetup {
                label: spec.label.clone(),
                direction,
                users: spec.users.get(direction),
                packet_size: traffic.packet_size,
                arrival_rate: traffic.arrival_rate,
                sinr_pattern: spec.sinr_pattern.clone(),
                buffer_size: self.buffer_size,
                mimo: spec.mimo,
                carrier: self.carrier,
                seed: derive_seed(self.seed, index, direction),
            };
            factory
                .intra_scheduler(&spec.intra_scheduler, &setup)
                .map_err(|source| SimError::Process {
                    phase: Phase::Setup,
                    label: spec.label.clone(),
                    time_ms: 0,
                    source,
                })
        };
        let scheduler_dl = build(Direction::Downlink)?;
        let scheduler_ul = if spec.has_uplink {
            Some(build(Direction::Uplink)?)
        } else {
            None
        };

        info!(
            "Created slice '{}' ({} DL / {} UL users, intra {}, band {}, MIMO {:?}x{})",
            spec.label,
            spec.users.dl,
            spec.users.ul,
            spec.intra_scheduler,
            spec.band,
            spec.mimo.mode,
            spec.mimo.layers
        );
        self.slices
            .push(Slice::new(spec, scheduler_dl, scheduler_ul));
        Ok(&self.slices[self.slices.len() - 1])
    }

    /// One allocation wake-up. Runs to completion before any slice step of
    /// the same tick observes the new shares.
    pub fn res_alloc(&mut self, now: u64) -> Result<(), SimError> {
        if self.slices.is_empty() {
            debug!("t={now}: no slices registered, nothing to allocate");
            return Ok(());
        }

        let total = self.carrier.total_prbs;
        let shares = {
            let demands: Vec<SliceDemand> = self.slices.iter().map(Slice::demand).collect();
            let shares = self
                .policy
                .partition(total, &demands)
                .map_err(|source| SimError::Process {
                    phase: Phase::Allocation,
                    label: self.policy.name().to_string(),
                    time_ms: now,
                    source,
                })?;
            if shares.len() != demands.len() {
                return Err(SimError::malformed(
                    Phase::Allocation,
                    self.policy.name(),
                    now,
                    format!("{} shares for {} slices", shares.len(), demands.len()),
                ));
            }
            let sum: u64 = shares.iter().map(|&s| s as u64).sum();
            if sum > total as u64 {
                return Err(SimError::malformed(
                    Phase::Allocation,
                    self.policy.name(),
                    now,
                    format!("allocated {sum} PRBs but the cell has {total}"),
                ));
            }
            shares
        };

        let mut record = AllocationRecord {
            time_ms: now,
            shares: Vec::with_capacity(shares.len()),
        };
        for (slice, share) in self.slices.iter_mut().zip(shares) {
            slice.set_share(share);
            record.shares.push((slice.label().to_string(), share));
        }
        debug!("t={now}: {} allocation {:?}", self.policy.name(), record.shares);
        self.history.push(record);
        Ok(())
    }
}

fn derive_seed(base: u64, slice_index: u64, direction: Direction) -> u64 {
    let lane = slice_index * 2
        + match direction {
            Direction::Downlink => 0,
            Direction::Uplink => 1,
        };
    base ^ (lane + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slice::{DirectionTraffic, SliceRequirements, UserCounts};
    use slicesim_abstract::{
        IntervalContext, IntraSliceScheduler, MimoConfig, MimoMode, SchedulerError,
    };

    struct Idle;

    impl IntraSliceScheduler for Idle {
        fn name(&self) -> &str {
            "idle"
        }
        fn users(&self) -> u32 {
            0
        }
        fn step(&mut self, _ctx: &mut dyn IntervalContext) -> Result<(), SchedulerError> {
            Ok(())
        }
    }

    /// Hands every slice the full budget.
    struct Greedy;

    impl InterSlicePolicy for Greedy {
        fn name(&self) -> &str {
            "greedy"
        }
        fn partition(
            &mut self,
            total_prbs: u32,
            demands: &[SliceDemand],
        ) -> Result<Vec<u32>, SchedulerError> {
            Ok(vec![total_prbs; demands.len()])
        }
    }

    struct Equal;

    impl InterSlicePolicy for Equal {
        fn name(&self) -> &str {
            "equal"
        }
        fn partition(
            &mut self,
            total_prbs: u32,
            demands: &[SliceDemand],
        ) -> Result<Vec<u32>, SchedulerError> {
            let n = demands.len() as u32;
            Ok((0..n)
                .map(|i| total_prbs / n + u32::from(i < total_prbs % n))
                .collect())
        }
    }

    struct Factory;

    impl SchedulerFactory for Factory {
        fn intra_scheduler(
            &self,
            kind: &str,
            _setup: &IntraSetup,
        ) -> Result<Box<dyn IntraSliceScheduler>, SchedulerError> {
            match kind {
                "idle" => Ok(Box::new(Idle)),
                other => Err(SchedulerError::UnknownKind {
                    role: "intra-slice",
                    kind: other.to_string(),
                }),
            }
        }
        fn inter_policy(&self, _kind: &str) -> Result<Box<dyn InterSlicePolicy>, SchedulerError> {
            Ok(Box::new(Equal))
        }
    }

    fn carrier() -> CarrierProfile {
        CarrierProfile {
            total_prbs: 106,
            scs_khz: 15,
            slots_per_ms: 1,
            tdd: false,
        }
    }

    fn spec(label: &str) -> SliceSpec {
        let traffic = DirectionTraffic {
            packet_size: 1000,
            arrival_rate: 10.0,
        };
        SliceSpec {
            label: label.to_string(),
            requirements: SliceRequirements {
                delay_ms: 20,
                min_throughput_dl_bps: 1.0,
                min_throughput_ul_bps: 1.0,
                availability: None,
            },
            users: UserCounts { dl: 1, ul: 1 },
            band: "B1".to_string(),
            debug: false,
            mimo: MimoConfig {
                mode: MimoMode::SingleUser,
                layers: 1,
            },
            intra_scheduler: "idle".to_string(),
            has_uplink: true,
            dl_traffic: traffic,
            ul_traffic: traffic,
            sinr_pattern: "S30".to_string(),
        }
    }

    fn scheduler(policy: Box<dyn InterSlicePolicy>) -> InterSliceScheduler {
        InterSliceScheduler::new(policy, carrier(), 81920, 3000, 42)
    }

    #[test]
    fn test_duplicate_label_rejected_first_kept() {
        let mut inter = scheduler(Box::new(Equal));
        inter.create_slice(spec("eMBB"), &Factory).unwrap();
        let err = inter.create_slice(spec("eMBB"), &Factory).err().unwrap();
        assert!(matches!(err, SimError::DuplicateSlice(ref l) if l == "eMBB"));
        assert_eq!(inter.slices().len(), 1);

        inter.res_alloc(0).unwrap();
        assert_eq!(inter.slice("eMBB").unwrap().share_prbs(), 106);
    }

    #[test]
    fn test_uplink_capability_flag() {
        let mut inter = scheduler(Box::new(Equal));
        let mut lte = spec("LTE");
        lte.has_uplink = false;
        let slice = inter.create_slice(lte, &Factory).unwrap();
        assert!(!slice.has_uplink());
        assert!(slice.scheduler(Direction::Uplink).is_none());
        let slice = inter.create_slice(spec("LTE2"), &Factory).unwrap();
        assert!(slice.has_uplink());
    }

    #[test]
    fn test_zero_slices_is_noop() {
        let mut inter = scheduler(Box::new(Greedy));
        inter.res_alloc(0).unwrap();
        inter.res_alloc(3000).unwrap();
        assert!(inter.history().is_empty());
    }

    #[test]
    fn test_shares_follow_registration_order() {
        let mut inter = scheduler(Box::new(Equal));
        for label in ["a", "b", "c"] {
            inter.create_slice(spec(label), &Factory).unwrap();
        }
        inter.res_alloc(0).unwrap();
        let record = &inter.history()[0];
        assert_eq!(
            record.shares,
            vec![
                ("a".to_string(), 36),
                ("b".to_string(), 35),
                ("c".to_string(), 35)
            ]
        );
        assert_eq!(record.total(), 106);
    }

    #[test]
    fn test_over_budget_partition_is_rejected() {
        let mut inter = scheduler(Box::new(Greedy));
        inter.create_slice(spec("a"), &Factory).unwrap();
        inter.create_slice(spec("b"), &Factory).unwrap();
        let err = inter.res_alloc(3000).unwrap_err();
        match err {
            SimError::Process {
                phase,
                label,
                time_ms,
                ..
            } => {
                assert_eq!(phase, Phase::Allocation);
                assert_eq!(label, "greedy");
                assert_eq!(time_ms, 3000);
            }
            other => panic!("unexpected error {other}"),
        }
        assert!(inter.history().is_empty());
    }

    #[test]
    fn test_unknown_intra_scheduler_fails_setup() {
        let mut inter = scheduler(Box::new(Equal));
        let mut bad = spec("x");
        bad.intra_scheduler = "EDF".to_string();
        let err = inter.create_slice(bad, &Factory).err().unwrap();
        assert!(matches!(
            err,
            SimError::Process {
                phase: Phase::Setup,
                ..
            }
        ));
        assert!(inter.slices().is_empty());
    }

    #[test]
    fn test_seeds_differ_per_lane() {
        let a = derive_seed(42, 0, Direction::Downlink);
        let b = derive_seed(42, 0, Direction::Uplink);
        let c = derive_seed(42, 1, Direction::Downlink);
        assert!(a != b && b != c && a != c);
    }
}
