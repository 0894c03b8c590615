//! Inter-slice policies: divide the cell's resource blocks among slices.

use slicesim_abstract::{InterSlicePolicy, SchedulerError, SliceDemand};

use crate::share::split_by_weights;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterKind {
    RoundRobin,
    RequirementWeighted,
    BacklogProportional,
}

/// `RR`: every slice gets the same share.
#[derive(Debug, Default)]
pub struct EqualShare;

impl InterSlicePolicy for EqualShare {
    fn name(&self) -> &str {
        "RR"
    }

    fn partition(
        &mut self,
        total_prbs: u32,
        demands: &[SliceDemand],
    ) -> Result<Vec<u32>, SchedulerError> {
        Ok(split_by_weights(total_prbs, &vec![1.0; demands.len()]))
    }
}

/// `WRR`: shares follow the declared minimum-throughput requirements.
#[derive(Debug, Default)]
pub struct RequirementWeighted;

impl InterSlicePolicy for RequirementWeighted {
    fn name(&self) -> &str {
        "WRR"
    }

    fn partition(
        &mut self,
        total_prbs: u32,
        demands: &[SliceDemand],
    ) -> Result<Vec<u32>, SchedulerError> {
        let weights: Vec<f64> = demands.iter().map(|d| d.weight).collect();
        Ok(split_by_weights(total_prbs, &weights))
    }
}

/// `PF`: shares follow requirement weight times queued bytes, so slices
/// with nothing waiting give their blocks to those that have. With every
/// queue empty it behaves like `WRR`.
#[derive(Debug, Default)]
pub struct BacklogProportional;

impl InterSlicePolicy for BacklogProportional {
    fn name(&self) -> &str {
        "PF"
    }

    fn partition(
        &mut self,
        total_prbs: u32,
        demands: &[SliceDemand],
    ) -> Result<Vec<u32>, SchedulerError> {
        let any_backlog = demands.iter().any(|d| d.backlog_bytes > 0);
        let weights: Vec<f64> = demands
            .iter()
            .map(|d| {
                if any_backlog {
                    d.weight.max(1.0) * d.backlog_bytes as f64
                } else {
                    d.weight
                }
            })
            .collect();
        Ok(split_by_weights(total_prbs, &weights))
    }
}

pub fn equal_share() -> Box<dyn InterSlicePolicy> {
    Box::new(EqualShare)
}

pub fn requirement_weighted() -> Box<dyn InterSlicePolicy> {
    Box::new(RequirementWeighted)
}

pub fn backlog_proportional() -> Box<dyn InterSlicePolicy> {
    Box::new(BacklogProportional)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demands() -> Vec<SliceDemand> {
        vec![
            SliceDemand {
                weight: 400_000.0,
                backlog_bytes: 0,
            },
            SliceDemand {
                weight: 100_000.0,
                backlog_bytes: 5000,
            },
        ]
    }

    #[test]
    fn test_equal_share_ignores_weights() {
        assert_eq!(EqualShare.partition(106, &demands()).unwrap(), vec![53, 53]);
    }

    #[test]
    fn test_requirement_weighted() {
        let shares = RequirementWeighted.partition(100, &demands()).unwrap();
        assert_eq!(shares, vec![80, 20]);
    }

    #[test]
    fn test_backlog_proportional_follows_queues() {
        let shares = BacklogProportional.partition(100, &demands()).unwrap();
        assert_eq!(shares, vec![0, 100]);

        let idle: Vec<SliceDemand> = demands()
            .into_iter()
            .map(|d| SliceDemand {
                backlog_bytes: 0,
                ..d
            })
            .collect();
        assert_eq!(
            BacklogProportional.partition(100, &idle).unwrap(),
            vec![80, 20]
        );
    }

    #[test]
    fn test_no_slices_yields_empty_partition() {
        assert!(EqualShare.partition(106, &[]).unwrap().is_empty());
    }
}
