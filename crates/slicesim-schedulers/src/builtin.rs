use slicesim_abstract::{
    InterSlicePolicy, IntraSetup, IntraSliceScheduler, SchedulerError, SchedulerFactory,
};

use crate::inter::{InterKind, backlog_proportional, equal_share, requirement_weighted};
use crate::intra::UeGroupScheduler;
use crate::sinr::SinrPattern;
use crate::spec::{inter_kind_by_name, intra_kind_by_name};

/// Factory for the scheduling algorithms shipped with this crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuiltinSchedulers;

impl SchedulerFactory for BuiltinSchedulers {
    fn intra_scheduler(
        &self,
        kind: &str,
        setup: &IntraSetup,
    ) -> Result<Box<dyn IntraSliceScheduler>, SchedulerError> {
        let kind = intra_kind_by_name(kind)?;
        Ok(Box::new(UeGroupScheduler::new(kind, setup)?))
    }

    fn inter_policy(&self, kind: &str) -> Result<Box<dyn InterSlicePolicy>, SchedulerError> {
        Ok(match inter_kind_by_name(kind)? {
            InterKind::RoundRobin => equal_share(),
            InterKind::RequirementWeighted => requirement_weighted(),
            InterKind::BacklogProportional => backlog_proportional(),
        })
    }

    fn check_intra_kind(&self, kind: &str) -> Result<(), SchedulerError> {
        intra_kind_by_name(kind).map(drop)
    }

    fn check_inter_kind(&self, kind: &str) -> Result<(), SchedulerError> {
        inter_kind_by_name(kind).map(drop)
    }

    fn check_sinr_pattern(&self, pattern: &str) -> Result<(), SchedulerError> {
        SinrPattern::parse(pattern).map(drop)
    }
}

pub fn available_intra_schedulers() -> &'static [&'static str] {
    &["RR", "PF", "PF<a><b>"]
}

pub fn available_inter_policies() -> &'static [&'static str] {
    &["RR", "WRR", "PF"]
}
