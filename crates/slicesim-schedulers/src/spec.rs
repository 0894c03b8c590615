use slicesim_abstract::SchedulerError;

use crate::inter::InterKind;
use crate::intra::IntraKind;

/// Map a user-visible intra-slice scheduler name to its kind.
///
/// `RR` is round robin. `PF` is proportional fair with both exponents 1;
/// `PF<a><b>` sets them explicitly, e.g. `PF21`.
pub fn intra_kind_by_name(name: &str) -> Result<IntraKind, SchedulerError> {
    match name {
        "RR" => Ok(IntraKind::RoundRobin),
        "PF" => Ok(IntraKind::ProportionalFair { alpha: 1, beta: 1 }),
        other => {
            let digits = other
                .strip_prefix("PF")
                .map(|rest| rest.as_bytes())
                .filter(|rest| rest.len() == 2 && rest.iter().all(u8::is_ascii_digit));
            match digits {
                Some(&[a, b]) => Ok(IntraKind::ProportionalFair {
                    alpha: a - b'0',
                    beta: b - b'0',
                }),
                _ => Err(SchedulerError::UnknownKind {
                    role: "intra-slice",
                    kind: other.to_string(),
                }),
            }
        }
    }
}

/// Map a user-visible inter-slice policy name to its kind.
pub fn inter_kind_by_name(name: &str) -> Result<InterKind, SchedulerError> {
    match name {
        "RR" => Ok(InterKind::RoundRobin),
        "WRR" => Ok(InterKind::RequirementWeighted),
        "PF" => Ok(InterKind::BacklogProportional),
        other => Err(SchedulerError::UnknownKind {
            role: "inter-slice",
            kind: other.to_string(),
        }),
    }
}
