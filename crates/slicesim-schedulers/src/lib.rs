//! Built-in scheduling algorithms and the UE traffic model behind them.

mod builtin;
pub mod inter;
pub mod intra;
pub mod link;
pub mod share;
pub mod sinr;
pub mod spec;
pub mod ue;

pub use builtin::{BuiltinSchedulers, available_inter_policies, available_intra_schedulers};
pub use inter::{BacklogProportional, EqualShare, InterKind, RequirementWeighted};
pub use intra::{IntraKind, UeGroupScheduler};
pub use share::split_by_weights;
