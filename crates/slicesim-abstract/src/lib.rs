pub mod carrier;
pub mod config;
pub mod interface;
pub mod record;
pub mod scenario;

pub use carrier::CarrierProfile;
pub use config::{
    ConfigError, MimoConfig, MimoMode, NetworkConfig, ScenarioConfig, SimulationConfig,
    TrafficConfig,
};
pub use interface::{
    InterSlicePolicy, IntervalContext, IntraSetup, IntraSliceScheduler, SchedulerError,
    SchedulerFactory, SliceDemand,
};
pub use record::{Direction, RECORD_HEADER, TrafficRecord};
pub use scenario::ScenarioOverride;
