use crate::config::ScenarioConfig;
use serde::Deserialize;

/// Command-line or caller supplied overrides layered over a loaded scenario.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ScenarioOverride {
    pub duration_ms: Option<u64>,
    pub seed: Option<u64>,
    pub debug: Option<bool>,
    pub measurement_interval_ms: Option<f64>,
    pub inter_slice_granularity_ms: Option<f64>,
    pub inter_scheduler: Option<String>,
    pub intra_scheduler: Option<String>,
}

impl ScenarioOverride {
    pub fn apply_to(&self, config: &mut ScenarioConfig) {
        if let Some(v) = self.duration_ms {
            config.simulation.duration_ms = v;
        }
        if let Some(v) = self.seed {
            config.simulation.seed = v;
        }
        if let Some(v) = self.debug {
            config.simulation.debug = v;
        }
        if let Some(v) = self.measurement_interval_ms {
            config.simulation.measurement_interval_ms = v;
        }
        if let Some(v) = self.inter_slice_granularity_ms {
            config.simulation.inter_slice_granularity_ms = v;
        }
        if let Some(v) = &self.inter_scheduler {
            config.network.inter_scheduler = v.clone();
        }
        if let Some(v) = &self.intra_scheduler {
            config.network.intra_scheduler = v.clone();
        }
    }
}
