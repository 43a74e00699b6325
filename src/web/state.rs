use crate::actuator::BuzzerStrategy;
use crate::artifacts::Model;
use crate::prelude::*;
use crate::relay::TelemetryRelay;

/// Web application global state.
#[derive(Clone)]
pub struct State {
    /// `None` when the artifacts could not be loaded at startup.
    pub model: Option<Arc<Model>>,

    pub relay: Arc<dyn TelemetryRelay>,
    pub buzzer_strategy: BuzzerStrategy,
}
