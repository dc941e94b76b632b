//! Observation producer mirroring the local body's motion state

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::core::error::Result;
use crate::handler::{MissionHandler, ObservationProducer};
use crate::mission::context::MissionContext;
use crate::motion::state::MotionState;
use crate::observation::ObservationRecord;

#[derive(Debug, Clone, Default, Deserialize)]
struct BodyStateParams {
    /// Prefix for every written field, e.g. "agent_"
    #[serde(default)]
    prefix: String,
}

/// Writes yaw/pitch/velocity fields for the locally controlled body.
pub struct BodyStateObservations {
    params: BodyStateParams,
    state: Option<Arc<Mutex<MotionState>>>,
    installed: bool,
}

impl BodyStateObservations {
    pub fn new() -> Self {
        Self {
            params: BodyStateParams::default(),
            state: None,
            installed: false,
        }
    }
}

impl Default for BodyStateObservations {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionHandler for BodyStateObservations {
    fn name(&self) -> &str {
        "body_state_observations"
    }

    fn parse_parameters(&mut self, parameters: &Value) -> bool {
        match serde_json::from_value::<BodyStateParams>(parameters.clone()) {
            Ok(params) => {
                self.params = params;
                true
            }
            Err(error) => {
                tracing::warn!("body state parameters rejected: {error}");
                false
            }
        }
    }

    fn install(&mut self, context: &mut MissionContext) -> Result<()> {
        if self.installed {
            return Ok(());
        }
        self.state = Some(context.local_body());
        self.installed = true;
        Ok(())
    }

    fn deinstall(&mut self, _context: &mut MissionContext) {
        if !self.installed {
            return;
        }
        self.state = None;
        self.installed = false;
    }

    fn as_observation(&mut self) -> Option<&mut dyn ObservationProducer> {
        Some(self)
    }
}

impl ObservationProducer for BodyStateObservations {
    fn write_observations(&mut self, record: &mut ObservationRecord) {
        let Some(state) = &self.state else {
            return;
        };
        let state = state.lock();
        let prefix = &self.params.prefix;
        record.set(&format!("{prefix}yaw"), state.yaw);
        record.set(&format!("{prefix}pitch"), state.pitch);
        record.set(&format!("{prefix}velocity"), state.velocity);
        record.set(&format!("{prefix}strafe"), state.strafe);
        record.set(&format!("{prefix}jumping"), state.jumping);
        record.set(&format!("{prefix}crouching"), state.crouching);
    }
}
