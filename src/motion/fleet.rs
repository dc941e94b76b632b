//! Multi-body motion control for remotely controlled bodies
//!
//! The fleet keys motion state by body id. Entries are created on attach
//! (the body enters the simulation under external control) and destroyed
//! on detach; commands for unknown ids are dropped. The map is written by
//! the network delivery thread and read by the simulation tick thread, so
//! entries sit behind their own locks and the map itself behind a RwLock:
//! detach is safe concurrently with an in-flight command for that body.

use ahash::AHashMap;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::channel::{
    CommandListener, CommandMessage, ListenerId, ListenerRegistry, MessageKind, SharedListener,
};
use crate::core::error::Result;
use crate::core::types::BodyId;
use crate::handler::MissionHandler;
use crate::mission::context::MissionContext;
use crate::motion::state::{MotionFrame, MotionState};

/// Keyed motion state for every remotely controlled body.
pub struct MotionFleet {
    bodies: RwLock<AHashMap<BodyId, Arc<Mutex<MotionState>>>>,
    inertia_ticks: u32,
    max_angular_velocity: f32,
}

impl MotionFleet {
    pub fn new(inertia_ticks: u32, max_angular_velocity: f32) -> Self {
        Self {
            bodies: RwLock::new(AHashMap::new()),
            inertia_ticks,
            max_angular_velocity,
        }
    }

    /// Create state for a newly attached body (active immediately).
    pub fn attach(&self, id: BodyId) -> Arc<Mutex<MotionState>> {
        let mut state = MotionState::new(self.inertia_ticks, self.max_angular_velocity);
        state.set_active(true);
        let state = Arc::new(Mutex::new(state));
        self.bodies.write().insert(id, state.clone());
        state
    }

    /// Destroy state for a detached body. False if it was never attached.
    pub fn detach(&self, id: &BodyId) -> bool {
        self.bodies.write().remove(id).is_some()
    }

    pub fn contains(&self, id: &BodyId) -> bool {
        self.bodies.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.bodies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.read().is_empty()
    }

    pub fn body(&self, id: &BodyId) -> Option<Arc<Mutex<MotionState>>> {
        self.bodies.read().get(id).cloned()
    }

    /// Apply a motion verb to one body. Unknown ids are dropped silently
    /// (a detach may have raced the message; that is not an error).
    pub fn apply(&self, id: &BodyId, verb: &str, value: &str) -> bool {
        let Some(state) = self.body(id) else {
            tracing::debug!(body = %id, "motion command for unknown body dropped");
            return false;
        };
        let applied = state.lock().apply_command(verb, value);
        applied
    }

    /// Advance every attached body one tick.
    pub fn advance_all(&self, now: Instant) -> Vec<(BodyId, MotionFrame)> {
        let snapshot: Vec<(BodyId, Arc<Mutex<MotionState>>)> = self
            .bodies
            .read()
            .iter()
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect();

        snapshot
            .into_iter()
            .filter_map(|(id, state)| state.lock().advance(now).map(|frame| (id, frame)))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RemoteMotionParams {
    inertia_ticks: Option<u32>,
    max_angular_velocity: Option<f32>,
}

struct FleetListener {
    fleet: Arc<MotionFleet>,
}

impl CommandListener for FleetListener {
    fn on_message(&mut self, message: &CommandMessage, actor: &BodyId) -> Result<()> {
        let body = message.origin.as_ref().unwrap_or(actor);
        self.fleet.apply(body, &message.verb, &message.value);
        Ok(())
    }
}

/// Authoritative-side handler wiring the fleet to the command channel.
pub struct RemoteMotion {
    params: RemoteMotionParams,
    registry: Option<Arc<ListenerRegistry>>,
    token: Option<ListenerId>,
    installed: bool,
}

impl RemoteMotion {
    pub fn new() -> Self {
        Self {
            params: RemoteMotionParams::default(),
            registry: None,
            token: None,
            installed: false,
        }
    }
}

impl Default for RemoteMotion {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionHandler for RemoteMotion {
    fn name(&self) -> &str {
        "remote_motion"
    }

    fn parse_parameters(&mut self, parameters: &Value) -> bool {
        match serde_json::from_value::<RemoteMotionParams>(parameters.clone()) {
            Ok(params) => {
                self.params = params;
                true
            }
            Err(error) => {
                tracing::warn!("remote motion parameters rejected: {error}");
                false
            }
        }
    }

    fn install(&mut self, context: &mut MissionContext) -> Result<()> {
        if self.installed {
            return Ok(());
        }
        // Handler parameters are currently advisory for the fleet, which
        // is constructed by the mission driver with mission defaults.
        if self.params.inertia_ticks.is_some() || self.params.max_angular_velocity.is_some() {
            tracing::debug!("remote motion overrides apply to newly attached bodies only");
        }
        let registry = context.registry()?;
        let listener: SharedListener = Arc::new(Mutex::new(FleetListener {
            fleet: context.fleet()?,
        }));
        self.token = Some(registry.register(MessageKind::Move, listener));
        self.registry = Some(registry);
        self.installed = true;
        Ok(())
    }

    fn deinstall(&mut self, _context: &mut MissionContext) {
        if !self.installed {
            return;
        }
        if let (Some(registry), Some(token)) = (self.registry.take(), self.token.take()) {
            registry.deregister(MessageKind::Move, token);
        }
        self.installed = false;
    }
}
