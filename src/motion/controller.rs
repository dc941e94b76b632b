//! Controlling-side continuous motion handler
//!
//! Applies motion verbs to the local body's motion state and, when
//! configured, replicates every applied verb to the authoritative side so
//! remotely simulated copies of this body move the same way.

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::channel::{CommandMessage, CommandSender, MessageKind};
use crate::core::error::Result;
use crate::core::types::BodyId;
use crate::handler::{CommandHandler, MissionHandler};
use crate::mission::context::MissionContext;
use crate::motion::state::MotionState;

#[derive(Debug, Clone, Default, Deserialize)]
struct MotionParams {
    inertia_ticks: Option<u32>,
    max_angular_velocity: Option<f32>,
    /// Origin id stamped on replicated messages.
    body: Option<String>,
    /// Forward applied verbs over the command channel.
    #[serde(default)]
    replicate: bool,
}

/// Continuous motion command handler for the locally controlled body.
pub struct MotionCommands {
    params: MotionParams,
    state: Option<Arc<Mutex<MotionState>>>,
    sender: Option<CommandSender>,
    overriding: bool,
    installed: bool,
}

impl MotionCommands {
    pub fn new() -> Self {
        Self {
            params: MotionParams::default(),
            state: None,
            sender: None,
            overriding: false,
            installed: false,
        }
    }
}

impl Default for MotionCommands {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionHandler for MotionCommands {
    fn name(&self) -> &str {
        "motion_commands"
    }

    fn parse_parameters(&mut self, parameters: &Value) -> bool {
        match serde_json::from_value::<MotionParams>(parameters.clone()) {
            Ok(params) => {
                self.params = params;
                true
            }
            Err(error) => {
                tracing::warn!("motion command parameters rejected: {error}");
                false
            }
        }
    }

    fn install(&mut self, context: &mut MissionContext) -> Result<()> {
        if self.installed {
            return Ok(());
        }
        let state = context.local_body();
        state.lock().configure(
            self.params.inertia_ticks.unwrap_or(context.config.inertia_ticks),
            self.params
                .max_angular_velocity
                .unwrap_or(context.config.max_angular_velocity),
        );
        self.state = Some(state);
        if self.params.replicate {
            self.sender = Some(context.sender()?.clone());
        }
        self.installed = true;
        Ok(())
    }

    fn deinstall(&mut self, context: &mut MissionContext) {
        if !self.installed {
            return;
        }
        context.local_body().lock().set_active(false);
        self.state = None;
        self.sender = None;
        self.installed = false;
    }

    fn as_command(&mut self) -> Option<&mut dyn CommandHandler> {
        Some(self)
    }
}

impl CommandHandler for MotionCommands {
    fn execute(&mut self, verb: &str, value: &str) -> bool {
        if !self.overriding {
            return false;
        }
        let Some(state) = &self.state else {
            tracing::error!("motion commands executed before install");
            return false;
        };

        // The state lock is released before any send: the transport may
        // block on backpressure.
        let handled = state.lock().apply_command(verb, value);
        if !handled {
            return false;
        }

        if let Some(sender) = &self.sender {
            let mut message = CommandMessage::new(MessageKind::Move, verb, value);
            if let Some(body) = &self.params.body {
                message = message.with_origin(BodyId::new(body.clone()));
            }
            if let Err(error) = sender.send(&message) {
                tracing::warn!("motion verb {verb} not replicated: {error}");
            }
        }
        true
    }

    fn set_overriding(&mut self, overriding: bool) {
        self.overriding = overriding;
        if let Some(state) = &self.state {
            state.lock().set_active(overriding);
        }
    }
}
