//! Binding command handler - drives named override bindings by verb

use ahash::AHashMap;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::handler::{CommandHandler, MissionHandler};
use crate::input::binding::OverrideBinding;

#[derive(Debug, Default, Deserialize)]
struct BindingParams {
    /// Verb names to expose as overridable controls, e.g. ["use", "attack"]
    #[serde(default)]
    bindings: Vec<String>,
}

/// Command handler mapping verbs to named `OverrideBinding`s.
///
/// `execute("use", "1")` presses the "use" binding, `execute("use", "0")`
/// releases it. The embedding input system holds clones of the bindings
/// (via [`BindingCommands::binding`]) and queries them each frame.
pub struct BindingCommands {
    bindings: AHashMap<String, Arc<OverrideBinding>>,
    overriding: bool,
}

impl BindingCommands {
    pub fn new() -> Self {
        Self {
            bindings: AHashMap::new(),
            overriding: false,
        }
    }

    /// The binding registered for a verb, if any.
    pub fn binding(&self, verb: &str) -> Option<Arc<OverrideBinding>> {
        self.bindings.get(verb).cloned()
    }

    pub fn add_binding(&mut self, verb: impl Into<String>) -> Arc<OverrideBinding> {
        let binding = Arc::new(OverrideBinding::new());
        self.bindings.insert(verb.into(), binding.clone());
        binding
    }
}

impl Default for BindingCommands {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionHandler for BindingCommands {
    fn name(&self) -> &str {
        "binding_commands"
    }

    fn parse_parameters(&mut self, parameters: &Value) -> bool {
        match serde_json::from_value::<BindingParams>(parameters.clone()) {
            Ok(params) => {
                for verb in params.bindings {
                    self.add_binding(verb);
                }
                true
            }
            Err(error) => {
                tracing::warn!("binding command parameters rejected: {error}");
                false
            }
        }
    }

    fn as_command(&mut self) -> Option<&mut dyn CommandHandler> {
        Some(self)
    }
}

impl CommandHandler for BindingCommands {
    fn execute(&mut self, verb: &str, value: &str) -> bool {
        if !self.overriding {
            return false;
        }
        let Some(binding) = self.bindings.get(verb) else {
            return false;
        };
        match value {
            "1" | "true" => binding.press(),
            "0" | "false" => binding.release(),
            other => {
                tracing::debug!("binding {verb} ignoring value {other:?}");
                return false;
            }
        }
        true
    }

    fn set_overriding(&mut self, overriding: bool) {
        self.overriding = overriding;
        for binding in self.bindings.values() {
            binding.set_overriding(overriding);
        }
    }
}
