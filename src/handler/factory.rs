//! Handler factory: resolves declarative type names to concrete handlers
//!
//! Resolution is by exact declared-type name against a registry populated
//! explicitly at startup, so the set of constructible handlers is visible
//! and testable. Construction failures are data, not control flow: every
//! problem appends a line to a cumulative report and the rest of the graph
//! keeps building.

use ahash::AHashMap;
use std::fmt;

use crate::core::types::Side;
use crate::handler::{shared, HandlerSpec, SharedHandler};
use crate::input::commands::BindingCommands;
use crate::mission::quit::{ContactQuit, TimeLimitQuit};
use crate::motion::controller::MotionCommands;
use crate::motion::fleet::RemoteMotion;
use crate::observation::body_state::BodyStateObservations;
use crate::replication::craft::{CraftCommands, CraftReplication};
use crate::replication::inventory::{InventoryCommands, InventoryReplication};
use crate::reward::triggers::{CommandDispatchReward, ContactReward};

/// Cumulative, human-readable record of everything that went wrong while
/// building a behaviour graph. A mission with a non-empty report still runs
/// with whichever handlers succeeded.
#[derive(Debug, Default)]
pub struct BuildReport {
    lines: Vec<String>,
}

impl BuildReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lines.join("\n"))
    }
}

/// Constructs a handler for the given side, or None when the type does not
/// exist on that side.
type BuilderFn = fn(Side) -> Option<SharedHandler>;

/// Registry mapping declarative handler type names to builders.
pub struct HandlerRegistry {
    builders: AHashMap<String, BuilderFn>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            builders: AHashMap::new(),
        }
    }

    /// Registry pre-populated with every built-in handler type
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();

        registry.register("motion_commands", |side| match side {
            Side::Controlling => Some(shared(MotionCommands::new())),
            Side::Authoritative => None,
        });
        registry.register("binding_commands", |side| match side {
            Side::Controlling => Some(shared(BindingCommands::new())),
            Side::Authoritative => None,
        });
        registry.register("inventory_commands", |side| match side {
            Side::Controlling => Some(shared(InventoryCommands::new())),
            Side::Authoritative => None,
        });
        registry.register("craft_commands", |side| match side {
            Side::Controlling => Some(shared(CraftCommands::new())),
            Side::Authoritative => None,
        });
        registry.register("body_state_observations", |_| {
            Some(shared(BodyStateObservations::new()))
        });
        registry.register("dispatch_reward", |side| match side {
            Side::Controlling => Some(shared(CommandDispatchReward::new())),
            Side::Authoritative => None,
        });
        registry.register("contact_reward", |_| Some(shared(ContactReward::new())));
        registry.register("contact_quit", |_| Some(shared(ContactQuit::new())));
        registry.register("time_limit_quit", |_| Some(shared(TimeLimitQuit::new())));
        registry.register("remote_motion", |side| match side {
            Side::Controlling => None,
            Side::Authoritative => Some(shared(RemoteMotion::new())),
        });
        registry.register("inventory_replication", |side| match side {
            Side::Controlling => None,
            Side::Authoritative => Some(shared(InventoryReplication::new())),
        });
        registry.register("craft_replication", |side| match side {
            Side::Controlling => None,
            Side::Authoritative => Some(shared(CraftReplication::new())),
        });

        registry
    }

    /// Register a builder under an exact type name
    pub fn register(&mut self, name: &str, builder: BuilderFn) {
        self.builders.insert(name.to_string(), builder);
    }

    /// Names currently registered, for diagnostics
    pub fn known_types(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    /// Resolve and construct exactly one handler, or return None with an
    /// appended report line. Never fails the caller.
    pub fn build(
        &self,
        spec: &HandlerSpec,
        side: Side,
        report: &mut BuildReport,
    ) -> Option<SharedHandler> {
        let Some(builder) = self.builders.get(spec.name.as_str()) else {
            report.add(format!("handler type not found: {}", spec.name));
            return None;
        };

        let Some(handler) = builder(side) else {
            report.add(format!(
                "handler type {} is not available on the {} side",
                spec.name, side
            ));
            return None;
        };

        if !handler.lock().parse_parameters(&spec.parameters) {
            report.add(format!(
                "handler {} rejected its parameter bundle",
                spec.name
            ));
            return None;
        }

        Some(handler)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_type_reported_not_fatal() {
        let registry = HandlerRegistry::with_defaults();
        let mut report = BuildReport::new();

        let spec = HandlerSpec::new("no_such_handler", json!({}));
        assert!(registry.build(&spec, Side::Controlling, &mut report).is_none());
        assert_eq!(report.lines().len(), 1);
        assert!(report.lines()[0].contains("not found"));
    }

    #[test]
    fn test_wrong_side_reported() {
        let registry = HandlerRegistry::with_defaults();
        let mut report = BuildReport::new();

        let spec = HandlerSpec::new("motion_commands", json!({}));
        assert!(registry.build(&spec, Side::Authoritative, &mut report).is_none());
        assert!(report.lines()[0].contains("authoritative"));
    }

    #[test]
    fn test_parse_failure_discards_handler() {
        let registry = HandlerRegistry::with_defaults();
        let mut report = BuildReport::new();

        // time_limit_quit requires max_ticks to be a number
        let spec = HandlerSpec::new("time_limit_quit", json!({ "max_ticks": "soon" }));
        assert!(registry.build(&spec, Side::Controlling, &mut report).is_none());
        assert!(report.lines()[0].contains("parameter"));
    }

    #[test]
    fn test_successful_build() {
        let registry = HandlerRegistry::with_defaults();
        let mut report = BuildReport::new();

        let spec = HandlerSpec::new("time_limit_quit", json!({ "max_ticks": 100 }));
        let handler = registry.build(&spec, Side::Controlling, &mut report);
        assert!(handler.is_some());
        assert!(report.is_empty());
    }
}
