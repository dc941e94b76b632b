//! Mission handler capability model
//!
//! A mission handler is a pluggable unit offering one or more capabilities:
//! command execution, observation production, reward production, termination
//! decision, frame production. One concrete type may offer several. Rather
//! than deep interface inheritance, each handler exposes its capability set
//! through `as_*` accessors returning `Option<&mut dyn ...>`; the behaviour
//! graph probes these once at registration time.
//!
//! Lifecycle: constructed -> `parse_parameters` (fails closed) ->
//! `install` (attach side effects) -> polled every tick -> `deinstall`
//! (detach, exactly once, idempotent).

pub mod composite;
pub mod factory;
pub mod graph;

pub use composite::{CommandGroup, ObservationComposite, RewardGroup, TerminationComposite};
pub use factory::{BuildReport, HandlerRegistry};
pub use graph::MissionBehaviourGraph;

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

use crate::core::error::Result;
use crate::mission::context::MissionContext;
use crate::observation::ObservationRecord;
use crate::reward::RewardAccumulator;

/// A handler cell shared between the graph and the aggregates it feeds.
pub type SharedHandler = Arc<Mutex<dyn MissionHandler>>;

/// Wrap a concrete handler into a shared cell.
pub fn shared<H: MissionHandler + 'static>(handler: H) -> SharedHandler {
    Arc::new(Mutex::new(handler))
}

/// One declarative (name, parameter-bundle) pair from a mission description.
///
/// Consumed once at graph-build time.
#[derive(Debug, Clone)]
pub struct HandlerSpec {
    pub name: String,
    pub parameters: Value,
}

impl HandlerSpec {
    pub fn new(name: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            parameters,
        }
    }
}

/// Outcome surfaced by a termination producer when a mission ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionEnd {
    pub outcome: String,
}

impl MissionEnd {
    pub fn new(outcome: impl Into<String>) -> Self {
        Self {
            outcome: outcome.into(),
        }
    }
}

/// Lifecycle and capability surface of every mission handler.
pub trait MissionHandler: Send {
    /// Declared type name this handler was built from.
    fn name(&self) -> &str;

    /// Feed the declarative parameter bundle. Returns false on any type
    /// mismatch; a handler that fails to parse is discarded by the factory.
    fn parse_parameters(&mut self, _parameters: &Value) -> bool {
        true
    }

    /// Attach side effects (bind to an input, register on the command
    /// channel). Must be idempotent: a second call is a no-op.
    fn install(&mut self, _context: &mut MissionContext) -> Result<()> {
        Ok(())
    }

    /// Detach side effects. Idempotent; calling twice observes the same
    /// state as calling once.
    fn deinstall(&mut self, _context: &mut MissionContext) {}

    fn as_command(&mut self) -> Option<&mut dyn CommandHandler> {
        None
    }

    fn as_observation(&mut self) -> Option<&mut dyn ObservationProducer> {
        None
    }

    fn as_reward(&mut self) -> Option<&mut dyn RewardProducer> {
        None
    }

    fn as_termination(&mut self) -> Option<&mut dyn TerminationProducer> {
        None
    }

    fn as_frame(&mut self) -> Option<&mut dyn FrameProducer> {
        None
    }
}

/// Executes external commands (verb + parameter string).
pub trait CommandHandler {
    /// Try to execute a verb. Returns true if this handler recognized and
    /// applied it; false lets the next handler in a group have a go.
    fn execute(&mut self, verb: &str, value: &str) -> bool;

    /// Toggle whether external control currently owns this handler's
    /// input channels. Handlers ignore commands while not overriding.
    fn set_overriding(&mut self, overriding: bool);
}

/// Contributes fields to the per-tick observation record.
pub trait ObservationProducer {
    fn write_observations(&mut self, record: &mut ObservationRecord);
}

/// Contributes scalar rewards into the per-tick accumulator.
pub trait RewardProducer {
    fn collect_rewards(&mut self, accumulator: &mut RewardAccumulator);
}

/// Decides whether the mission participant wants to end the mission.
pub trait TerminationProducer {
    /// Polled once per tick; `Some` carries the human-readable outcome.
    fn check_completion(&mut self) -> Option<MissionEnd>;
}

/// Produces rendered frames for the observation stream.
///
/// Frame contents are an external collaborator concern; the control plane
/// only sequences `prepare`/`write_fields`/`cleanup` and validates that all
/// producers in one graph agree on dimensions.
pub trait FrameProducer {
    fn prepare(&mut self, context: &MissionContext);

    fn write_fields(&mut self, record: &mut ObservationRecord, context: &MissionContext);

    fn cleanup(&mut self);

    /// (width, height) of produced frames.
    fn dimensions(&self) -> (u32, u32);
}
