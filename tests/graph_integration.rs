//! Integration tests for handler composition
//!
//! These tests verify the factory -> graph -> aggregate pipeline:
//! - Declarative specs resolve into handlers; failures become report lines
//! - A second same-capability handler upgrades the slot to a composite
//! - Command groups short-circuit on the first accepting member
//! - Handler lifecycle (install/deinstall) is exactly-once and idempotent

use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;

use tether::channel::{loopback, CommandSender};
use tether::core::config::ControlConfig;
use tether::core::types::Side;
use tether::handler::{
    shared, CommandHandler, FrameProducer, HandlerRegistry, HandlerSpec, MissionBehaviourGraph,
    MissionHandler,
};
use tether::mission::MissionContext;
use tether::observation::ObservationRecord;

/// Command handler that accepts exactly one verb and records every win.
struct RecordingHandler {
    accept: &'static str,
    wins: Arc<Mutex<Vec<&'static str>>>,
    tag: &'static str,
}

impl MissionHandler for RecordingHandler {
    fn name(&self) -> &str {
        self.tag
    }

    fn as_command(&mut self) -> Option<&mut dyn CommandHandler> {
        Some(self)
    }
}

impl CommandHandler for RecordingHandler {
    fn execute(&mut self, verb: &str, _value: &str) -> bool {
        if verb == self.accept {
            self.wins.lock().push(self.tag);
            true
        } else {
            false
        }
    }

    fn set_overriding(&mut self, _overriding: bool) {}
}

fn controlling_context() -> (MissionContext, crossbeam_channel::Receiver<Vec<u8>>) {
    let (transport, receiver) = loopback(8);
    let context =
        MissionContext::controlling(ControlConfig::default(), CommandSender::new(transport));
    (context, receiver)
}

/// End-to-end: two command handlers where only the second accepts "jump".
/// `execute("jump", "1")` returns true and only the second handler's side
/// effect occurs.
#[test]
fn test_second_handler_wins_jump() {
    let wins = Arc::new(Mutex::new(Vec::new()));
    let mut graph = MissionBehaviourGraph::new(Side::Controlling);
    graph.add_handler(shared(RecordingHandler {
        accept: "move",
        wins: wins.clone(),
        tag: "mover",
    }));
    graph.add_handler(shared(RecordingHandler {
        accept: "jump",
        wins: wins.clone(),
        tag: "jumper",
    }));

    assert!(graph.execute("jump", "1"));
    assert_eq!(*wins.lock(), vec!["jumper"]);

    // No member accepts "fly": the group reports no match.
    assert!(!graph.execute("fly", "1"));
}

/// Adding a second command handler to a graph that already holds a single
/// one yields a group containing exactly both, in the order added, and
/// both remain individually pollable.
#[test]
fn test_composite_upgrade_keeps_both_members() {
    let wins = Arc::new(Mutex::new(Vec::new()));
    let mut graph = MissionBehaviourGraph::new(Side::Controlling);

    graph.add_handler(shared(RecordingHandler {
        accept: "first",
        wins: wins.clone(),
        tag: "first",
    }));
    assert_eq!(graph.command_member_count(), 1);

    graph.add_handler(shared(RecordingHandler {
        accept: "second",
        wins: wins.clone(),
        tag: "second",
    }));
    assert_eq!(graph.command_member_count(), 2);

    assert!(graph.execute("second", "1"));
    assert!(graph.execute("first", "1"));
    assert_eq!(*wins.lock(), vec!["second", "first"]);
}

/// A mission with unresolved handlers still runs with whichever handlers
/// succeeded; the report carries the diagnostics.
#[test]
fn test_unresolved_handlers_do_not_block_the_mission() {
    let registry = HandlerRegistry::with_defaults();
    let specs = vec![
        HandlerSpec::new("inventory_commands", json!({})),
        HandlerSpec::new("imaginary_handler", json!({})),
        HandlerSpec::new("contact_reward", json!({ "rewards": "not a list" })),
        HandlerSpec::new("time_limit_quit", json!({ "max_ticks": 2 })),
    ];
    let mut graph = MissionBehaviourGraph::build(&specs, Side::Controlling, &registry);

    assert_eq!(graph.handler_count(), 2);
    assert_eq!(graph.report().lines().len(), 2);
    assert!(graph.has_command_handler());
    assert!(graph.has_termination_handler());

    // The surviving termination handler still polls.
    assert!(graph.check_completion().is_none());
    assert!(graph.check_completion().is_some());
}

/// Deinstalling twice observes the same state as deinstalling once, and a
/// second install after the first is a no-op.
#[test]
fn test_install_deinstall_idempotence() {
    let registry = HandlerRegistry::with_defaults();
    let specs = vec![
        HandlerSpec::new("inventory_commands", json!({})),
        HandlerSpec::new("craft_commands", json!({})),
    ];
    let mut graph = MissionBehaviourGraph::build(&specs, Side::Controlling, &registry);
    let (mut context, _frames) = controlling_context();

    graph.install_all(&mut context).unwrap();
    graph.install_all(&mut context).unwrap();
    graph.set_overriding(true);
    assert!(graph.execute("craft", "planks"));

    graph.deinstall_all(&mut context);
    graph.deinstall_all(&mut context);

    // Detached handlers no longer replicate anything.
    assert!(!graph.execute("craft", "planks"));
}

struct FixedSizeFrames {
    width: u32,
    height: u32,
}

impl MissionHandler for FixedSizeFrames {
    fn name(&self) -> &str {
        "fixed_size_frames"
    }

    fn as_frame(&mut self) -> Option<&mut dyn FrameProducer> {
        Some(self)
    }
}

impl FrameProducer for FixedSizeFrames {
    fn prepare(&mut self, _context: &MissionContext) {}

    fn write_fields(&mut self, record: &mut ObservationRecord, _context: &MissionContext) {
        record.set("frame_width", self.width);
        record.set("frame_height", self.height);
    }

    fn cleanup(&mut self) {}

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Two frame producers with different dimensions are an incompatible
/// combination: the second is rejected into the report, the first keeps
/// producing.
#[test]
fn test_conflicting_frame_dimensions_rejected() {
    let mut graph = MissionBehaviourGraph::new(Side::Controlling);
    graph.add_handler(shared(FixedSizeFrames {
        width: 320,
        height: 240,
    }));
    graph.add_handler(shared(FixedSizeFrames {
        width: 640,
        height: 480,
    }));

    assert_eq!(graph.frame_producers().len(), 1);
    assert_eq!(graph.report().lines().len(), 1);

    let (context, _frames) = controlling_context();
    let mut record = ObservationRecord::new();
    graph.write_frames(&mut record, &context);
    assert_eq!(record.get("frame_width").and_then(|v| v.as_u64()), Some(320));
}

/// Building a controlling-side handler on the authoritative side is a
/// report line, not an error.
#[test]
fn test_side_mismatch_is_reported() {
    let registry = HandlerRegistry::with_defaults();
    let specs = vec![HandlerSpec::new("motion_commands", json!({}))];
    let graph = MissionBehaviourGraph::build(&specs, Side::Authoritative, &registry);

    assert_eq!(graph.handler_count(), 0);
    assert_eq!(graph.report().lines().len(), 1);
}
