//! Mission behaviour graph: one participant's handler composition
//!
//! The graph owns every handler built for one mission attempt and routes
//! each into per-capability aggregates. A capability slot starts empty,
//! holds a single handler for as long as only one offers that capability,
//! and is transparently upgraded to a composite the moment a second
//! arrives; both instances become members, in the order added. Nothing
//! outlives a mission restart: a fresh graph is built per mission.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::core::error::Result;
use crate::core::types::Side;
use crate::handler::composite::{
    CommandGroup, ObservationComposite, RewardGroup, TerminationComposite,
};
use crate::handler::factory::{BuildReport, HandlerRegistry};
use crate::handler::{
    CommandHandler, HandlerSpec, MissionEnd, ObservationProducer, RewardProducer, SharedHandler,
    TerminationProducer,
};
use crate::mission::context::MissionContext;
use crate::observation::ObservationRecord;
use crate::reward::RewardAccumulator;

/// One capability slot: empty, a single handler, or an upgraded composite.
enum Aggregate<G> {
    Empty,
    Single(SharedHandler),
    Group(Arc<Mutex<G>>),
}

impl<G> Aggregate<G> {
    fn is_empty(&self) -> bool {
        matches!(self, Aggregate::Empty)
    }
}

/// The behaviour graph for one mission participant on one side.
pub struct MissionBehaviourGraph {
    side: Side,
    /// Every built handler, in build order; lifecycle (install/deinstall)
    /// walks this list exactly once per handler.
    handlers: Vec<SharedHandler>,
    command: Aggregate<CommandGroup>,
    observation: Aggregate<ObservationComposite>,
    reward: Aggregate<RewardGroup>,
    termination: Aggregate<TerminationComposite>,
    frame_producers: Vec<SharedHandler>,
    frame_dimensions: Option<(u32, u32)>,
    report: BuildReport,
    installed: bool,
}

impl MissionBehaviourGraph {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            handlers: Vec::new(),
            command: Aggregate::Empty,
            observation: Aggregate::Empty,
            reward: Aggregate::Empty,
            termination: Aggregate::Empty,
            frame_producers: Vec::new(),
            frame_dimensions: None,
            report: BuildReport::new(),
            installed: false,
        }
    }

    /// Build a graph from a declarative handler list. Unresolvable specs
    /// land in the report; the mission still runs with the rest.
    pub fn build(specs: &[HandlerSpec], side: Side, registry: &HandlerRegistry) -> Self {
        let mut graph = Self::new(side);
        for spec in specs {
            if let Some(handler) = registry.build(spec, side, &mut graph.report) {
                graph.add_handler(handler);
            }
        }
        tracing::debug!(
            side = %side,
            handlers = graph.handlers.len(),
            problems = graph.report.lines().len(),
            "behaviour graph built"
        );
        graph
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Number of handlers merged behind the command interface.
    pub fn command_member_count(&self) -> usize {
        match &self.command {
            Aggregate::Empty => 0,
            Aggregate::Single(_) => 1,
            Aggregate::Group(group) => group.lock().len(),
        }
    }

    pub fn frame_producers(&self) -> &[SharedHandler] {
        &self.frame_producers
    }

    /// Route a handler into every capability slot it offers.
    pub fn add_handler(&mut self, handler: SharedHandler) {
        let (command, observation, reward, termination, frame_dims) = {
            let mut guard = handler.lock();
            (
                guard.as_command().is_some(),
                guard.as_observation().is_some(),
                guard.as_reward().is_some(),
                guard.as_termination().is_some(),
                guard.as_frame().map(|f| f.dimensions()),
            )
        };

        if let Some(dims) = frame_dims {
            match self.frame_dimensions {
                Some(existing) if existing != dims => {
                    self.report.add(format!(
                        "frame producer dimensions {}x{} conflict with {}x{}; handler skipped",
                        dims.0, dims.1, existing.0, existing.1
                    ));
                    return;
                }
                _ => self.frame_dimensions = Some(dims),
            }
            self.frame_producers.push(handler.clone());
        }

        if command {
            self.command = match std::mem::replace(&mut self.command, Aggregate::Empty) {
                Aggregate::Empty => Aggregate::Single(handler.clone()),
                Aggregate::Single(existing) => {
                    let mut group = CommandGroup::new(false);
                    group.push_synced(existing);
                    group.push_synced(handler.clone());
                    Aggregate::Group(Arc::new(Mutex::new(group)))
                }
                Aggregate::Group(group) => {
                    if !group.lock().push_synced(handler.clone()) {
                        self.report.add("command group is locked; handler not merged");
                    }
                    Aggregate::Group(group)
                }
            };
        }

        if observation {
            self.observation = match std::mem::replace(&mut self.observation, Aggregate::Empty) {
                Aggregate::Empty => Aggregate::Single(handler.clone()),
                Aggregate::Single(existing) => {
                    let mut composite = ObservationComposite::new(false);
                    composite.push(existing);
                    composite.push(handler.clone());
                    Aggregate::Group(Arc::new(Mutex::new(composite)))
                }
                Aggregate::Group(composite) => {
                    if !composite.lock().push(handler.clone()) {
                        self.report
                            .add("observation composite is locked; handler not merged");
                    }
                    Aggregate::Group(composite)
                }
            };
        }

        if reward {
            self.reward = match std::mem::replace(&mut self.reward, Aggregate::Empty) {
                Aggregate::Empty => Aggregate::Single(handler.clone()),
                Aggregate::Single(existing) => {
                    let mut group = RewardGroup::new(false);
                    group.push(existing);
                    group.push(handler.clone());
                    Aggregate::Group(Arc::new(Mutex::new(group)))
                }
                Aggregate::Group(group) => {
                    if !group.lock().push(handler.clone()) {
                        self.report.add("reward group is locked; handler not merged");
                    }
                    Aggregate::Group(group)
                }
            };
        }

        if termination {
            self.termination = match std::mem::replace(&mut self.termination, Aggregate::Empty) {
                Aggregate::Empty => Aggregate::Single(handler.clone()),
                Aggregate::Single(existing) => {
                    let mut composite = TerminationComposite::new(false);
                    composite.push(existing);
                    composite.push(handler.clone());
                    Aggregate::Group(Arc::new(Mutex::new(composite)))
                }
                Aggregate::Group(composite) => {
                    if !composite.lock().push(handler.clone()) {
                        self.report
                            .add("termination composite is locked; handler not merged");
                    }
                    Aggregate::Group(composite)
                }
            };
        }

        self.handlers.push(handler);
    }

    /// Install every handler exactly once. A second call is a no-op.
    pub fn install_all(&mut self, context: &mut MissionContext) -> Result<()> {
        if self.installed {
            return Ok(());
        }
        for handler in &self.handlers {
            handler.lock().install(context)?;
        }
        self.installed = true;
        Ok(())
    }

    /// Deinstall every handler. Idempotent.
    pub fn deinstall_all(&mut self, context: &mut MissionContext) {
        if !self.installed {
            return;
        }
        for handler in &self.handlers {
            handler.lock().deinstall(context);
        }
        self.installed = false;
    }

    /// Execute a verb against the merged command interface.
    pub fn execute(&mut self, verb: &str, value: &str) -> bool {
        match &self.command {
            Aggregate::Empty => false,
            Aggregate::Single(handler) => {
                let mut guard = handler.lock();
                guard
                    .as_command()
                    .map_or(false, |command| command.execute(verb, value))
            }
            Aggregate::Group(group) => group.lock().execute(verb, value),
        }
    }

    /// Propagate override ownership to every command handler.
    pub fn set_overriding(&mut self, overriding: bool) {
        match &self.command {
            Aggregate::Empty => {}
            Aggregate::Single(handler) => {
                let mut guard = handler.lock();
                if let Some(command) = guard.as_command() {
                    command.set_overriding(overriding);
                }
            }
            Aggregate::Group(group) => group.lock().set_overriding(overriding),
        }
    }

    /// Poll every reward producer into the accumulator.
    pub fn collect_rewards(&mut self, accumulator: &mut RewardAccumulator) {
        match &self.reward {
            Aggregate::Empty => {}
            Aggregate::Single(handler) => {
                let mut guard = handler.lock();
                if let Some(reward) = guard.as_reward() {
                    reward.collect_rewards(accumulator);
                }
            }
            Aggregate::Group(group) => group.lock().collect_rewards(accumulator),
        }
    }

    /// Poll every observation producer into one record.
    pub fn write_observations(&mut self, record: &mut ObservationRecord) {
        match &self.observation {
            Aggregate::Empty => {}
            Aggregate::Single(handler) => {
                let mut guard = handler.lock();
                if let Some(observation) = guard.as_observation() {
                    observation.write_observations(record);
                }
            }
            Aggregate::Group(composite) => composite.lock().write_observations(record),
        }
    }

    /// Poll termination producers; `Some` ends the mission.
    pub fn check_completion(&mut self) -> Option<MissionEnd> {
        match &self.termination {
            Aggregate::Empty => None,
            Aggregate::Single(handler) => {
                let mut guard = handler.lock();
                guard
                    .as_termination()
                    .and_then(|termination| termination.check_completion())
            }
            Aggregate::Group(composite) => composite.lock().check_completion(),
        }
    }

    /// Run `prepare` on every frame producer.
    pub fn prepare_frames(&mut self, context: &MissionContext) {
        for producer in &self.frame_producers {
            let mut guard = producer.lock();
            if let Some(frame) = guard.as_frame() {
                frame.prepare(context);
            }
        }
    }

    /// Run `write_fields` on every frame producer into the shared record.
    pub fn write_frames(&mut self, record: &mut ObservationRecord, context: &MissionContext) {
        for producer in &self.frame_producers {
            let mut guard = producer.lock();
            if let Some(frame) = guard.as_frame() {
                frame.write_fields(record, context);
            }
        }
    }

    /// Run `cleanup` on every frame producer.
    pub fn cleanup_frames(&mut self) {
        for producer in &self.frame_producers {
            let mut guard = producer.lock();
            if let Some(frame) = guard.as_frame() {
                frame.cleanup();
            }
        }
    }

    pub fn has_command_handler(&self) -> bool {
        !self.command.is_empty()
    }

    pub fn has_termination_handler(&self) -> bool {
        !self.termination.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{shared, CommandHandler, MissionHandler};
    use serde_json::Value;

    struct NamedStub {
        tag: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl MissionHandler for NamedStub {
        fn name(&self) -> &str {
            self.tag
        }

        fn as_command(&mut self) -> Option<&mut dyn CommandHandler> {
            Some(self)
        }
    }

    impl CommandHandler for NamedStub {
        fn execute(&mut self, verb: &str, _value: &str) -> bool {
            if verb == self.tag {
                self.log.lock().push(self.tag);
                true
            } else {
                false
            }
        }

        fn set_overriding(&mut self, _overriding: bool) {}
    }

    #[test]
    fn test_single_handler_stays_single() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = MissionBehaviourGraph::new(Side::Controlling);
        graph.add_handler(shared(NamedStub {
            tag: "jump",
            log: log.clone(),
        }));

        assert_eq!(graph.command_member_count(), 1);
        assert!(graph.execute("jump", "1"));
    }

    #[test]
    fn test_second_handler_upgrades_to_group_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = MissionBehaviourGraph::new(Side::Controlling);
        graph.add_handler(shared(NamedStub {
            tag: "first",
            log: log.clone(),
        }));
        graph.add_handler(shared(NamedStub {
            tag: "second",
            log: log.clone(),
        }));

        // Both members survive the upgrade and stay individually pollable.
        assert_eq!(graph.command_member_count(), 2);
        assert!(graph.execute("first", "1"));
        assert!(graph.execute("second", "1"));
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_unresolved_spec_keeps_graph_building() {
        let registry = HandlerRegistry::with_defaults();
        let specs = vec![
            HandlerSpec::new("no_such_thing", Value::Null),
            HandlerSpec::new("time_limit_quit", serde_json::json!({ "max_ticks": 5 })),
        ];
        let graph = MissionBehaviourGraph::build(&specs, Side::Controlling, &registry);

        assert_eq!(graph.handler_count(), 1);
        assert_eq!(graph.report().lines().len(), 1);
        assert!(graph.has_termination_handler());
    }
}
