//! Composite aggregators: many handlers behind one interface
//!
//! Four instantiations share one membership algorithm and differ only in
//! how they poll their members:
//! - `CommandGroup` short-circuits on the first member that handles a verb
//! - `RewardGroup` polls every member so each can contribute
//! - `ObservationComposite` polls every member into one shared record
//!   (field collisions are last-write-wins in registration order)
//! - `TerminationComposite` polls every member, surfacing the first
//!   signaled outcome
//!
//! Once a group is locked it rejects membership changes; callers wanting a
//! different composition must build a fresh group.

use serde_json::Value;

use crate::handler::{
    CommandHandler, MissionEnd, MissionHandler, ObservationProducer, RewardProducer, SharedHandler,
    TerminationProducer,
};
use crate::observation::ObservationRecord;
use crate::reward::RewardAccumulator;

/// Shared membership state of the four composite kinds.
#[derive(Default)]
pub(crate) struct GroupCore {
    members: Vec<SharedHandler>,
    locked: bool,
    share_params: bool,
}

impl GroupCore {
    fn new(share_params: bool) -> Self {
        Self {
            members: Vec::new(),
            locked: false,
            share_params,
        }
    }

    /// Append a member. Returns false (and leaves the group unchanged)
    /// once the group is locked.
    fn push(&mut self, member: SharedHandler) -> bool {
        if self.locked {
            return false;
        }
        self.members.push(member);
        true
    }

    fn lock(&mut self) {
        self.locked = true;
    }

    /// With share-params enabled, the group's parse result is the AND of
    /// every member's parse, without short-circuiting: every member still
    /// gets a chance to parse and report failure.
    fn parse_members(&mut self, parameters: &Value) -> bool {
        if !self.share_params {
            return true;
        }
        let mut ok = true;
        for member in &self.members {
            ok &= member.lock().parse_parameters(parameters);
        }
        ok
    }
}

macro_rules! group_membership {
    () => {
        /// Add a member; false if the group is locked.
        pub fn push(&mut self, member: SharedHandler) -> bool {
            self.core.push(member)
        }

        /// Seal the member list against further changes.
        pub fn lock(&mut self) {
            self.core.lock();
        }

        pub fn is_locked(&self) -> bool {
            self.core.locked
        }

        pub fn len(&self) -> usize {
            self.core.members.len()
        }

        pub fn is_empty(&self) -> bool {
            self.core.members.is_empty()
        }

        pub fn members(&self) -> &[SharedHandler] {
            &self.core.members
        }
    };
}

/// Merges several command handlers; first match wins.
pub struct CommandGroup {
    core: GroupCore,
    overriding: bool,
}

impl CommandGroup {
    pub fn new(share_params: bool) -> Self {
        Self {
            core: GroupCore::new(share_params),
            overriding: false,
        }
    }

    group_membership!();

    /// Add a member, propagating the group's current override state to it;
    /// false if the group is locked.
    pub fn push_synced(&mut self, member: SharedHandler) -> bool {
        if !self.core.push(member.clone()) {
            return false;
        }
        let mut guard = member.lock();
        if let Some(command) = guard.as_command() {
            command.set_overriding(self.overriding);
        }
        true
    }
}

impl MissionHandler for CommandGroup {
    fn name(&self) -> &str {
        "command_group"
    }

    fn parse_parameters(&mut self, parameters: &Value) -> bool {
        self.core.parse_members(parameters)
    }

    fn as_command(&mut self) -> Option<&mut dyn CommandHandler> {
        Some(self)
    }
}

impl CommandHandler for CommandGroup {
    fn execute(&mut self, verb: &str, value: &str) -> bool {
        for member in &self.core.members {
            let mut guard = member.lock();
            if let Some(command) = guard.as_command() {
                if command.execute(verb, value) {
                    return true;
                }
            }
        }
        false
    }

    fn set_overriding(&mut self, overriding: bool) {
        self.overriding = overriding;
        for member in &self.core.members {
            let mut guard = member.lock();
            if let Some(command) = guard.as_command() {
                command.set_overriding(overriding);
            }
        }
    }
}

/// Merges several reward producers; all of them contribute each tick.
pub struct RewardGroup {
    core: GroupCore,
}

impl RewardGroup {
    pub fn new(share_params: bool) -> Self {
        Self {
            core: GroupCore::new(share_params),
        }
    }

    group_membership!();
}

impl MissionHandler for RewardGroup {
    fn name(&self) -> &str {
        "reward_group"
    }

    fn parse_parameters(&mut self, parameters: &Value) -> bool {
        self.core.parse_members(parameters)
    }

    fn as_reward(&mut self) -> Option<&mut dyn RewardProducer> {
        Some(self)
    }
}

impl RewardProducer for RewardGroup {
    fn collect_rewards(&mut self, accumulator: &mut RewardAccumulator) {
        for member in &self.core.members {
            let mut guard = member.lock();
            if let Some(reward) = guard.as_reward() {
                reward.collect_rewards(accumulator);
            }
        }
    }
}

/// Merges several observation producers into one shared record.
pub struct ObservationComposite {
    core: GroupCore,
}

impl ObservationComposite {
    pub fn new(share_params: bool) -> Self {
        Self {
            core: GroupCore::new(share_params),
        }
    }

    group_membership!();
}

impl MissionHandler for ObservationComposite {
    fn name(&self) -> &str {
        "observation_composite"
    }

    fn parse_parameters(&mut self, parameters: &Value) -> bool {
        self.core.parse_members(parameters)
    }

    fn as_observation(&mut self) -> Option<&mut dyn ObservationProducer> {
        Some(self)
    }
}

impl ObservationProducer for ObservationComposite {
    fn write_observations(&mut self, record: &mut ObservationRecord) {
        for member in &self.core.members {
            let mut guard = member.lock();
            if let Some(observation) = guard.as_observation() {
                observation.write_observations(record);
            }
        }
    }
}

/// Merges several termination producers; any member may end the mission.
pub struct TerminationComposite {
    core: GroupCore,
}

impl TerminationComposite {
    pub fn new(share_params: bool) -> Self {
        Self {
            core: GroupCore::new(share_params),
        }
    }

    group_membership!();
}

impl MissionHandler for TerminationComposite {
    fn name(&self) -> &str {
        "termination_composite"
    }

    fn parse_parameters(&mut self, parameters: &Value) -> bool {
        self.core.parse_members(parameters)
    }

    fn as_termination(&mut self) -> Option<&mut dyn TerminationProducer> {
        Some(self)
    }
}

impl TerminationProducer for TerminationComposite {
    fn check_completion(&mut self) -> Option<MissionEnd> {
        // Every member is polled even after one signals; members may carry
        // per-tick state of their own. The first outcome is surfaced.
        let mut ended = None;
        for member in &self.core.members {
            let mut guard = member.lock();
            if let Some(termination) = guard.as_termination() {
                let end = termination.check_completion();
                if ended.is_none() {
                    ended = end;
                }
            }
        }
        ended
    }
}
