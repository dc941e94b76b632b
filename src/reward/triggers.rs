//! One-shot reward triggers
//!
//! Both triggers arm on an external event and disarm exactly once when the
//! reward poll reads them. The dispatch trigger uses an atomic swap so a
//! send on the delivery thread and a poll on the tick thread cannot
//! double-count one arming.

use ahash::AHashSet;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::channel::{DispatchObserver, MessageKind};
use crate::core::error::Result;
use crate::core::types::RewardDimension;
use crate::handler::{MissionHandler, RewardProducer};
use crate::mission::context::{ContactQueue, MissionContext};
use crate::reward::RewardAccumulator;

#[derive(Debug, Clone, Deserialize)]
struct DispatchRewardParams {
    kind: MessageKind,
    #[serde(default)]
    dimension: RewardDimension,
    #[serde(default = "default_amount")]
    amount: f32,
}

fn default_amount() -> f32 {
    1.0
}

struct DispatchFlag {
    kind: MessageKind,
    armed: AtomicBool,
}

impl DispatchObserver for DispatchFlag {
    fn on_dispatch(&self, kind: MessageKind) {
        if kind == self.kind {
            self.armed.store(true, Ordering::SeqCst);
        }
    }
}

/// Fixed scalar into a fixed dimension, once per matching command sent.
pub struct CommandDispatchReward {
    params: Option<DispatchRewardParams>,
    flag: Option<Arc<DispatchFlag>>,
    sender: Option<crate::channel::CommandSender>,
    installed: bool,
}

impl CommandDispatchReward {
    pub fn new() -> Self {
        Self {
            params: None,
            flag: None,
            sender: None,
            installed: false,
        }
    }
}

impl Default for CommandDispatchReward {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionHandler for CommandDispatchReward {
    fn name(&self) -> &str {
        "dispatch_reward"
    }

    fn parse_parameters(&mut self, parameters: &Value) -> bool {
        match serde_json::from_value::<DispatchRewardParams>(parameters.clone()) {
            Ok(params) => {
                self.params = Some(params);
                true
            }
            Err(error) => {
                tracing::warn!("dispatch reward parameters rejected: {error}");
                false
            }
        }
    }

    fn install(&mut self, context: &mut MissionContext) -> Result<()> {
        if self.installed {
            return Ok(());
        }
        let Some(params) = &self.params else {
            return Err(crate::core::error::TetherError::InvalidConfig(
                "dispatch reward installed without parameters".into(),
            ));
        };
        let flag = Arc::new(DispatchFlag {
            kind: params.kind,
            armed: AtomicBool::new(false),
        });
        let sender = context.sender()?.clone();
        sender.add_observer(flag.clone());
        self.sender = Some(sender);
        self.flag = Some(flag);
        self.installed = true;
        Ok(())
    }

    fn deinstall(&mut self, _context: &mut MissionContext) {
        if !self.installed {
            return;
        }
        if let (Some(sender), Some(flag)) = (self.sender.take(), self.flag.take()) {
            let observer: Arc<dyn DispatchObserver> = flag;
            sender.remove_observer(&observer);
        }
        self.installed = false;
    }

    fn as_reward(&mut self) -> Option<&mut dyn RewardProducer> {
        Some(self)
    }
}

impl RewardProducer for CommandDispatchReward {
    fn collect_rewards(&mut self, accumulator: &mut RewardAccumulator) {
        let (Some(params), Some(flag)) = (&self.params, &self.flag) else {
            return;
        };
        // Atomic read-and-disarm: exactly one poll observes each arming.
        if flag.armed.swap(false, Ordering::SeqCst) {
            accumulator.add(params.dimension, params.amount);
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ContactRewardEntry {
    category: String,
    amount: f32,
    #[serde(default)]
    dimension: RewardDimension,
}

#[derive(Debug, Clone, Deserialize)]
struct ContactRewardParams {
    rewards: Vec<ContactRewardEntry>,
    #[serde(default)]
    once_only: bool,
}

/// Scalar reward per contact with a configured category.
///
/// In once-only mode a category that has paid out is excluded for the
/// rest of the mission.
pub struct ContactReward {
    params: Option<ContactRewardParams>,
    queue: Option<ContactQueue>,
    rewarded: AHashSet<String>,
    installed: bool,
}

impl ContactReward {
    pub fn new() -> Self {
        Self {
            params: None,
            queue: None,
            rewarded: AHashSet::new(),
            installed: false,
        }
    }
}

impl Default for ContactReward {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionHandler for ContactReward {
    fn name(&self) -> &str {
        "contact_reward"
    }

    fn parse_parameters(&mut self, parameters: &Value) -> bool {
        match serde_json::from_value::<ContactRewardParams>(parameters.clone()) {
            Ok(params) => {
                self.params = Some(params);
                true
            }
            Err(error) => {
                tracing::warn!("contact reward parameters rejected: {error}");
                false
            }
        }
    }

    fn install(&mut self, context: &mut MissionContext) -> Result<()> {
        if self.installed {
            return Ok(());
        }
        self.queue = Some(context.contact_bus().subscribe());
        self.installed = true;
        Ok(())
    }

    fn deinstall(&mut self, _context: &mut MissionContext) {
        if !self.installed {
            return;
        }
        self.queue = None;
        self.installed = false;
    }

    fn as_reward(&mut self) -> Option<&mut dyn RewardProducer> {
        Some(self)
    }
}

impl RewardProducer for ContactReward {
    fn collect_rewards(&mut self, accumulator: &mut RewardAccumulator) {
        let (Some(params), Some(queue)) = (&self.params, &self.queue) else {
            return;
        };
        for category in queue.drain() {
            if params.once_only && self.rewarded.contains(&category) {
                continue;
            }
            let Some(entry) = params.rewards.iter().find(|e| e.category == category) else {
                continue;
            };
            accumulator.add(entry.dimension, entry.amount);
            if params.once_only {
                self.rewarded.insert(category);
            }
        }
    }
}
