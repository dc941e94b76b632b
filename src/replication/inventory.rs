//! Inventory state and its replication pair
//!
//! The authoritative side owns named containers of item slots. The
//! controlling side issues swap/combine commands addressing
//! (container, slot) pairs; both indices are validated before anything
//! mutates. When stacks cross between the actor's own container and a
//! foreign one, the result reports which stack was gained and lost so the
//! caller can wire rewards to it.

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::channel::{
    CommandListener, CommandMessage, ListenerId, ListenerRegistry, MessageKind, SharedListener,
};
use crate::core::error::Result;
use crate::core::types::BodyId;
use crate::handler::{CommandHandler, MissionHandler};
use crate::mission::context::MissionContext;

/// A stack of identical items in one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item: String,
    pub count: u32,
}

impl ItemStack {
    pub fn new(item: impl Into<String>, count: u32) -> Self {
        Self {
            item: item.into(),
            count,
        }
    }
}

/// Addressable (container, slot) pair, written `container:slot`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRef {
    pub container: String,
    pub slot: usize,
}

impl SlotRef {
    pub fn new(container: impl Into<String>, slot: usize) -> Self {
        Self {
            container: container.into(),
            slot,
        }
    }

    /// Parse `container:slot`; None on anything else.
    pub fn parse(text: &str) -> Option<Self> {
        let (container, slot) = text.rsplit_once(':')?;
        if container.is_empty() {
            return None;
        }
        Some(Self {
            container: container.to_string(),
            slot: slot.parse().ok()?,
        })
    }
}

impl fmt::Display for SlotRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.container, self.slot)
    }
}

/// Parse the command value `container:slot container:slot`.
pub fn parse_slot_pair(value: &str) -> Option<(SlotRef, SlotRef)> {
    let mut parts = value.split_whitespace();
    let first = SlotRef::parse(parts.next()?)?;
    let second = SlotRef::parse(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((first, second))
}

/// Which stack the actor gained and lost by a cross-container transfer.
///
/// Both fields are None when nothing crossed the actor's own container
/// boundary (e.g. a swap inside one container).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransferOutcome {
    pub gained: Option<ItemStack>,
    pub lost: Option<ItemStack>,
}

/// Named containers of item slots for one authoritative actor.
pub struct Inventory {
    containers: AHashMap<String, Vec<Option<ItemStack>>>,
    own_container: String,
    stack_limit: u32,
}

impl Inventory {
    pub fn new(stack_limit: u32) -> Self {
        Self {
            containers: AHashMap::new(),
            own_container: "inventory".to_string(),
            stack_limit,
        }
    }

    /// Add an empty container with the given slot count.
    pub fn add_container(&mut self, name: impl Into<String>, slots: usize) {
        self.containers.insert(name.into(), vec![None; slots]);
    }

    pub fn own_container(&self) -> &str {
        &self.own_container
    }

    pub fn in_bounds(&self, slot_ref: &SlotRef) -> bool {
        self.containers
            .get(&slot_ref.container)
            .map_or(false, |slots| slot_ref.slot < slots.len())
    }

    pub fn stack_at(&self, slot_ref: &SlotRef) -> Option<&ItemStack> {
        self.containers
            .get(&slot_ref.container)?
            .get(slot_ref.slot)?
            .as_ref()
    }

    pub fn set_slot(&mut self, slot_ref: &SlotRef, stack: Option<ItemStack>) -> bool {
        match self.slot_mut(slot_ref) {
            Some(slot) => {
                *slot = stack;
                true
            }
            None => false,
        }
    }

    fn slot_mut(&mut self, slot_ref: &SlotRef) -> Option<&mut Option<ItemStack>> {
        self.containers
            .get_mut(&slot_ref.container)?
            .get_mut(slot_ref.slot)
    }

    fn is_own(&self, slot_ref: &SlotRef) -> bool {
        slot_ref.container == self.own_container
    }

    /// Gained/lost relative to the actor's own container after the stacks
    /// at `a` and `b` have been exchanged.
    fn crossing_outcome(&self, a: &SlotRef, b: &SlotRef) -> TransferOutcome {
        if self.is_own(a) == self.is_own(b) {
            return TransferOutcome::default();
        }
        let (own, foreign) = if self.is_own(a) { (a, b) } else { (b, a) };
        TransferOutcome {
            gained: self.stack_at(own).cloned(),
            lost: self.stack_at(foreign).cloned(),
        }
    }

    /// Exchange the stacks at two slots. None when either index is out of
    /// bounds (nothing mutates).
    pub fn swap(&mut self, a: &SlotRef, b: &SlotRef) -> Option<TransferOutcome> {
        if !self.in_bounds(a) || !self.in_bounds(b) {
            return None;
        }
        if a == b {
            return Some(TransferOutcome::default());
        }
        let stack_a = self.slot_mut(a)?.take();
        let stack_b = self.slot_mut(b)?.take();
        *self.slot_mut(a)? = stack_b;
        *self.slot_mut(b)? = stack_a;
        Some(self.crossing_outcome(a, b))
    }

    /// Merge the stack at `from` onto `to` when the items match (or `to`
    /// is empty), up to the stack limit; different items fall back to a
    /// swap. None when either index is out of bounds.
    pub fn combine(&mut self, from: &SlotRef, to: &SlotRef) -> Option<TransferOutcome> {
        if !self.in_bounds(from) || !self.in_bounds(to) {
            return None;
        }
        if from == to {
            return Some(TransferOutcome::default());
        }

        let source = self.stack_at(from).cloned();
        let target = self.stack_at(to).cloned();

        let Some(source) = source else {
            // Nothing to move.
            return Some(TransferOutcome::default());
        };

        let moved = match &target {
            None => source.count,
            Some(target_stack) if target_stack.item == source.item => {
                source.count.min(self.stack_limit - target_stack.count.min(self.stack_limit))
            }
            Some(_) => return self.swap(from, to),
        };
        if moved == 0 {
            return Some(TransferOutcome::default());
        }

        let remaining = source.count - moved;
        let merged_count = target.as_ref().map_or(0, |t| t.count) + moved;
        *self.slot_mut(to)? = Some(ItemStack::new(source.item.clone(), merged_count));
        *self.slot_mut(from)? = if remaining > 0 {
            Some(ItemStack::new(source.item.clone(), remaining))
        } else {
            None
        };

        let moved_stack = ItemStack::new(source.item, moved);
        Some(if self.is_own(to) && !self.is_own(from) {
            TransferOutcome {
                gained: Some(moved_stack),
                lost: None,
            }
        } else if self.is_own(from) && !self.is_own(to) {
            TransferOutcome {
                gained: None,
                lost: Some(moved_stack),
            }
        } else {
            TransferOutcome::default()
        })
    }

    /// Total count of one item across the actor's own container.
    pub fn count_of(&self, item: &str) -> u32 {
        self.containers
            .get(&self.own_container)
            .map_or(0, |slots| {
                slots
                    .iter()
                    .flatten()
                    .filter(|stack| stack.item == item)
                    .map(|stack| stack.count)
                    .sum()
            })
    }

    fn remove_items(&mut self, item: &str, mut count: u32) -> bool {
        let own = self.own_container.clone();
        let Some(slots) = self.containers.get_mut(&own) else {
            return false;
        };
        for slot in slots.iter_mut() {
            if count == 0 {
                break;
            }
            if let Some(stack) = slot {
                if stack.item == item {
                    let taken = stack.count.min(count);
                    stack.count -= taken;
                    count -= taken;
                    if stack.count == 0 {
                        *slot = None;
                    }
                }
            }
        }
        count == 0
    }

    fn can_insert(&self, stack: &ItemStack) -> bool {
        self.containers.get(&self.own_container).map_or(false, |slots| {
            slots.iter().any(|slot| match slot {
                None => true,
                Some(existing) => {
                    existing.item == stack.item
                        && existing.count + stack.count <= self.stack_limit
                }
            })
        })
    }

    fn insert(&mut self, stack: ItemStack) -> bool {
        let own = self.own_container.clone();
        let limit = self.stack_limit;
        let Some(slots) = self.containers.get_mut(&own) else {
            return false;
        };
        // Prefer merging onto an existing stack of the same item.
        for slot in slots.iter_mut() {
            if let Some(existing) = slot {
                if existing.item == stack.item && existing.count + stack.count <= limit {
                    existing.count += stack.count;
                    return true;
                }
            }
        }
        for slot in slots.iter_mut() {
            if slot.is_none() {
                *slot = Some(stack);
                return true;
            }
        }
        false
    }

    /// Consume a craft plan's ingredients and insert its product, all or
    /// nothing. False leaves the inventory untouched.
    pub fn apply_craft(&mut self, plan: &crate::replication::craft::CraftPlan) -> bool {
        for (item, count) in &plan.consume {
            if self.count_of(item) < *count {
                return false;
            }
        }
        if !self.can_insert(&plan.produce) {
            return false;
        }
        for (item, count) in &plan.consume {
            self.remove_items(item, *count);
        }
        self.insert(plan.produce.clone())
    }
}

// === Controlling side ===

/// Replicates swap/combine intents over the command channel.
pub struct InventoryCommands {
    sender: Option<crate::channel::CommandSender>,
    overriding: bool,
    installed: bool,
}

impl InventoryCommands {
    pub fn new() -> Self {
        Self {
            sender: None,
            overriding: false,
            installed: false,
        }
    }
}

impl Default for InventoryCommands {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionHandler for InventoryCommands {
    fn name(&self) -> &str {
        "inventory_commands"
    }

    fn install(&mut self, context: &mut MissionContext) -> Result<()> {
        if self.installed {
            return Ok(());
        }
        self.sender = Some(context.sender()?.clone());
        self.installed = true;
        Ok(())
    }

    fn deinstall(&mut self, _context: &mut MissionContext) {
        if !self.installed {
            return;
        }
        self.sender = None;
        self.installed = false;
    }

    fn as_command(&mut self) -> Option<&mut dyn CommandHandler> {
        Some(self)
    }
}

impl CommandHandler for InventoryCommands {
    fn execute(&mut self, verb: &str, value: &str) -> bool {
        if !self.overriding {
            return false;
        }
        if verb != "swap_slots" && verb != "combine_slots" {
            return false;
        }
        if parse_slot_pair(value).is_none() {
            tracing::debug!("ignoring {verb} with unparseable slots {value:?}");
            return false;
        }
        let Some(sender) = &self.sender else {
            tracing::error!("inventory commands executed before install");
            return false;
        };
        let message = CommandMessage::new(MessageKind::InventoryChange, verb, value);
        match sender.send(&message) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("inventory command not replicated: {error}");
                false
            }
        }
    }

    fn set_overriding(&mut self, overriding: bool) {
        self.overriding = overriding;
    }
}

// === Authoritative side ===

struct InventoryChangeListener {
    inventory: Arc<Mutex<Inventory>>,
}

impl CommandListener for InventoryChangeListener {
    fn on_message(&mut self, message: &CommandMessage, actor: &BodyId) -> Result<()> {
        let Some((a, b)) = parse_slot_pair(&message.value) else {
            return Err(crate::core::error::TetherError::Protocol(format!(
                "bad slot pair {:?}",
                message.value
            )));
        };

        let outcome = {
            let mut inventory = self.inventory.lock();
            match message.verb.as_str() {
                "swap_slots" => inventory.swap(&a, &b),
                "combine_slots" => inventory.combine(&a, &b),
                other => {
                    tracing::debug!("unknown inventory verb {other:?}");
                    return Ok(());
                }
            }
        };

        match outcome {
            Some(outcome) => {
                tracing::debug!(
                    actor = %actor,
                    gained = ?outcome.gained,
                    lost = ?outcome.lost,
                    "inventory change applied"
                );
            }
            None => {
                tracing::debug!(actor = %actor, "inventory change out of bounds; dropped");
            }
        }
        Ok(())
    }
}

/// Installs the authoritative listener that applies inventory changes.
pub struct InventoryReplication {
    registry: Option<Arc<ListenerRegistry>>,
    token: Option<ListenerId>,
    installed: bool,
}

impl InventoryReplication {
    pub fn new() -> Self {
        Self {
            registry: None,
            token: None,
            installed: false,
        }
    }
}

impl Default for InventoryReplication {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionHandler for InventoryReplication {
    fn name(&self) -> &str {
        "inventory_replication"
    }

    fn install(&mut self, context: &mut MissionContext) -> Result<()> {
        if self.installed {
            return Ok(());
        }
        let registry = context.registry()?;
        let listener: SharedListener = Arc::new(Mutex::new(InventoryChangeListener {
            inventory: context.inventory()?,
        }));
        self.token = Some(registry.register(MessageKind::InventoryChange, listener));
        self.registry = Some(registry);
        self.installed = true;
        Ok(())
    }

    fn deinstall(&mut self, _context: &mut MissionContext) {
        if !self.installed {
            return;
        }
        if let (Some(registry), Some(token)) = (self.registry.take(), self.token.take()) {
            registry.deregister(MessageKind::InventoryChange, token);
        }
        self.installed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inventory_with(own: &[(usize, ItemStack)], chest: &[(usize, ItemStack)]) -> Inventory {
        let mut inventory = Inventory::new(64);
        inventory.add_container("inventory", 9);
        inventory.add_container("chest", 9);
        for (slot, stack) in own {
            inventory.set_slot(&SlotRef::new("inventory", *slot), Some(stack.clone()));
        }
        for (slot, stack) in chest {
            inventory.set_slot(&SlotRef::new("chest", *slot), Some(stack.clone()));
        }
        inventory
    }

    #[test]
    fn test_swap_within_one_container() {
        let mut inventory = inventory_with(
            &[(2, ItemStack::new("stone", 12)), (5, ItemStack::new("log", 3))],
            &[],
        );

        let outcome = inventory
            .swap(&SlotRef::new("inventory", 2), &SlotRef::new("inventory", 5))
            .unwrap();

        assert_eq!(
            inventory.stack_at(&SlotRef::new("inventory", 2)),
            Some(&ItemStack::new("log", 3))
        );
        assert_eq!(
            inventory.stack_at(&SlotRef::new("inventory", 5)),
            Some(&ItemStack::new("stone", 12))
        );
        // Same container: nothing gained, nothing lost.
        assert_eq!(outcome, TransferOutcome::default());
    }

    #[test]
    fn test_swap_out_of_bounds_mutates_nothing() {
        let mut inventory = inventory_with(&[(0, ItemStack::new("stone", 1))], &[]);
        assert!(inventory
            .swap(&SlotRef::new("inventory", 0), &SlotRef::new("inventory", 99))
            .is_none());
        assert_eq!(
            inventory.stack_at(&SlotRef::new("inventory", 0)),
            Some(&ItemStack::new("stone", 1))
        );
    }

    #[test]
    fn test_cross_container_swap_reports_gained_and_lost() {
        let mut inventory = inventory_with(
            &[(0, ItemStack::new("stone", 4))],
            &[(3, ItemStack::new("gold", 2))],
        );

        let outcome = inventory
            .swap(&SlotRef::new("inventory", 0), &SlotRef::new("chest", 3))
            .unwrap();

        assert_eq!(outcome.gained, Some(ItemStack::new("gold", 2)));
        assert_eq!(outcome.lost, Some(ItemStack::new("stone", 4)));
    }

    #[test]
    fn test_combine_merges_up_to_stack_limit() {
        let mut inventory = inventory_with(
            &[
                (0, ItemStack::new("stone", 40)),
                (1, ItemStack::new("stone", 40)),
            ],
            &[],
        );

        inventory
            .combine(&SlotRef::new("inventory", 0), &SlotRef::new("inventory", 1))
            .unwrap();

        assert_eq!(
            inventory.stack_at(&SlotRef::new("inventory", 1)),
            Some(&ItemStack::new("stone", 64))
        );
        assert_eq!(
            inventory.stack_at(&SlotRef::new("inventory", 0)),
            Some(&ItemStack::new("stone", 16))
        );
    }

    #[test]
    fn test_combine_different_items_swaps() {
        let mut inventory = inventory_with(
            &[(0, ItemStack::new("stone", 1)), (1, ItemStack::new("log", 1))],
            &[],
        );

        inventory
            .combine(&SlotRef::new("inventory", 0), &SlotRef::new("inventory", 1))
            .unwrap();

        assert_eq!(
            inventory.stack_at(&SlotRef::new("inventory", 0)),
            Some(&ItemStack::new("log", 1))
        );
    }

    #[test]
    fn test_slot_pair_parsing() {
        let (a, b) = parse_slot_pair("inventory:2 chest:5").unwrap();
        assert_eq!(a, SlotRef::new("inventory", 2));
        assert_eq!(b, SlotRef::new("chest", 5));

        assert!(parse_slot_pair("inventory:2").is_none());
        assert!(parse_slot_pair("inventory:x chest:5").is_none());
        assert!(parse_slot_pair("inventory:2 chest:5 extra:1").is_none());
    }
}
