//! Craft replication: attempt on the authoritative side, silent on failure
//!
//! The controlling side forwards a free-text request (`output [fuel]`).
//! The authoritative listener asks the recipe resolver for a feasible
//! ingredient assignment and applies it atomically; infeasible requests
//! are no-ops, mirroring "attempt, report nothing on failure".

use parking_lot::Mutex;
use std::sync::Arc;

use crate::channel::{
    CommandListener, CommandMessage, ListenerId, ListenerRegistry, MessageKind, SharedListener,
};
use crate::core::error::Result;
use crate::core::types::BodyId;
use crate::handler::{CommandHandler, MissionHandler};
use crate::mission::context::MissionContext;
use crate::replication::inventory::{Inventory, ItemStack};

/// A feasible ingredient assignment: consume these, produce that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CraftPlan {
    pub consume: Vec<(String, u32)>,
    pub produce: ItemStack,
}

/// External collaborator resolving craft feasibility.
///
/// Given a requested output and the current inventory, returns a plan only
/// when every ingredient (and the fuel, if the recipe needs one) is
/// available. The control plane applies the plan; it never searches
/// recipes itself.
pub trait RecipeResolver: Send + Sync {
    fn resolve(&self, output: &str, fuel: Option<&str>, inventory: &Inventory) -> Option<CraftPlan>;
}

/// One craftable output and what it takes.
#[derive(Debug, Clone)]
pub struct CraftRecipe {
    pub output: ItemStack,
    pub ingredients: Vec<(String, u32)>,
    /// Some recipes additionally burn one unit of fuel.
    pub fuel: Option<String>,
}

/// Simple list-backed resolver.
#[derive(Debug, Clone, Default)]
pub struct RecipeBook {
    recipes: Vec<CraftRecipe>,
}

impl RecipeBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load default recipes (hardcoded for now)
    pub fn with_defaults() -> Self {
        let mut book = Self::new();
        book.add(CraftRecipe {
            output: ItemStack::new("planks", 4),
            ingredients: vec![("log".into(), 1)],
            fuel: None,
        });
        book.add(CraftRecipe {
            output: ItemStack::new("stick", 4),
            ingredients: vec![("planks".into(), 2)],
            fuel: None,
        });
        book.add(CraftRecipe {
            output: ItemStack::new("iron_ingot", 1),
            ingredients: vec![("iron_ore".into(), 1)],
            fuel: Some("coal".into()),
        });
        book
    }

    pub fn add(&mut self, recipe: CraftRecipe) {
        self.recipes.push(recipe);
    }
}

impl RecipeResolver for RecipeBook {
    fn resolve(&self, output: &str, fuel: Option<&str>, inventory: &Inventory) -> Option<CraftPlan> {
        'recipes: for recipe in &self.recipes {
            if recipe.output.item != output {
                continue;
            }
            // A fueled recipe needs the matching fuel named in the request.
            if let Some(required_fuel) = &recipe.fuel {
                if fuel != Some(required_fuel.as_str()) {
                    continue;
                }
            }

            let mut consume = recipe.ingredients.clone();
            if let Some(required_fuel) = &recipe.fuel {
                consume.push((required_fuel.clone(), 1));
            }
            for (item, count) in &consume {
                if inventory.count_of(item) < *count {
                    continue 'recipes;
                }
            }
            return Some(CraftPlan {
                consume,
                produce: recipe.output.clone(),
            });
        }
        None
    }
}

// === Controlling side ===

/// Forwards craft requests over the command channel.
pub struct CraftCommands {
    sender: Option<crate::channel::CommandSender>,
    overriding: bool,
    installed: bool,
}

impl CraftCommands {
    pub fn new() -> Self {
        Self {
            sender: None,
            overriding: false,
            installed: false,
        }
    }
}

impl Default for CraftCommands {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionHandler for CraftCommands {
    fn name(&self) -> &str {
        "craft_commands"
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

impl CommandHandler for CraftCommands {
    fn execute(&mut self, verb: &str, value: &str) -> bool {
        if !self.overriding || verb != "craft" {
            return false;
        }
        let mut words = value.split_whitespace();
        let Some(output) = words.next() else {
            return false;
        };
        let fuel = words.next();

        let Some(sender) = &self.sender else {
            tracing::error!("craft commands executed before install");
            return false;
        };
        let mut message = CommandMessage::new(MessageKind::Craft, "craft", output);
        if let Some(fuel) = fuel {
            message = message.with_aux("fuel", fuel);
        }
        match sender.send(&message) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("craft request not replicated: {error}");
                false
            }
        }
    }

    fn set_overriding(&mut self, overriding: bool) {
        self.overriding = overriding;
    }
}

// === Authoritative side ===

struct CraftRequestListener {
    inventory: Arc<Mutex<Inventory>>,
    resolver: Arc<dyn RecipeResolver>,
}

impl CommandListener for CraftRequestListener {
    fn on_message(&mut self, message: &CommandMessage, actor: &BodyId) -> Result<()> {
        let fuel = message.aux.get("fuel").map(String::as_str);
        let mut inventory = self.inventory.lock();

        match self.resolver.resolve(&message.value, fuel, &inventory) {
            Some(plan) => {
                if inventory.apply_craft(&plan) {
                    tracing::debug!(actor = %actor, output = %plan.produce.item, "craft applied");
                } else {
                    tracing::debug!(actor = %actor, "craft plan no longer applicable; dropped");
                }
            }
            None => {
                // Infeasible requests report nothing back to the
                // controlling side.
                tracing::debug!(actor = %actor, output = %message.value, "craft infeasible");
            }
        }
        Ok(())
    }
}

/// Installs the authoritative listener that resolves craft requests.
pub struct CraftReplication {
    registry: Option<Arc<ListenerRegistry>>,
    token: Option<ListenerId>,
    installed: bool,
}

impl CraftReplication {
    pub fn new() -> Self {
        Self {
            registry: None,
            token: None,
            installed: false,
        }
    }
}

impl Default for CraftReplication {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionHandler for CraftReplication {
    fn name(&self) -> &str {
        "craft_replication"
    }

    fn install(&mut self, context: &mut MissionContext) -> Result<()> {
        if self.installed {
            return Ok(());
        }
        let registry = context.registry()?;
        let listener: SharedListener = Arc::new(Mutex::new(CraftRequestListener {
            inventory: context.inventory()?,
            resolver: context.resolver()?,
        }));
        self.token = Some(registry.register(MessageKind::Craft, listener));
        self.registry = Some(registry);
        self.installed = true;
        Ok(())
    }

    fn deinstall(&mut self, _context: &mut MissionContext) {
        if !self.installed {
            return;
        }
        if let (Some(registry), Some(token)) = (self.registry.take(), self.token.take()) {
            registry.deregister(MessageKind::Craft, token);
        }
        self.installed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replication::inventory::SlotRef;

    fn stocked_inventory() -> Inventory {
        let mut inventory = Inventory::new(64);
        inventory.add_container("inventory", 9);
        inventory.set_slot(
            &SlotRef::new("inventory", 0),
            Some(ItemStack::new("log", 2)),
        );
        inventory.set_slot(
            &SlotRef::new("inventory", 1),
            Some(ItemStack::new("iron_ore", 1)),
        );
        inventory.set_slot(
            &SlotRef::new("inventory", 2),
            Some(ItemStack::new("coal", 3)),
        );
        inventory
    }

    #[test]
    fn test_resolve_plain_recipe() {
        let book = RecipeBook::with_defaults();
        let inventory = stocked_inventory();

        let plan = book.resolve("planks", None, &inventory).unwrap();
        assert_eq!(plan.produce, ItemStack::new("planks", 4));
        assert_eq!(plan.consume, vec![("log".to_string(), 1)]);
    }

    #[test]
    fn test_fueled_recipe_requires_named_fuel() {
        let book = RecipeBook::with_defaults();
        let inventory = stocked_inventory();

        assert!(book.resolve("iron_ingot", None, &inventory).is_none());
        let plan = book.resolve("iron_ingot", Some("coal"), &inventory).unwrap();
        assert!(plan.consume.contains(&("coal".to_string(), 1)));
    }

    #[test]
    fn test_missing_ingredients_are_infeasible() {
        let book = RecipeBook::with_defaults();
        let inventory = stocked_inventory();
        assert!(book.resolve("stick", None, &inventory).is_none());
    }

    #[test]
    fn test_apply_craft_is_atomic() {
        let book = RecipeBook::with_defaults();
        let mut inventory = stocked_inventory();

        let plan = book
            .resolve("iron_ingot", Some("coal"), &inventory)
            .unwrap();
        assert!(inventory.apply_craft(&plan));
        assert_eq!(inventory.count_of("iron_ore"), 0);
        assert_eq!(inventory.count_of("coal"), 2);
        assert_eq!(inventory.count_of("iron_ingot"), 1);

        // Second attempt: ore is gone, plan must not partially apply.
        assert!(!inventory.apply_craft(&plan));
        assert_eq!(inventory.count_of("coal"), 2);
    }
}
