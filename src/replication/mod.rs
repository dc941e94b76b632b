//! Replication of inventory and crafting intents to the authoritative side

pub mod craft;
pub mod inventory;

pub use craft::{CraftCommands, CraftPlan, CraftRecipe, CraftReplication, RecipeBook, RecipeResolver};
pub use inventory::{
    Inventory, InventoryCommands, InventoryReplication, ItemStack, SlotRef, TransferOutcome,
};
