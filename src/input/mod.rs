//! Input override arbitration

pub mod binding;
pub mod commands;

pub use binding::{EdgeObserver, OverrideBinding};
pub use commands::BindingCommands;
