//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulation tick counter (one tick = one advance of the world)
pub type Tick = u64;

/// Index into the reward vector (missions may reward along several axes)
pub type RewardDimension = usize;

/// Which half of the control plane a handler runs on.
///
/// The controlling side issues intent; the authoritative side owns the
/// canonical world state those intents are applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Controlling,
    Authoritative,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Controlling => write!(f, "controlling"),
            Side::Authoritative => write!(f, "authoritative"),
        }
    }
}

/// Identifier for a controlled body in the simulated world.
///
/// Body ids originate on the wire (command origin fields), so they are
/// strings rather than dense indices.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BodyId(pub String);

impl BodyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BodyId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
