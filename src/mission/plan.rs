//! Declarative mission plans
//!
//! A plan lists the handler specs for each side of one mission
//! participant. Plans are TOML on disk:
//!
//! ```toml
//! name = "fetch_quest"
//!
//! [[controlling]]
//! type = "motion_commands"
//! params = { replicate = true, body = "agent-0" }
//!
//! [[authoritative]]
//! type = "remote_motion"
//! ```

use serde::Deserialize;
use std::path::Path;

use crate::core::error::{Result, TetherError};
use crate::core::types::Side;
use crate::handler::HandlerSpec;

#[derive(Debug, Clone, Deserialize)]
struct PlanHandler {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    params: Option<toml::Value>,
}

/// Handler lists for one mission participant, split by side.
#[derive(Debug, Clone, Deserialize)]
pub struct MissionPlan {
    pub name: String,
    #[serde(default)]
    controlling: Vec<PlanHandler>,
    #[serde(default)]
    authoritative: Vec<PlanHandler>,
}

impl MissionPlan {
    /// Load a plan from a TOML file
    pub fn load_from_toml(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse a plan from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|error| TetherError::Plan(error.to_string()))
    }

    /// The declarative handler specs for one side, parameter bundles
    /// converted to the factory's JSON form.
    pub fn handler_specs(&self, side: Side) -> Vec<HandlerSpec> {
        let handlers = match side {
            Side::Controlling => &self.controlling,
            Side::Authoritative => &self.authoritative,
        };
        handlers
            .iter()
            .map(|handler| {
                let parameters = handler
                    .params
                    .as_ref()
                    .and_then(|value| serde_json::to_value(value).ok())
                    .unwrap_or_else(|| serde_json::json!({}));
                HandlerSpec::new(handler.type_name.clone(), parameters)
            })
            .collect()
    }
}
