//! Termination producers

use serde::Deserialize;
use serde_json::Value;

use crate::core::error::Result;
use crate::core::types::Tick;
use crate::handler::{MissionEnd, MissionHandler, TerminationProducer};
use crate::mission::context::{ContactQueue, MissionContext};

#[derive(Debug, Clone, Deserialize)]
struct TimeLimitParams {
    max_ticks: Tick,
}

/// Ends the mission after a fixed number of polled ticks.
pub struct TimeLimitQuit {
    params: Option<TimeLimitParams>,
    elapsed: Tick,
}

impl TimeLimitQuit {
    pub fn new() -> Self {
        Self {
            params: None,
            elapsed: 0,
        }
    }
}

impl Default for TimeLimitQuit {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionHandler for TimeLimitQuit {
    fn name(&self) -> &str {
        "time_limit_quit"
    }

    fn parse_parameters(&mut self, parameters: &Value) -> bool {
        match serde_json::from_value::<TimeLimitParams>(parameters.clone()) {
            Ok(params) => {
                self.params = Some(params);
                true
            }
            Err(error) => {
                tracing::warn!("time limit parameters rejected: {error}");
                false
            }
        }
    }

    fn as_termination(&mut self) -> Option<&mut dyn TerminationProducer> {
        Some(self)
    }
}

impl TerminationProducer for TimeLimitQuit {
    fn check_completion(&mut self) -> Option<MissionEnd> {
        let params = self.params.as_ref()?;
        self.elapsed += 1;
        (self.elapsed >= params.max_ticks).then(|| MissionEnd::new("time limit reached"))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ContactQuitEntry {
    category: String,
    outcome: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ContactQuitParams {
    categories: Vec<ContactQuitEntry>,
}

/// Ends the mission on contact with a configured category, surfacing that
/// category's outcome text.
pub struct ContactQuit {
    params: Option<ContactQuitParams>,
    queue: Option<ContactQueue>,
    installed: bool,
}

impl ContactQuit {
    pub fn new() -> Self {
        Self {
            params: None,
            queue: None,
            installed: false,
        }
    }
}

impl Default for ContactQuit {
    fn default() -> Self {
        Self::new()
    }
}

impl MissionHandler for ContactQuit {
    fn name(&self) -> &str {
        "contact_quit"
    }

    fn parse_parameters(&mut self, parameters: &Value) -> bool {
        match serde_json::from_value::<ContactQuitParams>(parameters.clone()) {
            Ok(params) => {
                self.params = Some(params);
                true
            }
            Err(error) => {
                tracing::warn!("contact quit parameters rejected: {error}");
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

    fn as_termination(&mut self) -> Option<&mut dyn TerminationProducer> {
        Some(self)
    }
}

impl TerminationProducer for ContactQuit {
    fn check_completion(&mut self) -> Option<MissionEnd> {
        let (Some(params), Some(queue)) = (&self.params, &self.queue) else {
            return None;
        };
        for category in queue.drain() {
            if let Some(entry) = params.categories.iter().find(|e| e.category == category) {
                return Some(MissionEnd::new(entry.outcome.clone()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::context::ContactBus;
    use serde_json::json;

    #[test]
    fn test_time_limit_counts_polls() {
        let mut quit = TimeLimitQuit::new();
        assert!(quit.parse_parameters(&json!({ "max_ticks": 3 })));

        assert!(quit.check_completion().is_none());
        assert!(quit.check_completion().is_none());
        let end = quit.check_completion().unwrap();
        assert_eq!(end.outcome, "time limit reached");
    }

    #[test]
    fn test_contact_quit_surfaces_outcome_text() {
        let bus = ContactBus::new();
        let mut quit = ContactQuit::new();
        assert!(quit.parse_parameters(&json!({
            "categories": [{ "category": "goal", "outcome": "reached the goal" }]
        })));
        quit.queue = Some(bus.subscribe());

        assert!(quit.check_completion().is_none());
        bus.publish("water");
        assert!(quit.check_completion().is_none());
        bus.publish("goal");
        assert_eq!(
            quit.check_completion().unwrap().outcome,
            "reached the goal"
        );
    }
}
