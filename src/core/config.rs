//! Control-plane configuration with documented constants
//!
//! All magic numbers are collected here with explanations of their purpose
//! and how they interact with each other. A config is injected per mission
//! through the `MissionContext`; there is no process-global instance because
//! every mission attempt rebuilds its graph from scratch.

/// Configuration for the control plane
///
/// These values have been tuned against the reference simulation.
/// Changing them will affect how responsive controlled bodies feel.
#[derive(Debug, Clone)]
pub struct ControlConfig {
    // === MOTION ===
    /// Number of ticks a velocity change takes to reach its target
    ///
    /// The ramp is linear: after `inertia_ticks` ticks the body moves at
    /// exactly the commanded velocity. 0 disables inertia entirely
    /// (commands take effect on the next tick).
    pub inertia_ticks: u32,

    /// Maximum angular velocity in degrees per second
    ///
    /// Turn and pitch rates in [-1, 1] scale this value. Angular motion is
    /// integrated against wall-clock time rather than tick count so camera
    /// movement stays smooth regardless of the simulation tick rate.
    pub max_angular_velocity: f32,

    // === INVENTORY ===
    /// Maximum item count in a single inventory slot
    ///
    /// Combine operations merge stacks up to this limit; the remainder
    /// stays in the source slot.
    pub stack_limit: u32,

    // === COMMAND CHANNEL ===
    /// Bounded capacity of the in-process command transport
    ///
    /// When the authoritative side falls behind, controlling-side sends
    /// block once this many frames are queued. Senders must therefore
    /// never hold an aggregator-wide lock across a send.
    pub channel_capacity: usize,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            inertia_ticks: 6,
            max_angular_velocity: 180.0,
            stack_limit: 64,
            channel_capacity: 256,
        }
    }
}

impl ControlConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), String> {
        if self.max_angular_velocity <= 0.0 {
            return Err(format!(
                "max_angular_velocity ({}) must be positive",
                self.max_angular_velocity
            ));
        }

        if self.stack_limit == 0 {
            return Err("stack_limit must be at least 1".into());
        }

        if self.channel_capacity == 0 {
            return Err("channel_capacity must be at least 1".into());
        }

        Ok(())
    }
}
