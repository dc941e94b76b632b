//! Per-body motion state: velocity ramp and angular integration
//!
//! Velocity approaches its target linearly over `inertia_ticks` simulation
//! ticks, reaching it exactly at the inertia boundary. Yaw and pitch
//! integrate against wall-clock time so camera motion stays smooth no
//! matter how fast the simulation ticks.

use std::time::Instant;

/// The per-tick output applied to a controlled body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionFrame {
    pub velocity: f32,
    pub strafe: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub jumping: bool,
    pub crouching: bool,
}

/// Motion state for one controlled body.
#[derive(Debug, Clone)]
pub struct MotionState {
    pub velocity: f32,
    pub strafe: f32,
    target_velocity: f32,
    ticks_since_velocity_change: u32,
    inertia_ticks: u32,
    pub yaw: f32,
    pub pitch: f32,
    yaw_rate: f32,
    pitch_rate: f32,
    max_angular_velocity: f32,
    last_angular_update: Instant,
    pub jumping: bool,
    pub crouching: bool,
    active: bool,
}

impl MotionState {
    pub fn new(inertia_ticks: u32, max_angular_velocity: f32) -> Self {
        Self {
            velocity: 0.0,
            strafe: 0.0,
            target_velocity: 0.0,
            ticks_since_velocity_change: 0,
            inertia_ticks,
            yaw: 0.0,
            pitch: 0.0,
            yaw_rate: 0.0,
            pitch_rate: 0.0,
            max_angular_velocity,
            last_angular_update: Instant::now(),
            jumping: false,
            crouching: false,
            active: false,
        }
    }

    /// Reconfigure ramp and angular limits (handler parameters may
    /// override the mission defaults at install time).
    pub fn configure(&mut self, inertia_ticks: u32, max_angular_velocity: f32) {
        self.inertia_ticks = inertia_ticks;
        self.max_angular_velocity = max_angular_velocity;
    }

    pub fn target_velocity(&self) -> f32 {
        self.target_velocity
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Hand control to (or take it from) the external controller.
    ///
    /// Deactivating releases all held controls; reactivating restarts the
    /// angular clock so the idle period does not integrate into yaw.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
        if active {
            self.last_angular_update = Instant::now();
        } else {
            self.yaw_rate = 0.0;
            self.pitch_rate = 0.0;
            self.jumping = false;
            self.crouching = false;
        }
    }

    /// Apply one motion verb. Unrecognized verbs and unparseable values
    /// return false (a runtime no-op, not an error).
    pub fn apply_command(&mut self, verb: &str, value: &str) -> bool {
        let Ok(parsed) = value.parse::<f32>() else {
            tracing::debug!("motion verb {verb} ignoring value {value:?}");
            return false;
        };
        let clamped = parsed.clamp(-1.0, 1.0);

        match verb {
            "move" => {
                // Restart the ramp only on an actual target change.
                if clamped != self.target_velocity {
                    self.target_velocity = clamped;
                    self.ticks_since_velocity_change = 0;
                }
                true
            }
            "strafe" => {
                self.strafe = -clamped;
                true
            }
            "turn" => {
                self.yaw_rate = clamped;
                self.last_angular_update = Instant::now();
                true
            }
            "pitch" => {
                self.pitch_rate = clamped;
                self.last_angular_update = Instant::now();
                true
            }
            "jump" => {
                self.jumping = parsed != 0.0;
                true
            }
            "crouch" => {
                self.crouching = parsed != 0.0;
                true
            }
            _ => false,
        }
    }

    /// Advance one tick of the ramp plus the elapsed wall-clock angular
    /// motion. Returns None while the external controller is not active;
    /// default locomotion then applies unchanged.
    pub fn advance(&mut self, now: Instant) -> Option<MotionFrame> {
        if !self.active {
            return None;
        }

        self.ticks_since_velocity_change = self.ticks_since_velocity_change.saturating_add(1);
        if self.inertia_ticks > 0 && self.ticks_since_velocity_change <= self.inertia_ticks {
            let fraction = self.ticks_since_velocity_change as f32 / self.inertia_ticks as f32;
            self.velocity += (self.target_velocity - self.velocity) * fraction;
        } else {
            self.velocity = self.target_velocity;
        }

        let delta_seconds = now
            .saturating_duration_since(self.last_angular_update)
            .as_secs_f32();
        self.last_angular_update = now;

        self.yaw += self.yaw_rate * self.max_angular_velocity * delta_seconds;
        self.pitch = (self.pitch + self.pitch_rate * self.max_angular_velocity * delta_seconds)
            .clamp(-90.0, 90.0);

        Some(MotionFrame {
            velocity: self.velocity,
            strafe: self.strafe,
            yaw: self.yaw,
            pitch: self.pitch,
            jumping: self.jumping,
            crouching: self.crouching,
        })
    }
}
