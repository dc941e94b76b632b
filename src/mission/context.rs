//! Mission context: the collaborators handlers attach to at install time
//!
//! A context is built once per mission attempt per side and injected into
//! every handler's `install`. Asking for a collaborator the side does not
//! carry is an invariant violation (a mis-wired mission driver) and fails
//! hard, unlike configuration problems which are collected as data.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::channel::{CommandSender, ListenerRegistry};
use crate::core::config::ControlConfig;
use crate::core::error::{Result, TetherError};
use crate::core::types::Side;
use crate::motion::fleet::MotionFleet;
use crate::motion::state::MotionState;
use crate::replication::craft::RecipeResolver;
use crate::replication::inventory::Inventory;

/// Fan-out bus for world contact events (the embedding simulation calls
/// `publish` whenever the agent touches a categorized surface).
#[derive(Clone, Default)]
pub struct ContactBus {
    subscribers: Arc<Mutex<Vec<Arc<Mutex<Vec<String>>>>>>,
}

impl ContactBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver one contact category to every subscriber.
    pub fn publish(&self, category: &str) {
        for queue in self.subscribers.lock().iter() {
            queue.lock().push(category.to_string());
        }
    }

    /// A fresh queue that receives every future publish.
    pub fn subscribe(&self) -> ContactQueue {
        let queue = Arc::new(Mutex::new(Vec::new()));
        self.subscribers.lock().push(queue.clone());
        ContactQueue { inner: queue }
    }
}

/// One subscriber's pending contact events.
pub struct ContactQueue {
    inner: Arc<Mutex<Vec<String>>>,
}

impl ContactQueue {
    /// Take everything published since the last drain.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.inner.lock())
    }
}

/// Everything a handler may attach to during `install`.
pub struct MissionContext {
    side: Side,
    pub config: ControlConfig,
    sender: Option<CommandSender>,
    registry: Option<Arc<ListenerRegistry>>,
    inventory: Option<Arc<Mutex<Inventory>>>,
    resolver: Option<Arc<dyn RecipeResolver>>,
    fleet: Option<Arc<MotionFleet>>,
    local_body: Arc<Mutex<MotionState>>,
    contact_bus: ContactBus,
}

impl MissionContext {
    /// Context for the side issuing intent.
    pub fn controlling(config: ControlConfig, sender: CommandSender) -> Self {
        let local_body = Arc::new(Mutex::new(MotionState::new(
            config.inertia_ticks,
            config.max_angular_velocity,
        )));
        Self {
            side: Side::Controlling,
            config,
            sender: Some(sender),
            registry: None,
            inventory: None,
            resolver: None,
            fleet: None,
            local_body,
            contact_bus: ContactBus::new(),
        }
    }

    /// Context for the side owning canonical world state.
    pub fn authoritative(
        config: ControlConfig,
        registry: Arc<ListenerRegistry>,
        inventory: Arc<Mutex<Inventory>>,
        resolver: Arc<dyn RecipeResolver>,
        fleet: Arc<MotionFleet>,
    ) -> Self {
        let local_body = Arc::new(Mutex::new(MotionState::new(
            config.inertia_ticks,
            config.max_angular_velocity,
        )));
        Self {
            side: Side::Authoritative,
            config,
            sender: None,
            registry: Some(registry),
            inventory: Some(inventory),
            resolver: Some(resolver),
            fleet: Some(fleet),
            local_body,
            contact_bus: ContactBus::new(),
        }
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn sender(&self) -> Result<&CommandSender> {
        self.sender
            .as_ref()
            .ok_or(TetherError::CollaboratorMissing("command sender"))
    }

    pub fn registry(&self) -> Result<Arc<ListenerRegistry>> {
        self.registry
            .clone()
            .ok_or(TetherError::CollaboratorMissing("listener registry"))
    }

    pub fn inventory(&self) -> Result<Arc<Mutex<Inventory>>> {
        self.inventory
            .clone()
            .ok_or(TetherError::CollaboratorMissing("inventory"))
    }

    pub fn resolver(&self) -> Result<Arc<dyn RecipeResolver>> {
        self.resolver
            .clone()
            .ok_or(TetherError::CollaboratorMissing("recipe resolver"))
    }

    pub fn fleet(&self) -> Result<Arc<MotionFleet>> {
        self.fleet
            .clone()
            .ok_or(TetherError::CollaboratorMissing("motion fleet"))
    }

    /// Motion state of this participant's own body.
    pub fn local_body(&self) -> Arc<Mutex<MotionState>> {
        self.local_body.clone()
    }

    pub fn contact_bus(&self) -> &ContactBus {
        &self.contact_bus
    }
}
