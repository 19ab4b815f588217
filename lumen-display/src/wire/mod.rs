//! The resource registry: the boundary between protocol objects and the
//! transport.
//!
//! Every server-side object lives here as a [`ResourceEntry`]: the owning
//! client, the negotiated interface version, and a role tag linking back to
//! the component that owns the object's state (the destructor hook;
//! [`Registry::destroy`] hands the tag back so the server can route
//! teardown). Outbound messages pass through the single [`Registry::send`]
//! choke point, which drops anything addressed to a dead resource, a
//! poisoned client, or a resource whose version predates the message, and
//! queues the rest per client for the transport to drain.

pub mod events;

use crate::{ClientId, OfferId, OutputId, ResourceId, SeatId, SourceId, SurfaceId};
use events::AnyEvent;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// The interface a resource was created as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    WlOutput,
    WlSurface,
    WlDataDeviceManager,
    WlDataSource,
    WlDataOffer,
    WlDataDevice,
}

/// Ties a resource back to the component state it fronts.
///
/// Returned by [`Registry::destroy`] so the caller can sever the
/// component-side edges; this is the registry's destructor hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRole {
    Output(OutputId),
    Surface(SurfaceId),
    DataSource(SourceId),
    DataOffer(OfferId),
    DataDevice(SeatId),
    /// Manager objects and anything else without component state.
    None,
}

/// A protocol error posted on a resource, poisoning its client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedError {
    pub object: ResourceId,
    pub code: u32,
    pub message: String,
}

/// An event queued for a client, addressed by the emitting resource.
#[derive(Debug)]
pub struct OutboundEvent {
    pub resource: ResourceId,
    pub event: AnyEvent,
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("client is not connected")]
    DeadClient,
}

#[derive(Debug)]
pub struct ResourceEntry {
    pub client: ClientId,
    pub interface: Interface,
    pub version: u32,
    pub role: ResourceRole,
    alive: bool,
}

#[derive(Debug, Default)]
struct ClientRecord {
    alive: bool,
    error: Option<PostedError>,
    queue: VecDeque<OutboundEvent>,
}

/// Owns all clients and resources. See the module docs.
#[derive(Debug, Default)]
pub struct Registry {
    clients: HashMap<ClientId, ClientRecord>,
    resources: HashMap<ResourceId, ResourceEntry>,
    next_client: u32,
    next_resource: u32,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    pub fn create_client(&mut self) -> ClientId {
        self.next_client += 1;
        let id = ClientId(self.next_client);
        self.clients.insert(
            id,
            ClientRecord {
                alive: true,
                ..Default::default()
            },
        );
        id
    }

    pub fn client_alive(&self, client: ClientId) -> bool {
        self.clients.get(&client).map_or(false, |c| c.alive)
    }

    /// Whether a protocol error has been posted against the client.
    pub fn client_error(&self, client: ClientId) -> Option<&PostedError> {
        self.clients.get(&client).and_then(|c| c.error.as_ref())
    }

    pub fn create_resource(
        &mut self,
        client: ClientId,
        interface: Interface,
        version: u32,
        role: ResourceRole,
    ) -> Result<ResourceId, WireError> {
        if !self.client_alive(client) {
            return Err(WireError::DeadClient);
        }
        self.next_resource += 1;
        let id = ResourceId(self.next_resource);
        self.resources.insert(
            id,
            ResourceEntry {
                client,
                interface,
                version,
                role,
                alive: true,
            },
        );
        Ok(id)
    }

    /// Attach the component role to a resource created before its state
    /// existed.
    pub fn set_role(&mut self, resource: ResourceId, role: ResourceRole) {
        if let Some(entry) = self.resources.get_mut(&resource) {
            entry.role = role;
        }
    }

    pub fn alive(&self, resource: ResourceId) -> bool {
        self.resources.get(&resource).map_or(false, |r| r.alive)
    }

    /// The negotiated version, readable for dead entries too (teardown
    /// paths still consult it).
    pub fn version(&self, resource: ResourceId) -> Option<u32> {
        self.resources.get(&resource).map(|r| r.version)
    }

    pub fn client_of(&self, resource: ResourceId) -> Option<ClientId> {
        self.resources.get(&resource).map(|r| r.client)
    }

    pub fn role_of(&self, resource: ResourceId) -> Option<ResourceRole> {
        self.resources.get(&resource).map(|r| r.role)
    }

    /// Emit an event on a resource.
    ///
    /// This is the only path onto the wire. The event is dropped, never an
    /// error, when the resource or its client is gone, the client has been
    /// poisoned by a protocol error, or the resource's version predates the
    /// message.
    pub fn send(&mut self, resource: ResourceId, event: impl Into<AnyEvent>) {
        let event = event.into();
        let Some(entry) = self.resources.get(&resource) else {
            return;
        };
        if !entry.alive {
            return;
        }
        if entry.version < event.since_version() {
            return;
        }
        let Some(client) = self.clients.get_mut(&entry.client) else {
            return;
        };
        if !client.alive || client.error.is_some() {
            return;
        }
        client.queue.push_back(OutboundEvent { resource, event });
    }

    /// Post a protocol error on a resource. The client is poisoned: no
    /// further events will be queued for it, and the transport is expected
    /// to disconnect it.
    pub fn post_error(&mut self, resource: ResourceId, code: u32, message: impl Into<String>) {
        let message = message.into();
        let Some(entry) = self.resources.get(&resource) else {
            return;
        };
        tracing::error!(
            resource = resource.0,
            code,
            %message,
            "posting protocol error"
        );
        if let Some(client) = self.clients.get_mut(&entry.client) {
            if client.error.is_none() {
                client.error = Some(PostedError {
                    object: resource,
                    code,
                    message,
                });
            }
        }
    }

    /// Post `no_memory` on a resource's client.
    pub fn post_no_memory(&mut self, resource: ResourceId) {
        self.post_error(resource, events::error_code::DISPLAY_NO_MEMORY, "no memory");
    }

    /// Mark a resource dead and hand back its role so the caller can tear
    /// down the component state. Idempotent: a second call returns `None`.
    pub fn destroy(&mut self, resource: ResourceId) -> Option<ResourceRole> {
        let entry = self.resources.get_mut(&resource)?;
        if !entry.alive {
            return None;
        }
        entry.alive = false;
        Some(entry.role)
    }

    /// All live resources belonging to a client, for disconnect teardown.
    pub fn resources_of_client(&self, client: ClientId) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self
            .resources
            .iter()
            .filter(|(_, entry)| entry.client == client && entry.alive)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }

    /// Mark a client gone and drop its queue (closing any fds still in
    /// flight).
    pub fn kill_client(&mut self, client: ClientId) {
        if let Some(record) = self.clients.get_mut(&client) {
            record.alive = false;
            record.queue.clear();
        }
    }

    /// Drain the client's outbound queue, in emission order.
    pub fn drain_events(&mut self, client: ClientId) -> Vec<OutboundEvent> {
        match self.clients.get_mut(&client) {
            Some(record) => record.queue.drain(..).collect(),
            None => Vec::new(),
        }
    }
}
