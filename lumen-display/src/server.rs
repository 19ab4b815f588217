//! The display server: one value owning the whole object graph.
//!
//! Everything the library manages hangs off a [`DisplayServer`] (the
//! resource registry, outputs and their layout, surfaces, seats, data
//! sources, offers and drags) and is addressed by arena index. The event
//! loop owns the value; every operation runs to completion before the
//! loop regains control, which is the only concurrency discipline the
//! core needs.
//!
//! Compositor-facing signals queue as [`Notification`]s and are drained
//! once per loop turn; wire events queue per client inside the registry.
//! Teardown is routed through [`DisplayServer::destroy_resource`]: the
//! registry hands back the dying resource's role tag and the matching
//! component severs every cross-reference before the state is dropped.

use crate::output::Output;
use crate::output::layout::OutputLayout;
use crate::data_device::{DataOffer, DataSource, Drag};
use crate::seat::Seat;
use crate::surface::{Surface, SurfaceBuffer};
use crate::wire::{Interface, Registry, ResourceRole, WireError};
use crate::{ClientId, DragId, OfferId, OutputId, ResourceId, SeatId, SourceId, SurfaceId};
use std::collections::{HashMap, VecDeque};

/// Compositor-facing signals, drained with
/// [`DisplayServer::drain_notifications`].
///
/// A notification is queued after the state transition it describes has
/// completed; snapshot fields carry what a listener needs once the object
/// itself is gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The output layout was reconfigured.
    LayoutChanged,
    /// An output is going away.
    OutputDestroyed { output: OutputId, name: String },
    /// A seat's selection changed hands (or was cleared).
    SelectionChanged { seat: SeatId },
    DragStarted { seat: SeatId },
    DragEnded { seat: SeatId },
    PointerFocusChanged {
        seat: SeatId,
        surface: Option<SurfaceId>,
    },
    KeyboardFocusChanged {
        seat: SeatId,
        surface: Option<SurfaceId>,
    },
}

#[derive(Default)]
pub struct DisplayServer {
    pub registry: Registry,
    pub(crate) outputs: HashMap<OutputId, Output>,
    pub(crate) layout: OutputLayout,
    pub(crate) surfaces: HashMap<SurfaceId, Surface>,
    pub(crate) seats: HashMap<SeatId, Seat>,
    pub(crate) sources: HashMap<SourceId, DataSource>,
    pub(crate) offers: HashMap<OfferId, DataOffer>,
    pub(crate) drags: HashMap<DragId, Drag>,
    next_output: u32,
    next_surface: u32,
    next_seat: u32,
    next_source: u32,
    next_offer: u32,
    next_drag: u32,
    serial: u32,
    notifications: VecDeque<Notification>,
}

impl DisplayServer {
    pub fn new() -> DisplayServer {
        DisplayServer::default()
    }

    /// Next wire serial; monotonically increasing, wrapping.
    pub fn next_serial(&mut self) -> u32 {
        self.serial = self.serial.wrapping_add(1);
        self.serial
    }

    pub(crate) fn push_notification(&mut self, notification: Notification) {
        self.notifications.push_back(notification);
    }

    /// Drain queued compositor-facing signals, in emission order.
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    // --- id allocation ---

    pub(crate) fn alloc_output_id(&mut self) -> OutputId {
        self.next_output += 1;
        OutputId(self.next_output)
    }

    pub(crate) fn alloc_surface_id(&mut self) -> SurfaceId {
        self.next_surface += 1;
        SurfaceId(self.next_surface)
    }

    pub(crate) fn alloc_seat_id(&mut self) -> SeatId {
        self.next_seat += 1;
        SeatId(self.next_seat)
    }

    pub(crate) fn alloc_source_id(&mut self) -> SourceId {
        self.next_source += 1;
        SourceId(self.next_source)
    }

    pub(crate) fn alloc_offer_id(&mut self) -> OfferId {
        self.next_offer += 1;
        OfferId(self.next_offer)
    }

    pub(crate) fn alloc_drag_id(&mut self) -> DragId {
        self.next_drag += 1;
        DragId(self.next_drag)
    }

    // --- clients ---

    pub fn create_client(&mut self) -> ClientId {
        self.registry.create_client()
    }

    /// Tear a disconnected client out of the graph: every resource it
    /// owns is destroyed through the role routing, its seat handles are
    /// unbound (clearing any drag focus pointing at them), and its queue
    /// is dropped.
    pub fn disconnect_client(&mut self, client: ClientId) {
        tracing::info!(?client, "disconnecting client");
        for resource in self.registry.resources_of_client(client) {
            self.destroy_resource(resource);
        }

        // client_unbound: drags lose their focus handle without a leave
        // (there is no device left to address)
        for drag in self.drags.values_mut() {
            if drag.focus_client == Some(client) {
                drag.focus = None;
                drag.focus_client = None;
            }
        }
        for seat in self.seats.values_mut() {
            seat.handles.remove(&client);
            if seat.keyboard.focused_client == Some(client) {
                seat.keyboard.focused_client = None;
                seat.keyboard.focused_surface = None;
            }
        }

        self.registry.kill_client(client);
    }

    // --- surfaces ---

    pub fn create_surface(&mut self, client: ClientId) -> Result<SurfaceId, WireError> {
        let id = self.alloc_surface_id();
        let resource = self.registry.create_resource(
            client,
            Interface::WlSurface,
            1,
            ResourceRole::Surface(id),
        )?;
        self.surfaces.insert(id, Surface::new(id, resource, client));
        Ok(id)
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    pub fn surface_mut(&mut self, id: SurfaceId) -> Option<&mut Surface> {
        self.surfaces.get_mut(&id)
    }

    /// Commit new surface contents and fan the change out to whatever is
    /// bound to the surface (cursor outputs today).
    pub fn commit_surface(
        &mut self,
        id: SurfaceId,
        buffer: Option<SurfaceBuffer>,
        sx: i32,
        sy: i32,
    ) {
        {
            let Some(surface) = self.surfaces.get_mut(&id) else {
                return;
            };
            surface.buffer = buffer;
            surface.sx = sx;
            surface.sy = sy;
        }
        let surface = &self.surfaces[&id];
        for output in self.outputs.values_mut() {
            output.commit_cursor_surface(surface);
        }
    }

    /// Destroy a surface, severing every edge that points at it: cursor
    /// bindings, drag icons and drag focus, and seat focus.
    pub fn destroy_surface(&mut self, id: SurfaceId) {
        let Some(surface) = self.surfaces.get(&id) else {
            return;
        };
        let resource = surface.resource;
        self.registry.destroy(resource);

        for output in self.outputs.values_mut() {
            output.unbind_cursor_surface(id);
        }

        let focused_drags: Vec<DragId> = self
            .drags
            .iter()
            .filter(|(_, d)| d.focus == Some(id))
            .map(|(did, _)| *did)
            .collect();
        for drag in focused_drags {
            self.drag_set_focus(drag, None, 0.0, 0.0);
        }
        for drag in self.drags.values_mut() {
            if drag.icon == Some(id) {
                drag.icon = None;
            }
        }

        for seat in self.seats.values_mut() {
            if seat.pointer.focused_surface == Some(id) {
                seat.pointer.focused_surface = None;
            }
            if seat.keyboard.focused_surface == Some(id) {
                seat.keyboard.focused_surface = None;
                seat.keyboard.focused_client = None;
            }
        }

        self.surfaces.remove(&id);
    }

    // --- resource lookup ---

    /// The offer behind a `wl_data_offer` resource, for request dispatch.
    pub fn offer_by_resource(&self, resource: ResourceId) -> Option<OfferId> {
        match self.registry.role_of(resource) {
            Some(ResourceRole::DataOffer(id)) => Some(id),
            _ => None,
        }
    }

    /// The source behind a `wl_data_source` resource.
    pub fn source_by_resource(&self, resource: ResourceId) -> Option<SourceId> {
        match self.registry.role_of(resource) {
            Some(ResourceRole::DataSource(id)) => Some(id),
            _ => None,
        }
    }

    // --- teardown routing ---

    /// Destroy a resource, routing component teardown by its role tag.
    /// Safe to call twice; the second call finds the entry already dead.
    pub fn destroy_resource(&mut self, resource: ResourceId) {
        let Some(role) = self.registry.destroy(resource) else {
            return;
        };
        match role {
            ResourceRole::Output(output) => {
                if let Some(output) = self.outputs.get_mut(&output) {
                    output.unlink_resource(resource);
                }
            }
            ResourceRole::Surface(surface) => self.destroy_surface(surface),
            ResourceRole::DataSource(source) => self.destroy_source(source),
            ResourceRole::DataOffer(offer) => self.destroy_offer(offer),
            ResourceRole::DataDevice(seat) => {
                if let Some(seat) = self.seats.get_mut(&seat) {
                    for handle in seat.handles.values_mut() {
                        if handle.data_device == Some(resource) {
                            handle.data_device = None;
                        }
                    }
                }
            }
            ResourceRole::None => {}
        }
    }
}
