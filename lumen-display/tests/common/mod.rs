//! Shared fixture for the drag-and-drop scenarios: two clients on one
//! seat, each with a surface and a bound data device; client A holds the
//! drag source.

use lumen_display::seat::ButtonState;
use lumen_display::wire::events::AnyEvent;
use lumen_display::{ClientId, DisplayServer, ResourceId, SeatId, SourceId, SurfaceId};

pub const BTN_LEFT: u32 = 0x110;

pub struct DndFixture {
    pub server: DisplayServer,
    pub seat: SeatId,
    pub client_a: ClientId,
    pub surface_a: SurfaceId,
    pub device_a: ResourceId,
    pub client_b: ClientId,
    pub surface_b: SurfaceId,
    pub device_b: ResourceId,
    pub source: SourceId,
}

/// Build the two-client setup with the manager bound at `version_a` for
/// the source side and `version_b` for the destination side.
pub fn dnd_fixture(version_a: u32, version_b: u32) -> DndFixture {
    let mut server = DisplayServer::new();
    let seat = server.create_seat("seat0");

    let client_a = server.create_client();
    let surface_a = server.create_surface(client_a).unwrap();
    let manager_a = server.bind_data_device_manager(client_a, version_a).unwrap();
    let device_a = server.manager_get_data_device(manager_a, seat).unwrap();
    let source = server.manager_create_data_source(manager_a).unwrap();
    server.source_offer_mime(source, "text/plain");

    let client_b = server.create_client();
    let surface_b = server.create_surface(client_b).unwrap();
    let manager_b = server.bind_data_device_manager(client_b, version_b).unwrap();
    let device_b = server.manager_get_data_device(manager_b, seat).unwrap();

    DndFixture {
        server,
        seat,
        client_a,
        surface_a,
        device_a,
        client_b,
        surface_b,
        device_b,
        source,
    }
}

impl DndFixture {
    /// Press on A's surface and start the drag with the matching serial.
    pub fn begin_drag(&mut self) {
        self.server
            .pointer_notify_enter(self.seat, Some(self.surface_a), 5.0, 5.0);
        self.server
            .pointer_notify_button(self.seat, 100, BTN_LEFT, ButtonState::Pressed);
        let serial = self.server.seat(self.seat).unwrap().pointer.grab_serial;
        self.server.device_start_drag(
            self.device_a,
            Some(self.source),
            self.surface_a,
            None,
            serial,
        );
    }

    pub fn release(&mut self) {
        self.server
            .pointer_notify_button(self.seat, 200, BTN_LEFT, ButtonState::Released);
    }

    pub fn events_for(&mut self, client: ClientId) -> Vec<(ResourceId, AnyEvent)> {
        self.server
            .registry
            .drain_events(client)
            .into_iter()
            .map(|e| (e.resource, e.event))
            .collect()
    }
}
