//! Selection and drag-and-drop: the data-device protocol family.
//!
//! The manager global hands out data sources and per-seat data devices;
//! the device carries `set_selection` and `start_drag`. An offer is built
//! on the destination device every time a source needs advertising,
//! during a drag's `enter` or when the selection reaches a focused
//! client, and the source and offer stay cross-linked until either side
//! dies or the transfer resolves.

pub mod drag;
pub mod offer;
pub mod source;

pub use drag::Drag;
pub use offer::{choose_action, DataOffer};
pub use source::{DataSource, SetActionsError, SourceHandler};

use crate::server::DisplayServer;
use crate::wire::events::{DataDeviceEvent, DataOfferEvent};
use crate::wire::{Interface, ResourceRole};
use crate::{ClientId, OfferId, ResourceId, SeatId, SourceId};

/// Version the data-device-manager global is advertised at.
pub const DATA_DEVICE_MANAGER_VERSION: u32 = 3;

impl DisplayServer {
    /// Bind a client to the `wl_data_device_manager` global.
    pub fn bind_data_device_manager(
        &mut self,
        client: ClientId,
        version: u32,
    ) -> Option<ResourceId> {
        self.registry
            .create_resource(
                client,
                Interface::WlDataDeviceManager,
                version.min(DATA_DEVICE_MANAGER_VERSION),
                ResourceRole::None,
            )
            .ok()
    }

    /// Handle `wl_data_device_manager.create_data_source`. The source
    /// inherits the manager's version.
    pub fn manager_create_data_source(&mut self, manager: ResourceId) -> Option<SourceId> {
        let client = self.registry.client_of(manager)?;
        let version = self.registry.version(manager)?;
        self.create_client_source(client, version)
    }

    /// Handle `wl_data_device_manager.get_data_device`.
    ///
    /// A seat keeps one data device per client; binding again replaces
    /// the old resource.
    pub fn manager_get_data_device(
        &mut self,
        manager: ResourceId,
        seat: SeatId,
    ) -> Option<ResourceId> {
        let client = self.registry.client_of(manager)?;
        let version = self.registry.version(manager)?;
        if !self.seats.contains_key(&seat) {
            return None;
        }

        let previous = self
            .seat_handle_mut(seat, client)
            .and_then(|h| h.data_device.take());
        if let Some(previous) = previous {
            self.registry.destroy(previous);
        }

        let device = self
            .registry
            .create_resource(
                client,
                Interface::WlDataDevice,
                version,
                ResourceRole::DataDevice(seat),
            )
            .ok()?;
        self.seat_handle_mut(seat, client)?.data_device = Some(device);
        Some(device)
    }

    /// Handle `wl_data_device.set_selection`. A null source is ignored at
    /// the wire layer; clearing happens through source destruction.
    pub fn device_set_selection(
        &mut self,
        device: ResourceId,
        source: Option<SourceId>,
        serial: u32,
    ) {
        let Some(source) = source else {
            return;
        };
        let Some(ResourceRole::DataDevice(seat)) = self.registry.role_of(device) else {
            return;
        };
        self.seat_set_selection(seat, Some(source), serial);
    }

    /// Handle `wl_data_device.release`.
    pub fn device_release(&mut self, device: ResourceId) {
        self.destroy_resource(device);
    }

    /// Build a fresh offer for `source` on a destination data device and
    /// advertise the source's mime types on it. Links the pair and resets
    /// the source's accepted flag.
    pub(crate) fn data_source_send_offer(
        &mut self,
        source_id: SourceId,
        device: ResourceId,
    ) -> Option<OfferId> {
        let client = self.registry.client_of(device)?;
        let version = self.registry.version(device)?;
        if !self.registry.alive(device) {
            return None;
        }

        let id = self.alloc_offer_id();
        let resource = self
            .registry
            .create_resource(
                client,
                Interface::WlDataOffer,
                version,
                ResourceRole::DataOffer(id),
            )
            .ok()?;
        self.offers
            .insert(id, offer::DataOffer::new(id, resource, source_id));

        // introduce the offer before anything references it
        self.registry
            .send(device, DataDeviceEvent::DataOffer { id: resource });
        let mime_types = self.sources.get(&source_id)?.mime_types.clone();
        for mime_type in mime_types {
            self.registry
                .send(resource, DataOfferEvent::Offer { mime_type });
        }

        let source = self.sources.get_mut(&source_id)?;
        source.offer = Some(id);
        source.accepted = false;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::events::{AnyEvent, DndAction};
    use crate::DisplayServer;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::os::fd::OwnedFd;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingHandler {
        cancelled: Rc<RefCell<u32>>,
    }

    impl SourceHandler for RecordingHandler {
        fn accept(&mut self, _serial: u32, _mime_type: Option<&str>) {}
        fn send(&mut self, _mime_type: &str, _fd: OwnedFd) {}
        fn cancel(&mut self) {
            *self.cancelled.borrow_mut() += 1;
        }
    }

    struct Fixture {
        server: DisplayServer,
        seat: crate::SeatId,
        client: crate::ClientId,
        device: ResourceId,
    }

    /// A client with keyboard focus and a bound data device.
    fn focused_client() -> Fixture {
        let mut server = DisplayServer::new();
        let seat = server.create_seat("seat0");
        let client = server.create_client();
        let surface = server.create_surface(client).unwrap();
        let manager = server.bind_data_device_manager(client, 3).unwrap();
        let device = server.manager_get_data_device(manager, seat).unwrap();
        server.keyboard_notify_enter(seat, Some(surface));
        server.registry.drain_events(client);
        server.drain_notifications();
        Fixture {
            server,
            seat,
            client,
            device,
        }
    }

    fn compositor_source(
        server: &mut DisplayServer,
        mimes: &[&str],
    ) -> (crate::SourceId, Rc<RefCell<u32>>) {
        let cancelled = Rc::new(RefCell::new(0));
        let source = server.create_compositor_source(Box::new(RecordingHandler {
            cancelled: cancelled.clone(),
        }));
        for mime in mimes {
            server.source_offer_mime(source, *mime);
        }
        (source, cancelled)
    }

    fn selection_events(server: &mut DisplayServer, client: crate::ClientId) -> Vec<AnyEvent> {
        server
            .registry
            .drain_events(client)
            .into_iter()
            .map(|e| e.event)
            .collect()
    }

    #[test]
    fn stale_selection_serial_is_ignored() {
        let mut f = focused_client();
        let (s1, s1_cancelled) = compositor_source(&mut f.server, &["text/plain"]);
        let (s2, _) = compositor_source(&mut f.server, &["text/html"]);

        f.server.seat_set_selection(f.seat, Some(s1), 5);
        assert_eq!(f.server.seat(f.seat).unwrap().selection_source(), Some(s1));
        f.server.drain_notifications();
        f.server.registry.drain_events(f.client);

        // older serial under wrap-safe compare: nothing happens
        f.server.seat_set_selection(f.seat, Some(s2), 3);
        assert_eq!(f.server.seat(f.seat).unwrap().selection_source(), Some(s1));
        assert_eq!(*s1_cancelled.borrow(), 0);
        assert!(f.server.drain_notifications().is_empty());
        assert!(selection_events(&mut f.server, f.client).is_empty());
    }

    #[test]
    fn newer_selection_supersedes_and_cancels() {
        let mut f = focused_client();
        let (s1, s1_cancelled) = compositor_source(&mut f.server, &["text/plain"]);
        let (s3, _) = compositor_source(&mut f.server, &["image/png", "text/uri-list"]);

        f.server.seat_set_selection(f.seat, Some(s1), 5);
        f.server.registry.drain_events(f.client);

        f.server.seat_set_selection(f.seat, Some(s3), 10);
        assert_eq!(f.server.seat(f.seat).unwrap().selection_source(), Some(s3));
        assert_eq!(*s1_cancelled.borrow(), 1);

        // the focused client sees a data_offer advertising s3's mimes,
        // then the selection event naming it
        let events = selection_events(&mut f.server, f.client);
        match &events[0] {
            AnyEvent::DataDevice(DataDeviceEvent::DataOffer { .. }) => {}
            other => panic!("expected data_offer, got {other:?}"),
        }
        let mimes: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                AnyEvent::DataOffer(DataOfferEvent::Offer { mime_type }) => {
                    Some(mime_type.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(mimes, vec!["image/png", "text/uri-list"]);
        assert!(matches!(
            events.last(),
            Some(AnyEvent::DataDevice(DataDeviceEvent::Selection { id: Some(_) }))
        ));
    }

    #[test]
    fn selection_source_death_readvertises_nothing() {
        let mut f = focused_client();
        let (s1, _) = compositor_source(&mut f.server, &["text/plain"]);
        f.server.seat_set_selection(f.seat, Some(s1), 5);
        f.server.registry.drain_events(f.client);

        f.server.destroy_compositor_source(s1);
        assert_eq!(f.server.seat(f.seat).unwrap().selection_source(), None);
        let events = selection_events(&mut f.server, f.client);
        assert!(matches!(
            events.as_slice(),
            [AnyEvent::DataDevice(DataDeviceEvent::Selection { id: None })]
        ));

        // with the slot empty, even an old serial may install a source
        let (s2, _) = compositor_source(&mut f.server, &["text/html"]);
        f.server.seat_set_selection(f.seat, Some(s2), 1);
        assert_eq!(f.server.seat(f.seat).unwrap().selection_source(), Some(s2));
    }

    #[test]
    fn rebinding_the_data_device_replaces_the_old_resource() {
        let mut f = focused_client();
        let manager = f.server.bind_data_device_manager(f.client, 3).unwrap();
        let new_device = f.server.manager_get_data_device(manager, f.seat).unwrap();
        assert_ne!(new_device, f.device);
        assert!(!f.server.registry.alive(f.device));
        assert_eq!(
            f.server
                .seat(f.seat)
                .unwrap()
                .handle(f.client)
                .unwrap()
                .data_device,
            Some(new_device)
        );
    }

    #[test]
    fn selection_offer_symmetry() {
        let mut f = focused_client();
        let (s1, _) = compositor_source(&mut f.server, &["text/plain"]);
        f.server.seat_set_selection(f.seat, Some(s1), 5);

        let offer_id = f.server.data_source(s1).unwrap().offer.unwrap();
        assert_eq!(f.server.data_offer(offer_id).unwrap().source(), Some(s1));
    }

    #[test]
    fn compositor_pin_reruns_action_rule() {
        let mut f = focused_client();
        let (s1, _) = compositor_source(&mut f.server, &["text/plain"]);
        f.server
            .data_source_mut(s1)
            .unwrap()
            .try_set_actions((DndAction::COPY | DndAction::MOVE).bits())
            .unwrap();
        f.server.seat_set_selection(f.seat, Some(s1), 5);
        let offer_id = f.server.data_source(s1).unwrap().offer.unwrap();
        f.server.offer_set_actions(
            offer_id,
            (DndAction::COPY | DndAction::MOVE).bits(),
            DndAction::COPY.bits(),
        );
        assert_eq!(
            f.server.data_source(s1).unwrap().current_dnd_action(),
            DndAction::COPY
        );

        // outside a drag the pin does nothing
        f.server
            .source_set_compositor_action(s1, DndAction::MOVE);
        assert_eq!(
            f.server.data_source(s1).unwrap().current_dnd_action(),
            DndAction::COPY
        );
    }
}
