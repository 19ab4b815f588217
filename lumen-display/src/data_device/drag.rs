//! The drag-and-drop lifecycle.
//!
//! A [`Drag`] lives for exactly one gesture: created by a validated
//! `start_drag`, destroyed when the last pointer button lifts, the source
//! dies, or a grab is cancelled. While alive it owns the seat's pointer
//! and keyboard grabs; the pointer grab drives focus and the drop, the
//! keyboard grab swallows everything.

use crate::seat::grab::{KeyboardGrab, PointerGrab};
use crate::seat::ButtonState;
use crate::server::{DisplayServer, Notification};
use crate::surface::ROLE_DATA_DEVICE_ICON;
use crate::wire::events::{
    error_code, since, DataDeviceEvent, DataOfferEvent, DataSourceEvent, DndAction,
};
use crate::{ClientId, DragId, ResourceId, SeatId, SourceId, SurfaceId};
use lumen_core::geometry::Fixed;

pub struct Drag {
    pub id: DragId,
    pub seat: SeatId,
    /// Client that started the drag; internal drags may only focus its
    /// surfaces.
    pub client: ClientId,
    /// Absent for internal (compositor-initiated) drags.
    pub source: Option<SourceId>,
    pub icon: Option<SurfaceId>,
    pub focus: Option<SurfaceId>,
    /// Client whose data device currently holds the DnD focus.
    pub(crate) focus_client: Option<ClientId>,
    /// Set once `drop` went out, so teardown does not also cancel.
    pub(crate) dropped: bool,
}

impl DisplayServer {
    pub fn drag(&self, id: DragId) -> Option<&Drag> {
        self.drags.get(&id)
    }

    /// The drag owning a seat's grabs, if one is in flight.
    pub fn active_drag(&self, seat: SeatId) -> Option<DragId> {
        self.drags
            .iter()
            .find(|(_, d)| d.seat == seat)
            .map(|(id, _)| *id)
    }

    /// Handle `wl_data_device.start_drag`.
    ///
    /// Accepted only while exactly one pointer button is held, the serial
    /// matches the press that started it, and the pointer sits on
    /// `origin`. Anything else is silently stale. An icon must take the
    /// drag-icon role; a conflicting role is a protocol error on the
    /// device.
    pub fn device_start_drag(
        &mut self,
        device: ResourceId,
        source: Option<SourceId>,
        origin: SurfaceId,
        icon: Option<SurfaceId>,
        serial: u32,
    ) {
        let Some(crate::wire::ResourceRole::DataDevice(seat_id)) = self.registry.role_of(device)
        else {
            return;
        };
        let Some(client) = self.registry.client_of(device) else {
            return;
        };

        let is_pointer_grab = {
            let Some(seat) = self.seats.get(&seat_id) else {
                return;
            };
            seat.pointer.button_count == 1
                && seat.pointer.grab_serial == serial
                && seat.pointer.focused_surface == Some(origin)
        };
        if !is_pointer_grab {
            tracing::debug!(serial, "ignoring stale start_drag");
            return;
        }

        if let Some(icon_id) = icon {
            let Some(surface) = self.surfaces.get_mut(&icon_id) else {
                return;
            };
            if surface.set_role(ROLE_DATA_DEVICE_ICON).is_err() {
                self.registry.post_error(
                    device,
                    error_code::DATA_DEVICE_ROLE,
                    "surface already has a role",
                );
                return;
            }
        }

        let id = self.alloc_drag_id();
        self.drags.insert(
            id,
            Drag {
                id,
                seat: seat_id,
                client,
                source,
                icon,
                focus: None,
                focus_client: None,
                dropped: false,
            },
        );

        // the default grab must not deliver the release that finishes the
        // gesture
        self.pointer_clear_focus(seat_id);

        self.keyboard_start_grab(seat_id, KeyboardGrab::Dnd(id));
        self.pointer_start_grab(seat_id, PointerGrab::Dnd(id));

        if let Some(source_id) = source {
            if let Some(src) = self.sources.get_mut(&source_id) {
                src.seat = Some(seat_id);
            }
        }

        self.push_notification(Notification::DragStarted { seat: seat_id });
    }

    /// Point the drag at a new destination surface.
    pub(crate) fn drag_set_focus(
        &mut self,
        drag_id: DragId,
        surface: Option<SurfaceId>,
        sx: f64,
        sy: f64,
    ) {
        let (seat_id, origin_client, source, previous_focus, previous_client) = {
            let Some(drag) = self.drags.get(&drag_id) else {
                return;
            };
            (
                drag.seat,
                drag.client,
                drag.source,
                drag.focus,
                drag.focus_client,
            )
        };
        if previous_focus == surface {
            return;
        }

        // tear down the old focus link
        if previous_focus.is_some() {
            if let Some(device) = previous_client.and_then(|c| {
                self.seats
                    .get(&seat_id)
                    .and_then(|s| s.handles.get(&c))
                    .and_then(|h| h.data_device)
            }) {
                self.registry.send(device, DataDeviceEvent::Leave);
            }
            let drag = self.drags.get_mut(&drag_id).unwrap();
            drag.focus = None;
            drag.focus_client = None;
        }

        let Some(surface_id) = surface else {
            return;
        };
        let Some((surface_client, surface_resource)) = self
            .surfaces
            .get(&surface_id)
            .map(|s| (s.client, s.resource))
        else {
            return;
        };

        // internal drags stay within the client that started them
        if source.is_none() && surface_client != origin_client {
            return;
        }

        // unlink any stale offer still hanging off the source
        if let Some(source_id) = source {
            let stale = self.sources.get(&source_id).and_then(|s| s.offer);
            if let Some(offer_id) = stale {
                if let Some(offer) = self.offers.get_mut(&offer_id) {
                    offer.source = None;
                }
                self.sources.get_mut(&source_id).unwrap().offer = None;
            }
        }

        let Some(device) = self
            .seats
            .get(&seat_id)
            .and_then(|s| s.handles.get(&surface_client))
            .and_then(|h| h.data_device)
        else {
            return;
        };

        let mut offer_resource = None;
        if let Some(source_id) = source {
            self.sources.get_mut(&source_id).unwrap().accepted = false;
            let Some(offer_id) = self.data_source_send_offer(source_id, device) else {
                return;
            };
            self.offer_update_action(offer_id);
            let source_actions = self.sources[&source_id].dnd_actions;
            let resource = self.offers[&offer_id].resource;
            self.registry
                .send(resource, DataOfferEvent::SourceActions { source_actions });
            offer_resource = Some(resource);
        }

        let serial = self.next_serial();
        self.registry.send(
            device,
            DataDeviceEvent::Enter {
                serial,
                surface: surface_resource,
                x: Fixed::from_f64(sx),
                y: Fixed::from_f64(sy),
                id: offer_resource,
            },
        );

        let drag = self.drags.get_mut(&drag_id).unwrap();
        drag.focus = Some(surface_id);
        drag.focus_client = Some(surface_client);
    }

    // --- pointer grab ---

    pub(crate) fn drag_pointer_enter(
        &mut self,
        drag_id: DragId,
        surface: Option<SurfaceId>,
        sx: f64,
        sy: f64,
    ) {
        self.drag_set_focus(drag_id, surface, sx, sy);
    }

    pub(crate) fn drag_pointer_motion(&mut self, drag_id: DragId, time: u32, sx: f64, sy: f64) {
        let Some(drag) = self.drags.get(&drag_id) else {
            return;
        };
        if drag.focus.is_none() {
            return;
        }
        let Some(device) = drag.focus_client.and_then(|c| {
            self.seats
                .get(&drag.seat)
                .and_then(|s| s.handles.get(&c))
                .and_then(|h| h.data_device)
        }) else {
            return;
        };
        self.registry.send(
            device,
            DataDeviceEvent::Motion {
                time,
                x: Fixed::from_f64(sx),
                y: Fixed::from_f64(sy),
            },
        );
    }

    pub(crate) fn drag_pointer_button(
        &mut self,
        drag_id: DragId,
        _time: u32,
        button: u32,
        state: ButtonState,
    ) {
        let (seat_id, source, focus_client) = {
            let Some(drag) = self.drags.get(&drag_id) else {
                return;
            };
            (drag.seat, drag.source, drag.focus_client)
        };
        let (grab_button, button_count) = {
            let Some(seat) = self.seats.get(&seat_id) else {
                return;
            };
            (seat.pointer.grab_button, seat.pointer.button_count)
        };

        if let Some(source_id) = source {
            if grab_button == button && state == ButtonState::Released {
                let device = focus_client.and_then(|c| {
                    self.seats
                        .get(&seat_id)
                        .and_then(|s| s.handles.get(&c))
                        .and_then(|h| h.data_device)
                });
                let (current_action, accepted, source_resource, offer_id) = {
                    let Some(src) = self.sources.get(&source_id) else {
                        return;
                    };
                    (src.current_dnd_action, src.accepted, src.resource, src.offer)
                };

                if device.is_some() && !current_action.is_empty() && accepted {
                    self.registry.send(device.unwrap(), DataDeviceEvent::Drop);
                    if let Some(resource) = source_resource {
                        self.registry
                            .send(resource, DataSourceEvent::DndDropPerformed);
                    }
                    if let Some(offer_id) = offer_id {
                        if let Some(offer) = self.offers.get_mut(&offer_id) {
                            offer.in_ask = current_action == DndAction::ASK;
                        }
                    }
                    self.drags.get_mut(&drag_id).unwrap().dropped = true;
                }
            }
        }

        if button_count == 0 && state == ButtonState::Released {
            self.drag_end_with(drag_id, true);
        }
    }

    /// End a drag: drop the focus link (emitting `leave`), pop both
    /// grabs, and (unless the drop already went out or the source itself
    /// died) let the source know it was cancelled.
    pub(crate) fn drag_end_with(&mut self, drag_id: DragId, emit_cancel: bool) {
        let (seat_id, source, dropped) = {
            let Some(drag) = self.drags.get(&drag_id) else {
                return;
            };
            (drag.seat, drag.source, drag.dropped)
        };

        self.drag_set_focus(drag_id, None, 0.0, 0.0);
        self.pointer_end_grab(seat_id, PointerGrab::Dnd(drag_id));
        self.keyboard_end_grab(seat_id, KeyboardGrab::Dnd(drag_id));

        if emit_cancel && !dropped {
            if let Some(source_id) = source {
                if self.sources.contains_key(&source_id) {
                    self.source_cancel(source_id);
                }
            }
        }

        self.drags.remove(&drag_id);
        self.push_notification(Notification::DragEnded { seat: seat_id });
    }
}
