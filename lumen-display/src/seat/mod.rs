//! Seats: one logical user's input focus.
//!
//! A [`Seat`] tracks pointer and keyboard focus, per-client handles (the
//! data-device resource a client bound for this seat), the current
//! selection with its wrap-safe serial, and the grab stacks that may
//! intercept device events. Input notifications route through the topmost
//! grab; the default behaviour is focus-follows-motion with forwarding
//! surfaced to the embedder.

pub mod grab;

use crate::server::{DisplayServer, Notification};
use crate::wire::events::DataDeviceEvent;
use crate::{ClientId, ResourceId, SeatId, SurfaceId};
use grab::{GrabStack, KeyboardGrab, PointerGrab};
use std::collections::HashMap;

/// Pressed or released, for pointer buttons and keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonState {
    Pressed,
    Released,
}

/// Scroll axis orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrientation {
    Vertical,
    Horizontal,
}

/// Per-client state on a seat.
#[derive(Debug)]
pub struct SeatHandle {
    pub client: ClientId,
    /// The client's data device for this seat, once bound.
    pub data_device: Option<ResourceId>,
}

impl SeatHandle {
    fn new(client: ClientId) -> SeatHandle {
        SeatHandle {
            client,
            data_device: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct PointerState {
    pub focused_surface: Option<SurfaceId>,
    /// Buttons currently held.
    pub button_count: u32,
    /// Serial of the press that started the current button sequence.
    pub grab_serial: u32,
    /// Button that started the current sequence.
    pub grab_button: u32,
}

#[derive(Debug, Default)]
pub struct KeyboardState {
    pub focused_surface: Option<SurfaceId>,
    pub focused_client: Option<ClientId>,
}

pub struct Seat {
    pub id: SeatId,
    pub name: String,
    pub(crate) handles: HashMap<ClientId, SeatHandle>,
    pub pointer: PointerState,
    pub keyboard: KeyboardState,
    pub(crate) selection_source: Option<crate::SourceId>,
    pub(crate) selection_serial: u32,
    pub(crate) pointer_grabs: GrabStack<PointerGrab>,
    pub(crate) keyboard_grabs: GrabStack<KeyboardGrab>,
}

impl Seat {
    fn new(id: SeatId, name: String) -> Seat {
        Seat {
            id,
            name,
            handles: HashMap::new(),
            pointer: PointerState::default(),
            keyboard: KeyboardState::default(),
            selection_source: None,
            selection_serial: 0,
            pointer_grabs: GrabStack::default(),
            keyboard_grabs: GrabStack::default(),
        }
    }

    pub fn handle(&self, client: ClientId) -> Option<&SeatHandle> {
        self.handles.get(&client)
    }

    pub fn selection_source(&self) -> Option<crate::SourceId> {
        self.selection_source
    }

    /// The active pointer grab; the implicit default when no override is
    /// installed.
    pub fn pointer_grab(&self) -> PointerGrab {
        self.pointer_grabs.top().unwrap_or(PointerGrab::Default)
    }

    pub fn keyboard_grab(&self) -> KeyboardGrab {
        self.keyboard_grabs.top().unwrap_or(KeyboardGrab::Default)
    }
}

impl DisplayServer {
    pub fn create_seat(&mut self, name: impl Into<String>) -> SeatId {
        let id = self.alloc_seat_id();
        let name = name.into();
        tracing::info!(%name, "creating seat");
        self.seats.insert(id, Seat::new(id, name));
        id
    }

    pub fn seat(&self, id: SeatId) -> Option<&Seat> {
        self.seats.get(&id)
    }

    pub(crate) fn seat_handle_mut(
        &mut self,
        seat: SeatId,
        client: ClientId,
    ) -> Option<&mut SeatHandle> {
        let s = self.seats.get_mut(&seat)?;
        Some(
            s.handles
                .entry(client)
                .or_insert_with(|| SeatHandle::new(client)),
        )
    }

    // --- pointer ---

    /// Route pointer focus through the current grab.
    pub fn pointer_notify_enter(
        &mut self,
        seat: SeatId,
        surface: Option<SurfaceId>,
        sx: f64,
        sy: f64,
    ) {
        let Some(grab) = self.seats.get(&seat).map(|s| s.pointer_grab()) else {
            return;
        };
        match grab {
            PointerGrab::Default => {
                let s = self.seats.get_mut(&seat).unwrap();
                if s.pointer.focused_surface == surface {
                    return;
                }
                s.pointer.focused_surface = surface;
                self.push_notification(Notification::PointerFocusChanged { seat, surface });
            }
            PointerGrab::Dnd(drag) => self.drag_pointer_enter(drag, surface, sx, sy),
        }
    }

    /// Drop pointer focus without routing through the grab.
    pub fn pointer_clear_focus(&mut self, seat: SeatId) {
        let Some(s) = self.seats.get_mut(&seat) else {
            return;
        };
        if s.pointer.focused_surface.is_none() {
            return;
        }
        s.pointer.focused_surface = None;
        self.push_notification(Notification::PointerFocusChanged {
            seat,
            surface: None,
        });
    }

    pub fn pointer_notify_motion(&mut self, seat: SeatId, time: u32, sx: f64, sy: f64) {
        let Some(grab) = self.seats.get(&seat).map(|s| s.pointer_grab()) else {
            return;
        };
        match grab {
            PointerGrab::Default => {}
            PointerGrab::Dnd(drag) => self.drag_pointer_motion(drag, time, sx, sy),
        }
    }

    /// Update button accounting, then route through the grab. Returns the
    /// serial assigned to this event.
    pub fn pointer_notify_button(
        &mut self,
        seat: SeatId,
        time: u32,
        button: u32,
        state: ButtonState,
    ) -> u32 {
        let serial = self.next_serial();
        {
            let Some(s) = self.seats.get_mut(&seat) else {
                return serial;
            };
            match state {
                ButtonState::Pressed => {
                    if s.pointer.button_count == 0 {
                        s.pointer.grab_serial = serial;
                        s.pointer.grab_button = button;
                    }
                    s.pointer.button_count += 1;
                }
                ButtonState::Released => {
                    s.pointer.button_count = s.pointer.button_count.saturating_sub(1);
                }
            }
        }
        let grab = self.seats[&seat].pointer_grab();
        match grab {
            PointerGrab::Default => {}
            PointerGrab::Dnd(drag) => self.drag_pointer_button(drag, time, button, state),
        }
        serial
    }

    pub fn pointer_notify_axis(
        &mut self,
        seat: SeatId,
        time: u32,
        orientation: AxisOrientation,
        value: f64,
    ) {
        let _ = (time, orientation, value);
        let Some(grab) = self.seats.get(&seat).map(|s| s.pointer_grab()) else {
            return;
        };
        match grab {
            // default forwarding is the embedder's concern; DnD drops axis
            // events entirely
            PointerGrab::Default | PointerGrab::Dnd(_) => {}
        }
    }

    /// Cancel the active pointer grab. The default grab has nothing to
    /// cancel.
    pub fn pointer_cancel_grab(&mut self, seat: SeatId) {
        let Some(grab) = self.seats.get(&seat).map(|s| s.pointer_grab()) else {
            return;
        };
        self.cancel_pointer_grab_inner(grab);
    }

    pub(crate) fn pointer_start_grab(&mut self, seat: SeatId, grab: PointerGrab) {
        let Some(s) = self.seats.get_mut(&seat) else {
            return;
        };
        let displaced = s.pointer_grabs.push(grab);
        if let Some(previous) = displaced {
            self.cancel_pointer_grab_inner(previous);
        }
    }

    pub(crate) fn pointer_end_grab(&mut self, seat: SeatId, grab: PointerGrab) {
        if let Some(s) = self.seats.get_mut(&seat) {
            s.pointer_grabs.end(grab);
        }
    }

    fn cancel_pointer_grab_inner(&mut self, grab: PointerGrab) {
        match grab {
            PointerGrab::Default => {}
            PointerGrab::Dnd(drag) => self.drag_end_with(drag, true),
        }
    }

    // --- keyboard ---

    /// Route keyboard focus through the current grab. During a DnD grab
    /// nothing has keyboard focus.
    pub fn keyboard_notify_enter(&mut self, seat: SeatId, surface: Option<SurfaceId>) {
        let Some(grab) = self.seats.get(&seat).map(|s| s.keyboard_grab()) else {
            return;
        };
        match grab {
            KeyboardGrab::Dnd(_) => {}
            KeyboardGrab::Default => {
                let client = surface
                    .and_then(|s| self.surfaces.get(&s))
                    .map(|s| s.client);
                let previous_client = {
                    let s = self.seats.get_mut(&seat).unwrap();
                    let previous = s.keyboard.focused_client;
                    s.keyboard.focused_surface = surface;
                    s.keyboard.focused_client = client;
                    if let Some(c) = client {
                        s.handles.entry(c).or_insert_with(|| SeatHandle::new(c));
                    }
                    previous
                };
                self.push_notification(Notification::KeyboardFocusChanged { seat, surface });
                if client != previous_client {
                    if let Some(c) = client {
                        self.send_selection_to_client(seat, c);
                    }
                }
            }
        }
    }

    pub fn keyboard_notify_key(&mut self, seat: SeatId, time: u32, key: u32, state: ButtonState) {
        let _ = (time, key, state);
        let Some(grab) = self.seats.get(&seat).map(|s| s.keyboard_grab()) else {
            return;
        };
        match grab {
            // no keyboard input during drags; default forwarding is the
            // embedder's concern
            KeyboardGrab::Default | KeyboardGrab::Dnd(_) => {}
        }
    }

    pub fn keyboard_notify_modifiers(
        &mut self,
        seat: SeatId,
        mods_depressed: u32,
        mods_latched: u32,
        mods_locked: u32,
        group: u32,
    ) {
        let _ = (mods_depressed, mods_latched, mods_locked, group);
        let Some(grab) = self.seats.get(&seat).map(|s| s.keyboard_grab()) else {
            return;
        };
        match grab {
            KeyboardGrab::Default => {}
            // TODO: feed modifier changes into the DnD action negotiation
            KeyboardGrab::Dnd(_) => {}
        }
    }

    /// Cancel the active keyboard grab.
    pub fn keyboard_cancel_grab(&mut self, seat: SeatId) {
        let Some(grab) = self.seats.get(&seat).map(|s| s.keyboard_grab()) else {
            return;
        };
        match grab {
            KeyboardGrab::Default => {}
            KeyboardGrab::Dnd(drag) => self.drag_end_with(drag, true),
        }
    }

    pub(crate) fn keyboard_start_grab(&mut self, seat: SeatId, grab: KeyboardGrab) {
        let Some(s) = self.seats.get_mut(&seat) else {
            return;
        };
        let displaced = s.keyboard_grabs.push(grab);
        if let Some(previous) = displaced {
            match previous {
                KeyboardGrab::Default => {}
                KeyboardGrab::Dnd(drag) => self.drag_end_with(drag, true),
            }
        }
    }

    pub(crate) fn keyboard_end_grab(&mut self, seat: SeatId, grab: KeyboardGrab) {
        if let Some(s) = self.seats.get_mut(&seat) {
            s.keyboard_grabs.end(grab);
        }
    }

    // --- selection ---

    /// Install a selection source.
    ///
    /// Stale serials lose under wrap-safe comparison and change nothing.
    /// Replacing a live selection cancels the previous source; the focused
    /// client (if any) sees the new selection immediately.
    pub fn seat_set_selection(
        &mut self,
        seat: SeatId,
        source: Option<crate::SourceId>,
        serial: u32,
    ) {
        {
            let Some(s) = self.seats.get(&seat) else {
                return;
            };
            if s.selection_source.is_some()
                && s.selection_serial.wrapping_sub(serial) < u32::MAX / 2
            {
                tracing::debug!(serial, "ignoring stale selection");
                return;
            }
        }

        let previous = {
            let s = self.seats.get_mut(&seat).unwrap();
            let previous = s.selection_source.take();
            s.selection_source = source;
            s.selection_serial = serial;
            previous
        };

        if let Some(prev) = previous {
            if let Some(src) = self.sources.get_mut(&prev) {
                src.selection_seat = None;
            }
            self.source_cancel(prev);
        }

        if let Some(sid) = source {
            if let Some(src) = self.sources.get_mut(&sid) {
                src.selection_seat = Some(seat);
            }
        }

        if let Some(client) = self.seats[&seat].keyboard.focused_client {
            self.send_selection_to_client(seat, client);
        }
        self.push_notification(Notification::SelectionChanged { seat });
    }

    /// Advertise the current selection (or its absence) to one client's
    /// data device.
    pub(crate) fn send_selection_to_client(&mut self, seat: SeatId, client: ClientId) {
        let Some(device) = self
            .seats
            .get(&seat)
            .and_then(|s| s.handles.get(&client))
            .and_then(|h| h.data_device)
        else {
            return;
        };
        let selection = self.seats[&seat].selection_source;
        match selection {
            Some(sid) if self.sources.contains_key(&sid) => {
                if let Some(offer) = self.data_source_send_offer(sid, device) {
                    let offer_resource = self.offers[&offer].resource;
                    self.registry.send(
                        device,
                        DataDeviceEvent::Selection {
                            id: Some(offer_resource),
                        },
                    );
                }
            }
            _ => {
                self.registry
                    .send(device, DataDeviceEvent::Selection { id: None });
            }
        }
    }
}
