//! Data sources: what a client (or the compositor) offers to paste or
//! drop.
//!
//! A source moves from fresh, through advertised (once an offer has been
//! built for it), into a DnD binding when a drag adopts it, and ends
//! finished, cancelled or destroyed. Its behaviour hooks `{accept, send,
//! cancel}` are either the client-backed default, forwarding to the wire
//! as `target`, `send` and `cancelled`, or a [`SourceHandler`] supplied
//! for compositor-synthesised sources (clipboard managers and the like).

use crate::server::DisplayServer;
use crate::wire::events::{error_code, DataSourceEvent, DndAction};
use crate::wire::{Interface, ResourceRole};
use crate::{ClientId, OfferId, ResourceId, SeatId, SourceId};
use std::os::fd::OwnedFd;
use thiserror::Error;

/// Behaviour hooks for a source not backed by a client resource.
pub trait SourceHandler {
    /// A destination accepted (or rejected, with `None`) a mime type.
    fn accept(&mut self, serial: u32, mime_type: Option<&str>);

    /// Write the data for `mime_type` into `fd`. Dropping the fd closes
    /// it.
    fn send(&mut self, mime_type: &str, fd: OwnedFd);

    /// The source was replaced or its transfer abandoned.
    fn cancel(&mut self);
}

/// Who drives the source's hooks.
pub(crate) enum SourceSite {
    /// A client resource; hooks forward to the wire.
    Client,
    /// A compositor-synthesised source.
    Handler(Box<dyn SourceHandler>),
}

/// Rejected `set_actions` calls, each a protocol error on the offending
/// resource.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SetActionsError {
    #[error("cannot set actions more than once")]
    AlreadySet,
    #[error("invalid action mask {0:#x}")]
    InvalidMask(u32),
    #[error("invalid action change after wl_data_device.start_drag")]
    BoundToDrag,
}

pub struct DataSource {
    pub id: SourceId,
    /// Absent for compositor-synthesised sources.
    pub(crate) resource: Option<ResourceId>,
    pub(crate) mime_types: Vec<String>,
    pub(crate) dnd_actions: DndAction,
    pub(crate) actions_set: bool,
    /// The offer currently advertising this source, if any. The offer's
    /// `source` field points back here.
    pub(crate) offer: Option<OfferId>,
    pub(crate) accepted: bool,
    pub(crate) current_dnd_action: DndAction,
    pub(crate) compositor_action: DndAction,
    /// Set when a drag adopts the source; locks out `set_actions`.
    pub(crate) seat: Option<SeatId>,
    /// Set while the source is a seat's selection.
    pub(crate) selection_seat: Option<SeatId>,
    pub(crate) site: SourceSite,
}

impl DataSource {
    fn new(id: SourceId, resource: Option<ResourceId>, site: SourceSite) -> DataSource {
        DataSource {
            id,
            resource,
            mime_types: Vec::new(),
            dnd_actions: DndAction::empty(),
            actions_set: false,
            offer: None,
            accepted: false,
            current_dnd_action: DndAction::empty(),
            compositor_action: DndAction::empty(),
            seat: None,
            selection_seat: None,
            site,
        }
    }

    pub fn mime_types(&self) -> &[String] {
        &self.mime_types
    }

    pub fn dnd_actions(&self) -> DndAction {
        self.dnd_actions
    }

    pub fn current_dnd_action(&self) -> DndAction {
        self.current_dnd_action
    }

    /// The offer currently advertising this source.
    pub fn offer(&self) -> Option<OfferId> {
        self.offer
    }

    /// The backing client resource; absent for compositor-synthesised
    /// sources.
    pub fn resource(&self) -> Option<ResourceId> {
        self.resource
    }

    pub fn accepted(&self) -> bool {
        self.accepted
    }

    /// Whether the source has been adopted by a drag.
    pub fn in_drag(&self) -> bool {
        self.seat.is_some()
    }

    /// Append a mime type. Meaningful before the first offer goes out, but
    /// never rejected.
    pub fn offer_mime(&mut self, mime_type: impl Into<String>) {
        self.mime_types.push(mime_type.into());
    }

    /// Declare the action mask. Valid exactly once, with only known bits,
    /// and never after the source entered a DnD.
    pub(crate) fn try_set_actions(&mut self, raw_mask: u32) -> Result<(), SetActionsError> {
        if self.actions_set {
            return Err(SetActionsError::AlreadySet);
        }
        if raw_mask & !DndAction::all().bits() != 0 {
            return Err(SetActionsError::InvalidMask(raw_mask));
        }
        if self.seat.is_some() {
            return Err(SetActionsError::BoundToDrag);
        }
        self.dnd_actions = DndAction::from_bits_truncate(raw_mask);
        self.actions_set = true;
        Ok(())
    }
}

impl DisplayServer {
    /// Create a compositor-synthesised source driven by `handler`.
    pub fn create_compositor_source(&mut self, handler: Box<dyn SourceHandler>) -> SourceId {
        let id = self.alloc_source_id();
        self.sources
            .insert(id, DataSource::new(id, None, SourceSite::Handler(handler)));
        id
    }

    pub(crate) fn create_client_source(
        &mut self,
        client: ClientId,
        version: u32,
    ) -> Option<SourceId> {
        let id = self.alloc_source_id();
        let resource = self
            .registry
            .create_resource(
                client,
                Interface::WlDataSource,
                version,
                ResourceRole::DataSource(id),
            )
            .ok()?;
        self.sources
            .insert(id, DataSource::new(id, Some(resource), SourceSite::Client));
        Some(id)
    }

    pub fn data_source(&self, id: SourceId) -> Option<&DataSource> {
        self.sources.get(&id)
    }

    pub fn data_source_mut(&mut self, id: SourceId) -> Option<&mut DataSource> {
        self.sources.get_mut(&id)
    }

    /// Handle `wl_data_source.offer`.
    pub fn source_offer_mime(&mut self, id: SourceId, mime_type: impl Into<String>) {
        if let Some(source) = self.sources.get_mut(&id) {
            source.offer_mime(mime_type);
        }
    }

    /// Handle `wl_data_source.set_actions`; failures raise
    /// `invalid_action_mask` on the source resource and keep the previous
    /// mask.
    pub fn source_set_actions(&mut self, id: SourceId, raw_mask: u32) {
        let Some(source) = self.sources.get_mut(&id) else {
            return;
        };
        match source.try_set_actions(raw_mask) {
            Ok(()) => {}
            Err(err) => {
                if let Some(resource) = source.resource {
                    self.registry.post_error(
                        resource,
                        error_code::DATA_SOURCE_INVALID_ACTION_MASK,
                        err.to_string(),
                    );
                }
            }
        }
    }

    /// Pin the compositor's preferred action and re-run the action rule on
    /// a live offer.
    pub fn source_set_compositor_action(&mut self, id: SourceId, action: DndAction) {
        let offer = {
            let Some(source) = self.sources.get_mut(&id) else {
                return;
            };
            source.compositor_action = action;
            source.offer
        };
        if let Some(offer) = offer {
            self.offer_update_action(offer);
        }
    }

    // --- behaviour hooks ---

    pub(crate) fn source_accept(&mut self, id: SourceId, serial: u32, mime_type: Option<String>) {
        let Some(source) = self.sources.get_mut(&id) else {
            return;
        };
        match &mut source.site {
            SourceSite::Client => {
                if let Some(resource) = source.resource {
                    self.registry
                        .send(resource, DataSourceEvent::Target { mime_type });
                }
            }
            SourceSite::Handler(handler) => handler.accept(serial, mime_type.as_deref()),
        }
    }

    pub(crate) fn source_send(&mut self, id: SourceId, mime_type: String, fd: OwnedFd) {
        let Some(source) = self.sources.get_mut(&id) else {
            return;
        };
        match &mut source.site {
            SourceSite::Client => {
                if let Some(resource) = source.resource {
                    self.registry
                        .send(resource, DataSourceEvent::Send { mime_type, fd });
                }
            }
            SourceSite::Handler(handler) => handler.send(&mime_type, fd),
        }
    }

    pub(crate) fn source_cancel(&mut self, id: SourceId) {
        let Some(source) = self.sources.get_mut(&id) else {
            return;
        };
        match &mut source.site {
            SourceSite::Client => {
                if let Some(resource) = source.resource {
                    self.registry.send(resource, DataSourceEvent::Cancelled);
                }
            }
            SourceSite::Handler(handler) => handler.cancel(),
        }
    }

    /// Destroy a compositor-synthesised source.
    pub fn destroy_compositor_source(&mut self, id: SourceId) {
        self.destroy_source(id);
    }

    /// Sever every edge pointing at a dying source, then drop it. Order:
    /// drags first (they stop consulting the source), then offers, then
    /// the selection slot.
    pub(crate) fn destroy_source(&mut self, id: SourceId) {
        if !self.sources.contains_key(&id) {
            return;
        }

        let drags: Vec<crate::DragId> = self
            .drags
            .iter()
            .filter(|(_, d)| d.source == Some(id))
            .map(|(did, _)| *did)
            .collect();
        for drag in drags {
            self.drag_end_with(drag, false);
        }

        for offer in self.offers.values_mut() {
            if offer.source == Some(id) {
                offer.source = None;
            }
        }

        let selection_seat = self.sources.get(&id).and_then(|s| s.selection_seat);
        if let Some(seat) = selection_seat {
            if let Some(s) = self.seats.get_mut(&seat) {
                s.selection_source = None;
            }
            if let Some(client) = self.seats.get(&seat).and_then(|s| s.keyboard.focused_client) {
                self.send_selection_to_client(seat, client);
            }
            self.push_notification(crate::server::Notification::SelectionChanged { seat });
        }

        self.sources.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn actions_can_only_be_set_once() {
        let mut source = DataSource::new(SourceId(1), None, SourceSite::Client);
        source
            .try_set_actions((DndAction::COPY | DndAction::MOVE).bits())
            .unwrap();
        assert_eq!(
            source.try_set_actions(DndAction::COPY.bits()),
            Err(SetActionsError::AlreadySet)
        );
        // the first mask is retained
        assert_eq!(source.dnd_actions(), DndAction::COPY | DndAction::MOVE);
    }

    #[test]
    fn foreign_bits_are_rejected() {
        let mut source = DataSource::new(SourceId(1), None, SourceSite::Client);
        assert_eq!(
            source.try_set_actions(0x10),
            Err(SetActionsError::InvalidMask(0x10))
        );
        assert!(!source.actions_set);
    }

    #[test]
    fn actions_lock_out_after_drag_binding() {
        let mut source = DataSource::new(SourceId(1), None, SourceSite::Client);
        source.seat = Some(SeatId(1));
        assert_eq!(
            source.try_set_actions(DndAction::COPY.bits()),
            Err(SetActionsError::BoundToDrag)
        );
    }

    #[test]
    fn set_actions_failure_posts_protocol_error() {
        let mut server = DisplayServer::new();
        let client = server.create_client();
        let manager = server.bind_data_device_manager(client, 3).unwrap();
        let source = server.manager_create_data_source(manager).unwrap();

        server.source_set_actions(source, DndAction::COPY.bits());
        assert!(server.registry.client_error(client).is_none());

        server.source_set_actions(source, DndAction::MOVE.bits());
        let error = server.registry.client_error(client).unwrap();
        assert_eq!(error.code, error_code::DATA_SOURCE_INVALID_ACTION_MASK);
        // the first mask survives
        assert_eq!(
            server.data_source(source).unwrap().dnd_actions(),
            DndAction::COPY
        );
    }
}
