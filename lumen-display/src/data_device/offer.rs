//! Data offers: what a recipient client sees of a source.
//!
//! An offer and its source point at each other; either side's death
//! severs both edges before anything is freed. The action negotiation
//! (source mask, offer mask, destination preference, compositor pin) is
//! the pure [`choose_action`] rule, re-run on every input change and
//! mirrored to both resources when the outcome moves.

use crate::server::DisplayServer;
use crate::wire::events::{
    error_code, since, DataOfferEvent, DataSourceEvent, DndAction,
};
use crate::{OfferId, ResourceId, SourceId};
use std::os::fd::OwnedFd;

pub struct DataOffer {
    pub id: OfferId,
    pub(crate) resource: ResourceId,
    /// Back-pointer to the source; `None` once the source is gone.
    pub(crate) source: Option<SourceId>,
    pub(crate) dnd_actions: DndAction,
    pub(crate) preferred_dnd_action: DndAction,
    /// Set when a drop resolved to the `ask` action; suppresses `action`
    /// events until the destination decides.
    pub(crate) in_ask: bool,
}

impl DataOffer {
    pub(crate) fn new(id: OfferId, resource: ResourceId, source: SourceId) -> DataOffer {
        DataOffer {
            id,
            resource,
            source: Some(source),
            dnd_actions: DndAction::empty(),
            preferred_dnd_action: DndAction::empty(),
            in_ask: false,
        }
    }

    pub fn source(&self) -> Option<SourceId> {
        self.source
    }

    pub fn resource(&self) -> ResourceId {
        self.resource
    }
}

/// The action choice rule. Pure: one bit of `source_actions ∧
/// offer_actions` (or the compositor's pin from within it), or none when
/// the intersection is empty.
pub fn choose_action(
    source_actions: DndAction,
    offer_actions: DndAction,
    preferred: DndAction,
    compositor_action: DndAction,
    source_in_drag: bool,
) -> DndAction {
    let available = source_actions & offer_actions;
    if available.is_empty() {
        return DndAction::empty();
    }
    if source_in_drag && available.intersects(compositor_action) {
        return compositor_action;
    }
    if available.intersects(preferred) {
        return preferred;
    }
    available.lowest()
}

impl DisplayServer {
    pub fn data_offer(&self, id: OfferId) -> Option<&DataOffer> {
        self.offers.get(&id)
    }

    /// Re-run the action rule for an offer and mirror a changed outcome to
    /// both ends. Resources predating the action stream count as
    /// copy-only.
    pub(crate) fn offer_update_action(&mut self, id: OfferId) {
        let Some(offer) = self.offers.get(&id) else {
            return;
        };
        let Some(source_id) = offer.source else {
            return;
        };
        let Some(source) = self.sources.get(&source_id) else {
            return;
        };

        let offer_version = self.registry.version(offer.resource).unwrap_or(1);
        let (offer_actions, preferred) = if offer_version >= since::DATA_OFFER_ACTION {
            (offer.dnd_actions, offer.preferred_dnd_action)
        } else {
            (DndAction::COPY, DndAction::empty())
        };

        let source_actions = match source.resource {
            Some(resource)
                if self.registry.version(resource).unwrap_or(1) < since::DATA_SOURCE_ACTION =>
            {
                DndAction::COPY
            }
            _ => source.dnd_actions,
        };

        let action = choose_action(
            source_actions,
            offer_actions,
            preferred,
            source.compositor_action,
            source.seat.is_some(),
        );

        if source.current_dnd_action == action {
            return;
        }
        let offer_resource = offer.resource;
        let source_resource = source.resource;
        let in_ask = offer.in_ask;

        self.sources.get_mut(&source_id).unwrap().current_dnd_action = action;

        if in_ask {
            return;
        }
        if let Some(resource) = source_resource {
            self.registry
                .send(resource, DataSourceEvent::Action { dnd_action: action });
        }
        self.registry
            .send(offer_resource, DataOfferEvent::Action { dnd_action: action });
    }

    /// Handle `wl_data_offer.accept`. Ignored when the offer is no longer
    /// the source's current offer.
    pub fn offer_accept(&mut self, id: OfferId, serial: u32, mime_type: Option<String>) {
        let Some(offer) = self.offers.get(&id) else {
            return;
        };
        let Some(source_id) = offer.source else {
            return;
        };
        if self.sources.get(&source_id).map(|s| s.offer) != Some(Some(id)) {
            return;
        }
        let accepted = mime_type.is_some();
        self.source_accept(source_id, serial, mime_type);
        self.sources.get_mut(&source_id).unwrap().accepted = accepted;
    }

    /// Handle `wl_data_offer.receive`. The fd is forwarded into the
    /// source's send hook, or closed here when the source is gone; it
    /// never leaks.
    pub fn offer_receive(&mut self, id: OfferId, mime_type: String, fd: OwnedFd) {
        let source_id = {
            let Some(offer) = self.offers.get(&id) else {
                return;
            };
            match offer.source {
                Some(source_id)
                    if self.sources.get(&source_id).map(|s| s.offer) == Some(Some(id)) =>
                {
                    Some(source_id)
                }
                _ => None,
            }
        };
        match source_id {
            Some(source_id) => self.source_send(source_id, mime_type, fd),
            None => drop(fd),
        }
    }

    /// Handle `wl_data_offer.finish`: the destination committed to the
    /// transfer.
    pub fn offer_finish(&mut self, id: OfferId) {
        let Some(offer) = self.offers.get(&id) else {
            return;
        };
        let Some(source_id) = offer.source else {
            return;
        };
        if self.sources.get(&source_id).map(|s| s.offer) != Some(Some(id)) {
            return;
        }
        self.source_notify_finish(source_id);
    }

    /// Handle `wl_data_offer.set_actions`.
    pub fn offer_set_actions(&mut self, id: OfferId, raw_actions: u32, raw_preferred: u32) {
        let Some(offer) = self.offers.get_mut(&id) else {
            return;
        };
        if raw_actions & !DndAction::all().bits() != 0 {
            let resource = offer.resource;
            self.registry.post_error(
                resource,
                error_code::DATA_OFFER_INVALID_ACTION_MASK,
                format!("invalid action mask {raw_actions:#x}"),
            );
            return;
        }
        let preferred = DndAction::from_bits_truncate(raw_preferred);
        if raw_preferred != 0 && (raw_preferred & raw_actions == 0 || !preferred.is_single()) {
            let resource = offer.resource;
            self.registry.post_error(
                resource,
                error_code::DATA_OFFER_INVALID_ACTION,
                format!("invalid action {raw_preferred:#x}"),
            );
            return;
        }

        offer.dnd_actions = DndAction::from_bits_truncate(raw_actions);
        offer.preferred_dnd_action = preferred;
        self.offer_update_action(id);
    }

    /// Finish handshake toward the source. A no-op until the source
    /// declared actions. Clears the source↔offer edge.
    pub(crate) fn source_notify_finish(&mut self, source_id: SourceId) {
        let Some(source) = self.sources.get(&source_id) else {
            return;
        };
        if !source.actions_set {
            return;
        }
        let Some(offer_id) = source.offer else {
            return;
        };
        let source_resource = source.resource;
        let current_action = source.current_dnd_action;
        let in_ask = self.offers.get(&offer_id).map_or(false, |o| o.in_ask);

        if in_ask {
            if let Some(resource) = source_resource {
                self.registry.send(
                    resource,
                    DataSourceEvent::Action {
                        dnd_action: current_action,
                    },
                );
            }
        }
        if let Some(resource) = source_resource {
            self.registry.send(resource, DataSourceEvent::DndFinished);
        }

        self.sources.get_mut(&source_id).unwrap().offer = None;
        if let Some(offer) = self.offers.get_mut(&offer_id) {
            offer.source = None;
        }
    }

    /// Handle `wl_data_offer.destroy`: the client dropped the offer.
    pub fn offer_destroy(&mut self, id: OfferId) {
        let Some(resource) = self.offers.get(&id).map(|o| o.resource) else {
            return;
        };
        self.destroy_resource(resource);
    }

    /// Teardown when the offer's client resource goes away.
    ///
    /// If the offer is still current: destinations predating the action
    /// stream get a safety-net finish (they have no `finish` request), and
    /// newer sources learn the transfer died through `cancelled`.
    pub(crate) fn destroy_offer(&mut self, id: OfferId) {
        let (source, offer_resource) = match self.offers.get(&id) {
            Some(offer) => (offer.source, offer.resource),
            None => return,
        };
        if let Some(source_id) = source {
            let still_current =
                self.sources.get(&source_id).map(|s| s.offer) == Some(Some(id));
            if still_current {
                let offer_version = self.registry.version(offer_resource).unwrap_or(1);
                if offer_version < since::DATA_OFFER_ACTION {
                    self.source_notify_finish(source_id);
                } else if let Some(source) = self.sources.get(&source_id) {
                    if let Some(resource) = source.resource {
                        if self.registry.version(resource).unwrap_or(1)
                            >= since::DATA_SOURCE_DND_FINISHED
                        {
                            self.registry.send(resource, DataSourceEvent::Cancelled);
                        }
                    }
                }
                if let Some(source) = self.sources.get_mut(&source_id) {
                    source.offer = None;
                }
            }
        }
        self.offers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const COPY: DndAction = DndAction::COPY;
    const MOVE: DndAction = DndAction::MOVE;
    const ASK: DndAction = DndAction::ASK;

    fn none() -> DndAction {
        DndAction::empty()
    }

    #[rstest]
    // empty intersection: no action
    #[case(COPY, MOVE, none(), none(), false, none())]
    // preferred wins inside the intersection
    #[case(COPY.union(MOVE), COPY.union(MOVE), MOVE, none(), false, MOVE)]
    // preferred outside the intersection falls back to the lowest bit
    #[case(COPY.union(MOVE), COPY.union(MOVE), ASK, none(), false, COPY)]
    // lowest bit in bit order
    #[case(MOVE.union(ASK), MOVE.union(ASK), none(), none(), false, MOVE)]
    // compositor pin beats the destination preference during a drag
    #[case(COPY.union(MOVE), COPY.union(MOVE), COPY, MOVE, true, MOVE)]
    // compositor pin is ignored outside a drag
    #[case(COPY.union(MOVE), COPY.union(MOVE), COPY, MOVE, false, COPY)]
    // compositor pin outside the intersection is ignored
    #[case(COPY, COPY, none(), MOVE, true, COPY)]
    fn action_choice_is_deterministic(
        #[case] source: DndAction,
        #[case] offer: DndAction,
        #[case] preferred: DndAction,
        #[case] pin: DndAction,
        #[case] in_drag: bool,
        #[case] expected: DndAction,
    ) {
        assert_eq!(choose_action(source, offer, preferred, pin, in_drag), expected);
    }

    #[test]
    fn chosen_action_is_single_bit_of_intersection() {
        let masks = [
            none(),
            COPY,
            MOVE,
            ASK,
            COPY | MOVE,
            COPY | ASK,
            MOVE | ASK,
            COPY | MOVE | ASK,
        ];
        for source in masks {
            for offer in masks {
                for preferred in [none(), COPY, MOVE, ASK] {
                    let action = choose_action(source, offer, preferred, none(), false);
                    let available = source & offer;
                    if available.is_empty() {
                        assert_eq!(action, none());
                    } else {
                        assert!(action.is_single());
                        assert!(available.contains(action));
                    }
                }
            }
        }
    }
}
