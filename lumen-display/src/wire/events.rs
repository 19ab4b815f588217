//! Typed wire messages and the version table.
//!
//! Every event the core emits is a variant of one of the per-interface
//! enums below, wrapped into [`AnyEvent`] for the registry's choke point.
//! Introduction versions live in [`since`] as one table rather than
//! scattered conditionals; [`AnyEvent::since_version`] is the only place
//! that maps a message to its threshold.

use crate::ResourceId;
use lumen_core::geometry::{Fixed, Transform};
use std::os::fd::OwnedFd;

/// Introduction versions for version-gated messages.
///
/// A message is emitted only when the bound resource's negotiated version
/// is at least the constant named here.
pub mod since {
    pub const OUTPUT_GEOMETRY: u32 = 1;
    pub const OUTPUT_MODE: u32 = 1;
    pub const OUTPUT_DONE: u32 = 2;
    pub const OUTPUT_SCALE: u32 = 2;

    pub const DATA_SOURCE_ACTION: u32 = 3;
    pub const DATA_SOURCE_DND_DROP_PERFORMED: u32 = 3;
    pub const DATA_SOURCE_DND_FINISHED: u32 = 3;

    pub const DATA_OFFER_SOURCE_ACTIONS: u32 = 3;
    pub const DATA_OFFER_ACTION: u32 = 3;
    /// Request-side threshold: `wl_data_offer.finish` and `set_actions`
    /// exist from this version on.
    pub const DATA_OFFER_FINISH: u32 = 3;
}

/// Protocol error codes, per interface, as carried by `post_error`.
pub mod error_code {
    pub const DISPLAY_INVALID_OBJECT: u32 = 0;
    pub const DISPLAY_INVALID_METHOD: u32 = 1;
    pub const DISPLAY_NO_MEMORY: u32 = 2;

    pub const DATA_OFFER_INVALID_FINISH: u32 = 0;
    pub const DATA_OFFER_INVALID_ACTION_MASK: u32 = 1;
    pub const DATA_OFFER_INVALID_ACTION: u32 = 2;

    pub const DATA_SOURCE_INVALID_ACTION_MASK: u32 = 0;

    pub const DATA_DEVICE_ROLE: u32 = 0;
}

bitflags::bitflags! {
    /// Drag-and-drop action bits negotiated between source, offer and
    /// compositor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DndAction: u32 {
        const COPY = 1;
        const MOVE = 2;
        const ASK = 4;
    }
}

impl DndAction {
    /// The lowest set bit, or empty when no bit is set.
    pub fn lowest(self) -> DndAction {
        if self.is_empty() {
            DndAction::empty()
        } else {
            DndAction::from_bits_truncate(1 << self.bits().trailing_zeros())
        }
    }

    /// Whether exactly one action bit is set.
    pub fn is_single(self) -> bool {
        self.bits().count_ones() == 1
    }
}

bitflags::bitflags! {
    /// `wl_output.mode` flag bits.
    ///
    /// Storage keeps `PREFERRED`; emission strips it and sets `CURRENT`
    /// on the active mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ModeFlag: u32 {
        const CURRENT = 1;
        const PREFERRED = 2;
    }
}

/// Subpixel layout hint advertised in `wl_output.geometry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i32)]
pub enum Subpixel {
    #[default]
    Unknown = 0,
    None = 1,
    HorizontalRgb = 2,
    HorizontalBgr = 3,
    VerticalRgb = 4,
    VerticalBgr = 5,
}

/// `wl_output` events.
#[derive(Debug)]
pub enum OutputEvent {
    Geometry {
        x: i32,
        y: i32,
        physical_width: i32,
        physical_height: i32,
        subpixel: Subpixel,
        make: String,
        model: String,
        transform: Transform,
    },
    Mode {
        flags: ModeFlag,
        width: i32,
        height: i32,
        refresh: i32,
    },
    Done,
    Scale {
        factor: i32,
    },
}

/// `wl_data_source` events.
#[derive(Debug)]
pub enum DataSourceEvent {
    /// `target`: a mime type was accepted (or rejected with `None`).
    Target { mime_type: Option<String> },
    /// `send`: write the data for `mime_type` into `fd`.
    ///
    /// The fd is owned by the event; whoever drains the queue consumes it.
    Send { mime_type: String, fd: OwnedFd },
    Cancelled,
    DndDropPerformed,
    DndFinished,
    Action { dnd_action: DndAction },
}

/// `wl_data_offer` events.
#[derive(Debug)]
pub enum DataOfferEvent {
    Offer { mime_type: String },
    SourceActions { source_actions: DndAction },
    Action { dnd_action: DndAction },
}

/// `wl_data_device` events.
#[derive(Debug)]
pub enum DataDeviceEvent {
    DataOffer {
        id: ResourceId,
    },
    Enter {
        serial: u32,
        surface: ResourceId,
        x: Fixed,
        y: Fixed,
        id: Option<ResourceId>,
    },
    Leave,
    Motion {
        time: u32,
        x: Fixed,
        y: Fixed,
    },
    Drop,
    Selection {
        id: Option<ResourceId>,
    },
}

/// Any event the core can emit, as accepted by the registry's choke point.
#[derive(Debug)]
pub enum AnyEvent {
    Output(OutputEvent),
    DataSource(DataSourceEvent),
    DataOffer(DataOfferEvent),
    DataDevice(DataDeviceEvent),
}

impl AnyEvent {
    /// The version at which this message was introduced.
    pub fn since_version(&self) -> u32 {
        match self {
            AnyEvent::Output(ev) => match ev {
                OutputEvent::Geometry { .. } => since::OUTPUT_GEOMETRY,
                OutputEvent::Mode { .. } => since::OUTPUT_MODE,
                OutputEvent::Done => since::OUTPUT_DONE,
                OutputEvent::Scale { .. } => since::OUTPUT_SCALE,
            },
            AnyEvent::DataSource(ev) => match ev {
                DataSourceEvent::Target { .. }
                | DataSourceEvent::Send { .. }
                | DataSourceEvent::Cancelled => 1,
                DataSourceEvent::DndDropPerformed => since::DATA_SOURCE_DND_DROP_PERFORMED,
                DataSourceEvent::DndFinished => since::DATA_SOURCE_DND_FINISHED,
                DataSourceEvent::Action { .. } => since::DATA_SOURCE_ACTION,
            },
            AnyEvent::DataOffer(ev) => match ev {
                DataOfferEvent::Offer { .. } => 1,
                DataOfferEvent::SourceActions { .. } => since::DATA_OFFER_SOURCE_ACTIONS,
                DataOfferEvent::Action { .. } => since::DATA_OFFER_ACTION,
            },
            AnyEvent::DataDevice(_) => 1,
        }
    }
}

impl From<OutputEvent> for AnyEvent {
    fn from(ev: OutputEvent) -> AnyEvent {
        AnyEvent::Output(ev)
    }
}

impl From<DataSourceEvent> for AnyEvent {
    fn from(ev: DataSourceEvent) -> AnyEvent {
        AnyEvent::DataSource(ev)
    }
}

impl From<DataOfferEvent> for AnyEvent {
    fn from(ev: DataOfferEvent) -> AnyEvent {
        AnyEvent::DataOffer(ev)
    }
}

impl From<DataDeviceEvent> for AnyEvent {
    fn from(ev: DataDeviceEvent) -> AnyEvent {
        AnyEvent::DataDevice(ev)
    }
}
