//! # Lumen Display-Server Library (`lumen-display`)
//!
//! The runtime core of a Wayland compositor: the protocol object graph and
//! the seat-state machine. One [`DisplayServer`] value owns every object:
//! outputs and their layout, surfaces, seats with their grab stacks, data
//! sources and offers, and the drag-and-drop coordinator. Every
//! operation runs to completion on the single thread that owns it.
//!
//! ## Structure
//!
//! - [`wire`]: the resource registry, the boundary between protocol
//!   objects and the transport. All outbound messages pass through one
//!   version-gated choke point and queue per client.
//! - [`output`]: a display sink with mode list, geometry, transform matrix,
//!   cursor substate and the per-client resource fan-out, plus the
//!   [`output::layout::OutputLayout`] arranging outputs in a shared plane.
//! - [`surface`]: the minimal surface handle the core needs, a role, a
//!   committed buffer, and an owning client.
//! - [`seat`]: pointer and keyboard focus, per-client handles, and the
//!   LIFO grab stacks.
//! - [`data_device`]: selection ownership and the drag-and-drop state
//!   machine, including the DnD grabs and the source/offer pairing.
//!
//! Cross-references between objects are arena indices, never owning
//! handles; when either end of an edge dies, the owning teardown severs
//! both directions before anything is freed.

pub mod data_device;
pub mod output;
pub mod render;
pub mod seat;
pub mod server;
pub mod surface;
pub mod wire;

pub use server::{DisplayServer, Notification};
pub use wire::events::DndAction;

/// Identifies a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub(crate) u32);

/// Identifies a server-side protocol object in the resource registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) u32);

/// Identifies an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub(crate) u32);

/// Identifies a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub(crate) u32);

/// Identifies a seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeatId(pub(crate) u32);

/// Identifies a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub(crate) u32);

/// Identifies a data offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OfferId(pub(crate) u32);

/// Identifies a drag in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DragId(pub(crate) u32);
