//! Minimal surface handle.
//!
//! Shells own real surface state; the core needs only what its own
//! machinery touches: the owning client, a set-once role, and the last
//! committed buffer (for cursor upload). Commit and destroy fan-out to the
//! components holding an edge to the surface happens in
//! [`crate::server::DisplayServer::commit_surface`] and
//! [`crate::server::DisplayServer::destroy_surface`].

use crate::{ClientId, ResourceId, SurfaceId};
use thiserror::Error;

/// Role of a surface bound as a pointer cursor.
pub const ROLE_POINTER_CURSOR: &str = "wl_pointer-cursor";
/// Role of a surface used as a drag icon.
pub const ROLE_DATA_DEVICE_ICON: &str = "wl_data_device-icon";

/// Pixel format of a committed buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferFormat {
    Argb8888,
    Xrgb8888,
}

/// A committed shared-memory style buffer.
#[derive(Debug, Clone)]
pub struct SurfaceBuffer {
    pub format: BufferFormat,
    /// Pixels per row.
    pub stride: i32,
    pub width: i32,
    pub height: i32,
    pub data: Vec<u8>,
}

/// The surface already carries a different role.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("surface already has role {existing:?}")]
pub struct RoleConflict {
    pub existing: &'static str,
}

#[derive(Debug)]
pub struct Surface {
    pub id: SurfaceId,
    pub resource: ResourceId,
    pub client: ClientId,
    role: Option<&'static str>,
    /// Last committed buffer; `None` hides whatever the surface backed.
    pub buffer: Option<SurfaceBuffer>,
    /// Committed buffer offset, used to adjust cursor hotspots.
    pub sx: i32,
    pub sy: i32,
}

impl Surface {
    pub(crate) fn new(id: SurfaceId, resource: ResourceId, client: ClientId) -> Surface {
        Surface {
            id,
            resource,
            client,
            role: None,
            buffer: None,
            sx: 0,
            sy: 0,
        }
    }

    pub fn role(&self) -> Option<&'static str> {
        self.role
    }

    /// Assign a role. Re-assigning the same role is allowed; a different
    /// role is a conflict the caller turns into a `role` protocol error.
    pub fn set_role(&mut self, role: &'static str) -> Result<(), RoleConflict> {
        match self.role {
            None => {
                self.role = Some(role);
                Ok(())
            }
            Some(existing) if existing == role => Ok(()),
            Some(existing) => Err(RoleConflict { existing }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> Surface {
        Surface::new(SurfaceId(1), ResourceId(1), ClientId(1))
    }

    #[test]
    fn role_is_set_once() {
        let mut s = surface();
        assert_eq!(s.role(), None);
        s.set_role(ROLE_POINTER_CURSOR).unwrap();
        assert_eq!(s.role(), Some(ROLE_POINTER_CURSOR));
        // same role again is fine
        s.set_role(ROLE_POINTER_CURSOR).unwrap();
        // a different role conflicts
        let err = s.set_role(ROLE_DATA_DEVICE_ICON).unwrap_err();
        assert_eq!(err.existing, ROLE_POINTER_CURSOR);
    }
}
