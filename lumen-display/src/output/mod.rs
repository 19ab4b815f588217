//! A single display sink.
//!
//! An [`Output`] owns its mode list, geometry, transform matrix and cursor
//! substate, and fans its state out to every client resource advertising
//! it. The backend (winit window, KMS connector, headless sink) sits
//! behind [`OutputBackend`]; a `false` return from a backend capability is
//! never fatal, it either surfaces as a boolean to the caller or triggers
//! the software-cursor fallback.

pub mod cursor;
pub mod layout;

use crate::render::Renderer;
use crate::server::{DisplayServer, Notification};
use crate::wire::events::{ModeFlag, OutputEvent, Subpixel};
use crate::wire::{Interface, Registry, ResourceRole};
use crate::{ClientId, OutputId, ResourceId};
use cursor::OutputCursor;
use lumen_core::geometry::Transform;

/// A video mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMode {
    pub width: i32,
    pub height: i32,
    /// Refresh rate in millihertz.
    pub refresh: i32,
    pub flags: ModeFlag,
}

/// Raw cursor pixels handed to a backend, ARGB8888.
#[derive(Debug, Clone, Copy)]
pub struct CursorPixels<'a> {
    /// Pixels per row.
    pub stride: i32,
    pub width: u32,
    pub height: u32,
    pub data: &'a [u8],
}

/// Backend capability table for one output.
///
/// Optional capabilities default to "not supported": `set_cursor` refusing
/// makes the output fall back to a software cursor, a missing renderer
/// makes even that fail (and `set_cursor` then reports false).
pub trait OutputBackend {
    /// Apply a mode. Returning false leaves the output untouched.
    fn set_mode(&mut self, mode: &OutputMode) -> bool;

    fn enable(&mut self, enable: bool);

    fn transform(&mut self, transform: Transform);

    /// Program the hardware cursor plane.
    ///
    /// `pixels` is `None` for a hotspot-only update (`update_pixels`
    /// false) or to clear the plane (`update_pixels` true). Returning
    /// false selects the software path.
    fn set_cursor(
        &mut self,
        pixels: Option<CursorPixels<'_>>,
        hotspot_x: i32,
        hotspot_y: i32,
        update_pixels: bool,
    ) -> bool {
        let _ = (pixels, hotspot_x, hotspot_y, update_pixels);
        false
    }

    /// Move the hardware cursor. Only consulted for hardware cursors.
    fn move_cursor(&mut self, x: i32, y: i32) -> bool {
        let _ = (x, y);
        false
    }

    fn make_current(&mut self);

    fn swap_buffers(&mut self);

    /// Renderer used to composite the software cursor.
    fn renderer(&mut self) -> Option<Box<dyn Renderer>> {
        None
    }

    fn set_gamma(&mut self, r: &[u16], g: &[u16], b: &[u16]) {
        let _ = (r, g, b);
    }

    fn gamma_size(&self) -> u32 {
        0
    }
}

/// Static identification of an output.
#[derive(Debug, Clone, Default)]
pub struct OutputDescription {
    pub name: String,
    pub make: String,
    pub model: String,
    /// Physical size in millimetres.
    pub physical_width: i32,
    pub physical_height: i32,
    pub subpixel: Subpixel,
}

pub struct Output {
    pub id: OutputId,
    pub name: String,
    pub make: String,
    pub model: String,
    pub physical_width: i32,
    pub physical_height: i32,
    pub subpixel: Subpixel,
    width: i32,
    height: i32,
    scale: i32,
    lx: i32,
    ly: i32,
    transform: Transform,
    enabled: bool,
    modes: Vec<OutputMode>,
    current_mode: Option<usize>,
    transform_matrix: [f32; 16],
    pub(crate) cursor: OutputCursor,
    pub(crate) backend: Box<dyn OutputBackend>,
    global: bool,
    pub(crate) resources: Vec<ResourceId>,
}

impl Output {
    pub(crate) fn new(id: OutputId, desc: OutputDescription, backend: Box<dyn OutputBackend>) -> Output {
        Output {
            id,
            name: desc.name,
            make: desc.make,
            model: desc.model,
            physical_width: desc.physical_width,
            physical_height: desc.physical_height,
            subpixel: desc.subpixel,
            width: 0,
            height: 0,
            scale: 1,
            lx: 0,
            ly: 0,
            transform: Transform::Normal,
            enabled: false,
            modes: Vec::new(),
            current_mode: None,
            transform_matrix: matrix::projection(0, 0, Transform::Normal),
            cursor: OutputCursor::default(),
            backend,
            global: false,
            resources: Vec::new(),
        }
    }

    pub fn modes(&self) -> &[OutputMode] {
        &self.modes
    }

    pub fn current_mode(&self) -> Option<&OutputMode> {
        self.current_mode.map(|i| &self.modes[i])
    }

    pub fn add_mode(&mut self, mode: OutputMode) {
        self.modes.push(mode);
    }

    pub fn size(&self) -> (i32, i32) {
        (self.width, self.height)
    }

    pub fn scale(&self) -> i32 {
        self.scale
    }

    pub fn position(&self) -> (i32, i32) {
        (self.lx, self.ly)
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn transform_matrix(&self) -> &[f32; 16] {
        &self.transform_matrix
    }

    /// Width and height as seen in the layout: swapped for odd transforms.
    pub fn effective_resolution(&self) -> (i32, i32) {
        if self.transform.is_odd() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    fn update_matrix(&mut self) {
        self.transform_matrix = matrix::projection(self.width, self.height, self.transform);
    }

    pub fn enable(&mut self, enable: bool) {
        self.backend.enable(enable);
        self.enabled = enable;
    }

    /// Switch to the mode at `index`. Returns success iff the backend
    /// accepts; on success the current mode is re-advertised to every
    /// client resource.
    pub fn set_mode(&mut self, registry: &mut Registry, index: usize) -> bool {
        let Some(mode) = self.modes.get(index).copied() else {
            return false;
        };
        if !self.backend.set_mode(&mode) {
            return false;
        }
        self.current_mode = Some(index);
        self.width = mode.width;
        self.height = mode.height;
        self.update_matrix();
        for resource in self.resources.clone() {
            self.send_current_mode(registry, resource);
        }
        true
    }

    /// Resize a modeless output (nested and headless backends).
    pub fn update_size(&mut self, registry: &mut Registry, width: i32, height: i32) {
        self.width = width;
        self.height = height;
        self.update_matrix();
        for resource in self.resources.clone() {
            self.send_current_mode(registry, resource);
        }
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.backend.transform(transform);
        self.transform = transform;
        self.update_matrix();
    }

    /// Move the output in the layout plane. A no-op if unchanged;
    /// otherwise the new geometry goes out to every client resource.
    pub fn set_position(&mut self, registry: &mut Registry, lx: i32, ly: i32) {
        if lx == self.lx && ly == self.ly {
            return;
        }
        self.lx = lx;
        self.ly = ly;
        for resource in self.resources.clone() {
            self.send_geometry(registry, resource);
            registry.send(resource, OutputEvent::Done);
        }
    }

    pub fn set_scale(&mut self, registry: &mut Registry, scale: i32) {
        if scale < 1 || scale == self.scale {
            return;
        }
        self.scale = scale;
        for resource in self.resources.clone() {
            registry.send(resource, OutputEvent::Scale { factor: scale });
            registry.send(resource, OutputEvent::Done);
        }
    }

    pub fn make_current(&mut self) {
        self.backend.make_current();
    }

    pub fn set_gamma(&mut self, r: &[u16], g: &[u16], b: &[u16]) {
        self.backend.set_gamma(r, g, b);
    }

    pub fn gamma_size(&self) -> u32 {
        self.backend.gamma_size()
    }

    /// Bind a client to the output global, creating the per-client
    /// resource and advertising the full state.
    pub(crate) fn bind(
        &mut self,
        registry: &mut Registry,
        client: ClientId,
        version: u32,
    ) -> Option<ResourceId> {
        let resource = registry
            .create_resource(client, Interface::WlOutput, version, ResourceRole::Output(self.id))
            .ok()?;
        self.resources.push(resource);
        self.send_full_state(registry, resource);
        Some(resource)
    }

    pub(crate) fn unlink_resource(&mut self, resource: ResourceId) {
        self.resources.retain(|r| *r != resource);
    }

    fn send_geometry(&self, registry: &mut Registry, resource: ResourceId) {
        registry.send(
            resource,
            OutputEvent::Geometry {
                x: self.lx,
                y: self.ly,
                physical_width: self.physical_width,
                physical_height: self.physical_height,
                subpixel: self.subpixel,
                make: self.make.clone(),
                model: self.model.clone(),
                transform: self.transform,
            },
        );
    }

    /// The stored `preferred` flag never reaches the wire; the active mode
    /// carries `current` instead.
    fn wire_mode_flags(&self, index: usize) -> ModeFlag {
        let mut flags = self.modes[index].flags & !ModeFlag::PREFERRED;
        if self.current_mode == Some(index) {
            flags |= ModeFlag::CURRENT;
        }
        flags
    }

    fn send_current_mode(&self, registry: &mut Registry, resource: ResourceId) {
        match self.current_mode {
            Some(index) => {
                let mode = self.modes[index];
                registry.send(
                    resource,
                    OutputEvent::Mode {
                        flags: self.wire_mode_flags(index),
                        width: mode.width,
                        height: mode.height,
                        refresh: mode.refresh,
                    },
                );
            }
            None => {
                registry.send(
                    resource,
                    OutputEvent::Mode {
                        flags: ModeFlag::CURRENT,
                        width: self.width,
                        height: self.height,
                        refresh: 0,
                    },
                );
            }
        }
        registry.send(resource, OutputEvent::Done);
    }

    fn send_full_state(&self, registry: &mut Registry, resource: ResourceId) {
        self.send_geometry(registry, resource);
        if self.modes.is_empty() {
            registry.send(
                resource,
                OutputEvent::Mode {
                    flags: ModeFlag::CURRENT,
                    width: self.width,
                    height: self.height,
                    refresh: 0,
                },
            );
        } else {
            for index in 0..self.modes.len() {
                let mode = self.modes[index];
                registry.send(
                    resource,
                    OutputEvent::Mode {
                        flags: self.wire_mode_flags(index),
                        width: mode.width,
                        height: mode.height,
                        refresh: mode.refresh,
                    },
                );
            }
        }
        registry.send(resource, OutputEvent::Scale { factor: self.scale });
        registry.send(resource, OutputEvent::Done);
    }
}

/// Output plumbing on the server: creation, global fan-out, and the
/// operations whose side effects reach beyond the output itself (layout
/// reconfiguration on resolution changes).
impl DisplayServer {
    pub fn create_output(
        &mut self,
        desc: OutputDescription,
        backend: Box<dyn OutputBackend>,
    ) -> OutputId {
        let id = self.alloc_output_id();
        tracing::info!(name = %desc.name, "creating output");
        self.outputs.insert(id, Output::new(id, desc, backend));
        id
    }

    pub fn output(&self, id: OutputId) -> Option<&Output> {
        self.outputs.get(&id)
    }

    pub fn output_mut(&mut self, id: OutputId) -> Option<&mut Output> {
        self.outputs.get_mut(&id)
    }

    /// Expose the output on the wire. Idempotent.
    pub fn output_create_global(&mut self, id: OutputId) {
        if let Some(output) = self.outputs.get_mut(&id) {
            output.global = true;
        }
    }

    /// Remove all client resources and take the global down.
    pub fn output_destroy_global(&mut self, id: OutputId) {
        let resources = match self.outputs.get_mut(&id) {
            Some(output) => {
                output.global = false;
                std::mem::take(&mut output.resources)
            }
            None => return,
        };
        for resource in resources {
            self.registry.destroy(resource);
        }
    }

    /// Bind `client` to an output global at `version`.
    pub fn output_bind(
        &mut self,
        id: OutputId,
        client: ClientId,
        version: u32,
    ) -> Option<ResourceId> {
        let output = self.outputs.get_mut(&id)?;
        if !output.global {
            return None;
        }
        output.bind(&mut self.registry, client, version)
    }

    /// Handle `wl_output.release`: drop the resource and unlink it from
    /// the fan-out set.
    pub fn output_release(&mut self, resource: ResourceId) {
        self.destroy_resource(resource);
    }

    pub fn output_set_mode(&mut self, id: OutputId, index: usize) -> bool {
        let Some(output) = self.outputs.get_mut(&id) else {
            return false;
        };
        let ok = output.set_mode(&mut self.registry, index);
        if ok {
            self.relayout_for(id);
        }
        ok
    }

    pub fn output_update_size(&mut self, id: OutputId, width: i32, height: i32) {
        if let Some(output) = self.outputs.get_mut(&id) {
            output.update_size(&mut self.registry, width, height);
            self.relayout_for(id);
        }
    }

    pub fn output_set_transform(&mut self, id: OutputId, transform: Transform) {
        if let Some(output) = self.outputs.get_mut(&id) {
            output.set_transform(transform);
            self.relayout_for(id);
        }
    }

    pub fn output_set_scale(&mut self, id: OutputId, scale: i32) {
        if let Some(output) = self.outputs.get_mut(&id) {
            output.set_scale(&mut self.registry, scale);
        }
    }

    pub fn output_set_position(&mut self, id: OutputId, lx: i32, ly: i32) {
        if let Some(output) = self.outputs.get_mut(&id) {
            output.set_position(&mut self.registry, lx, ly);
        }
    }

    pub fn output_enable(&mut self, id: OutputId, enable: bool) {
        if let Some(output) = self.outputs.get_mut(&id) {
            output.enable(enable);
        }
    }

    pub fn output_make_current(&mut self, id: OutputId) {
        if let Some(output) = self.outputs.get_mut(&id) {
            output.make_current();
        }
    }

    pub fn output_swap_buffers(&mut self, id: OutputId) {
        if let Some(output) = self.outputs.get_mut(&id) {
            output.swap_buffers();
        }
    }

    /// Destroy an output: the layout entry goes first, then every client
    /// resource, then the output itself. Listeners read the snapshot
    /// carried by the notification.
    pub fn destroy_output(&mut self, id: OutputId) {
        let Some(output) = self.outputs.get(&id) else {
            return;
        };
        let name = output.name.clone();
        self.push_notification(Notification::OutputDestroyed { output: id, name });

        if self.layout.get(id).is_some() {
            self.layout_remove(id);
        }

        let resources = match self.outputs.get_mut(&id) {
            Some(output) => std::mem::take(&mut output.resources),
            None => return,
        };
        for resource in resources {
            self.registry.destroy(resource);
        }
        self.outputs.remove(&id);
    }

    /// Resolution changed: if the output is in the layout, rerun the
    /// placement transaction.
    fn relayout_for(&mut self, id: OutputId) {
        if self.layout.get(id).is_some() {
            self.layout
                .reconfigure(&mut self.outputs, &mut self.registry);
            self.push_notification(Notification::LayoutChanged);
        }
    }
}

/// Row-major 4x4 matrices for the cursor compositing path.
pub(crate) mod matrix {
    use lumen_core::geometry::Transform;

    pub const IDENTITY: [f32; 16] = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ];

    pub fn multiply(a: &[f32; 16], b: &[f32; 16]) -> [f32; 16] {
        let mut out = [0.0; 16];
        for row in 0..4 {
            for col in 0..4 {
                let mut acc = 0.0;
                for k in 0..4 {
                    acc += a[row * 4 + k] * b[k * 4 + col];
                }
                out[row * 4 + col] = acc;
            }
        }
        out
    }

    pub fn translation(x: f32, y: f32) -> [f32; 16] {
        let mut m = IDENTITY;
        m[3] = x;
        m[7] = y;
        m
    }

    fn rotation(steps: i32) -> [f32; 16] {
        let (cos, sin): (f32, f32) = match steps.rem_euclid(4) {
            0 => (1.0, 0.0),
            1 => (0.0, 1.0),
            2 => (-1.0, 0.0),
            _ => (0.0, -1.0),
        };
        let mut m = IDENTITY;
        m[0] = cos;
        m[1] = -sin;
        m[4] = sin;
        m[5] = cos;
        m
    }

    fn flip_x() -> [f32; 16] {
        let mut m = IDENTITY;
        m[0] = -1.0;
        m
    }

    /// Maps output pixel space into normalized device coordinates with the
    /// output transform applied. Kept consistent with
    /// `(width, height, transform)` by recomputation on every geometric
    /// change.
    pub fn projection(width: i32, height: i32, transform: Transform) -> [f32; 16] {
        let w = if width > 0 { width as f32 } else { 1.0 };
        let h = if height > 0 { height as f32 } else { 1.0 };
        let ortho: [f32; 16] = [
            2.0 / w, 0.0, 0.0, -1.0, //
            0.0, -2.0 / h, 0.0, 1.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let mut m = ortho;
        if transform.is_flipped() {
            m = multiply(&flip_x(), &m);
        }
        multiply(&rotation(transform.rotation_steps()), &m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::events::AnyEvent;
    use pretty_assertions::assert_eq;

    /// Backend recording calls; mode acceptance is scriptable.
    struct TestBackend {
        accept_modes: bool,
    }

    impl OutputBackend for TestBackend {
        fn set_mode(&mut self, _mode: &OutputMode) -> bool {
            self.accept_modes
        }
        fn enable(&mut self, _enable: bool) {}
        fn transform(&mut self, _transform: Transform) {}
        fn make_current(&mut self) {}
        fn swap_buffers(&mut self) {}
    }

    fn server_with_output(accept_modes: bool) -> (DisplayServer, OutputId) {
        let mut server = DisplayServer::new();
        let id = server.create_output(
            OutputDescription {
                name: "TEST-1".into(),
                make: "Lumen".into(),
                model: "Virtual".into(),
                physical_width: 300,
                physical_height: 200,
                subpixel: Subpixel::Unknown,
            },
            Box::new(TestBackend { accept_modes }),
        );
        server
            .output_mut(id)
            .unwrap()
            .add_mode(OutputMode {
                width: 800,
                height: 600,
                refresh: 60000,
                flags: ModeFlag::PREFERRED,
            });
        server.output_mut(id).unwrap().add_mode(OutputMode {
            width: 1024,
            height: 768,
            refresh: 60000,
            flags: ModeFlag::empty(),
        });
        server.output_create_global(id);
        (server, id)
    }

    fn output_events(server: &mut DisplayServer, client: crate::ClientId) -> Vec<AnyEvent> {
        server
            .registry
            .drain_events(client)
            .into_iter()
            .map(|e| e.event)
            .collect()
    }

    #[test]
    fn bind_advertises_full_state_in_order() {
        let (mut server, id) = server_with_output(true);
        assert!(server.output_set_mode(id, 0));
        let client = server.create_client();
        server.output_bind(id, client, 3).unwrap();

        let events = output_events(&mut server, client);
        assert_eq!(events.len(), 5);
        assert!(matches!(events[0], AnyEvent::Output(OutputEvent::Geometry { .. })));
        // the active mode carries current and never preferred
        match &events[1] {
            AnyEvent::Output(OutputEvent::Mode { flags, width, .. }) => {
                assert_eq!(*flags, ModeFlag::CURRENT);
                assert_eq!(*width, 800);
            }
            other => panic!("expected mode event, got {other:?}"),
        }
        match &events[2] {
            AnyEvent::Output(OutputEvent::Mode { flags, width, .. }) => {
                assert_eq!(*flags, ModeFlag::empty());
                assert_eq!(*width, 1024);
            }
            other => panic!("expected mode event, got {other:?}"),
        }
        assert!(matches!(events[3], AnyEvent::Output(OutputEvent::Scale { factor: 1 })));
        assert!(matches!(events[4], AnyEvent::Output(OutputEvent::Done)));
    }

    #[test]
    fn old_clients_never_see_done_or_scale() {
        let (mut server, id) = server_with_output(true);
        let client = server.create_client();
        server.output_bind(id, client, 1).unwrap();

        for event in output_events(&mut server, client) {
            assert!(
                !matches!(
                    event,
                    AnyEvent::Output(OutputEvent::Done) | AnyEvent::Output(OutputEvent::Scale { .. })
                ),
                "v1 resource saw {event:?}"
            );
        }
    }

    #[test]
    fn set_mode_readvertises_on_success_only() {
        let (mut server, id) = server_with_output(false);
        let client = server.create_client();
        server.output_bind(id, client, 3).unwrap();
        server.registry.drain_events(client);

        assert!(!server.output_set_mode(id, 0));
        assert!(output_events(&mut server, client).is_empty());
        assert_eq!(server.output(id).unwrap().current_mode(), None);
    }

    #[test]
    fn set_mode_updates_geometry_and_matrix() {
        let (mut server, id) = server_with_output(true);
        let before = *server.output(id).unwrap().transform_matrix();
        assert!(server.output_set_mode(id, 1));
        let output = server.output(id).unwrap();
        assert_eq!(output.size(), (1024, 768));
        assert_eq!(output.current_mode().unwrap().width, 1024);
        assert_ne!(*output.transform_matrix(), before);
    }

    #[test]
    fn set_position_is_noop_when_unchanged() {
        let (mut server, id) = server_with_output(true);
        let client = server.create_client();
        server.output_bind(id, client, 3).unwrap();
        server.registry.drain_events(client);

        server.output_set_position(id, 0, 0);
        assert!(output_events(&mut server, client).is_empty());

        server.output_set_position(id, 100, 50);
        let events = output_events(&mut server, client);
        assert_eq!(events.len(), 2);
        match &events[0] {
            AnyEvent::Output(OutputEvent::Geometry { x, y, .. }) => {
                assert_eq!((*x, *y), (100, 50));
            }
            other => panic!("expected geometry, got {other:?}"),
        }
        assert!(matches!(events[1], AnyEvent::Output(OutputEvent::Done)));
    }

    #[test]
    fn effective_resolution_swaps_for_odd_transforms() {
        let (mut server, id) = server_with_output(true);
        assert!(server.output_set_mode(id, 0));
        assert_eq!(server.output(id).unwrap().effective_resolution(), (800, 600));
        server.output_set_transform(id, Transform::Rotated90);
        assert_eq!(server.output(id).unwrap().effective_resolution(), (600, 800));
        server.output_set_transform(id, Transform::Flipped180);
        assert_eq!(server.output(id).unwrap().effective_resolution(), (800, 600));
    }

    #[test]
    fn release_unlinks_from_fanout() {
        let (mut server, id) = server_with_output(true);
        let client = server.create_client();
        let resource = server.output_bind(id, client, 3).unwrap();
        assert_eq!(server.output(id).unwrap().resources.len(), 1);

        server.output_release(resource);
        assert!(server.output(id).unwrap().resources.is_empty());

        // fan-out after release reaches nobody
        server.registry.drain_events(client);
        server.output_set_position(id, 5, 5);
        assert!(output_events(&mut server, client).is_empty());
    }

    #[test]
    fn destroy_global_drops_all_resources() {
        let (mut server, id) = server_with_output(true);
        let a = server.create_client();
        let b = server.create_client();
        let ra = server.output_bind(id, a, 3).unwrap();
        let rb = server.output_bind(id, b, 2).unwrap();

        server.output_destroy_global(id);
        assert!(!server.registry.alive(ra));
        assert!(!server.registry.alive(rb));
        assert!(server.output_bind(id, a, 3).is_none());
    }

    #[test]
    fn modeless_output_advertises_raw_size() {
        let mut server = DisplayServer::new();
        let id = server.create_output(
            OutputDescription {
                name: "NESTED-1".into(),
                ..Default::default()
            },
            Box::new(TestBackend { accept_modes: true }),
        );
        server.output_create_global(id);
        server.output_update_size(id, 1280, 720);

        let client = server.create_client();
        server.output_bind(id, client, 3).unwrap();
        let events = output_events(&mut server, client);
        match &events[1] {
            AnyEvent::Output(OutputEvent::Mode {
                flags,
                width,
                height,
                refresh,
            }) => {
                assert_eq!(*flags, ModeFlag::CURRENT);
                assert_eq!((*width, *height, *refresh), (1280, 720, 0));
            }
            other => panic!("expected mode event, got {other:?}"),
        }
    }
}
