//! Per-output cursor state.
//!
//! A cursor is either *hardware* (programmed into the backend's cursor
//! plane) or *software* (composited over the frame during
//! [`Output::swap_buffers`]). Any backend refusal flips the output to the
//! software path, allocating the renderer and texture on first use. A
//! client surface may be bound as the cursor image; only surfaces with the
//! `wl_pointer-cursor` role are accepted, anything else is a no-op.

use super::{matrix, CursorPixels, Output};
use crate::render::{Renderer, Texture};
use crate::server::DisplayServer;
use crate::surface::{BufferFormat, Surface, ROLE_POINTER_CURSOR};
use crate::{OutputId, SurfaceId};

#[derive(Default)]
pub(crate) struct OutputCursor {
    pub is_sw: bool,
    pub hotspot_x: i32,
    pub hotspot_y: i32,
    /// Logical position on the output.
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub renderer: Option<Box<dyn Renderer>>,
    pub texture: Option<Box<dyn Texture>>,
    /// Bound client surface, if the cursor image comes from one.
    pub surface: Option<SurfaceId>,
}

impl Output {
    /// Try the hardware plane, fall back to uploading into the software
    /// texture. `hotspot` here is the effective hotspot (already adjusted
    /// for a surface's buffer offset).
    fn upload_cursor(
        &mut self,
        pixels: Option<CursorPixels<'_>>,
        hotspot_x: i32,
        hotspot_y: i32,
    ) -> bool {
        if self
            .backend
            .set_cursor(pixels, hotspot_x, hotspot_y, true)
        {
            self.cursor.is_sw = false;
            return true;
        }

        tracing::info!(output = %self.name, "falling back to software cursor");
        self.cursor.is_sw = true;

        if self.cursor.renderer.is_none() {
            self.cursor.renderer = self.backend.renderer();
            if self.cursor.renderer.is_none() {
                return false;
            }
        }
        if self.cursor.texture.is_none() {
            let renderer = self.cursor.renderer.as_mut().unwrap();
            self.cursor.texture = Some(renderer.create_texture());
        }

        match pixels {
            Some(p) => {
                self.cursor.width = p.width;
                self.cursor.height = p.height;
                self.cursor
                    .texture
                    .as_mut()
                    .unwrap()
                    .upload_argb8888(p.stride, p.width, p.height, p.data)
            }
            // No pixels: the cursor is hidden until the texture becomes
            // valid again.
            None => true,
        }
    }

    /// Set the cursor from raw ARGB8888 pixels, detaching any bound
    /// surface.
    pub fn set_cursor(
        &mut self,
        pixels: Option<CursorPixels<'_>>,
        hotspot_x: i32,
        hotspot_y: i32,
    ) -> bool {
        self.cursor.surface = None;
        self.cursor.hotspot_x = hotspot_x;
        self.cursor.hotspot_y = hotspot_y;
        self.upload_cursor(pixels, hotspot_x, hotspot_y)
    }

    /// Bind a client surface as the cursor image.
    ///
    /// The surface must carry the pointer-cursor role, compared by exact
    /// name; any other role makes this a no-op.
    pub fn set_cursor_surface(
        &mut self,
        surface: Option<&Surface>,
        hotspot_x: i32,
        hotspot_y: i32,
    ) {
        if let Some(s) = surface {
            if s.role() != Some(ROLE_POINTER_CURSOR) {
                return;
            }
        }

        self.cursor.hotspot_x = hotspot_x;
        self.cursor.hotspot_y = hotspot_y;

        // Re-binding the already-bound surface only moves the hotspot.
        // A hardware cursor tells the backend; a software cursor keeps
        // its uploaded pixels untouched. Neither path re-uploads.
        if let Some(s) = surface {
            if self.cursor.surface == Some(s.id) {
                if self.cursor.is_sw {
                    return;
                }
                self.backend
                    .set_cursor(None, hotspot_x, hotspot_y, false);
                return;
            }
        }

        // Re-binding always goes through the software path; the hardware
        // plane is cleared so stale pixels cannot linger.
        self.cursor.is_sw = true;
        self.backend.set_cursor(None, hotspot_x, hotspot_y, true);
        self.cursor.surface = surface.map(|s| s.id);

        match surface {
            Some(s) => self.commit_cursor_surface(s),
            None => {
                self.upload_cursor(None, hotspot_x, hotspot_y);
            }
        }
    }

    /// Refresh the cursor from the bound surface's committed buffer.
    /// Non-ARGB8888 buffers are ignored; a missing buffer hides the
    /// cursor by leaving the texture invalid.
    pub(crate) fn commit_cursor_surface(&mut self, surface: &Surface) {
        if self.cursor.surface != Some(surface.id) {
            return;
        }
        let hotspot_x = self.cursor.hotspot_x - surface.sx;
        let hotspot_y = self.cursor.hotspot_y - surface.sy;
        match &surface.buffer {
            Some(buffer) if buffer.format == BufferFormat::Argb8888 => {
                let pixels = CursorPixels {
                    stride: buffer.stride,
                    width: buffer.width as u32,
                    height: buffer.height as u32,
                    data: &buffer.data,
                };
                self.upload_cursor(Some(pixels), hotspot_x, hotspot_y);
            }
            Some(_) => {}
            None => {
                self.upload_cursor(None, hotspot_x, hotspot_y);
            }
        }
    }

    pub(crate) fn unbind_cursor_surface(&mut self, surface: SurfaceId) {
        if self.cursor.surface == Some(surface) {
            self.cursor.surface = None;
        }
    }

    /// Move the cursor. Hardware cursors delegate to the backend; the
    /// software position is only consumed at swap time.
    pub fn move_cursor(&mut self, x: i32, y: i32) -> bool {
        self.cursor.x = x;
        self.cursor.y = y;
        if self.cursor.is_sw {
            return true;
        }
        self.backend.move_cursor(x, y)
    }

    /// Composite the software cursor (when valid) and flip.
    pub fn swap_buffers(&mut self) {
        if self.cursor.is_sw {
            if let (Some(renderer), Some(texture)) =
                (self.cursor.renderer.as_mut(), self.cursor.texture.as_ref())
            {
                if texture.valid() {
                    let translate =
                        matrix::translation(self.cursor.x as f32, self.cursor.y as f32);
                    let m = matrix::multiply(&self.transform_matrix, &translate);
                    renderer.render_texture(texture.as_ref(), &m);
                }
            }
        }
        self.backend.swap_buffers();
    }
}

impl DisplayServer {
    /// Set an output's cursor from raw pixels. Falls back to the software
    /// path on any backend refusal.
    pub fn output_set_cursor(
        &mut self,
        id: OutputId,
        pixels: Option<CursorPixels<'_>>,
        hotspot_x: i32,
        hotspot_y: i32,
    ) -> bool {
        match self.outputs.get_mut(&id) {
            Some(output) => output.set_cursor(pixels, hotspot_x, hotspot_y),
            None => false,
        }
    }

    /// Bind a surface as an output's cursor image.
    pub fn output_set_cursor_surface(
        &mut self,
        id: OutputId,
        surface: Option<SurfaceId>,
        hotspot_x: i32,
        hotspot_y: i32,
    ) {
        let Some(output) = self.outputs.get_mut(&id) else {
            return;
        };
        match surface {
            Some(sid) => {
                if let Some(s) = self.surfaces.get(&sid) {
                    output.set_cursor_surface(Some(s), hotspot_x, hotspot_y);
                }
            }
            None => output.set_cursor_surface(None, hotspot_x, hotspot_y),
        }
    }

    pub fn output_move_cursor(&mut self, id: OutputId, x: i32, y: i32) -> bool {
        match self.outputs.get_mut(&id) {
            Some(output) => output.move_cursor(x, y),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{OutputBackend, OutputDescription, OutputMode};
    use crate::surface::SurfaceBuffer;
    use lumen_core::geometry::Transform;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct RecordingTexture {
        uploads: Rc<Cell<u32>>,
        valid: bool,
    }

    impl Texture for RecordingTexture {
        fn upload_argb8888(&mut self, _stride: i32, _w: u32, _h: u32, _data: &[u8]) -> bool {
            self.uploads.set(self.uploads.get() + 1);
            self.valid = true;
            true
        }
        fn valid(&self) -> bool {
            self.valid
        }
        fn size(&self) -> (u32, u32) {
            (0, 0)
        }
    }

    struct RecordingRenderer {
        uploads: Rc<Cell<u32>>,
        draws: Rc<Cell<u32>>,
    }

    impl Renderer for RecordingRenderer {
        fn create_texture(&mut self) -> Box<dyn Texture> {
            Box::new(RecordingTexture {
                uploads: self.uploads.clone(),
                valid: false,
            })
        }
        fn render_texture(&mut self, _texture: &dyn Texture, _matrix: &[f32; 16]) {
            self.draws.set(self.draws.get() + 1);
        }
    }

    struct CursorBackend {
        hw_cursor: bool,
        uploads: Rc<Cell<u32>>,
        draws: Rc<Cell<u32>>,
        hw_calls: Rc<Cell<u32>>,
    }

    impl OutputBackend for CursorBackend {
        fn set_mode(&mut self, _mode: &OutputMode) -> bool {
            true
        }
        fn enable(&mut self, _enable: bool) {}
        fn transform(&mut self, _transform: Transform) {}
        fn set_cursor(
            &mut self,
            _pixels: Option<CursorPixels<'_>>,
            _hx: i32,
            _hy: i32,
            _update_pixels: bool,
        ) -> bool {
            self.hw_calls.set(self.hw_calls.get() + 1);
            self.hw_cursor
        }
        fn move_cursor(&mut self, _x: i32, _y: i32) -> bool {
            self.hw_cursor
        }
        fn make_current(&mut self) {}
        fn swap_buffers(&mut self) {}
        fn renderer(&mut self) -> Option<Box<dyn Renderer>> {
            Some(Box::new(RecordingRenderer {
                uploads: self.uploads.clone(),
                draws: self.draws.clone(),
            }))
        }
    }

    struct Probes {
        uploads: Rc<Cell<u32>>,
        draws: Rc<Cell<u32>>,
        hw_calls: Rc<Cell<u32>>,
    }

    fn cursor_server(hw_cursor: bool) -> (DisplayServer, OutputId, Probes) {
        let probes = Probes {
            uploads: Rc::new(Cell::new(0)),
            draws: Rc::new(Cell::new(0)),
            hw_calls: Rc::new(Cell::new(0)),
        };
        let mut server = DisplayServer::new();
        let id = server.create_output(
            OutputDescription {
                name: "CUR-1".into(),
                ..Default::default()
            },
            Box::new(CursorBackend {
                hw_cursor,
                uploads: probes.uploads.clone(),
                draws: probes.draws.clone(),
                hw_calls: probes.hw_calls.clone(),
            }),
        );
        server.output_update_size(id, 1920, 1080);
        (server, id, probes)
    }

    fn pixels() -> Vec<u8> {
        vec![0xff; 16 * 16 * 4]
    }

    #[test]
    fn hardware_cursor_stays_hardware() {
        let (mut server, id, probes) = cursor_server(true);
        let data = pixels();
        let ok = server.output_set_cursor(
            id,
            Some(CursorPixels {
                stride: 16,
                width: 16,
                height: 16,
                data: &data,
            }),
            1,
            2,
        );
        assert!(ok);
        assert!(!server.output(id).unwrap().cursor.is_sw);
        assert_eq!(probes.uploads.get(), 0);
        assert!(probes.hw_calls.get() > 0);
        // hardware cursors delegate movement to the backend
        assert!(server.output_move_cursor(id, 10, 20));
    }

    #[test]
    fn backend_refusal_falls_back_to_software() {
        let (mut server, id, probes) = cursor_server(false);
        let data = pixels();
        let ok = server.output_set_cursor(
            id,
            Some(CursorPixels {
                stride: 16,
                width: 16,
                height: 16,
                data: &data,
            }),
            0,
            0,
        );
        assert!(ok);
        assert!(server.output(id).unwrap().cursor.is_sw);
        assert_eq!(probes.uploads.get(), 1);

        // software cursor composites at swap time
        server.output_swap_buffers(id);
        assert_eq!(probes.draws.get(), 1);

        // moving a software cursor never touches the backend
        assert!(server.output_move_cursor(id, 5, 5));
    }

    #[test]
    fn cursor_surface_requires_pointer_role() {
        let (mut server, id, probes) = cursor_server(false);
        let client = server.create_client();
        let sid = server.create_surface(client).unwrap();
        server.commit_surface(
            sid,
            Some(SurfaceBuffer {
                format: BufferFormat::Argb8888,
                stride: 8,
                width: 8,
                height: 8,
                data: vec![0; 8 * 8 * 4],
            }),
            0,
            0,
        );

        // no role: binding is a no-op
        server.output_set_cursor_surface(id, Some(sid), 0, 0);
        assert_eq!(server.output(id).unwrap().cursor.surface, None);
        assert_eq!(probes.uploads.get(), 0);

        server
            .surface_mut(sid)
            .unwrap()
            .set_role(ROLE_POINTER_CURSOR)
            .unwrap();
        server.output_set_cursor_surface(id, Some(sid), 0, 0);
        assert_eq!(server.output(id).unwrap().cursor.surface, Some(sid));
        assert_eq!(probes.uploads.get(), 1);
    }

    #[test]
    fn commits_refresh_the_bound_cursor() {
        let (mut server, id, probes) = cursor_server(false);
        let client = server.create_client();
        let sid = server.create_surface(client).unwrap();
        server
            .surface_mut(sid)
            .unwrap()
            .set_role(ROLE_POINTER_CURSOR)
            .unwrap();
        server.output_set_cursor_surface(id, Some(sid), 4, 4);

        server.commit_surface(
            sid,
            Some(SurfaceBuffer {
                format: BufferFormat::Argb8888,
                stride: 8,
                width: 8,
                height: 8,
                data: vec![0; 8 * 8 * 4],
            }),
            0,
            0,
        );
        assert_eq!(probes.uploads.get(), 1);

        // a commit with no buffer hides the cursor but keeps the binding
        server.commit_surface(sid, None, 0, 0);
        assert_eq!(probes.uploads.get(), 1);
        assert_eq!(server.output(id).unwrap().cursor.surface, Some(sid));
    }

    #[test]
    fn same_surface_rebind_only_moves_the_hotspot() {
        let (mut server, id, probes) = cursor_server(false);
        let client = server.create_client();
        let sid = server.create_surface(client).unwrap();
        server
            .surface_mut(sid)
            .unwrap()
            .set_role(ROLE_POINTER_CURSOR)
            .unwrap();
        server.commit_surface(
            sid,
            Some(SurfaceBuffer {
                format: BufferFormat::Argb8888,
                stride: 8,
                width: 8,
                height: 8,
                data: vec![0; 8 * 8 * 4],
            }),
            0,
            0,
        );
        server.output_set_cursor_surface(id, Some(sid), 0, 0);
        assert_eq!(probes.uploads.get(), 1);
        let hw_calls = probes.hw_calls.get();

        // software cursor, same surface: no re-upload, no plane clear
        server.output_set_cursor_surface(id, Some(sid), 3, 5);
        assert_eq!(probes.uploads.get(), 1);
        assert_eq!(probes.hw_calls.get(), hw_calls);
        let output = server.output(id).unwrap();
        assert!(output.cursor.is_sw);
        assert_eq!(output.cursor.surface, Some(sid));
        assert_eq!(
            (output.cursor.hotspot_x, output.cursor.hotspot_y),
            (3, 5)
        );
    }

    #[test]
    fn surface_destruction_unbinds_the_cursor() {
        let (mut server, id, _probes) = cursor_server(false);
        let client = server.create_client();
        let sid = server.create_surface(client).unwrap();
        server
            .surface_mut(sid)
            .unwrap()
            .set_role(ROLE_POINTER_CURSOR)
            .unwrap();
        server.output_set_cursor_surface(id, Some(sid), 0, 0);
        assert_eq!(server.output(id).unwrap().cursor.surface, Some(sid));

        server.destroy_surface(sid);
        assert_eq!(server.output(id).unwrap().cursor.surface, None);
    }

    #[test]
    fn raw_cursor_detaches_bound_surface() {
        let (mut server, id, _probes) = cursor_server(false);
        let client = server.create_client();
        let sid = server.create_surface(client).unwrap();
        server
            .surface_mut(sid)
            .unwrap()
            .set_role(ROLE_POINTER_CURSOR)
            .unwrap();
        server.output_set_cursor_surface(id, Some(sid), 0, 0);

        let data = pixels();
        server.output_set_cursor(
            id,
            Some(CursorPixels {
                stride: 16,
                width: 16,
                height: 16,
                data: &data,
            }),
            0,
            0,
        );
        // at most one of raw-buffer and surface-bound cursor is active
        assert_eq!(server.output(id).unwrap().cursor.surface, None);
    }
}
