//! Headless output backend.
//!
//! Stands in for a real KMS or nested backend: accepts every mode, keeps
//! no hardware cursor plane (so the software path is exercised), and
//! counts frames instead of flipping buffers.

use lumen_display::output::{CursorPixels, OutputBackend, OutputMode};
use lumen_display::render::{Renderer, Texture};
use lumen_core::geometry::Transform;

#[derive(Default)]
pub struct HeadlessBackend {
    pub frames: u64,
    enabled: bool,
}

impl OutputBackend for HeadlessBackend {
    fn set_mode(&mut self, mode: &OutputMode) -> bool {
        tracing::debug!(width = mode.width, height = mode.height, "headless mode set");
        true
    }

    fn enable(&mut self, enable: bool) {
        self.enabled = enable;
    }

    fn transform(&mut self, _transform: Transform) {}

    fn set_cursor(
        &mut self,
        _pixels: Option<CursorPixels<'_>>,
        _hotspot_x: i32,
        _hotspot_y: i32,
        _update_pixels: bool,
    ) -> bool {
        // no cursor plane; the library falls back to compositing
        false
    }

    fn make_current(&mut self) {}

    fn swap_buffers(&mut self) {
        self.frames += 1;
    }

    fn renderer(&mut self) -> Option<Box<dyn Renderer>> {
        Some(Box::new(HeadlessRenderer))
    }
}

struct HeadlessRenderer;

impl Renderer for HeadlessRenderer {
    fn create_texture(&mut self) -> Box<dyn Texture> {
        Box::new(HeadlessTexture::default())
    }

    fn render_texture(&mut self, texture: &dyn Texture, _matrix: &[f32; 16]) {
        let (width, height) = texture.size();
        tracing::trace!(width, height, "compositing software cursor");
    }
}

#[derive(Default)]
struct HeadlessTexture {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl Texture for HeadlessTexture {
    fn upload_argb8888(&mut self, stride: i32, width: u32, height: u32, data: &[u8]) -> bool {
        let stride_bytes = stride as usize * 4;
        let row_bytes = width as usize * 4;
        if height == 0 || stride_bytes < row_bytes {
            return false;
        }
        let required = stride_bytes * (height as usize - 1) + row_bytes;
        if data.len() < required {
            return false;
        }
        self.pixels.clear();
        for row in 0..height as usize {
            let start = row * stride_bytes;
            self.pixels.extend_from_slice(&data[start..start + row_bytes]);
        }
        self.width = width;
        self.height = height;
        true
    }

    fn valid(&self) -> bool {
        !self.pixels.is_empty()
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
