//! Renderer seam for the software cursor path.
//!
//! Rendering proper is a collaborator; the core only needs to upload
//! ARGB8888 pixels into a texture and composite that texture with a
//! matrix when a software cursor is in use. Backends provide an
//! implementation through [`crate::output::OutputBackend::renderer`].

/// A renderer capable of drawing cursor textures over the frame.
pub trait Renderer {
    /// Allocate an empty texture.
    fn create_texture(&mut self) -> Box<dyn Texture>;

    /// Draw `texture` using the given 4x4 row-major matrix.
    fn render_texture(&mut self, texture: &dyn Texture, matrix: &[f32; 16]);
}

/// A pixel container owned by a renderer.
pub trait Texture {
    /// Upload tightly packed ARGB8888 pixels. `stride` counts pixels per
    /// row. Returns false when the upload fails.
    fn upload_argb8888(&mut self, stride: i32, width: u32, height: u32, data: &[u8]) -> bool;

    /// Whether the texture has valid contents. Clients hide a cursor by
    /// committing a surface with no buffer, which leaves this false.
    fn valid(&self) -> bool;

    fn size(&self) -> (u32, u32);
}
