// src/projection.rs
// Pixel space (origin top-left, y down) to clip space.
use glam::{Mat4, Vec2};
use bytemuck::{Pod, Zeroable};

// Uniform shared by every pipeline
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct ViewUniform {
    pub view_proj: [[f32; 4]; 4],
    pub fade_color: [f32; 4],              // linear RGBA blended over the trail each frame
    pub viewport: [f32; 2],
    pub needs_srgb_output_conversion: u32, // 0 for false, 1 for true
    pub _padding: u32,                     // total size 96 bytes, a multiple of 16
}

#[derive(Debug)]
pub struct ScreenProjection {
    pub viewport_size: Vec2,
}

impl ScreenProjection {
    pub fn new(viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            viewport_size: Vec2::new(viewport_width as f32, viewport_height as f32),
        }
    }

    /// Call on window resize. Zero sizes (minimised windows) are ignored.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.viewport_size = Vec2::new(width as f32, height as f32);
        }
    }

    pub fn build_view_projection_matrix(&self) -> Mat4 {
        let size = self.viewport_size.max(Vec2::ONE);
        // Top and bottom swapped so that y grows downwards like canvas coordinates.
        Mat4::orthographic_rh(0.0, size.x, size.y, 0.0, -1.0, 1.0)
    }

    pub fn uniform(&self, fade_color: [f32; 4], needs_srgb_output_conversion: bool) -> ViewUniform {
        ViewUniform {
            view_proj: self.build_view_projection_matrix().to_cols_array_2d(),
            fade_color,
            viewport: self.viewport_size.into(),
            needs_srgb_output_conversion: needs_srgb_output_conversion as u32,
            _padding: 0,
        }
    }
}
