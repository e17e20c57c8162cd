// src/models.rs
// Vertex and instance layouts shared by the CPU batch and the WGSL pipelines.
use bytemuck::{Pod, Zeroable};

// --- Unit quad, expanded per circle instance ---
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex2D {
    pub position: [f32; 2],
}

impl Vertex2D {
    pub const QUAD_VERTICES: [Self; 4] = [
        Vertex2D { position: [-1.0, -1.0] },
        Vertex2D { position: [ 1.0, -1.0] },
        Vertex2D { position: [ 1.0,  1.0] },
        Vertex2D { position: [-1.0,  1.0] },
    ];

    // Screen space has y pointing down, so both triangles wind clockwise on screen.
    // The circle pipeline runs without culling.
    pub const QUAD_INDICES: [u16; 6] = [
        0, 1, 2,
        0, 2, 3,
    ];

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x2,
            }],
        }
    }
}

// --- Instance data for nodes ---
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct CircleInstance {
    pub center: [f32; 2],     // pixel coordinates, origin top-left
    pub radius: f32,          // solid disc radius in pixels
    pub extent: f32,          // half size of the drawn quad: radius plus glow blur
    pub color: [f32; 4],      // linear RGBA of the disc
    pub glow_color: [f32; 4], // linear RGBA of the halo, alpha 0 disables it
}

impl CircleInstance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        1 => Float32x2,
        2 => Float32,
        3 => Float32,
        4 => Float32x4,
        5 => Float32x4
    ];

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

// --- Vertex data for edges, six per line quad ---
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 2], // pixel coordinates
    pub color: [f32; 4],    // linear RGBA
}

impl LineVertex {
    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_sizes_match_attribute_layout() {
        assert_eq!(std::mem::size_of::<Vertex2D>(), 8);
        assert_eq!(std::mem::size_of::<CircleInstance>(), 48);
        assert_eq!(std::mem::size_of::<LineVertex>(), 24);
    }
}
