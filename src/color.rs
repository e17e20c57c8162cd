// src/color.rs
// Conversions between config colours (sRGB bytes) and the GPU side (linear floats).
use bevy_color::{ColorToComponents, LinearRgba, Srgba};

/// sRGB colour from config bytes with a straight alpha.
pub fn srgb_u8(rgb: [u8; 3], alpha: f32) -> Srgba {
    let mut color = Srgba::rgb_u8(rgb[0], rgb[1], rgb[2]);
    color.alpha = alpha.clamp(0.0, 1.0);
    color
}

pub fn with_alpha(color: Srgba, alpha: f32) -> Srgba {
    Srgba { alpha: alpha.clamp(0.0, 1.0), ..color }
}

/// Linear RGBA floats, the layout the vertex buffers expect.
pub fn to_linear_array(color: Srgba) -> [f32; 4] {
    LinearRgba::from(color).to_f32_array()
}

pub fn to_wgpu_color(color: Srgba) -> wgpu::Color {
    let linear = LinearRgba::from(color);
    wgpu::Color {
        r: linear.red as f64,
        g: linear.green as f64,
        b: linear.blue as f64,
        a: linear.alpha as f64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb_u8_keeps_alpha() {
        let cyan = srgb_u8([0, 255, 255], 0.4);
        assert!((cyan.red - 0.0).abs() < 1e-6);
        assert!((cyan.green - 1.0).abs() < 1e-6);
        assert!((cyan.alpha - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_alpha_is_clamped() {
        assert_eq!(srgb_u8([0, 0, 0], 3.0).alpha, 1.0);
        assert_eq!(with_alpha(Srgba::WHITE, -1.0).alpha, 0.0);
    }

    #[test]
    fn test_linear_array_extremes_are_unchanged() {
        let linear = to_linear_array(srgb_u8([0, 255, 255], 0.5));
        assert!((linear[0] - 0.0).abs() < 1e-6);
        assert!((linear[1] - 1.0).abs() < 1e-6);
        assert!((linear[2] - 1.0).abs() < 1e-6);
        assert!((linear[3] - 0.5).abs() < 1e-6);
    }
}
