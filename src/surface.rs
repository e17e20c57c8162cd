// src/surface.rs
//! Draw primitives and the surface they are drawn onto.
//!
//! The simulator only talks to [`DrawSurface`]. [`FrameBatch`] is the GPU-backed
//! implementation: it turns primitives into the instance and vertex data in
//! [`crate::models`], which `State` uploads once per frame.
use bevy_color::Srgba;
use glam::Vec2;

use crate::color;
use crate::models::{CircleInstance, LineVertex};

/// Viewport size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
}

impl Bounds {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width: width.max(0.0), height: height.max(0.0) }
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, point: Vec2) -> bool {
        (0.0..=self.width).contains(&point.x) && (0.0..=self.height).contains(&point.y)
    }
}

/// Soft halo drawn behind a circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glow {
    pub blur: f32,
    pub color: Srgba,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
    pub color: Srgba,
    pub glow: Option<Glow>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub from: Vec2,
    pub to: Vec2,
    pub width: f32,
    pub color: Srgba,
}

pub trait DrawSurface {
    fn bounds(&self) -> Bounds;

    /// Blend `color` over everything drawn so far.
    fn fade(&mut self, color: Srgba);

    fn fill_circle(&mut self, circle: &Circle);

    fn stroke_line(&mut self, line: &Line);
}

/// GPU draw stage of a [`FrameBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Fade,
    Circles,
    Lines,
}

/// One frame of draw calls, laid out for the GPU pipelines.
#[derive(Debug, Default)]
pub struct FrameBatch {
    bounds: Bounds,
    pub fade: Option<Srgba>,
    pub circles: Vec<CircleInstance>,
    pub line_vertices: Vec<LineVertex>,
}

impl FrameBatch {
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds, ..Default::default() }
    }

    pub fn set_bounds(&mut self, bounds: Bounds) {
        self.bounds = bounds;
    }

    pub fn clear(&mut self) {
        self.fade = None;
        self.circles.clear();
        self.line_vertices.clear();
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.fade.is_none() && self.circles.is_empty() && self.line_vertices.is_empty()
    }

    /// Non-empty layers in paint order. Connections go on top of the nodes.
    pub fn layers(&self) -> Vec<Layer> {
        let mut layers = Vec::with_capacity(3);
        if self.fade.is_some() {
            layers.push(Layer::Fade);
        }
        if !self.circles.is_empty() {
            layers.push(Layer::Circles);
        }
        if !self.line_vertices.is_empty() {
            layers.push(Layer::Lines);
        }
        layers
    }
}

impl DrawSurface for FrameBatch {
    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn fade(&mut self, color: Srgba) {
        self.fade = Some(color);
    }

    fn fill_circle(&mut self, circle: &Circle) {
        let (blur, glow_color) = match circle.glow {
            Some(glow) => (glow.blur.max(0.0), color::to_linear_array(glow.color)),
            None => (0.0, [0.0; 4]),
        };
        self.circles.push(CircleInstance {
            center: circle.center.into(),
            radius: circle.radius,
            extent: circle.radius + blur,
            color: color::to_linear_array(circle.color),
            glow_color,
        });
    }

    fn stroke_line(&mut self, line: &Line) {
        let direction = line.to - line.from;
        let Some(unit) = direction.try_normalize() else {
            return;
        };

        // A hairline still covers one pixel; thinner strokes fade instead of shrinking.
        let (width, alpha) = if line.width < 1.0 {
            (1.0, line.color.alpha * line.width.max(0.0))
        } else {
            (line.width, line.color.alpha)
        };
        let color = color::to_linear_array(color::with_alpha(line.color, alpha));
        let offset = unit.perp() * (width * 0.5);

        let corners = [
            line.from + offset,
            line.from - offset,
            line.to - offset,
            line.from + offset,
            line.to - offset,
            line.to + offset,
        ];
        self.line_vertices.extend(corners.iter().map(|corner| LineVertex {
            position: (*corner).into(),
            color,
        }));
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Keeps every primitive as drawn, for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingSurface {
        pub bounds: Bounds,
        pub fades: Vec<Srgba>,
        pub circles: Vec<Circle>,
        pub lines: Vec<Line>,
    }

    impl RecordingSurface {
        pub fn new(width: f32, height: f32) -> Self {
            Self { bounds: Bounds::new(width, height), ..Default::default() }
        }
    }

    impl DrawSurface for RecordingSurface {
        fn bounds(&self) -> Bounds {
            self.bounds
        }

        fn fade(&mut self, color: Srgba) {
            self.fades.push(color);
        }

        fn fill_circle(&mut self, circle: &Circle) {
            self.circles.push(*circle);
        }

        fn stroke_line(&mut self, line: &Line) {
            self.lines.push(*line);
        }
    }
}
