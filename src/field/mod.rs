//! The node field: a fixed population of drifting nodes joined by fading edges.
//!
//! [`ParticleField`] is the simulation and knows nothing about windows or GPUs.
//! [`FieldAnimator`] owns one and drives it from a frame clock.
mod animator;
mod config;
mod node;

pub use animator::FieldAnimator;
pub use config::{CONFIG_ENV_VAR, FieldConfig, MAX_NODE_COUNT};
pub use node::Node;

use glam::Vec2;
use rand::Rng;
use std::f32::consts::TAU;

use crate::surface::{Bounds, Circle, DrawSurface, Glow, Line};

#[derive(Debug, Clone)]
pub struct ParticleField {
    nodes: Vec<Node>,
    bounds: Bounds,
    config: FieldConfig,
}

impl ParticleField {
    /// Scatters `config.node_count` nodes uniformly over `bounds`.
    pub fn initialize(config: FieldConfig, bounds: Bounds, rng: &mut impl Rng) -> Self {
        let nodes = (0..config.node_count)
            .map(|_| {
                let position = Vec2::new(rng.r#gen::<f32>() * bounds.width, rng.r#gen::<f32>() * bounds.height);
                let velocity = Vec2::new(
                    (rng.r#gen::<f32>() - 0.5) * 2.0 * config.max_speed,
                    (rng.r#gen::<f32>() - 0.5) * 2.0 * config.max_speed,
                );
                let radius = config.min_radius + rng.r#gen::<f32>() * (config.max_radius - config.min_radius);
                let phase = rng.r#gen::<f32>() * TAU;
                Node::new(position, velocity, radius, phase)
            })
            .collect();

        log::debug!("Initialized {} nodes over {}x{}", config.node_count, bounds.width, bounds.height);
        Self { nodes, bounds, config }
    }

    /// Advances every node by one step.
    pub fn tick(&mut self) {
        for node in &mut self.nodes {
            node.step(self.bounds, self.config.phase_step);
        }
    }

    /// Fades the previous frame, then draws nodes and the edges between close pairs.
    pub fn render(&self, surface: &mut impl DrawSurface) {
        surface.fade(self.config.trail());

        let glow = Glow {
            blur: self.config.glow_blur,
            color: self.config.node_color(self.config.glow_alpha),
        };
        for node in &self.nodes {
            surface.fill_circle(&Circle {
                center: node.position,
                radius: node.radius,
                color: self.config.node_color(self.node_alpha(node)),
                glow: (glow.blur > 0.0).then_some(glow),
            });
        }

        // Every unordered pair, quadratic in the node count.
        for (i, a) in self.nodes.iter().enumerate() {
            for b in &self.nodes[i + 1..] {
                let distance = a.position.distance(b.position);
                if distance < self.config.connection_distance {
                    surface.stroke_line(&Line {
                        from: a.position,
                        to: b.position,
                        width: self.config.line_width,
                        color: self.config.node_color(self.connection_alpha(distance)),
                    });
                }
            }
        }
    }

    /// Bounds for the following ticks. Nodes stay where they are.
    pub fn resize(&mut self, bounds: Bounds) {
        log::debug!("Field bounds {}x{} -> {}x{}", self.bounds.width, self.bounds.height, bounds.width, bounds.height);
        self.bounds = bounds;
    }

    /// Drops the node population.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn node_alpha(&self, node: &Node) -> f32 {
        self.config.pulse_base + self.config.pulse_amplitude * node.pulse()
    }

    /// Edge opacity: the configured maximum at distance 0, falling linearly to 0 at
    /// the connection distance and staying there beyond it.
    pub fn connection_alpha(&self, distance: f32) -> f32 {
        let falloff = 1.0 - distance / self.config.connection_distance;
        falloff.max(0.0) * self.config.connection_max_alpha
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }
}
