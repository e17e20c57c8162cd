use std::f32::consts::TAU;

use glam::Vec2;

use crate::surface::Bounds;

/// One drifting point of the field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    /// Pulse angle in radians, kept in [0, TAU) so f32 steps never stall.
    pub phase: f32,
}

impl Node {
    pub fn new(position: Vec2, velocity: Vec2, radius: f32, phase: f32) -> Self {
        Self { position, velocity, radius, phase }
    }

    /// Moves one step and turns around at the edges.
    ///
    /// The position is left where it landed: a node may sit outside `bounds` for a
    /// single step before the reversed velocity brings it back. A component only
    /// flips while it still points outward, so a node stranded outside by a
    /// shrinking viewport drifts back in instead of reversing every step.
    pub fn step(&mut self, bounds: Bounds, phase_step: f32) {
        self.position += self.velocity;

        if (self.position.x < 0.0 && self.velocity.x < 0.0)
            || (self.position.x > bounds.width && self.velocity.x > 0.0)
        {
            self.velocity.x = -self.velocity.x;
        }
        if (self.position.y < 0.0 && self.velocity.y < 0.0)
            || (self.position.y > bounds.height && self.velocity.y > 0.0)
        {
            self.velocity.y = -self.velocity.y;
        }

        self.phase = (self.phase + phase_step).rem_euclid(TAU);
    }

    /// Pulse mapped from `sin(phase)` in [-1, 1] to [0, 1].
    pub fn pulse(&self) -> f32 {
        self.phase.sin() * 0.5 + 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: Bounds = Bounds { width: 100.0, height: 100.0 };

    #[test]
    fn test_overshoot_is_kept_for_one_step() {
        let mut node = Node::new(Vec2::new(99.0, 50.0), Vec2::new(5.0, 0.0), 2.0, 0.0);

        node.step(BOUNDS, 0.02);
        assert_eq!(node.position.x, 104.0);
        assert_eq!(node.velocity.x, -5.0);

        node.step(BOUNDS, 0.02);
        assert_eq!(node.position.x, 99.0);
        assert_eq!(node.velocity.x, -5.0);
    }

    #[test]
    fn test_bounces_off_low_edge() {
        let mut node = Node::new(Vec2::new(50.0, 0.1), Vec2::new(0.0, -0.25), 2.0, 0.0);
        node.step(BOUNDS, 0.02);
        assert!(node.position.y < 0.0);
        assert_eq!(node.velocity.y, 0.25);
    }

    #[test]
    fn test_stranded_node_drifts_back() {
        // Left outside by a shrinking viewport, already heading inward.
        let mut node = Node::new(Vec2::new(150.0, 50.0), Vec2::new(-0.5, 0.0), 2.0, 0.0);
        for _ in 0..10 {
            node.step(BOUNDS, 0.02);
            assert_eq!(node.velocity.x, -0.5);
        }
        assert!((node.position.x - 145.0).abs() < 1e-4);
    }

    #[test]
    fn test_phase_advances_and_pulse_stays_in_unit_range() {
        let mut node = Node::new(Vec2::new(10.0, 10.0), Vec2::ZERO, 1.0, 0.0);
        for _ in 0..1000 {
            node.step(BOUNDS, 0.02);
            let pulse = node.pulse();
            assert!((0.0..=1.0).contains(&pulse));
        }
        assert!((node.phase - 20.0_f32.rem_euclid(TAU)).abs() < 1e-2);
    }

    #[test]
    fn test_large_phase_keeps_advancing() {
        let mut node = Node::new(Vec2::new(10.0, 10.0), Vec2::ZERO, 1.0, 524_288.0);
        node.step(BOUNDS, 0.02);
        let mut previous = node.pulse();
        let mut changed = 0;
        for _ in 0..100 {
            node.step(BOUNDS, 0.02);
            assert!((0.0..=TAU).contains(&node.phase));
            if node.pulse() != previous {
                changed += 1;
            }
            previous = node.pulse();
        }
        assert_eq!(changed, 100);
    }

    #[test]
    fn test_wrapped_phase_keeps_pulse() {
        let mut wrapped = Node::new(Vec2::ZERO, Vec2::ZERO, 1.0, TAU - 0.01);
        wrapped.step(BOUNDS, 0.02);
        assert!((wrapped.phase - 0.01).abs() < 1e-4);
        assert!((wrapped.pulse() - (0.01_f32.sin() * 0.5 + 0.5)).abs() < 1e-4);
    }

    #[test]
    fn test_pulse_extremes() {
        let peak = Node::new(Vec2::ZERO, Vec2::ZERO, 1.0, std::f32::consts::FRAC_PI_2);
        let trough = Node::new(Vec2::ZERO, Vec2::ZERO, 1.0, -std::f32::consts::FRAC_PI_2);
        assert!((peak.pulse() - 1.0).abs() < 1e-6);
        assert!(trough.pulse().abs() < 1e-6);
    }
}
