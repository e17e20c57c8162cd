use std::path::Path;

use anyhow::{Context, ensure};
use bevy_color::Srgba;
use serde::{Deserialize, Serialize};

use crate::color;

/// Environment variable naming a JSON config file for the native build.
pub const CONFIG_ENV_VAR: &str = "NODEFIELD_CONFIG";

/// Every frame compares all node pairs, so the count stays small.
pub const MAX_NODE_COUNT: usize = 10_000;

/// Tunables for the node field. Every field is optional in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub node_count: usize,
    /// Each velocity component is drawn from `[-max_speed, max_speed)`.
    pub max_speed: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    pub phase_step: f32,
    pub pulse_base: f32,
    pub pulse_amplitude: f32,
    pub glow_blur: f32,
    pub glow_alpha: f32,
    pub connection_distance: f32,
    pub connection_max_alpha: f32,
    pub line_width: f32,
    pub color: [u8; 3],
    pub trail_color: [u8; 3],
    pub trail_alpha: f32,
    /// Fixed seed for a reproducible layout; random when absent.
    pub seed: Option<u64>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            node_count: 80,
            max_speed: 0.25,
            min_radius: 1.0,
            max_radius: 3.0,
            phase_step: 0.02,
            pulse_base: 0.3,
            pulse_amplitude: 0.4,
            glow_blur: 15.0,
            glow_alpha: 0.8,
            connection_distance: 150.0,
            connection_max_alpha: 0.2,
            line_width: 0.5,
            color: [0, 255, 255],
            trail_color: [5, 8, 20],
            trail_alpha: 0.1,
            seed: None,
        }
    }
}

impl FieldConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: FieldConfig = serde_json::from_str(json).context("Invalid field config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read field config {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("Failed to load field config {}", path.display()))
    }

    /// Config named by `NODEFIELD_CONFIG`, or the defaults when it is unset.
    pub fn from_env() -> anyhow::Result<Self> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => {
                log::info!("Loading field config from {}", Path::new(&path).display());
                Self::from_path(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let finite = [
            self.max_speed,
            self.min_radius,
            self.max_radius,
            self.phase_step,
            self.pulse_base,
            self.pulse_amplitude,
            self.glow_blur,
            self.glow_alpha,
            self.connection_distance,
            self.connection_max_alpha,
            self.line_width,
            self.trail_alpha,
        ];
        ensure!(finite.iter().all(|v| v.is_finite()), "field config values must be finite");
        ensure!(
            self.node_count <= MAX_NODE_COUNT,
            "node_count must be at most {MAX_NODE_COUNT}, got {}",
            self.node_count
        );
        ensure!(self.max_speed >= 0.0, "max_speed must not be negative, got {}", self.max_speed);
        ensure!(
            self.min_radius >= 0.0 && self.min_radius <= self.max_radius,
            "radius range {}..{} is empty or negative",
            self.min_radius,
            self.max_radius
        );
        ensure!(
            self.connection_distance > 0.0,
            "connection_distance must be positive, got {}",
            self.connection_distance
        );
        ensure!(self.glow_blur >= 0.0, "glow_blur must not be negative");
        ensure!(self.line_width >= 0.0, "line_width must not be negative");
        for (name, alpha) in [
            ("pulse_base", self.pulse_base),
            ("pulse_base + pulse_amplitude", self.pulse_base + self.pulse_amplitude),
            ("glow_alpha", self.glow_alpha),
            ("connection_max_alpha", self.connection_max_alpha),
            ("trail_alpha", self.trail_alpha),
        ] {
            ensure!((0.0..=1.0).contains(&alpha), "{name} must lie in [0, 1], got {alpha}");
        }
        Ok(())
    }

    pub fn node_color(&self, alpha: f32) -> Srgba {
        color::srgb_u8(self.color, alpha)
    }

    pub fn trail(&self) -> Srgba {
        color::srgb_u8(self.trail_color, self.trail_alpha)
    }

    /// Trail colour at full strength, used to clear a fresh trail target.
    pub fn background(&self) -> Srgba {
        color::srgb_u8(self.trail_color, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_animation() {
        let config = FieldConfig::default();
        assert_eq!(config.node_count, 80);
        assert_eq!(config.connection_distance, 150.0);
        assert_eq!(config.connection_max_alpha, 0.2);
        assert_eq!(config.phase_step, 0.02);
        assert_eq!(config.color, [0, 255, 255]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = FieldConfig::from_json(r#"{"node_count": 120, "seed": 7}"#).unwrap();
        assert_eq!(config.node_count, 120);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.max_radius, 3.0);
        assert_eq!(config.trail_color, [5, 8, 20]);
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(FieldConfig::from_json("{}").unwrap(), FieldConfig::default());
    }

    #[test]
    fn test_rejects_malformed_json() {
        let err = FieldConfig::from_json(r#"{"node_count": "many"}"#).unwrap_err();
        assert!(err.to_string().contains("Invalid field config JSON"));
    }

    #[test]
    fn test_rejects_zero_connection_distance() {
        let err = FieldConfig::from_json(r#"{"connection_distance": 0.0}"#).unwrap_err();
        assert!(err.to_string().contains("connection_distance"));
    }

    #[test]
    fn test_caps_node_count() {
        let at_cap = FieldConfig { node_count: MAX_NODE_COUNT, ..Default::default() };
        assert!(at_cap.validate().is_ok());

        let err = FieldConfig::from_json(r#"{"node_count": 1000000}"#).unwrap_err();
        assert!(format!("{err:#}").contains("node_count must be at most"));
    }

    #[test]
    fn test_rejects_inverted_radius_range() {
        let config = FieldConfig { min_radius: 4.0, max_radius: 2.0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_pulse_above_one() {
        let config = FieldConfig { pulse_base: 0.8, pulse_amplitude: 0.4, ..Default::default() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pulse_base + pulse_amplitude"));
    }

    #[test]
    fn test_missing_config_file_names_path() {
        let err = FieldConfig::from_path("/definitely/not/here.json").unwrap_err();
        assert!(format!("{err:#}").contains("/definitely/not/here.json"));
    }

    #[test]
    fn test_trail_colors() {
        let config = FieldConfig::default();
        assert!((config.trail().alpha - 0.1).abs() < 1e-6);
        assert_eq!(config.background().alpha, 1.0);
    }
}
