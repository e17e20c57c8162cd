#![cfg(target_arch = "wasm32")]

use nodefield::{Bounds, FieldConfig, ParticleField};
use rand::SeedableRng;
use rand::rngs::StdRng;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn config_from_js_json() {
    let config = FieldConfig::from_json(r#"{"node_count": 40, "connection_distance": 120.0}"#).unwrap();
    assert_eq!(config.node_count, 40);
    assert_eq!(config.connection_distance, 120.0);
}

#[wasm_bindgen_test]
fn field_steps_in_browser() {
    let mut rng = StdRng::seed_from_u64(9);
    let mut field = ParticleField::initialize(FieldConfig::default(), Bounds::new(320.0, 240.0), &mut rng);
    field.tick();
    assert_eq!(field.nodes().len(), 80);
}
