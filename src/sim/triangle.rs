//! Demo game: a single triangle.

use serde_json::{Value, json};

use crate::sim::Game;

const VERTICES: [f32; 9] = [
    -1.0, -1.0, 0.0, //
    0.0, 1.0, 0.0, //
    1.0, -1.0, 0.0,
];

#[derive(Debug, Clone)]
pub struct Triangle {
    scene: Value,
}

impl Triangle {
    pub fn new() -> Self {
        let scene = json!({
            "geometry": [{
                "components": [{ "vertices": VERTICES }],
                "material": {},
            }],
        });
        Self { scene }
    }
}

impl Default for Triangle {
    fn default() -> Self {
        Self::new()
    }
}

impl Game for Triangle {
    fn update(&mut self, frame: u64, input: &Value, output: &mut Value) {
        *output = json!({
            "frame": frame,
            "scene": self.scene,
            "input": input.get("input").cloned().unwrap_or(Value::Null),
        });
    }
}
