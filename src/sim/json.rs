use serde_json::Value;

use crate::sim::Simulation;

/// A game updated from JSON input into JSON output, once per frame.
pub trait Game {
    fn update(&mut self, frame: u64, input: &Value, output: &mut Value);
}

/// Runs a [`Game`] behind the byte-level [`Simulation`] interface.
#[derive(Debug, Default)]
pub struct JsonSimulation<G> {
    game: G,
    frame_number: u64,
}

impl<G: Game> JsonSimulation<G> {
    pub fn new(game: G) -> Self {
        Self {
            game,
            frame_number: 0,
        }
    }

    /// Number of frames simulated so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }
}

impl<G: Game> Simulation for JsonSimulation<G> {
    fn do_frame(&mut self, input: &[u8]) -> Vec<u8> {
        let input = if input.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice::<Value>(input).unwrap_or_else(|e| {
                tracing::warn!(error = %e, bytes = input.len(), "Frame input is not JSON");
                Value::Null
            })
        };

        let mut output = Value::Null;
        self.game.update(self.frame_number, &input, &mut output);
        self.frame_number += 1;

        // Serializing a Value cannot fail: keys are always strings.
        serde_json::to_vec(&output).unwrap_or_default()
    }
}
