//! Simulation collaborators.
//!
//! The connection layer only knows the [`Simulation`] capability: one call per
//! frame, opaque bytes in, opaque bytes out. [`JsonSimulation`] adapts a
//! [`Game`] that works on JSON values, and [`triangle`] holds the demo game the
//! binary serves.

pub mod json;
pub mod triangle;

use std::cell::RefCell;
use std::rc::Rc;

pub use json::{Game, JsonSimulation};

/// Per-frame update of one simulation instance.
pub trait Simulation {
    /// Consumes one request body and produces the response body.
    fn do_frame(&mut self, input: &[u8]) -> Vec<u8>;
}

/// A simulation instance shared by every connection bound to it.
///
/// All connections run on one thread, so a `RefCell` is enough.
pub type SharedSimulation = Rc<RefCell<dyn Simulation>>;

/// Wraps a simulation for registration with the server.
pub fn shared<S: Simulation + 'static>(sim: S) -> SharedSimulation {
    Rc::new(RefCell::new(sim))
}
