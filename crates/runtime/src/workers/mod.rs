//! Background tasks internal to the runtime.

mod simulation;

pub use simulation::{Command, SimulationWorker};
