//! Registry and runner of gradient experiments.
//!
//! Experiments are grouped by test suite (`TS-xxxx`) and use case (`UC-xxxx`).
//! Running them produces one GGUF reference file per experiment and,
//! optionally, a rendering of the traced computation.

pub mod cases;
pub mod references;

mod config;
mod registry;
mod runner;

pub use config::RunConfig;
pub use registry::{ExecFn, Executable, Outcome, Registry};
pub use runner::{exec_and_store, execute, execute_one, store, ExperimentResult, StoredExperiment};
