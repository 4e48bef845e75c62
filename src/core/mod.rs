//! Core data types and I/O operations.

pub mod loaders;
pub mod writers;

pub use loaders::{DataCube, LoadError, RescaleFactors};
pub use writers::{write_assignments_csv, write_timing_log, WriteError};
