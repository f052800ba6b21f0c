//! Domain layer: core models, errors, and collaborator ports.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{StoreError, SweepError, SweepResult, TransportError};
