//! Domain layer for the lottery decision engine.
//!
//! Pure types, the draw error taxonomy, and the ports (traits) the
//! services are wired against.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DrawError, DrawResult};
