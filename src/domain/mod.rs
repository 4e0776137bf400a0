//! Domain layer: pure types and functions with no I/O.

pub mod connection;
pub mod reading;
pub mod sensor;
