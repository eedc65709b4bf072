//! Test-only fixtures shared by this crate's own unit/integration tests.
//!
//! Not part of the public API: compiled only under `#[cfg(test)]` and
//! invisible to any downstream crate.

pub mod fake;
pub mod fake_transport;
