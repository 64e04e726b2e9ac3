//! Plotwise library crate — re-exports all modules for integration testing.
//!
//! The binary crate (`main.rs`) is the actual overlay entry point.
//! This library crate exposes the same modules so that `tests/` integration
//! tests can import overlay types, systems, and resources without needing a
//! window or GPU.

pub mod shared;
pub mod prices;
pub mod valuation;
pub mod pairing;
pub mod rotation;
pub mod overlay;
pub mod demo;
