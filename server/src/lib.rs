//! Relay server library.
//!
//! This module exposes the server components for use in tests and binaries.

pub mod config;
pub mod events;
pub mod registry;
pub mod session;
pub mod ws;
