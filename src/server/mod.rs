//! Reliant - Server
//!
//! High-level API for Reliant servers.

#[allow(clippy::module_inception)]
mod server;

pub use server::*;
