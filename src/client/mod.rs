//! Reliant - Client
//!
//! High-level API for Reliant clients.

#[allow(clippy::module_inception)]
mod client;

pub use client::*;
