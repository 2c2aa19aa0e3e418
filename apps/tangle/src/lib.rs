//! # Tangle Library
//!
//! Library surface of the tangle binary, exposed for integration tests.

pub mod api;
pub mod cli;
pub mod config;
pub mod logging;
