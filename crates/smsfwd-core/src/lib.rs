//! Core domain + application logic for the SMS-to-email forwarder.
//!
//! This crate is intentionally platform-agnostic. The configuration store,
//! live-notification sink, durable job queue and email transport live behind
//! ports (traits) implemented in adapter crates / the daemon binary.

pub mod config;
pub mod delivery;
pub mod domain;
pub mod errors;
pub mod intake;
pub mod logging;
pub mod ports;
pub mod render;

pub use errors::{Error, Result};
