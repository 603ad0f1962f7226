//! # ecosense-server
//!
//! HTTP server library for ecosense.
//!
//! This library provides the API handlers, logging setup, and shared state
//! that host the polling coordinator.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;

#[cfg(test)]
mod test_support;
