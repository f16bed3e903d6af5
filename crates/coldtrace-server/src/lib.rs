//! # coldtrace-server
//!
//! HTTP server library for the coldtrace sensor ingestion service.
//!
//! This library provides the API handlers, the live WebSocket feed and the
//! state shared between them.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;
