//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler and the record framing.
//! The hub itself (registry, queues, slow-consumer handling) lives in the
//! `sse` crate.

pub mod handler;
