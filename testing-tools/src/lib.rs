// Testing Tools Library
//
// This crate provides testing utilities and tools for the notification hub.
// Currently includes:
// - sse-test-client: SSE integration testing tool run against a live server

pub mod api_client;
pub mod output;
pub mod scenarios;
pub mod sse_client;
