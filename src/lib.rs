// ABOUTME: Library root for tether - exposes the gateway, transport and config types.
// ABOUTME: The CLI binary is in main.rs.

pub mod config;
pub mod error;
pub mod gateway;
pub mod output;
pub mod ssh;
pub mod types;
