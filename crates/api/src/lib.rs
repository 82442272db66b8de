//! HTTP API: token endpoint, security settings, login audit.

pub mod app;
pub mod config;
pub mod context;
pub mod middleware;
