//! Collector daemon surfaces: configuration and the HTTP API

pub mod api;
pub mod config;
