//! Collector library for an APM REST API
//!
//! This crate provides the core functionality for:
//! - Advertising a static catalog of metric namespaces
//! - Collecting entity summary fields and metric time series
//! - De-duplicating upstream calls within one collection call
//! - Health checks and observability

pub mod catalog;
pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod facade;
pub mod health;
pub mod models;
pub mod namespace;
pub mod observability;
pub mod path;

pub use client::{ApmClient, HttpApmClient};
pub use config::{CollectOptions, ConfigPolicy, PluginConfig};
pub use error::{ClientError, CollectorError, PathError, Result};
pub use facade::{ClientFactory, Collector, CollectorBuilder};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use namespace::{Namespace, NamespaceElement};
pub use observability::{CollectorMetrics, StructuredLogger};
