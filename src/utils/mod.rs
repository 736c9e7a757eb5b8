//! # Utility Modules
//!
//! Supporting concerns shared by the services.
//!
//! ## Components
//! - **Metrics**: thread-safe relay counters
//! - **Logging**: `tracing-subscriber` setup from `LoggingConfig`

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
