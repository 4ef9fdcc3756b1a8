//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields (`provider_id`, `execution_id`) on every event
//! - Each fallback execution runs inside a span carrying its execution id
//! - Metrics are cheap (atomic operations behind the facade)

pub mod logging;
pub mod metrics;
