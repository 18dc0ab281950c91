//! Prometheus metrics for the delayed-execution engine.
//!
//! [`PrometheusMetrics`] is a [`deferd_core::Subscribe`] implementation: register it with the
//! scheduler and it counts every task event.
//!
//! ## Metrics
//! - `deferd_task_events_total{event}` - Counter, one series per event kind
//! - `deferd_tasks_in_flight` - Gauge, tasks currently holding an admission slot
//!
//! ## HTTP Server
//! This crate does NOT serve `/metrics`. Mount [`PrometheusMetrics::encode`] on the
//! application's own router:
//!
//! ```rust,ignore
//! async fn metrics_handler(State(metrics): State<PrometheusMetrics>) -> Response {
//!     match metrics.encode() {
//!         Ok(body) => ([(CONTENT_TYPE, metrics.content_type())], body).into_response(),
//!         Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
//!     }
//! }
//! ```

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::{Encoder, Registry, TextEncoder};
