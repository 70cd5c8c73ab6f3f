//! HTTP server: drain delay endpoint, health probes, metrics, shutdown

pub mod gateway;
mod health;
pub mod metrics;
pub mod shutdown;

pub use health::{bind, build_router, run_server, ReadinessState, ServerState};
pub use metrics::{create_metrics, DrainMetrics, SharedMetrics};
pub use shutdown::{shutdown_channel, wait_for_signal, ShutdownController, ShutdownSignal};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "health_test.rs"]
mod health_tests;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "gateway_test.rs"]
mod gateway_tests;

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod shutdown_tests;
