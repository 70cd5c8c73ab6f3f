//! Drain resolution: ingress → load balancer → IP target groups → wait
//!
//! `DrainResolver` runs the workflow against two collaborator traits:
//! - `IngressApi` for the cluster (`KubeIngressReader`)
//! - `LoadBalancerApi` for the load balancer control plane (`ElbClient`)

pub mod deadline;
pub mod directory;
pub mod elb;
pub mod error;
pub mod ingress;
pub mod request;
pub mod resolver;
pub mod retry;

#[cfg(test)]
pub mod fake;

pub use deadline::{Deadline, Elapsed};
pub use elb::{ElbClient, LoadBalancerApi, MemberHealth, TargetState};
pub use error::{ApiError, DrainError, DrainStage};
pub use ingress::{IngressApi, IngressLookup, KubeIngressReader};
pub use request::{DrainParams, DrainRequest, RequestError, DEFAULT_MAX_DELAY};
pub use resolver::{DrainReport, DrainResolver, POLL_INTERVAL};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[path = "resolver_test.rs"]
mod resolver_tests;
