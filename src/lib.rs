//! drain-delay: hold a pod's preStop hook until its IP has drained from the
//! load balancer target groups behind an ingress.

pub mod config;
pub mod drain;
pub mod server;
