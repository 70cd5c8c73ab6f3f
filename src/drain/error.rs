use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single collaborator call (Kubernetes or ELB API)
///
/// Never returned by the resolver: transport errors are retried until the
/// deadline or, during convergence, count as "still serving".
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("ELB API error: {0}")]
    Elb(String),
}

/// Stage of the drain workflow, in the order the stages run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStage {
    ResolvingHostname,
    ResolvingLoadBalancer,
    ListingGroups,
    Converging,
}

impl DrainStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrainStage::ResolvingHostname => "resolving_hostname",
            DrainStage::ResolvingLoadBalancer => "resolving_load_balancer",
            DrainStage::ListingGroups => "listing_groups",
            DrainStage::Converging => "converging",
        }
    }
}

impl fmt::Display for DrainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a failed drain workflow
#[derive(Debug, Error)]
pub enum DrainError {
    #[error("ingress {0} not found")]
    IngressNotFound(String),

    #[error("No hostname for ingress {0}")]
    NoHostname(String),

    #[error("could not find load balancer for hostname {0}")]
    LoadBalancerNotFound(String),

    #[error("timed out after {max_delay:?} while {stage}")]
    Timeout {
        stage: DrainStage,
        max_delay: Duration,
    },
}

impl DrainError {
    /// True for the "drain target does not exist" family
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DrainError::IngressNotFound(_)
                | DrainError::NoHostname(_)
                | DrainError::LoadBalancerNotFound(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, DrainError::Timeout { .. })
    }
}
