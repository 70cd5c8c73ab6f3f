use crate::drain::deadline::{Deadline, Elapsed};
use crate::drain::directory::{find_load_balancer_by_hostname, list_ip_target_groups};
use crate::drain::elb::{LoadBalancerApi, TargetGroupRef};
use crate::drain::error::{DrainError, DrainStage};
use crate::drain::ingress::{IngressApi, IngressLookup};
use crate::drain::request::DrainRequest;
use crate::drain::retry::retry_until_deadline;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Pause between two passes over the target groups still serving the IP
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Summary of a successful drain wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainReport {
    /// IP target groups found behind the load balancer
    pub target_groups: usize,
    /// Convergence passes run (zero when there was nothing to watch)
    pub iterations: u32,
    pub elapsed: Duration,
}

/// Waits for an IP to drain from the load balancer behind an ingress
///
/// Holds the long-lived collaborator clients; cheap to share behind an
/// `Arc` between concurrent requests. Each call to `delay_until_drain`
/// keeps its own deadline and working set.
pub struct DrainResolver {
    ingress: Arc<dyn IngressApi>,
    load_balancers: Arc<dyn LoadBalancerApi>,
}

impl DrainResolver {
    pub fn new(ingress: Arc<dyn IngressApi>, load_balancers: Arc<dyn LoadBalancerApi>) -> Self {
        Self {
            ingress,
            load_balancers,
        }
    }

    /// Block until `request.target_ip()` is no longer served by any IP
    /// target group of the ingress's load balancer
    ///
    /// Runs hostname → load balancer → target groups → convergence in
    /// order, all under one deadline of `request.max_delay()`.
    ///
    /// # Returns
    /// * `Ok(DrainReport)` - the IP is draining or unused everywhere, or
    ///   there was no IP target group to watch
    /// * `Err(DrainError::Timeout)` - the deadline passed first
    /// * `Err(_)` - the ingress, its hostname, or its load balancer does not exist
    pub async fn delay_until_drain(
        &self,
        request: &DrainRequest,
    ) -> Result<DrainReport, DrainError> {
        let started = Instant::now();
        let max_delay = request.max_delay();
        let deadline = Deadline::after(max_delay);
        let timeout = move |stage: DrainStage| {
            move |_: Elapsed| {
                warn!(stage = %stage, max_delay = ?max_delay, "Drain delay timed out");
                DrainError::Timeout { stage, max_delay }
            }
        };

        info!(
            ip = %request.target_ip(),
            ingress = %request.ingress_key(),
            max_delay = ?max_delay,
            "Beginning drain delay"
        );

        let hostname = self
            .resolve_hostname(request, &deadline)
            .await
            .map_err(timeout(DrainStage::ResolvingHostname))??;

        let load_balancer =
            find_load_balancer_by_hostname(self.load_balancers.as_ref(), &hostname, &deadline)
                .await
                .map_err(timeout(DrainStage::ResolvingLoadBalancer))?
                .ok_or_else(|| DrainError::LoadBalancerNotFound(hostname.clone()))?;
        debug!(hostname = %hostname, load_balancer = %load_balancer, "Resolved load balancer");

        let target_groups =
            list_ip_target_groups(self.load_balancers.as_ref(), &load_balancer, &deadline)
                .await
                .map_err(timeout(DrainStage::ListingGroups))?;
        let group_count = target_groups.len();

        let iterations = self
            .wait_until_drained(request.target_ip(), target_groups, &deadline)
            .await
            .map_err(timeout(DrainStage::Converging))?;

        let report = DrainReport {
            target_groups: group_count,
            iterations,
            elapsed: started.elapsed(),
        };
        info!(
            ip = %request.target_ip(),
            ingress = %request.ingress_key(),
            iterations = report.iterations,
            elapsed = ?report.elapsed,
            "No more target groups using IP"
        );
        Ok(report)
    }

    /// Published hostname of the request's ingress
    ///
    /// The outer error is the deadline; the inner one is a terminal
    /// not-found outcome.
    async fn resolve_hostname(
        &self,
        request: &DrainRequest,
        deadline: &Deadline,
    ) -> Result<Result<String, DrainError>, Elapsed> {
        let ingress = self.ingress.as_ref();
        let (namespace, name) = (request.ingress_namespace(), request.ingress_name());

        let lookup = retry_until_deadline(deadline, "get_ingress", || {
            ingress.lookup_hostname(namespace, name)
        })
        .await?;

        Ok(match lookup {
            IngressLookup::Hostname(hostname) => Ok(hostname),
            IngressLookup::NoHostname => {
                info!(ingress = %request.ingress_key(), "No hostname for ingress");
                Err(DrainError::NoHostname(request.ingress_key()))
            }
            IngressLookup::Missing => {
                info!(ingress = %request.ingress_key(), "Ingress not found");
                Err(DrainError::IngressNotFound(request.ingress_key()))
            }
        })
    }

    /// Convergence loop: poll until no target group still serves `ip`
    ///
    /// The working set only ever shrinks. A group leaves it when its health
    /// report has no serving record for `ip`; a failed health lookup keeps
    /// it. The deadline is checked before every group, not once per pass.
    /// Returns the number of passes run.
    async fn wait_until_drained(
        &self,
        ip: IpAddr,
        target_groups: Vec<TargetGroupRef>,
        deadline: &Deadline,
    ) -> Result<u32, Elapsed> {
        let mut remaining = target_groups;
        let mut iterations: u32 = 0;

        while !remaining.is_empty() {
            iterations += 1;
            debug!(
                ip = %ip,
                iteration = iterations,
                count = remaining.len(),
                "Searching target groups to see if IP is draining"
            );

            let mut still_serving = Vec::with_capacity(remaining.len());
            for group in remaining {
                if deadline.is_expired() {
                    return Err(Elapsed);
                }
                if self.still_serving(ip, &group, deadline).await? {
                    still_serving.push(group);
                }
            }

            remaining = still_serving;
            if !remaining.is_empty() {
                deadline.sleep(POLL_INTERVAL).await?;
            }
        }

        Ok(iterations)
    }

    /// Whether `group` must stay in the working set
    async fn still_serving(
        &self,
        ip: IpAddr,
        group: &TargetGroupRef,
        deadline: &Deadline,
    ) -> Result<bool, Elapsed> {
        match deadline
            .run(self.load_balancers.describe_target_health(group))
            .await?
        {
            Ok(members) => {
                let serving = members.iter().find(|m| m.is_ip(ip) && m.state.is_serving());
                if let Some(member) = serving {
                    info!(
                        ip = %ip,
                        target_group = %group,
                        state = %member.state,
                        "Found IP in target group"
                    );
                }
                Ok(serving.is_some())
            }
            Err(e) => {
                warn!(
                    target_group = %group,
                    error = %e,
                    "Failed to describe target health, assuming IP still serving"
                );
                Ok(true)
            }
        }
    }
}

impl std::fmt::Debug for DrainResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrainResolver").finish_non_exhaustive()
    }
}
