//! Load balancer directory: hostname → load balancer → IP target groups

use crate::drain::deadline::{Deadline, Elapsed};
use crate::drain::elb::{LoadBalancerApi, LoadBalancerRef, TargetGroupRef, TargetType};
use crate::drain::retry::retry_until_deadline;
use tracing::info;

/// Find the load balancer whose DNS name is exactly `hostname`
///
/// Returns the first match in listing order; DNS names are assumed unique.
/// Listing failures are retried until `deadline`. `Ok(None)` means a
/// listing succeeded and nothing matched, which is not retried.
pub async fn find_load_balancer_by_hostname(
    api: &dyn LoadBalancerApi,
    hostname: &str,
    deadline: &Deadline,
) -> Result<Option<LoadBalancerRef>, Elapsed> {
    let load_balancers =
        retry_until_deadline(deadline, "describe_load_balancers", || api.list_load_balancers())
            .await?;

    let found = load_balancers
        .into_iter()
        .find(|lb| lb.dns_name == hostname)
        .map(|lb| LoadBalancerRef(lb.arn));

    if found.is_none() {
        info!(hostname, "No load balancer with matching DNS name");
    }
    Ok(found)
}

/// Target groups of `load_balancer` whose members are IP addresses
///
/// Listing order is preserved. Listing failures are retried until
/// `deadline`.
pub async fn list_ip_target_groups(
    api: &dyn LoadBalancerApi,
    load_balancer: &LoadBalancerRef,
    deadline: &Deadline,
) -> Result<Vec<TargetGroupRef>, Elapsed> {
    let target_groups = retry_until_deadline(deadline, "describe_target_groups", || {
        api.list_target_groups(load_balancer)
    })
    .await?;

    let ip_groups: Vec<TargetGroupRef> = target_groups
        .into_iter()
        .filter(|tg| tg.target_type == TargetType::Ip)
        .map(|tg| TargetGroupRef(tg.arn))
        .collect();

    info!(
        load_balancer = %load_balancer,
        count = ip_groups.len(),
        "Found target groups with IP targets"
    );
    Ok(ip_groups)
}
