//! Load balancer control plane: load balancers, target groups, target health
//!
//! `LoadBalancerApi` is the raw request/response surface. Matching,
//! filtering and retries live in `directory` and `resolver`.

use crate::drain::error::ApiError;
use async_trait::async_trait;
use aws_sdk_elasticloadbalancingv2::error::DisplayErrorContext;
use aws_sdk_elasticloadbalancingv2::types as elbv2;
use aws_sdk_elasticloadbalancingv2::Client;
use std::fmt;
use std::net::IpAddr;

/// A load balancer as listed by the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancer {
    pub arn: String,
    pub dns_name: String,
}

/// Identifier (ARN) of a load balancer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadBalancerRef(pub String);

impl fmt::Display for LoadBalancerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Member type of a target group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetType {
    Instance,
    Ip,
    Lambda,
    Alb,
    Other(String),
}

impl From<&str> for TargetType {
    fn from(value: &str) -> Self {
        match value {
            "instance" => TargetType::Instance,
            "ip" => TargetType::Ip,
            "lambda" => TargetType::Lambda,
            "alb" => TargetType::Alb,
            other => TargetType::Other(other.to_string()),
        }
    }
}

/// A target group attached to a load balancer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroup {
    pub arn: String,
    pub target_type: TargetType,
}

/// Identifier (ARN) of a target group whose members are IP addresses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetGroupRef(pub String);

impl fmt::Display for TargetGroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health state of a registered target, as reported by the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetState {
    Initial,
    Healthy,
    Unhealthy,
    UnhealthyDraining,
    Unused,
    Draining,
    Unavailable,
    Unknown(String),
}

impl TargetState {
    /// False once the load balancer no longer routes new traffic to the target
    ///
    /// Only `Draining` and `Unused` count as drained; anything else keeps
    /// the target group under watch.
    pub fn is_serving(&self) -> bool {
        !matches!(self, TargetState::Draining | TargetState::Unused)
    }
}

impl From<&str> for TargetState {
    fn from(value: &str) -> Self {
        match value {
            "initial" => TargetState::Initial,
            "healthy" => TargetState::Healthy,
            "unhealthy" => TargetState::Unhealthy,
            "unhealthy.draining" => TargetState::UnhealthyDraining,
            "unused" => TargetState::Unused,
            "draining" => TargetState::Draining,
            "unavailable" => TargetState::Unavailable,
            other => TargetState::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for TargetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TargetState::Initial => "initial",
            TargetState::Healthy => "healthy",
            TargetState::Unhealthy => "unhealthy",
            TargetState::UnhealthyDraining => "unhealthy.draining",
            TargetState::Unused => "unused",
            TargetState::Draining => "draining",
            TargetState::Unavailable => "unavailable",
            TargetState::Unknown(other) => other,
        };
        f.write_str(s)
    }
}

/// Health record of one member of a target group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberHealth {
    pub id: String,
    pub port: Option<i32>,
    pub state: TargetState,
}

impl MemberHealth {
    /// Whether this record describes `ip`
    ///
    /// Compared as parsed addresses so differently written IPv6 forms match.
    pub fn is_ip(&self, ip: IpAddr) -> bool {
        self.id.parse::<IpAddr>().is_ok_and(|id| id == ip)
    }
}

/// Read-only access to the load balancer control plane
///
/// Production code uses `ElbClient`. Tests use an in-memory fake.
#[async_trait]
pub trait LoadBalancerApi: Send + Sync {
    /// Every load balancer visible to the caller, in listing order
    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>, ApiError>;

    /// Every target group attached to `load_balancer`, in listing order
    async fn list_target_groups(
        &self,
        load_balancer: &LoadBalancerRef,
    ) -> Result<Vec<TargetGroup>, ApiError>;

    /// Health of every member currently registered in `target_group`
    async fn describe_target_health(
        &self,
        target_group: &TargetGroupRef,
    ) -> Result<Vec<MemberHealth>, ApiError>;
}

/// `LoadBalancerApi` backed by the AWS ELBv2 API
#[derive(Clone)]
pub struct ElbClient {
    client: Client,
}

impl ElbClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

fn elb_error<E: std::error::Error>(err: E) -> ApiError {
    ApiError::Elb(DisplayErrorContext(err).to_string())
}

/// Entries without an ARN or DNS name cannot be matched and are skipped
fn load_balancer(lb: &elbv2::LoadBalancer) -> Option<LoadBalancer> {
    Some(LoadBalancer {
        arn: lb.load_balancer_arn()?.to_string(),
        dns_name: lb.dns_name()?.to_string(),
    })
}

fn target_group(tg: &elbv2::TargetGroup) -> Option<TargetGroup> {
    Some(TargetGroup {
        arn: tg.target_group_arn()?.to_string(),
        target_type: tg
            .target_type()
            .map(|t| TargetType::from(t.as_str()))
            .unwrap_or_else(|| TargetType::Other(String::new())),
    })
}

/// A record without a target id is skipped; one without a state is `Unknown`
fn member_health(description: &elbv2::TargetHealthDescription) -> Option<MemberHealth> {
    let target = description.target()?;
    let state = description
        .target_health()
        .and_then(|health| health.state())
        .map(|state| TargetState::from(state.as_str()))
        .unwrap_or_else(|| TargetState::Unknown(String::new()));
    Some(MemberHealth {
        id: target.id()?.to_string(),
        port: target.port(),
        state,
    })
}

#[async_trait]
impl LoadBalancerApi for ElbClient {
    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>, ApiError> {
        let mut load_balancers = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .client
                .describe_load_balancers()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(elb_error)?;

            load_balancers.extend(page.load_balancers().iter().filter_map(load_balancer));

            match page.next_marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => return Ok(load_balancers),
            }
        }
    }

    async fn list_target_groups(
        &self,
        load_balancer: &LoadBalancerRef,
    ) -> Result<Vec<TargetGroup>, ApiError> {
        let mut target_groups = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let page = self
                .client
                .describe_target_groups()
                .load_balancer_arn(&load_balancer.0)
                .set_marker(marker.take())
                .send()
                .await
                .map_err(elb_error)?;

            target_groups.extend(page.target_groups().iter().filter_map(target_group));

            match page.next_marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => return Ok(target_groups),
            }
        }
    }

    async fn describe_target_health(
        &self,
        target_group: &TargetGroupRef,
    ) -> Result<Vec<MemberHealth>, ApiError> {
        let output = self
            .client
            .describe_target_health()
            .target_group_arn(&target_group.0)
            .send()
            .await
            .map_err(elb_error)?;

        Ok(output
            .target_health_descriptions()
            .iter()
            .filter_map(member_health)
            .collect())
    }
}
