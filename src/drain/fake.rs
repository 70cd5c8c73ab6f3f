//! In-memory collaborators for tests

use crate::drain::elb::{
    LoadBalancer, LoadBalancerApi, LoadBalancerRef, MemberHealth, TargetGroup, TargetGroupRef,
    TargetState,
};
use crate::drain::error::ApiError;
use crate::drain::ingress::{IngressApi, IngressLookup};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Consume one scripted failure, if any are left
fn take_failure(remaining: &AtomicU32) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Fake cluster with a fixed set of ingresses
#[derive(Default)]
pub struct FakeIngress {
    lookups: HashMap<(String, String), IngressLookup>,
    failures: AtomicU32,
    calls: AtomicU32,
}

impl FakeIngress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hostname(mut self, namespace: &str, name: &str, hostname: &str) -> Self {
        self.lookups.insert(
            (namespace.to_string(), name.to_string()),
            IngressLookup::Hostname(hostname.to_string()),
        );
        self
    }

    pub fn without_hostname(mut self, namespace: &str, name: &str) -> Self {
        self.lookups.insert(
            (namespace.to_string(), name.to_string()),
            IngressLookup::NoHostname,
        );
        self
    }

    /// Fail the next `count` lookups with a transport error
    pub fn fail_lookups(self, count: u32) -> Self {
        self.failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IngressApi for FakeIngress {
    async fn lookup_hostname(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<IngressLookup, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failures) {
            return Err(ApiError::Elb("connection refused".to_string()));
        }
        Ok(self
            .lookups
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .unwrap_or(IngressLookup::Missing))
    }
}

/// One scripted answer of `describe_target_health`
#[derive(Debug, Clone)]
pub enum HealthPoll {
    Members(Vec<MemberHealth>),
    Fail,
}

/// Shorthand for a health record of `ip` on port 80
pub fn member(ip: &str, state: TargetState) -> MemberHealth {
    MemberHealth {
        id: ip.to_string(),
        port: Some(80),
        state,
    }
}

/// Fake load balancer control plane
///
/// Target health is scripted per target group: each call consumes the next
/// `HealthPoll`, and the last one repeats forever. Groups without a script
/// report no members.
#[derive(Default)]
pub struct FakeElb {
    load_balancers: Vec<LoadBalancer>,
    target_groups: HashMap<String, Vec<TargetGroup>>,
    health: Mutex<HashMap<String, VecDeque<HealthPoll>>>,
    health_latency: Duration,
    load_balancer_failures: AtomicU32,
    target_group_failures: AtomicU32,
    load_balancer_calls: AtomicU32,
    target_group_calls: AtomicU32,
    health_calls: Mutex<Vec<String>>,
}

impl FakeElb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load_balancers(mut self, load_balancers: Vec<LoadBalancer>) -> Self {
        self.load_balancers = load_balancers;
        self
    }

    pub fn with_target_groups(
        mut self,
        load_balancer: &LoadBalancerRef,
        target_groups: Vec<TargetGroup>,
    ) -> Self {
        self.target_groups
            .insert(load_balancer.0.clone(), target_groups);
        self
    }

    pub fn with_health(self, target_group: &str, polls: Vec<HealthPoll>) -> Self {
        self.health
            .lock()
            .expect("health script lock poisoned")
            .insert(target_group.to_string(), polls.into());
        self
    }

    /// Delay every `describe_target_health` answer by `latency`
    pub fn with_health_latency(mut self, latency: Duration) -> Self {
        self.health_latency = latency;
        self
    }

    pub fn fail_load_balancer_listings(self, count: u32) -> Self {
        self.load_balancer_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn fail_target_group_listings(self, count: u32) -> Self {
        self.target_group_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn load_balancer_calls(&self) -> u32 {
        self.load_balancer_calls.load(Ordering::SeqCst)
    }

    pub fn target_group_calls(&self) -> u32 {
        self.target_group_calls.load(Ordering::SeqCst)
    }

    /// Target groups passed to `describe_target_health`, in call order
    pub fn health_calls(&self) -> Vec<String> {
        self.health_calls
            .lock()
            .expect("health call log lock poisoned")
            .clone()
    }
}

#[async_trait]
impl LoadBalancerApi for FakeElb {
    async fn list_load_balancers(&self) -> Result<Vec<LoadBalancer>, ApiError> {
        self.load_balancer_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.load_balancer_failures) {
            return Err(ApiError::Elb("throttled".to_string()));
        }
        Ok(self.load_balancers.clone())
    }

    async fn list_target_groups(
        &self,
        load_balancer: &LoadBalancerRef,
    ) -> Result<Vec<TargetGroup>, ApiError> {
        self.target_group_calls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.target_group_failures) {
            return Err(ApiError::Elb("throttled".to_string()));
        }
        Ok(self
            .target_groups
            .get(&load_balancer.0)
            .cloned()
            .unwrap_or_default())
    }

    async fn describe_target_health(
        &self,
        target_group: &TargetGroupRef,
    ) -> Result<Vec<MemberHealth>, ApiError> {
        self.health_calls
            .lock()
            .expect("health call log lock poisoned")
            .push(target_group.0.clone());

        if !self.health_latency.is_zero() {
            tokio::time::sleep(self.health_latency).await;
        }

        let poll = {
            let mut scripts = self.health.lock().expect("health script lock poisoned");
            match scripts.get_mut(&target_group.0) {
                Some(polls) if polls.len() > 1 => polls.pop_front(),
                Some(polls) => polls.front().cloned(),
                None => None,
            }
        };

        match poll {
            Some(HealthPoll::Members(members)) => Ok(members),
            Some(HealthPoll::Fail) => Err(ApiError::Elb("target group not found".to_string())),
            None => Ok(Vec::new()),
        }
    }
}
