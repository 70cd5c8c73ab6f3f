//! Cluster state reader: ingress → published load balancer hostname

use crate::drain::error::ApiError;
use async_trait::async_trait;
use k8s_openapi::api::networking::v1::Ingress;
use kube::Api;
use tracing::debug;

/// Result of looking an ingress up in the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngressLookup {
    /// The ingress publishes this load balancer hostname
    Hostname(String),
    /// The ingress exists but its status carries no hostname yet
    NoHostname,
    /// No ingress with that namespace/name
    Missing,
}

/// Read-only access to ingress resources
///
/// Production code uses `KubeIngressReader`. Tests use an in-memory fake.
#[async_trait]
pub trait IngressApi: Send + Sync {
    async fn lookup_hostname(&self, namespace: &str, name: &str)
        -> Result<IngressLookup, ApiError>;
}

/// `IngressApi` backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeIngressReader {
    client: kube::Client,
}

impl KubeIngressReader {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IngressApi for KubeIngressReader {
    async fn lookup_hostname(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<IngressLookup, ApiError> {
        let ingresses: Api<Ingress> = Api::namespaced(self.client.clone(), namespace);

        match ingresses.get(name).await {
            Ok(ingress) => {
                let hostname = published_hostname(&ingress);
                debug!(namespace, name, hostname = ?hostname, "Fetched ingress");
                Ok(hostname.map_or(IngressLookup::NoHostname, IngressLookup::Hostname))
            }
            Err(kube::Error::Api(err)) if err.code == 404 => Ok(IngressLookup::Missing),
            Err(e) => Err(ApiError::Kube(e)),
        }
    }
}

/// Hostname published in `status.loadBalancer.ingress`
///
/// When several entries carry a hostname the last one wins.
pub fn published_hostname(ingress: &Ingress) -> Option<String> {
    ingress
        .status
        .as_ref()
        .and_then(|status| status.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .and_then(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.hostname.as_deref())
                .filter(|hostname| !hostname.is_empty())
                .last()
                .map(str::to_string)
        })
}
