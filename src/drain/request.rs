use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Max delay applied when the caller does not send `max-delay`
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("{0} must be in query param")]
    Missing(&'static str),

    #[error("ip '{0}' is not a valid IP address")]
    InvalidIp(String),

    #[error("max-delay '{0}' must be a non-negative number of seconds")]
    InvalidMaxDelay(String),
}

/// Raw query parameters of a drain-delay call
///
/// Every field is optional here so that missing values are reported by
/// `DrainRequest::from_params` with a field-specific message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrainParams {
    pub ip: Option<String>,
    pub namespace: Option<String>,
    pub ingress: Option<String>,
    #[serde(rename = "max-delay")]
    pub max_delay: Option<String>,
}

/// A validated request to wait for an IP to drain
///
/// Construction is the only place validation happens: a `DrainRequest`
/// that exists always has a parsed IP and non-empty ingress coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainRequest {
    target_ip: IpAddr,
    max_delay: Duration,
    ingress_namespace: String,
    ingress_name: String,
}

impl DrainRequest {
    pub fn new(
        target_ip: &str,
        ingress_namespace: &str,
        ingress_name: &str,
        max_delay: Option<Duration>,
    ) -> Result<Self, RequestError> {
        let target_ip = parse_ip(target_ip)?;
        let ingress_namespace = require("namespace", ingress_namespace)?;
        let ingress_name = require("ingress", ingress_name)?;

        Ok(Self {
            target_ip,
            max_delay: max_delay.unwrap_or(DEFAULT_MAX_DELAY),
            ingress_namespace,
            ingress_name,
        })
    }

    /// Build a request from query parameters
    ///
    /// Fields are checked in the order `max-delay`, `ip`, `namespace`,
    /// `ingress`; the first problem found is returned.
    pub fn from_params(params: &DrainParams) -> Result<Self, RequestError> {
        let max_delay = match params.max_delay.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(parse_max_delay(raw)?),
        };

        Self::new(
            params.ip.as_deref().unwrap_or_default(),
            params.namespace.as_deref().unwrap_or_default(),
            params.ingress.as_deref().unwrap_or_default(),
            max_delay,
        )
    }

    pub fn target_ip(&self) -> IpAddr {
        self.target_ip
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    pub fn ingress_namespace(&self) -> &str {
        &self.ingress_namespace
    }

    pub fn ingress_name(&self) -> &str {
        &self.ingress_name
    }

    /// `namespace/name` of the ingress, for logs and error messages
    pub fn ingress_key(&self) -> String {
        format!("{}/{}", self.ingress_namespace, self.ingress_name)
    }
}

fn require(field: &'static str, value: &str) -> Result<String, RequestError> {
    if value.is_empty() {
        return Err(RequestError::Missing(field));
    }
    Ok(value.to_string())
}

fn parse_ip(raw: &str) -> Result<IpAddr, RequestError> {
    if raw.is_empty() {
        return Err(RequestError::Missing("ip"));
    }
    raw.parse()
        .map_err(|_| RequestError::InvalidIp(raw.to_string()))
}

fn parse_max_delay(raw: &str) -> Result<Duration, RequestError> {
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| RequestError::InvalidMaxDelay(raw.to_string()))
}
