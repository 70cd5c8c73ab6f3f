use aws_sdk_elasticloadbalancingv2::config::Region;
use drain_delay::config::AppConfig;
use drain_delay::drain::{DrainResolver, ElbClient, KubeIngressReader};
use drain_delay::server::{
    bind, create_metrics, run_server, shutdown_channel, wait_for_signal, ReadinessState,
    ServerState,
};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Kubernetes client from an explicit kubeconfig, or the in-cluster/default config
async fn kube_client(config: &AppConfig) -> anyhow::Result<Client> {
    let client = match &config.kubeconfig {
        Some(path) => {
            info!(path = %path.display(), "Using kubeconfig file");
            let kubeconfig = Kubeconfig::read_from(path)?;
            let kube_config =
                kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await?;
            Client::try_from(kube_config)?
        }
        None => Client::try_default().await?,
    };
    Ok(client)
}

/// AWS SDK config with the optional profile and region applied
async fn aws_sdk_config(config: &AppConfig) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(profile) = &config.aws_profile {
        info!(profile = %profile, "Using AWS profile");
        loader = loader.profile_name(profile);
    }
    if let Some(region) = &config.aws_region {
        info!(region = %region, "Using AWS region");
        loader = loader.region(Region::new(region.clone()));
    }
    if config.aws_profile.is_none() && config.aws_region.is_none() {
        info!("Using default AWS config");
    }
    loader.load().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // kube and the AWS SDK both use rustls; pick one provider for the process
    let _ = rustls::crypto::ring::default_provider().install_default();

    info!("Starting drain delay server");

    let config = match AppConfig::try_load() {
        Ok(config) => config,
        Err(e) => e.exit(),
    };
    let readiness = ReadinessState::new();
    let metrics = create_metrics()?;

    let client = match kube_client(&config).await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to create Kubernetes client");
            return Err(e);
        }
    };
    info!("Kubernetes client configured");

    let sdk_config = aws_sdk_config(&config).await;
    let resolver = Arc::new(DrainResolver::new(
        Arc::new(KubeIngressReader::new(client)),
        Arc::new(ElbClient::from_conf(&sdk_config)),
    ));

    let listener = bind(config.port).await?;
    let (shutdown_controller, shutdown_signal) = shutdown_channel();
    let state = ServerState::new(resolver, readiness.clone(), metrics);
    let mut server = tokio::spawn(run_server(listener, state, shutdown_signal));

    readiness.set_ready();
    info!(port = config.port, "Ready to delay pod termination");

    tokio::select! {
        result = &mut server => {
            // The server only returns on its own when it fails
            readiness.set_not_ready();
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.into()),
                Err(e) => Err(e.into()),
            };
        }
        signal = wait_for_signal() => {
            let signal = signal?;
            info!(signal, "Closing server");
        }
    }

    readiness.set_not_ready();
    shutdown_controller.shutdown();

    match tokio::time::timeout(config.shutdown_timeout, &mut server).await {
        Ok(Ok(Ok(()))) => {
            info!("Successfully closed server");
            Ok(())
        }
        Ok(Ok(Err(e))) => {
            error!(error = %e, "Server failed during shutdown");
            Err(e.into())
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => {
            warn!(
                timeout = ?config.shutdown_timeout,
                "In-flight drain requests did not finish before the shutdown timeout"
            );
            server.abort();
            anyhow::bail!("shutdown timed out after {:?}", config.shutdown_timeout)
        }
    }
}
