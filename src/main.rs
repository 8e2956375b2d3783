//! # Secret Reflector
//!
//! One-shot job that mirrors secrets from HashiCorp Vault and Google Secret
//! Manager into Kubernetes secrets.
//!
//! The binary is a thin bootstrap around [`secret_reflector::Reflector`]:
//! load and validate the configuration file, construct authenticated
//! clients, run one reflection pass, and map the outcome to a process exit
//! status. Exit codes are stable so a scheduling layer can tell
//! configuration problems (2x) from client bootstrap problems (3x) from a
//! failed pass (40).

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use secret_reflector::config::{Config, SourceType};
use secret_reflector::constants::{
    EXIT_CONFIG_INVALID, EXIT_CONFIG_PARSE, EXIT_CONFIG_READ, EXIT_GSM_CLIENT, EXIT_K8S_CLIENT,
    EXIT_REFLECT, EXIT_USAGE, EXIT_VAULT_CLIENT,
};
use secret_reflector::provider::gsm::SecretManagerClient;
use secret_reflector::provider::vault::VaultClient;
use secret_reflector::sink::KubeSecretSink;
use secret_reflector::Reflector;

/// Mirror Vault and Secret Manager secrets into Kubernetes secrets.
#[derive(Debug, Parser)]
#[command(name = "secret-reflector", version, about)]
struct Cli {
    /// Path to the YAML configuration file.
    config: PathBuf,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // reqwest pulls in a second rustls provider; pin ring explicitly
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("rustls crypto provider was already installed");
    }

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() { EXIT_USAGE } else { 0 };
            let _ = err.print();
            process::exit(code);
        }
    };

    let config_text = match std::fs::read_to_string(&cli.config) {
        Ok(text) => text,
        Err(err) => {
            error!("error opening configuration file: {err}");
            process::exit(EXIT_CONFIG_READ);
        }
    };

    let mut config: Config = match serde_yaml::from_str(&config_text) {
        Ok(config) => config,
        Err(err) => {
            error!("error parsing configuration file: {err}");
            process::exit(EXIT_CONFIG_PARSE);
        }
    };

    config.set_defaults();

    if let Err(err) = config.validate() {
        error!("configuration error: {err}");
        process::exit(EXIT_CONFIG_INVALID);
    }

    let vault_client = match VaultClient::from_config(&config.vault).await {
        Ok(client) => client,
        Err(err) => {
            error!("unable to get vault client: {err:#}");
            process::exit(EXIT_VAULT_CLIENT);
        }
    };

    let sink = match kube::Client::try_default().await {
        Ok(client) => KubeSecretSink::new(client, &config.namespace),
        Err(err) => {
            error!("unable to get kubernetes client: {err}");
            process::exit(EXIT_K8S_CLIENT);
        }
    };

    let gsm_client = match build_gsm_client(&config).await {
        Ok(client) => client,
        Err(err) => {
            error!("unable to get secret manager client: {err:#}");
            process::exit(EXIT_GSM_CLIENT);
        }
    };

    let cancel = CancellationToken::new();
    spawn_signal_handler(cancel.clone());

    let mapping_count = config.mappings.len();
    let reflector = Reflector::new(
        Arc::new(vault_client),
        Arc::new(gsm_client),
        Arc::new(sink),
        config.label,
    );

    if let Err(err) = reflector.reflect(&cancel, &config.mappings).await {
        let err = anyhow::Error::new(err);
        error!("error reflecting secrets into kubernetes: {err:#}");
        process::exit(EXIT_REFLECT);
    }

    info!(
        namespace = %config.namespace,
        "reflected {mapping_count} mappings"
    );
}

/// Build the Secret Manager client.
///
/// Token acquisition talks to the metadata server, so it only happens when
/// some mapping actually reads from Secret Manager.
async fn build_gsm_client(config: &Config) -> Result<SecretManagerClient> {
    let needs_token = config
        .mappings
        .iter()
        .any(|mapping| mapping.source_type == SourceType::Gsm);

    let token = if needs_token {
        SecretManagerClient::fetch_access_token()
            .await
            .context("unable to acquire secret manager access token")?
    } else {
        String::new()
    };

    SecretManagerClient::new(config.gsm.endpoint.as_deref(), token)
}

/// Cancel the pass when the process is asked to stop.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("caught shutdown signal, cancelling reflection pass");
        cancel.cancel();
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!("unable to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
