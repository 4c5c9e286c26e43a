//! # nsgroup-sync
//!
//! Keeps one Keycloak group per namespace and postfix.
//!
//! ## Startup Sequence
//!
//! 1. **Configuration** - file and environment, validated before anything
//!    touches the network
//! 2. **Keycloak** - admin client for the target realm; no request yet
//! 3. **Policy** - the namespace filter is compiled; a bad pattern stops here
//! 4. **Kubernetes** - kubeconfig or in-cluster client
//! 5. **Sync loop** - bulk sync, then namespace events until a stop signal
//!
//! Any failure before the loop starts watching exits with status 1.
//!
//! ## Shutdown
//!
//! SIGINT and SIGTERM stop the loop after the event in flight.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use nsgroup_keycloak::{KeycloakClient, KeycloakDirectory};
use nsgroup_kube::KubeNamespaces;
use nsgroup_reconciler::{LoopConfig, ReconcilerBuilder, SyncLoop};
use nsgroup_sync::{Cli, Config, LogFormat};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format, &cli.log_level);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = format!("{err:#}"), "nsgroup-sync failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let start_time = Instant::now();

    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    info!(
        namespace_filter = %config.namespace_filter,
        group_postfixes = ?config.group_postfixes,
        groups_prefix = %config.groups_prefix,
        label_selector = ?config.label_selector,
        keycloak_url = %config.keycloak.base_url,
        realm = %config.keycloak.realm,
        "Configuration loaded"
    );

    let keycloak =
        KeycloakClient::new(config.keycloak.clone()).context("Failed to build Keycloak client")?;
    let reconciler = ReconcilerBuilder::new()
        .with_directory(Arc::new(KeycloakDirectory::new(keycloak)))
        .filter(config.namespace_filter.clone())
        .postfixes(config.group_postfixes.clone())
        .prefix(config.groups_prefix.clone())
        .build()
        .context("Invalid sync policy")?;

    let namespaces = Arc::new(
        KubeNamespaces::try_default(config.label_selector.clone())
            .await
            .context("Failed to connect to the Kubernetes cluster")?,
    );

    let mut sync_loop = SyncLoop::new(
        Arc::new(reconciler),
        namespaces.clone(),
        namespaces,
        LoopConfig::default(),
    );

    if cli.once {
        let report = sync_loop.sync_once().await.context("Startup sync failed")?;
        info!(
            created = report.created().len(),
            deleted = report.deleted().len(),
            failed = report.actions_failed.len(),
            elapsed_secs = start_time.elapsed().as_secs_f64(),
            "Sync complete"
        );
        if !report.all_succeeded() {
            bail!(
                "{} group action(s) failed: {:?}",
                report.actions_failed.len(),
                report.failed_groups()
            );
        }
        return Ok(());
    }

    let stopper = sync_loop.stopper();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        stopper.stop();
    });

    let summary = sync_loop.run().await.context("Sync loop failed")?;
    info!(
        events_handled = summary.events_handled,
        events_failed = summary.events_failed,
        actions_failed = summary.actions_failed,
        stopped = summary.stopped,
        uptime_secs = start_time.elapsed().as_secs(),
        "Sync loop finished"
    );
    Ok(())
}

/// Initialize tracing with an env filter and the chosen output format.
///
/// `RUST_LOG` takes precedence over `--log-level`.
fn init_tracing(format: LogFormat, level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Wait for Ctrl+C or, on Unix, SIGTERM.
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, stopping"),
        () = terminate => info!("Received SIGTERM, stopping"),
    }
}
