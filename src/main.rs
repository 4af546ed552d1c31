use std::io::IsTerminal;

use clap::Parser;
use k8s_openapi::api::core::v1::Pod;
use kube::Api;
use kube::runtime::watcher::Config as WatcherConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use kubetail::cli::{Cli, ColorMode};
use kubetail::config::Config;
use kubetail::error::Error;
use kubetail::kubernetes::{self, KubePodLogClient};
use kubetail::sink::Sink;
use kubetail::supervisor::Supervisor;
use kubetail::watcher;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        error!("{err}");
        std::process::exit(err.exit_code());
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Assembles the client, the Watcher's event source, and the Supervisor,
/// then runs the engine to completion. Returns once a SIGINT has been
/// observed and every live Tail has shut down cleanly.
async fn run(cli: Cli) -> Result<(), Error> {
    let color = cli.color;
    let config = Config::from_cli(cli)?;

    info!(namespace = %config.namespace, pod_query = %config.pod_query, "starting kubectl-tail");

    let client = kubernetes::build_client(&config).await?;
    let pods_api: Api<Pod> = Api::namespaced(client.clone(), &config.namespace);
    kubernetes::probe_namespace(&pods_api).await?;

    let use_color = match color {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::stdout().is_terminal(),
    };

    let cancel = CancellationToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_for_signal.cancel();
        }
    });

    let events = kubernetes::pod_events(pods_api, WatcherConfig::default());
    let (added, removed) = watcher::watch(
        events,
        cancel.clone(),
        config.pod_query.clone(),
        config.container_query.clone(),
    );

    let sink = Sink::new(std::io::stdout());
    let log_client = std::sync::Arc::new(KubePodLogClient::new(client, &config.namespace));
    let supervisor = Supervisor::new();

    supervisor
        .run(cancel, log_client, sink, added, removed, config.tail_options(use_color))
        .await;

    Ok(())
}
