use anyhow::Context;
use azhound::{
    client::{AzureClient, graph::GraphClient, memory::MemoryClient},
    collector::{Collector, summary::Outcome},
    config::{CliArgs, CollectConfig, ListKind, Source},
    shutdown::SignalContext,
    sink::JsonLinesSink,
    telemetry::init_telemetry,
};
use azhound_core::{Group, Resource, User};
use clap::Parser;
use std::{
    fs::File,
    io::{self, Write},
    process::ExitCode,
    sync::Arc,
    time::Instant,
};
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = CollectConfig::try_from(args)?;

    let providers = init_telemetry(config.verbosity)?;
    log_startup_info(&config);

    let signals = SignalContext::install();
    let result = run(&config, signals.token()).await;

    if let Some(signal) = signals.shutdown().await {
        tracing::info!("Collection stopped by {signal}");
    }
    providers.shutdown();

    result
}

async fn run(config: &CollectConfig, token: CancellationToken) -> anyhow::Result<ExitCode> {
    tracing::info!("testing connections");

    match &config.source {
        Source::Graph(settings) => {
            let connect = GraphClient::connect(settings.clone());
            let client = tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::info!("cancelled before connecting");
                    return Ok(ExitCode::SUCCESS);
                }
                client = connect => client.context("unable to connect to Microsoft Graph")?,
            };
            dispatch(Arc::new(client), config, token).await
        }
        Source::Replay(path) => {
            let client = MemoryClient::from_fixture(path)?;
            tracing::debug!(pages = client.page_count(), "loaded replay fixture");
            dispatch(Arc::new(client), config, token).await
        }
    }
}

async fn dispatch<C: AzureClient>(
    client: Arc<C>,
    config: &CollectConfig,
    token: CancellationToken,
) -> anyhow::Result<ExitCode> {
    let tenant = client.tenant_info();
    tracing::info!(tenant_id = %tenant.tenant_id, tenant = %tenant.display_name, "connected");

    match config.kind {
        ListKind::Groups => list::<C, Group>(client, config, token).await,
        ListKind::Users => list::<C, User>(client, config, token).await,
    }
}

async fn list<C: AzureClient, R: Resource>(
    client: Arc<C>,
    config: &CollectConfig,
    token: CancellationToken,
) -> anyhow::Result<ExitCode> {
    let mut query = R::default_query();
    if let Some(filter) = &config.filter {
        query = query.filter(filter.as_str());
    }
    if let Some(page_size) = config.page_size {
        query = query.top(page_size);
    }

    let writer: Box<dyn Write> = match &config.output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("unable to create {}", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    };
    let mut sink = JsonLinesSink::new(writer);

    let start = Instant::now();
    let collector = Collector::new(client, config.stream_buffer_size)?;
    let summary = collector
        .collect::<R>(query, token)
        .drain_into(&mut sink)
        .await?;
    sink.into_inner()?;

    tracing::info!(
        duration = ?start.elapsed(),
        count = summary.count,
        "collection completed: {summary}"
    );

    Ok(match summary.outcome {
        Outcome::Failed(_) => ExitCode::FAILURE,
        Outcome::Completed | Outcome::Cancelled => ExitCode::SUCCESS,
    })
}

fn log_startup_info(config: &CollectConfig) {
    if cfg!(debug_assertions) {
        tracing::debug!("Starting azhound with full config: {config:#?}");
    } else {
        tracing::debug!(
            kind = ?config.kind,
            stream_buffer_size = config.stream_buffer_size,
            "Starting azhound"
        );
    }
}
