use crate::client::graph::GraphSettings;
use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use core::time::Duration;
use reqwest::Url;
use std::path::PathBuf;

/// Runtime configuration for the `azhound` binary.
///
/// Every option can also be supplied through the environment (a `.env` file in
/// the working directory is loaded first). Log records go to stderr; collected
/// objects go to stdout unless `--output` is given.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "azhound",
    version,
    about = "Streams Entra ID directory objects as tenant-annotated JSON lines"
)]
pub struct CliArgs {
    /// Base URL of the Microsoft Graph API.
    ///
    /// Environment variable: `AZURE_GRAPH_URL`
    #[arg(long, env = "AZURE_GRAPH_URL", default_value_t = String::from("https://graph.microsoft.com"))]
    pub graph_url: String,

    /// Bearer token sent with every Graph request. Required unless
    /// `--replay` is used.
    ///
    /// Environment variable: `AZURE_ACCESS_TOKEN`
    #[arg(long, env = "AZURE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Serve pages from a recorded fixture instead of contacting Graph.
    #[arg(long, value_name = "FILE")]
    pub replay: Option<PathBuf>,

    /// Write collected objects to a file instead of stdout.
    #[arg(short, long, global = true, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// OData `$filter` replacing the collected kind's default filter.
    #[arg(long)]
    pub filter: Option<String>,

    /// Number of objects requested per page (`$top`).
    ///
    /// Environment variable: `PAGE_SIZE`
    #[arg(long, env = "PAGE_SIZE", value_parser = clap::value_parser!(u32).range(1..=999))]
    pub page_size: Option<u32>,

    /// Capacity of the buffer between the producer and the output sink.
    ///
    /// The producer waits whenever this many envelopes are pending, so a slow
    /// sink throttles page requests instead of growing memory.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 1)]
    pub stream_buffer_size: usize,

    /// Retries for throttled (429) or unavailable (503, 504) page requests.
    ///
    /// Environment variable: `MAX_RETRIES`
    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    /// Per-request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout: u64,

    /// Increase log verbosity (`-v` debug, `-vv` trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List every object of one kind.
    List {
        #[arg(value_enum)]
        kind: ListKind,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Groups,
    Users,
}

/// Where pages come from.
#[derive(Debug, Clone)]
pub enum Source {
    Graph(GraphSettings),
    Replay(PathBuf),
}

#[derive(Debug, Clone)]
pub struct CollectConfig {
    pub source: Source,
    pub kind: ListKind,
    pub output: Option<PathBuf>,
    pub filter: Option<String>,
    pub page_size: Option<u32>,
    pub stream_buffer_size: usize,
    pub verbosity: u8,
}

impl TryFrom<CliArgs> for CollectConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.request_timeout == 0 {
            bail!("REQUEST_TIMEOUT must be greater than 0");
        }

        let source = match (args.replay, args.access_token) {
            (Some(path), _) => Source::Replay(path),
            (None, Some(access_token)) if !access_token.trim().is_empty() => {
                let base_url = Url::parse(&args.graph_url)
                    .with_context(|| format!("invalid AZURE_GRAPH_URL {:?}", args.graph_url))?;
                if !matches!(base_url.scheme(), "http" | "https") {
                    bail!("AZURE_GRAPH_URL must be an http(s) URL, got {base_url}");
                }
                Source::Graph(GraphSettings {
                    base_url,
                    access_token,
                    max_retries: args.max_retries,
                    request_timeout: Duration::from_secs(args.request_timeout),
                })
            }
            (None, _) => bail!("AZURE_ACCESS_TOKEN is required unless --replay is given"),
        };

        let Command::List { kind } = args.command;

        Ok(Self {
            source,
            kind,
            output: args.output,
            filter: args.filter,
            page_size: args.page_size,
            stream_buffer_size: args.stream_buffer_size,
            verbosity: args.verbose,
        })
    }
}
