//! # relaydns
//!
//! Caching, forwarding DNS server and lookup tool built on a
//! single-threaded reactor.

mod bootstrap;
mod server;

use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use relaydns_application::{ResolveFlags, UpstreamTransport};
use relaydns_domain::{AnswerStatus, CliOverrides, Config, Question, RecordType};
use relaydns_infrastructure::dns::{DnsClient, NetworkTransport, ResolverSettings};
use relaydns_reactor::Dispatcher;
use std::rc::Rc;
use tracing::{error, info};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "relaydns")]
#[command(version)]
#[command(about = "Caching DNS forwarder on a single-threaded reactor")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<String>,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(short = 'l', long)]
    log_level: Option<String>,

    /// Upstream nameserver, `ip[:port]`; repeat for several
    #[arg(short = 'u', long = "upstream")]
    upstreams: Vec<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the caching DNS server until Ctrl+C
    Serve {
        /// DNS server port
        #[arg(short = 'p', long)]
        port: Option<u16>,

        /// Bind address
        #[arg(short = 'b', long)]
        bind: Option<String>,
    },
    /// Resolve one question through the upstreams and print the answer
    Query {
        name: String,

        /// Record type (A, AAAA, PTR, NS, MX, SOA, SRV, TXT)
        #[arg(short = 't', long = "type", default_value = "A")]
        record_type: String,

        /// Skip the cache
        #[arg(long)]
        no_cache: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (dns_port, bind_address) = match &cli.command {
        Command::Serve { port, bind } => (*port, bind.clone()),
        Command::Query { .. } => (None, None),
    };
    let overrides = CliOverrides {
        dns_port,
        bind_address,
        upstream_servers: (!cli.upstreams.is_empty()).then(|| cli.upstreams.clone()),
        log_level: cli.log_level.clone(),
    };

    let config = bootstrap::load_config(cli.config.as_deref(), overrides)?;
    bootstrap::init_logging(&config.logging);
    bootstrap::log_config(cli.config.as_deref(), &config);

    match cli.command {
        Command::Serve { .. } => serve(&config).await,
        Command::Query {
            name,
            record_type,
            no_cache,
        } => query(&config, &name, &record_type, no_cache).await,
    }
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::start("relaydns-reactor")?;

    if let Err(e) = server::start_dns_server(&dispatcher, config) {
        error!(error = %e, "Failed to start DNS server");
        shutdown(dispatcher).await?;
        return Err(e);
    }

    info!("Server ready! Press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    shutdown(dispatcher).await
}

async fn query(
    config: &Config,
    name: &str,
    record_type: &str,
    no_cache: bool,
) -> anyhow::Result<()> {
    let record_type: RecordType = record_type.parse()?;
    let question = Question::new(record_type, name)?;
    let settings = ResolverSettings::from_config(&config.dns)?;

    let dispatcher = Dispatcher::start("relaydns-client")?;
    let client = DnsClient::spawn(&dispatcher, settings, || {
        Rc::new(NetworkTransport::new()) as Rc<dyn UpstreamTransport>
    })?;

    let flags = ResolveFlags {
        bypass_cache: no_cache,
        cache_only: false,
    };
    let result = client.resolve_with(question, flags).await;
    client.shutdown();
    shutdown(dispatcher).await?;

    let answer = result?;
    println!(";; {} status: {} ttl: {}", answer.question, answer.status, answer.ttl);
    for record in &answer.records {
        println!("{record}");
    }

    match answer.status {
        AnswerStatus::Ok | AnswerStatus::NoData | AnswerStatus::NoDomain => Ok(()),
        status => anyhow::bail!("resolution failed: {status}"),
    }
}

/// Stop the reactor and wait for its thread off the async runtime.
async fn shutdown(dispatcher: Dispatcher) -> anyhow::Result<()> {
    dispatcher.stop();
    tokio::task::spawn_blocking(move || dispatcher.wait_stopped()).await??;
    Ok(())
}
