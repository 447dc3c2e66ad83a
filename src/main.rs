use clap::{Parser, Subcommand};
use logstream::config::Config;
use logstream::error::{common, describe_error_code, LogStreamError};
use logstream::logs::{AppLogService, DockerLogService, LogRouter, LogSource, APPLICATION_SERVICE};
use logstream::server::{self, LogsState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Parser)]
#[command(name = "logstream")]
#[command(about = "Stream live application and container logs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve log streams over server-sent events
    Serve {
        /// Listen address, overrides `bind_addr`
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print a log stream to stdout until interrupted
    Tail {
        /// Logical service name; `application` for this process
        #[arg(default_value = APPLICATION_SERVICE)]
        service: String,
        /// Historical lines to print first
        #[arg(short = 'n', long)]
        lines: Option<usize>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        let code = match e.downcast_ref::<LogStreamError>() {
            Some(err) => {
                eprintln!("  {}", describe_error_code(err.code()));
                err.exit_code()
            }
            None => 1,
        };
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Commands::Serve {
        bind: Some(bind), ..
    } = &cli.command
    {
        config.bind_addr = bind.clone();
        config.validate()?;
    }

    let app_logs = Arc::new(AppLogService::with_capacities(
        config.history_capacity,
        config.conduit_capacity,
    ));
    logstream::logging::init(&config.log_level, cli.verbose, config.ansi, app_logs.clone())?;
    debug!("logstream started with verbosity level: {}", cli.verbose);

    let router = build_router(&config, app_logs).await;

    match cli.command {
        Commands::Serve { .. } => run_serve(&config, router).await,
        Commands::Tail { service, lines } => {
            run_tail(router, &service, lines.unwrap_or(config.default_tail)).await
        }
    }
}

/// Wire the broadcaster and, when enabled and reachable, the Docker tailer
async fn build_router(config: &Config, app_logs: Arc<AppLogService>) -> LogRouter {
    let router = LogRouter::new(app_logs);
    if !config.docker.enabled {
        return router;
    }

    match DockerLogService::connect(config.docker.socket.as_deref()).await {
        Ok(docker) => {
            info!("Docker log streaming enabled");
            router.with_containers(Arc::new(
                docker
                    .conduit_capacity(config.conduit_capacity)
                    .max_line_bytes(config.max_line_bytes),
            ))
        }
        Err(e) => {
            warn!(
                "Failed to initialize Docker log service, falling back to app logs: {}",
                e
            );
            router
        }
    }
}

async fn run_serve(config: &Config, router: LogRouter) -> anyhow::Result<()> {
    let app_logs = Arc::clone(router.application());
    let shutdown = CancellationToken::new();
    let state = LogsState::new(Arc::new(router), config.default_tail, shutdown.clone());

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|e| common::bind_failed(&config.bind_addr).with_source(e))?;

    server::serve(listener, server::router(state), async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for shutdown signal: {}", e);
            return;
        }
        info!("Shutting down");
        shutdown.cancel();
        app_logs.close_all();
    })
    .await?;

    Ok(())
}

async fn run_tail(router: LogRouter, service: &str, tail: usize) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let mut stream = router.stream_logs(&cancel, service, tail).await?;
    let mut stdout = tokio::io::stdout();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                break;
            }
            line = stream.next_line() => match line {
                Some(line) => {
                    stdout.write_all(line.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                    stdout.flush().await?;
                }
                None => break,
            },
        }
    }

    Ok(())
}
