//! usql-gate - read-only SQL through usql.

use std::sync::Arc;

use tracing::{error, info};

use usql_gate::cli::{Cli, Command};
use usql_gate::config::Settings;
use usql_gate::connection::ConnectionRegistry;
use usql_gate::error::Result;
use usql_gate::handler::{AppContext, QueryHandler, QueryRequest, OPERATION_NAME};
use usql_gate::install::HttpFetcher;
use usql_gate::{logging, server};

#[tokio::main]
async fn main() {
    logging::init_stderr_logging();

    match run(Cli::parse_args()).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    // A missing .env file is fine; variables may come from the real environment.
    if let Ok(path) = dotenvy::dotenv() {
        info!("Loaded environment from {}", path.display());
    }

    let config_path = cli.config_path();
    info!("Loading settings from: {}", config_path.display());
    let mut settings = Settings::load_from_file(&config_path)?;
    settings.apply_process_env()?;
    cli.apply_to(&mut settings);
    settings.validate()?;

    let registry = ConnectionRegistry::from_env()?;
    info!("Loaded {} connection string(s)", registry.len());
    if settings.unsafe_install {
        info!("Unsafe install enabled: usql will be downloaded if missing");
    }

    let fetcher = Arc::new(HttpFetcher::new()?);
    let handler = Arc::new(QueryHandler::new(AppContext::new(
        registry, &settings, fetcher,
    )));

    match cli.command() {
        Command::Serve => {
            info!("Serving {} on stdin", OPERATION_NAME);
            server::serve(handler, tokio::io::stdin(), tokio::io::stdout()).await?;
            Ok(0)
        }
        Command::Run { connection, query } => {
            let response = handler
                .handle(QueryRequest {
                    id: None,
                    query,
                    connection_string_number: connection,
                })
                .await;
            println!("{}", response.text());
            Ok(if response.is_error { 1 } else { 0 })
        }
    }
}
