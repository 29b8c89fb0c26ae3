mod cli {
    pub mod engine {
        pub mod args;
        pub mod run;
    }
    pub mod query {
        pub mod args;
        pub mod response;
        pub mod run;
    }
    pub mod cmd;
    pub mod connect;
}

use clap::Parser;
use eyre::Result;
use tracing_subscriber::EnvFilter;

use crate::cli::cmd::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // a missing .env file is fine
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    init_tracing(&cli);

    match &cli.command {
        Command::Indexer(args) => {
            tracing::info!("Indexer Command: {:?}", args);
            cli::engine::run::indexer(args).await
        }
        Command::Producer(args) => {
            tracing::info!("Producer Command: {:?}", args);
            cli::engine::run::producer(args).await
        }
        Command::Run(args) => {
            tracing::info!("Run Command: {:?}", args);
            cli::engine::run::both(args).await
        }
        Command::Query(query) => {
            tracing::info!("Query: {:?}", query);
            cli::query::run::select(query).await
        }
    }
}

fn init_tracing(cli: &Cli) {
    // RUST_LOG wins, info otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match &cli.command {
        Command::Query(_) => {
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}
