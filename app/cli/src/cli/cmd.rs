use clap::command;
use clap::{Parser, Subcommand};

use crate::cli::engine::args::{IndexerCmd, ProducerCmd, RunCmd};
use crate::cli::query::args::Query;

#[derive(Parser, Debug)]
#[command(name = "eth-ingest")]
#[command(about = "Ethereum block ingestion pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan block numbers taken from the job queue
    Indexer(IndexerCmd),
    /// Publish block numbers to scan and track the ingestion cursor
    Producer(ProducerCmd),
    /// Producer and indexer in one process
    Run(RunCmd),
    /// Read blocks and transactions through the storage tiers
    Query(Query),
}
