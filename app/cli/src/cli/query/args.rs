use clap::{Args, Subcommand};

use crate::cli::connect::ConnectionArgs;

#[derive(Args, Debug)]
#[command(about = "Read indexed data, falling back to the node", long_about = None)]
pub struct Query {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub target: Target,
}

#[derive(Debug, Subcommand)]
pub enum Target {
    /// A transaction with its receipt logs
    Tx {
        /// Transaction hash
        hash: String,
    },
    /// A block with its transaction hashes
    Block {
        /// Block number
        number: String,
    },
    /// The most recent blocks of the chain
    Blocks {
        /// How many blocks
        #[arg(long)]
        limit: String,
    },
}
