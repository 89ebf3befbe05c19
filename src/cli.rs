use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lfcredir")]
#[command(about = "Logical to physical file name redirector backed by a replica catalog", long_about = None)]
pub struct Cli {
    /// Output results in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Resolver setup shared by the commands that talk to the catalog
#[derive(Args)]
pub struct ResolverArgs {
    /// Plugin parameters, e.g. "root=/eos rdrhost=eos.cern.ch nomatch=tape"
    #[arg(short, long, default_value = "")]
    pub params: String,

    /// Catalog snapshot (JSON) to open the session on
    #[arg(short, long)]
    pub catalog: PathBuf,

    /// Client identifier used in log lines
    #[arg(long, default_value = "cli")]
    pub client: String,

    /// Print resolver metrics and cache statistics at the end
    #[arg(long)]
    pub stats: bool,

    /// Dump the catalog failures seen during the run as JSON lines
    #[arg(long)]
    pub events_jsonl: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the candidate names tried for a logical name
    Rewrite {
        /// Logical file name
        lfn: String,
    },

    /// Resolve logical names to physical names
    Resolve {
        #[command(flatten)]
        resolver: ResolverArgs,

        /// Logical file names; repeated names exercise the cache
        #[arg(required = true)]
        lfns: Vec<String>,
    },

    /// Show the redirect answered for each logical name
    Locate {
        #[command(flatten)]
        resolver: ResolverArgs,

        #[arg(required = true)]
        lfns: Vec<String>,
    },

    /// Show the stat answer a legacy client would get
    Stat {
        #[command(flatten)]
        resolver: ResolverArgs,

        #[arg(required = true)]
        lfns: Vec<String>,
    },
}
