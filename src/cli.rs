use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "enroller", about = "Waitlist enrollment bot")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Enroll every account in the accounts file
    Run {
        /// Accounts file (username:password:host:ref_code:proxy per line)
        #[arg(short, long)]
        accounts: Option<String>,

        /// Number of concurrent workers
        #[arg(short, long)]
        workers: Option<usize>,
    },
    /// Parse the accounts file and config without touching the network
    Check {
        /// Accounts file
        #[arg(short, long)]
        accounts: Option<String>,
    },
}
