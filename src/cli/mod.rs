pub mod ledger;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "points_ledger")]
#[command(about = "Points ledger over mirrored storage tiers", long_about = None)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, default_value = "ledger.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a new account
    Register {
        id: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Verify credentials and mark the account as last logged in
    Login {
        id: String,
        #[arg(long)]
        password: String,
    },
    /// Show one account
    Lookup { id: String },
    /// List all accounts
    List,
    /// Set an account balance outright (negative values clamp to zero)
    SetBalance {
        id: String,
        #[arg(allow_hyphen_values = true)]
        amount: i64,
    },
    /// Log in and adjust the balance by a signed amount
    Delta {
        id: String,
        #[arg(long)]
        password: String,
        #[arg(allow_hyphen_values = true)]
        amount: i64,
    },
    /// Log in and request a withdrawal
    Withdraw {
        id: String,
        #[arg(long)]
        password: String,
        amount: i64,
    },
    /// Show point history and withdrawals for an account
    History { id: String },
    /// Reconcile the primary and mirror tiers
    Sync,
    /// Remove ephemeral keys from the primary tier
    Purge,
    /// Wipe credentials and reload accounts from storage
    Reset {
        /// Also clear every key from the primary tier first
        #[arg(long)]
        wipe: bool,
    },
}
