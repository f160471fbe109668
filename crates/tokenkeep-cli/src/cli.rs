//! CLI argument definitions.

use clap::{Parser, Subcommand};

/// Manage a tokenkeep session from the terminal.
#[derive(Parser, Debug)]
#[command(name = "tokenkeep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Override the credential service base URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Restore the persisted session and show who is logged in
    Status {
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },

    /// Log in with email and password
    Login {
        #[arg(long)]
        email: String,
    },

    /// Create an account and log in
    Register {
        #[arg(long)]
        username: String,

        #[arg(long)]
        email: String,
    },

    /// Forget the persisted session
    Logout,

    /// Exchange the refresh token for a new token pair
    Refresh,

    /// Change the account password
    Passwd,

    /// Edit the cached identity for this process and print it
    Profile {
        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },
}
