//! Command-line argument parsing for pg-gatekeeper.
//!
//! Thin by design (SPEC_FULL.md's CLI section): this owns no safety logic,
//! just enough surface to set a mode, run one SQL batch, redeem a
//! confirmation token, or print the risk-rule tables.

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "pg-gatekeeper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Set a client kind's mode and print it.
    Mode {
        client: ClientKindArg,
        mode: SafetyModeArg,
    },
    /// Run one SQL batch through the query manager.
    Sql {
        text: String,
        /// Client-supplied migration name, used verbatim if non-empty.
        #[arg(long)]
        migration_name: Option<String>,
        /// Put the database client in UNSAFE mode before running.
        #[arg(long)]
        unsafe_mode: bool,
    },
    /// Redeem a pending confirmation token.
    Confirm {
        token: String,
        /// Put the database client in UNSAFE mode before redeeming.
        #[arg(long)]
        unsafe_mode: bool,
    },
    /// Print the risk-rule introspection tables (SQL and API).
    Rules,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ClientKindArg {
    Database,
    Api,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum SafetyModeArg {
    Safe,
    Unsafe,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
