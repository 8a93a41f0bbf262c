//! pg-gatekeeper — thin CLI over the safety-gating kernel.

mod cli;

use std::sync::Arc;

use cli::{Cli, ClientKindArg, Command, SafetyModeArg};
use pg_gatekeeper::api::{ApiClient, ApiManager, ApiOutcome};
use pg_gatekeeper::config::Settings;
use pg_gatekeeper::db::PostgresExecutor;
use pg_gatekeeper::error::{GatewayError, Result};
use pg_gatekeeper::logging;
use pg_gatekeeper::query_manager::{QueryManager, QueryOutcome};
use pg_gatekeeper::risk::{ClientKind, SafetyMode};
use pg_gatekeeper::safety::SafetyManager;
use pg_gatekeeper::sql;
use tracing::error;

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("warning: failed to load .env file: {e}");
        }
    }

    logging::init_logging();

    let cli = Cli::parse_args();

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load_from_file(&Settings::default_path())?.apply_env_overrides();
    settings.validate()?;

    let safety = Arc::new(SafetyManager::new());

    match cli.command {
        Command::Mode { client, mode } => {
            let (kind, mode) = (to_client_kind(client), to_safety_mode(mode));
            safety.set_mode(kind, mode);
            println!("{kind:?} mode set to {mode}");
            Ok(())
        }
        Command::Sql {
            text,
            migration_name,
            unsafe_mode,
        } => {
            if unsafe_mode {
                safety.set_mode(ClientKind::Database, SafetyMode::Unsafe);
            }
            let executor = PostgresExecutor::new(settings.database_url());
            let manager = QueryManager::new(safety, executor);
            let outcome = manager.handle(&text, false, migration_name.as_deref()).await?;
            print_query_outcome(outcome);
            Ok(())
        }
        Command::Confirm { token, unsafe_mode } => {
            if unsafe_mode {
                safety.set_mode(ClientKind::Database, SafetyMode::Unsafe);
                safety.set_mode(ClientKind::Api, SafetyMode::Unsafe);
            }
            let executor = PostgresExecutor::new(settings.database_url());
            let manager = QueryManager::new(Arc::clone(&safety), executor);
            match manager.handle_confirmation(&token).await {
                Ok(outcome) => {
                    print_query_outcome(outcome);
                    Ok(())
                }
                Err(GatewayError::UnknownConfirmation) => {
                    let client = ApiClient::new(
                        settings.api_base_url.clone(),
                        settings.access_token.clone(),
                    )?;
                    let api = ApiManager::new(safety, client, settings.project_ref.clone());
                    let outcome = api.handle_confirmation(&token).await?;
                    print_api_outcome(outcome);
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
        Command::Rules => {
            println!("SQL risk table:");
            for (risk, commands) in sql::statement_type_table() {
                let names: Vec<_> = commands.iter().map(ToString::to_string).collect();
                println!("  {risk}: {}", names.join(", "));
            }

            println!("API risk table:");
            for (risk, by_method) in safety.api_rules().introspect() {
                println!("  {risk}:");
                for (method, patterns) in by_method {
                    println!("    {method}: {}", patterns.join(", "));
                }
            }
            Ok(())
        }
    }
}

fn to_client_kind(arg: ClientKindArg) -> ClientKind {
    match arg {
        ClientKindArg::Database => ClientKind::Database,
        ClientKindArg::Api => ClientKind::Api,
    }
}

fn to_safety_mode(arg: SafetyModeArg) -> SafetyMode {
    match arg {
        SafetyModeArg::Safe => SafetyMode::Safe,
        SafetyModeArg::Unsafe => SafetyMode::Unsafe,
    }
}

fn print_query_outcome(outcome: QueryOutcome) {
    match outcome {
        QueryOutcome::Executed(result) => {
            for (i, stmt) in result.statements.iter().enumerate() {
                println!("statement {i}: {} row(s)", stmt.rows.len());
                for row in &stmt.rows {
                    println!("  {row}");
                }
            }
        }
        QueryOutcome::ConfirmationRequired { token, risk } => {
            println!("confirmation required ({risk} risk): re-run with `confirm {token}`");
        }
    }
}

fn print_api_outcome(outcome: ApiOutcome) {
    match outcome {
        ApiOutcome::Completed(json) => println!("{json}"),
        ApiOutcome::ConfirmationRequired { token } => {
            println!("confirmation required: re-run with `confirm {token}`");
        }
    }
}
