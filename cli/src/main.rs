use clap::{CommandFactory, Parser};
mod app;
mod commands;
mod logging;
mod script;
use commands::cli;
use runonce_core::api::{CliError, GuardError};

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "runonce failed");
            eprintln!("[error] {e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    if args.command.is_empty() {
        let _ = cli::Args::command().print_help();
        return Err(CliError::Config("commands not found".to_string()));
    }

    let cfg = app::load_config(&args)?;
    logging::init(&cfg.logging).map_err(CliError::Logging)?;

    app::run_app(args, cfg).await
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 11: config error
    // 12: refused before running (date, existing log, prompt)
    // 20: log destination error
    // 30: the command itself failed
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) | CliError::Logging(_) => 11,
        CliError::Guard(ge) => match ge {
            GuardError::Config(_) | GuardError::Naming(_) => 11,
            ge if ge.is_refusal() => 12,
            GuardError::DestinationOpen { .. }
            | GuardError::TranscriptWrite { .. }
            | GuardError::DestinationClose { .. } => 20,
            GuardError::Script(_) => 30,
            _ => 50,
        },
        CliError::Anyhow(_) => 50,
    }
}
