pub(crate) mod cli;
pub(crate) mod error;

use clap::Parser;
use core_executor::Executor;
use core_utils::Db;
use dotenv::dotenv;
use error::{AppResult, ConnectSnafu, ExecutionSnafu, OutputSnafu};
use snafu::ResultExt;
use std::process::ExitCode;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

const TARGETS: [&str; 3] = ["sqlkit", "core_executor", "core_utils"];

#[allow(clippy::print_stdout, clippy::print_stderr)]
fn main() -> ExitCode {
    dotenv().ok();

    let opts = cli::CliOpts::parse();
    setup_tracing(&opts);

    match run(&opts) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "Command failed");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(opts: &cli::CliOpts) -> AppResult<String> {
    let config = opts.db_config()?;
    let db = Db::connect(&config).context(ConnectSnafu)?;
    execute_command(&Executor::new(db), &opts.command)
}

/// Runs one subcommand and renders its result as JSON.
fn execute_command(executor: &Executor, command: &cli::Command) -> AppResult<String> {
    let args = command.query();
    let sql = args.sql.as_str();
    let params = args.checked_params()?;

    let output = match command {
        cli::Command::All(_) => return executor.fetch_all_json(sql, params).context(ExecutionSnafu),
        cli::Command::One(_) => {
            serde_json::to_string(&executor.fetch_one(sql, params).context(ExecutionSnafu)?)
        }
        cli::Command::Scalar(_) => {
            serde_json::to_string(&executor.fetch_scalar(sql, params).context(ExecutionSnafu)?)
        }
        cli::Command::Count(_) => {
            serde_json::to_string(&executor.row_count(sql, params).context(ExecutionSnafu)?)
        }
        cli::Command::Exists(_) => {
            serde_json::to_string(&executor.exists(sql, params).context(ExecutionSnafu)?)
        }
        cli::Command::Exec(_) => {
            serde_json::to_string(&executor.execute(sql, params).context(ExecutionSnafu)?)
        }
        cli::Command::Tree(tree_args) => serde_json::to_string(
            &executor
                .build_tree(sql, params, &tree_args.columns())
                .context(ExecutionSnafu)?,
        ),
    };
    output.context(OutputSnafu)
}

#[allow(clippy::print_stderr)]
fn setup_tracing(opts: &cli::CliOpts) {
    let targets_with_level =
        |level: LevelFilter| -> Vec<(&str, LevelFilter)> { TARGETS.iter().map(|t| (*t, level)).collect() };

    // stdout carries the command output, logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_span_events(FmtSpan::CLOSE)
                .with_filter(match std::env::var("RUST_LOG") {
                    Ok(val) => match val.parse::<Targets>() {
                        Ok(log_targets_from_env) => log_targets_from_env,
                        Err(err) => {
                            eprintln!("Failed to parse RUST_LOG: {err:?}");
                            Targets::default()
                                .with_targets(targets_with_level(LevelFilter::DEBUG))
                                .with_default(LevelFilter::DEBUG)
                        }
                    },
                    _ => Targets::default()
                        .with_targets(targets_with_level(opts.tracing_level.clone().into()))
                        .with_default(LevelFilter::OFF),
                }),
        )
        .init();
}
