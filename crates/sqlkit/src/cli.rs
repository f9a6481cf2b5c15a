use crate::error::{self as app_error, AppResult};
use clap::{Args, Parser, Subcommand, ValueEnum};
use core_executor::TreeColumns;
use core_utils::config::DEFAULT_CONFIG_PATH;
use core_utils::{DbConfig, SqlParam};
use snafu::ResultExt;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser, Debug)]
#[command(version, about, long_about=None)]
pub struct CliOpts {
    #[arg(
        short,
        long,
        env = "SQLKIT_CONFIG",
        help = "Database config file (.json, .yaml or .yml); conf/db.json is used when present"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short,
        long,
        env = "SQLKIT_DATABASE",
        help = "Database file, or :memory:. Overrides the config file"
    )]
    pub database: Option<String>,

    #[arg(long, env = "SQLKIT_READ_ONLY", help = "Open the database read-only")]
    pub read_only: bool,

    #[arg(
        long,
        env = "SQLKIT_BUSY_TIMEOUT_MS",
        help = "How long to wait on a locked database"
    )]
    pub busy_timeout_ms: Option<u64>,

    #[arg(
        long,
        env = "SQLKIT_QUERY_TIMEOUT_MS",
        help = "Abort statements running longer than this"
    )]
    pub query_timeout_ms: Option<u64>,

    #[arg(
        long,
        value_enum,
        env = "TRACING_LEVEL",
        default_value = "off",
        help = "Tracing level, it can be overrided by *RUST_LOG* env var"
    )]
    pub tracing_level: TracingLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Every row as a JSON object
    All(QueryArgs),
    /// First row as a JSON object, column names lower-cased
    One(QueryArgs),
    /// Single value of a one-column result
    Scalar(QueryArgs),
    /// Number of rows returned
    Count(QueryArgs),
    /// Whether any row is returned
    Exists(QueryArgs),
    /// Statement without a result set; prints the affected row count
    Exec(QueryArgs),
    /// Two-level menu tree
    Tree(TreeArgs),
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// SQL text with positional `?` placeholders
    pub sql: String,

    #[arg(
        short,
        long = "param",
        value_parser = parse_param,
        allow_hyphen_values = true,
        help = "Positional parameter: integer, float, `null` or text. Repeatable"
    )]
    pub params: Vec<SqlParam>,

    #[arg(long, help = "Skip the keyword guard for text parameters")]
    pub no_guard: bool,
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    #[command(flatten)]
    pub query: QueryArgs,

    #[arg(long, default_value = "ordPath")]
    pub group_key: String,

    #[arg(long, default_value = "menu")]
    pub group_label: String,

    #[arg(long, default_value = "id")]
    pub item_id: String,

    #[arg(long, default_value = "name")]
    pub item_label: String,
}

impl TreeArgs {
    pub fn columns(&self) -> TreeColumns {
        TreeColumns::new(
            self.group_key.as_str(),
            self.group_label.as_str(),
            self.item_id.as_str(),
            self.item_label.as_str(),
        )
    }
}

impl Command {
    pub const fn query(&self) -> &QueryArgs {
        match self {
            Self::All(args)
            | Self::One(args)
            | Self::Scalar(args)
            | Self::Count(args)
            | Self::Exists(args)
            | Self::Exec(args) => args,
            Self::Tree(args) => &args.query,
        }
    }
}

impl QueryArgs {
    /// Parameters ready to bind, text values checked by the guard unless
    /// `--no-guard` was given.
    pub fn checked_params(&self) -> AppResult<&[SqlParam]> {
        if !self.no_guard {
            for (position, param) in self.params.iter().enumerate() {
                if let SqlParam::Text(text) = param {
                    core_utils::guard::check_input(text)
                        .context(app_error::GuardSnafu { position })?;
                }
            }
        }
        Ok(&self.params)
    }
}

#[allow(clippy::unnecessary_wraps)]
fn parse_param(value: &str) -> Result<SqlParam, Infallible> {
    if value.eq_ignore_ascii_case("null") {
        return Ok(SqlParam::Null);
    }
    if let Ok(v) = value.parse::<i64>() {
        return Ok(SqlParam::Integer(v));
    }
    if let Ok(v) = value.parse::<f64>() {
        return Ok(SqlParam::Float(v));
    }
    Ok(SqlParam::Text(value.to_string()))
}

impl CliOpts {
    /// Config file (explicit, or the default path when it exists) with the
    /// command-line overrides applied on top.
    pub fn db_config(&self) -> AppResult<DbConfig> {
        let file = match &self.config {
            Some(path) => Some(path.clone()),
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                default.is_file().then(|| default.to_path_buf())
            }
        };
        let mut config = match file {
            Some(path) => DbConfig::from_file(&path).context(app_error::ConfigSnafu)?,
            None => DbConfig::default(),
        };

        if let Some(database) = &self.database {
            config.database.clone_from(database);
        }
        if self.read_only {
            config.read_only = true;
        }
        if let Some(busy_timeout_ms) = self.busy_timeout_ms {
            config.busy_timeout_ms = Some(busy_timeout_ms);
        }
        if let Some(query_timeout_ms) = self.query_timeout_ms {
            config.query_timeout_ms = Some(query_timeout_ms);
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, ValueEnum)]
pub enum TracingLevel {
    Off,
    Info,
    Debug,
    Trace,
}

impl From<TracingLevel> for LevelFilter {
    fn from(level: TracingLevel) -> Self {
        match level {
            TracingLevel::Off => Self::OFF,
            TracingLevel::Info => Self::INFO,
            TracingLevel::Debug => Self::DEBUG,
            TracingLevel::Trace => Self::TRACE,
        }
    }
}

impl std::fmt::Display for TracingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Info => write!(f, "info"),
            Self::Debug => write!(f, "debug"),
            Self::Trace => write!(f, "trace"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        CliOpts::command().debug_assert();
    }

    #[test]
    fn test_params_are_typed() {
        let opts = CliOpts::try_parse_from([
            "sqlkit", "all", "SELECT ?, ?, ?, ?", "-p", "7", "-p", "2.5", "-p", "NULL", "-p",
            "menu",
        ])
        .expect("Failed to parse args");
        assert_eq!(
            opts.command.query().params,
            [
                SqlParam::Integer(7),
                SqlParam::Float(2.5),
                SqlParam::Null,
                SqlParam::Text("menu".to_string()),
            ]
        );
    }

    #[test]
    fn test_guard_rejects_text_params() {
        let opts = CliOpts::try_parse_from(["sqlkit", "one", "SELECT ?", "-p", "1 or 1"])
            .expect("Failed to parse args");
        let err = opts.command.query().checked_params().unwrap_err();
        assert!(matches!(err, AppError::Guard { position: 0, .. }));

        let opts = CliOpts::try_parse_from([
            "sqlkit", "one", "SELECT ?", "-p", "1 or 1", "--no-guard",
        ])
        .expect("Failed to parse args");
        assert_eq!(opts.command.query().checked_params().unwrap().len(), 1);
    }

    #[test]
    fn test_tree_columns_default() {
        let opts =
            CliOpts::try_parse_from(["sqlkit", "tree", "SELECT 1"]).expect("Failed to parse args");
        let Command::Tree(args) = &opts.command else {
            panic!("expected tree command");
        };
        assert_eq!(args.columns(), TreeColumns::default());
    }

    #[test]
    fn test_overrides_win_over_config_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("db.yaml");
        std::fs::write(&path, "database: from_file.db\nqueryTimeoutMs: 100\n")
            .expect("Failed to write config");
        let config_arg = path.display().to_string();

        let opts = CliOpts::try_parse_from([
            "sqlkit",
            "--config",
            config_arg.as_str(),
            "--database",
            ":memory:",
            "count",
            "SELECT 1",
        ])
        .expect("Failed to parse args");
        let config = opts.db_config().expect("Failed to build config");
        assert!(config.is_memory());
        assert_eq!(config.query_timeout_ms, Some(100));
    }
}
