use snafu::prelude::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AppError {
    #[snafu(display("Invalid configuration: {source}"))]
    Config { source: core_utils::Error },

    #[snafu(display("{source}"))]
    Connect { source: core_utils::Error },

    #[snafu(display("Parameter {position} rejected: {source}"))]
    Guard {
        position: usize,
        source: core_utils::Error,
    },

    #[snafu(display("{source}"))]
    Execution {
        source: core_executor::ExecutionError,
    },

    #[snafu(display("Failed to render output: {source}"))]
    Output { source: serde_json::Error },
}

pub type AppResult<T> = std::result::Result<T, AppError>;
