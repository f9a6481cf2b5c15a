use crate::{ConfigFormatSnafu, ConfigJsonSnafu, ConfigReadSnafu, ConfigYamlSnafu, Result};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "conf/db.json";
pub const MEMORY_DATABASE: &str = ":memory:";

/*
Config file, JSON or YAML:
    {
        "database": "data/app.db",
        "readOnly": false,
        "busyTimeoutMs": 5000,
        "queryTimeoutMs": 30000
    }
`DbName` is accepted in place of `database`; unknown keys are ignored.
*/
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbConfig {
    #[serde(alias = "DbName", alias = "db_name")]
    pub database: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
    #[serde(default)]
    pub query_timeout_ms: Option<u64>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::new(MEMORY_DATABASE)
    }
}

impl DbConfig {
    #[must_use]
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            read_only: false,
            busy_timeout_ms: None,
            query_timeout_ms: None,
        }
    }

    #[must_use]
    pub const fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub const fn with_busy_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.busy_timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub const fn with_query_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.query_timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub fn is_memory(&self) -> bool {
        self.database == MEMORY_DATABASE
    }

    /// Loads a config file, picking the format from its extension.
    ///
    /// # Errors
    ///
    /// Returns `ConfigRead` if the file cannot be read, `ConfigJson` or
    /// `ConfigYaml` if it does not parse, and `ConfigFormat` for any other
    /// extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let content = std::fs::read_to_string(path).context(ConfigReadSnafu {
            path: display.clone(),
        })?;
        match extension.as_deref() {
            Some("json") => serde_json::from_str(&content).context(ConfigJsonSnafu { path: display }),
            Some("yaml" | "yml") => {
                serde_yaml::from_str(&content).context(ConfigYamlSnafu { path: display })
            }
            _ => ConfigFormatSnafu { path: display }.fail(),
        }
    }
}
