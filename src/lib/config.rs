use crate::domain::models::{ColumnSelection, TableRef, WriteMode};
use crate::inbound::file::Sheet;
use anyhow::Context;
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 1433;
pub const DEFAULT_SCHEMA: &str = "dbo";

/// Where to connect and which table to load into.
#[derive(Clone)]
pub struct Credentials {
    /// `host` or `host,port`
    pub server: String,
    pub port: Option<u16>,
    pub database: String,
    pub schema: String,
    pub table_name: String,
    pub username: String,
    pub password: String,
    pub trust_cert: bool,
    pub encrypt: bool,
}

impl Credentials {
    pub fn new(
        server: impl Into<String>,
        database: impl Into<String>,
        schema: impl Into<String>,
        table_name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            server: server.into(),
            port: None,
            database: database.into(),
            schema: schema.into(),
            table_name: table_name.into(),
            username: username.into(),
            password: password.into(),
            trust_cert: true,
            encrypt: true,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn host(&self) -> &str {
        self.server
            .split_once(',')
            .map_or(self.server.as_str(), |(host, _)| host)
            .trim()
    }

    pub fn port(&self) -> u16 {
        self.port
            .or_else(|| {
                self.server
                    .split_once(',')
                    .and_then(|(_, port)| port.trim().parse().ok())
            })
            .unwrap_or(DEFAULT_PORT)
    }

    pub fn target(&self) -> TableRef {
        TableRef::new(&self.schema, &self.table_name)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("server", &self.server)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("table_name", &self.table_name)
            .field("username", &self.username)
            .field("password", &"***")
            .field("trust_cert", &self.trust_cert)
            .field("encrypt", &self.encrypt)
            .finish()
    }
}

/// What to read and how to write it.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub path: PathBuf,
    pub sheet: Sheet,
    pub columns: ColumnSelection,
    pub separator: char,
    pub encoding: String,
    pub write_mode: WriteMode,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub source: SourceConfig,
    pub log_level: tracing::Level,
}

const SERVER_KEY: &str = "MSSQL_SERVER";
const PORT_KEY: &str = "MSSQL_PORT";
const DATABASE_KEY: &str = "MSSQL_DATABASE";
const SCHEMA_KEY: &str = "MSSQL_SCHEMA";
const TABLE_KEY: &str = "MSSQL_TABLE";
const USERNAME_KEY: &str = "MSSQL_USERNAME";
const PASSWORD_KEY: &str = "MSSQL_PASSWORD";
const TRUST_CERT_KEY: &str = "MSSQL_TRUST_CERT";
const ENCRYPT_KEY: &str = "MSSQL_ENCRYPT";

const SOURCE_PATH_KEY: &str = "SOURCE_PATH";
const SOURCE_SHEET_KEY: &str = "SOURCE_SHEET";
const SOURCE_COLUMNS_KEY: &str = "SOURCE_COLUMNS";
const CSV_SEPARATOR_KEY: &str = "CSV_SEPARATOR";
const CSV_ENCODING_KEY: &str = "CSV_ENCODING";
const WRITE_MODE_KEY: &str = "WRITE_MODE";
const LOG_LEVEL_KEY: &str = "LOG_LEVEL";

fn parse_bool(key: &str, value: &str) -> anyhow::Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => anyhow::bail!("{} must be true or false, got '{}'", key, other),
    }
}

fn parse_columns(value: &str) -> ColumnSelection {
    let columns: Vec<&str> = value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    if columns.is_empty() {
        ColumnSelection::All
    } else {
        ColumnSelection::only(columns)
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).with_context(|| format!("missing required variable {}", key))
        };

        let mut credentials = Credentials::new(
            required(SERVER_KEY)?,
            required(DATABASE_KEY)?,
            lookup(SCHEMA_KEY).unwrap_or_else(|| DEFAULT_SCHEMA.to_string()),
            required(TABLE_KEY)?,
            required(USERNAME_KEY)?,
            required(PASSWORD_KEY)?,
        );
        if let Some(port) = lookup(PORT_KEY) {
            credentials.port = Some(
                port.trim()
                    .parse()
                    .with_context(|| format!("{} is not a valid port: {}", PORT_KEY, port))?,
            );
        }
        if let Some(value) = lookup(TRUST_CERT_KEY) {
            credentials.trust_cert = parse_bool(TRUST_CERT_KEY, &value)?;
        }
        if let Some(value) = lookup(ENCRYPT_KEY) {
            credentials.encrypt = parse_bool(ENCRYPT_KEY, &value)?;
        }

        let separator = match lookup(CSV_SEPARATOR_KEY) {
            Some(value) => {
                let mut chars = value.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => c,
                    _ => anyhow::bail!(
                        "{} must be exactly one character, got '{}'",
                        CSV_SEPARATOR_KEY,
                        value
                    ),
                }
            }
            None => ',',
        };
        let write_mode = match lookup(WRITE_MODE_KEY) {
            Some(value) => value.parse()?,
            None => WriteMode::default(),
        };
        let source = SourceConfig {
            path: PathBuf::from(required(SOURCE_PATH_KEY)?),
            sheet: lookup(SOURCE_SHEET_KEY)
                .map(Sheet::Name)
                .unwrap_or_default(),
            columns: lookup(SOURCE_COLUMNS_KEY)
                .map(|c| parse_columns(&c))
                .unwrap_or_default(),
            separator,
            encoding: lookup(CSV_ENCODING_KEY).unwrap_or_else(|| "utf-8".to_string()),
            write_mode,
        };

        let log_level = match lookup(LOG_LEVEL_KEY) {
            Some(level) => level
                .trim()
                .parse()
                .with_context(|| format!("{} is not a valid log level: {}", LOG_LEVEL_KEY, level))?,
            None => tracing::Level::INFO,
        };

        Ok(Self {
            credentials,
            source,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("MSSQL_SERVER", "db.local,1444"),
        ("MSSQL_DATABASE", "warehouse"),
        ("MSSQL_TABLE", "people"),
        ("MSSQL_USERNAME", "loader"),
        ("MSSQL_PASSWORD", "s3cret"),
        ("SOURCE_PATH", "input/people.csv"),
    ];

    #[test]
    fn config_from_lookup_applies_defaults() {
        let config = Config::from_lookup(lookup_from(REQUIRED)).unwrap();
        assert_eq!(config.credentials.host(), "db.local");
        assert_eq!(config.credentials.port(), 1444);
        assert_eq!(config.credentials.target(), TableRef::new("dbo", "people"));
        assert_eq!(config.source.separator, ',');
        assert_eq!(config.source.encoding, "utf-8");
        assert_eq!(config.source.sheet, Sheet::Index(0));
        assert_eq!(config.source.columns, ColumnSelection::All);
        assert_eq!(config.source.write_mode, WriteMode::Replace);
        assert_eq!(config.log_level, tracing::Level::INFO);
    }

    #[test]
    fn config_from_lookup_reads_optional_keys() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend_from_slice(&[
            ("MSSQL_PORT", "1500"),
            ("MSSQL_SCHEMA", "staging"),
            ("SOURCE_SHEET", "Totals"),
            ("SOURCE_COLUMNS", "id, name"),
            ("CSV_SEPARATOR", ";"),
            ("WRITE_MODE", "append"),
            ("LOG_LEVEL", "debug"),
        ]);
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.credentials.port(), 1500);
        assert_eq!(config.credentials.schema, "staging");
        assert_eq!(config.source.sheet, Sheet::Name("Totals".into()));
        assert_eq!(config.source.columns, ColumnSelection::only(["id", "name"]));
        assert_eq!(config.source.separator, ';');
        assert_eq!(config.source.write_mode, WriteMode::Append);
        assert_eq!(config.log_level, tracing::Level::DEBUG);
    }

    #[test]
    fn numeric_sheet_value_is_kept_as_a_name() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SOURCE_SHEET", "2024"));
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.source.sheet, Sheet::Name("2024".into()));
    }

    #[test]
    fn config_from_lookup_reports_missing_keys() {
        let err = Config::from_lookup(lookup_from(&REQUIRED[1..])).unwrap_err();
        assert!(err.to_string().contains("MSSQL_SERVER"));
    }

    #[test]
    fn debug_output_hides_password() {
        let credentials = Credentials::new("db", "warehouse", "dbo", "people", "loader", "s3cret");
        let rendered = format!("{:?}", credentials);
        assert!(!rendered.contains("s3cret"));
        assert_eq!(credentials.port(), DEFAULT_PORT);
    }
}
