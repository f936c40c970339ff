use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Invite code configuration
    #[serde(default)]
    pub invites: InviteConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database type (postgres, sqlite)
    #[serde(default = "default_db_type", rename = "type")]
    pub db_type: String,
    /// Database host
    #[serde(default = "default_db_host")]
    pub host: String,
    /// Database port
    #[serde(default = "default_db_port")]
    pub port: u16,
    /// Database name
    #[serde(default = "default_db_name", rename = "database")]
    pub name: String,
    /// Database user
    #[serde(default = "default_db_user", rename = "username")]
    pub user: String,
    /// Database password
    #[serde(default)]
    pub password: String,
    /// SQLite file path, or ":memory:"
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Upper bound of the connection pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InviteConfig {
    /// Length of generated invite codes (hex characters)
    #[serde(default = "default_code_length")]
    pub code_length: usize,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self {
            code_length: default_code_length(),
        }
    }
}

// Default value functions
fn default_db_type() -> String {
    "postgres".to_string()
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "squadcircle".to_string()
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_db_path() -> String {
    "./data/squadcircle.db".to_string()
}

fn default_max_connections() -> u32 {
    20
}

fn default_code_length() -> usize {
    16
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: default_db_type(),
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            user: default_db_user(),
            password: String::new(),
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn is_sqlite(&self) -> bool {
        self.db_type.eq_ignore_ascii_case("sqlite")
    }

    /// Generate database connection URL
    pub fn connection_url(&self) -> String {
        if self.is_sqlite() {
            if self.path == ":memory:" {
                "sqlite::memory:".to_string()
            } else {
                format!("sqlite://{}?mode=rwc", self.path)
            }
        } else {
            format!(
                "postgres://{}:{}@{}:{}/{}",
                self.user, self.password, self.host, self.port, self.name
            )
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let db_type = self.database.db_type.to_ascii_lowercase();
        if db_type != "postgres" && db_type != "sqlite" {
            anyhow::bail!("unsupported database type: {}", self.database.db_type);
        }
        if !(8..=64).contains(&self.invites.code_length) {
            anyhow::bail!(
                "invites.code_length must be between 8 and 64, got {}",
                self.invites.code_length
            );
        }
        Ok(())
    }
}
