use std::path::PathBuf;

/// Server configuration.
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | DATABASE_PATH | comanda.db | SQLite database file |
/// | HTTP_HOST | 0.0.0.0 | Bind address |
/// | HTTP_PORT | 3000 | HTTP port |
/// | LOG_LEVEL | info | Default filter when `RUST_LOG` is unset |
/// | LOG_DIR | (unset) | Write daily rolling log files here instead of stdout |
///
/// A `.env` file in the working directory is loaded first.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub http_host: String,
    pub http_port: u16,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "comanda.db".into())
                .into(),
            http_host: std::env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: std::env::var("LOG_DIR")
                .ok()
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Environment config pointed at another database; used by tests.
    pub fn with_database_path(path: impl Into<PathBuf>) -> Self {
        let mut config = Self::from_env();
        config.database_path = path.into();
        config
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_database_path_overrides_only_the_path() {
        let config = Config::with_database_path("/tmp/other.db");
        assert_eq!(config.database_path, PathBuf::from("/tmp/other.db"));
        assert!(config.bind_addr().ends_with(&format!(":{}", config.http_port)));
    }
}
