use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Root of the file-backed secret source. Defaults to `<data_dir>/secrets`.
    pub secrets_dir: Option<PathBuf>,
    /// Scheduler tick interval in seconds; per-repository pull periods gate
    /// individual repositories within it.
    pub sync_interval_seconds: u64,
}

impl ServerConfig {
    /// Loads `drover.toml` from the data directory if present; defaults
    /// otherwise.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join("drover.toml");
        if !path.exists() {
            return Ok(Self {
                data_dir: data_dir.to_path_buf(),
                ..Self::default()
            });
        }

        let raw = std::fs::read_to_string(&path)?;
        let mut config: ServerConfig = toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Config(format!("invalid listen address: {e}")))
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("drover.db")
    }

    /// Where repository clones live.
    #[must_use]
    pub fn repos_dir(&self) -> PathBuf {
        self.data_dir.join("repos")
    }

    #[must_use]
    pub fn secrets_dir(&self) -> PathBuf {
        self.secrets_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("secrets"))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            secrets_dir: None,
            sync_interval_seconds: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let temp = TempDir::new().unwrap();
        let config = ServerConfig::load(temp.path()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.data_dir, temp.path());
        assert_eq!(config.secrets_dir(), temp.path().join("secrets"));
    }

    #[test]
    fn test_loads_drover_toml() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("drover.toml"),
            "port = 9000\nsync_interval_seconds = 5\n",
        )
        .unwrap();

        let config = ServerConfig::load(temp.path()).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.sync_interval_seconds, 5);
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn test_invalid_toml_is_a_config_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("drover.toml"), "port = \"many\"\n").unwrap();
        assert!(matches!(
            ServerConfig::load(temp.path()),
            Err(Error::Config(_))
        ));
    }
}
