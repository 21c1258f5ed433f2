//! CLI configuration utilities

use actalog_client::ClientConfig;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming the state directory
pub const STATE_DIR_ENV: &str = "ACTALOG_STATE_DIR";

/// Resolve the state directory: the flag, then `ACTALOG_STATE_DIR`, then the
/// platform data directory
pub fn state_dir(data_dir: Option<PathBuf>) -> PathBuf {
    data_dir.unwrap_or_else(|| {
        if let Ok(state_dir) = std::env::var(STATE_DIR_ENV) {
            PathBuf::from(state_dir)
        } else {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("actalog")
        }
    })
}

/// File holding the persisted session
pub fn session_path(state_dir: &Path) -> PathBuf {
    state_dir.join("session.json")
}

/// Load client configuration.
///
/// An explicit file wins over `<state_dir>/config.toml`; without either only
/// defaults and `ACTALOG_*` environment variables apply. Command line
/// overrides are applied last.
pub fn load_client_config(
    file: Option<&Path>,
    state_dir: &Path,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
) -> Result<ClientConfig> {
    let default_file = state_dir.join("config.toml");
    let mut config = match file {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            ClientConfig::from_file(path)?
        }
        None if default_file.exists() => {
            info!("Loading configuration from: {}", default_file.display());
            ClientConfig::from_file(&default_file)?
        }
        None => ClientConfig::from_env()?,
    };

    if let Some(base_url) = base_url {
        config.base_url = base_url;
    }
    if let Some(timeout_secs) = timeout_secs {
        config.timeout_secs = timeout_secs;
    }
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_state_dir_wins() {
        let dir = PathBuf::from("/tmp/actalog-test");
        assert_eq!(state_dir(Some(dir.clone())), dir);
        assert_eq!(session_path(&dir), dir.join("session.json"));
    }

    #[test]
    fn test_state_dir_file_is_used() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "base_url = \"https://actalog.example.com\"\ntimeout_secs = 30\n",
        )
        .unwrap();

        let config = load_client_config(None, dir.path(), None, None).unwrap();
        assert_eq!(config.base_url, "https://actalog.example.com");
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("custom.toml");
        std::fs::write(&file, "base_url = \"https://actalog.example.com\"\n").unwrap();

        let config = load_client_config(
            Some(&file),
            dir.path(),
            Some("http://127.0.0.1:3000".to_string()),
            Some(5),
        )
        .unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:3000");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_client_config(None, dir.path(), Some("ftp://nope".to_string()), None);
        assert!(result.is_err());
    }
}
