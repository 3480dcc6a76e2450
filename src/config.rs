// Tool Configuration
//
// Credentials and Chef settings shared by every command, loaded from
// ~/.rackstrap/config.json and overridden by flags or environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::rackspace::DEFAULT_AUTH_URL;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // Rackspace credentials
    pub rackspace_api_username: Option<String>,
    pub rackspace_api_key: Option<String>,
    pub rackspace_auth_url: String,

    // Chef server the new node registers with
    pub chef_server_url: String,
    pub validation_client_name: String,
    pub validation_key: PathBuf,
    pub chef_version: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rackspace_api_username: None,
            rackspace_api_key: None,
            rackspace_auth_url: DEFAULT_AUTH_URL.to_string(),
            chef_server_url: "http://localhost:4000".to_string(),
            validation_client_name: "chef-validator".to_string(),
            validation_key: PathBuf::from("/etc/chef/validation.pem"),
            chef_version: None,
        }
    }
}

/// Rackspace username and API key, both present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub api_key: String,
}

impl Config {
    /// Apply flag/environment values on top of the file values
    pub fn with_credentials(mut self, username: Option<String>, api_key: Option<String>) -> Self {
        if username.is_some() {
            self.rackspace_api_username = username;
        }
        if api_key.is_some() {
            self.rackspace_api_key = api_key;
        }
        self
    }

    pub fn credentials(&self) -> Result<Credentials> {
        let username = self.rackspace_api_username.clone()
            .filter(|u| !u.is_empty())
            .context("Missing Rackspace API username (use --rackspace-api-username or RACKSPACE_API_USERNAME)")?;
        let api_key = self.rackspace_api_key.clone()
            .filter(|k| !k.is_empty())
            .context("Missing Rackspace API key (use --rackspace-api-key or RACKSPACE_API_KEY)")?;

        Ok(Credentials { username, api_key })
    }
}

/// Default location of the config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".rackstrap").join("config.json"))
}

/// Load configuration from a JSON file. A missing file gives the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!("No config file at {}, using defaults", path.display());
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("nope.json")).unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.rackspace_auth_url, DEFAULT_AUTH_URL);
        assert_eq!(config.validation_client_name, "chef-validator");
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"rackspace_api_username": "alice", "chef_server_url": "https://chef.example.com"}}"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.rackspace_api_username.as_deref(), Some("alice"));
        assert_eq!(config.chef_server_url, "https://chef.example.com");
        assert_eq!(config.validation_key, PathBuf::from("/etc/chef/validation.pem"));
        assert_eq!(config.rackspace_api_key, None);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let config = Config {
            rackspace_api_username: Some("file-user".to_string()),
            rackspace_api_key: Some("file-key".to_string()),
            ..Config::default()
        }
        .with_credentials(Some("flag-user".to_string()), None);

        let creds = config.credentials().unwrap();
        assert_eq!(creds.username, "flag-user");
        assert_eq!(creds.api_key, "file-key");
    }

    #[test]
    fn test_missing_credentials() {
        let config = Config::default().with_credentials(Some("alice".to_string()), None);

        let err = config.credentials().unwrap_err();
        assert!(err.to_string().contains("API key"));
    }
}
