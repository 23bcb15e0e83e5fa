//! Gateway configuration
//!
//! Loaded from `~/.ollamabridge/config.toml`, then overridden by the
//! environment contract the original deployment scripts rely on:
//! `OLLAMA_HOST`, `PORT`, `PATH_BASE`, `ACCEPTED_USERS` (JSON map),
//! `PREFERRED_MODELS` (JSON array) and `LUA_TOOLS_DIR`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub models: ModelsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TCP port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// URL prefix all routes are nested under (empty for root)
    #[serde(default)]
    pub path_base: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            path_base: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the Ollama backend
    #[serde(default = "default_backend_host")]
    pub host: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: default_backend_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Directory of script tools, one `<name>.lua` per tool
    #[serde(default = "default_script_dir")]
    pub script_dir: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            script_dir: default_script_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    /// Principal name to JWT signing secret
    #[serde(default)]
    pub accepted_users: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Models surfaced first in client UIs
    #[serde(default = "default_preferred_models")]
    pub preferred: Vec<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            preferred: default_preferred_models(),
        }
    }
}

fn default_port() -> u16 {
    8081
}

fn default_backend_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_script_dir() -> PathBuf {
    PathBuf::from("lua-tools")
}

fn default_preferred_models() -> Vec<String> {
    [
        "qwen2.5-coder:32b",
        "gemma3-12b:custom",
        "qwq:32b-q4_K_M",
        "huihui_ai/qwen2.5-coder-abliterate:14b-instruct-q4_K_M",
        "huihui_ai/phi4-abliterated:latest",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Config {
    /// Load configuration, creating the default file if none exists at
    /// the conventional path. An explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(explicit) => {
                if !explicit.exists() {
                    anyhow::bail!("config file not found: {}", explicit.display());
                }
                explicit.to_path_buf()
            }
            None => {
                let conventional = Self::config_path()?;
                if !conventional.exists() {
                    let config = Config::default();
                    config.save(&conventional)?;
                    return Ok(config);
                }
                conventional
            }
        };

        let contents = fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        fs::write(path, toml_string)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get the conventional configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Could not determine home directory")?;

        Ok(home.join(".ollamabridge").join("config.toml"))
    }

    /// Apply environment overrides. Environment wins over file values.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            if !host.is_empty() {
                self.backend.host = host;
            }
        }

        if let Ok(port) = std::env::var("PORT") {
            if !port.is_empty() {
                self.server.port = port
                    .parse()
                    .with_context(|| format!("invalid PORT value '{port}'"))?;
            }
        }

        if let Ok(path_base) = std::env::var("PATH_BASE") {
            self.server.path_base = path_base;
        }

        if let Ok(users) = std::env::var("ACCEPTED_USERS") {
            if !users.is_empty() {
                self.auth.accepted_users = serde_json::from_str(&users)
                    .context("ACCEPTED_USERS must be a JSON object of user to secret")?;
            }
        }

        if let Ok(preferred) = std::env::var("PREFERRED_MODELS") {
            if !preferred.is_empty() {
                self.models.preferred = serde_json::from_str(&preferred)
                    .context("PREFERRED_MODELS must be a JSON array of model names")?;
            }
        }

        if let Ok(dir) = std::env::var("LUA_TOOLS_DIR") {
            if !dir.is_empty() {
                self.tools.script_dir = PathBuf::from(dir);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.backend.host, "http://localhost:11434");
        assert_eq!(config.tools.script_dir, PathBuf::from("lua-tools"));
        assert!(config.auth.accepted_users.is_empty());
        assert!(!config.models.preferred.is_empty());
    }

    #[test]
    fn test_config_parses_partial_file() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9090

            [auth]
            accepted_users = { admin = "s3cret" }
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.auth.accepted_users.get("admin").unwrap(), "s3cret");
        // Unspecified sections keep their defaults
        assert_eq!(config.backend.host, "http://localhost:11434");
    }

    #[test]
    fn test_config_round_trip() {
        let mut config = Config::default();
        config.server.path_base = "/ai".to_string();

        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.server.path_base, "/ai");
    }

    #[test]
    #[serial]
    fn test_env_overrides_win() {
        std::env::set_var("OLLAMA_HOST", "http://gpu-box:11434");
        std::env::set_var("PORT", "8090");
        std::env::set_var("ACCEPTED_USERS", r#"{"ops": "topsecret"}"#);

        let mut config = Config::default();
        config.apply_env().unwrap();

        assert_eq!(config.backend.host, "http://gpu-box:11434");
        assert_eq!(config.server.port, 8090);
        assert_eq!(config.auth.accepted_users.get("ops").unwrap(), "topsecret");

        std::env::remove_var("OLLAMA_HOST");
        std::env::remove_var("PORT");
        std::env::remove_var("ACCEPTED_USERS");
    }

    #[test]
    #[serial]
    fn test_invalid_port_env_is_an_error() {
        std::env::set_var("PORT", "not-a-port");

        let mut config = Config::default();
        let result = config.apply_env();
        assert!(result.is_err());

        std::env::remove_var("PORT");
    }
}
