//! Configuration management for reagent
//!
//! Supports environment variables, config files, and runtime overrides.
//! The provider, iteration bound, memory backend and command tools are all
//! interchangeable via settings.
//!
//! Config file location: ~/.config/reagent/config.toml

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

use crate::core::error::{ReagentError, Result};

/// Main configuration for reagent
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,
    /// Conversation memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,
    /// External command tools exposed to the model
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<CommandToolConfig>,
}

/// Which provider client to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Local Ollama server
    Ollama,
    /// Any OpenAI-compatible chat completions endpoint
    #[serde(alias = "openai-compatible")]
    OpenAi,
}

impl std::str::FromStr for ProviderKind {
    type Err = ReagentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" | "openai-compatible" => Ok(Self::OpenAi),
            other => Err(ReagentError::config(format!("Unknown provider: {}", other))),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Ollama => write!(f, "ollama"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Provider implementation
    pub kind: ProviderKind,
    /// Endpoint base URL (defaults depend on the provider kind)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// API key for authenticated endpoints
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model name sent with every request
    pub model: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Agent behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum model calls per run before giving up
    /// Default: 10
    pub max_iterations: usize,
    /// Forward raw deltas while streaming (exposes partial action JSON)
    pub debug: bool,
    /// Conversation thread used for memory load/save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Extra instructions appended to the system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Capacity of the bounded stream chunk channel
    /// Default: 10
    pub channel_capacity: usize,
}

/// Memory backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryBackend {
    /// No persistence
    None,
    /// In-process buffer (lost on exit)
    Buffer,
    /// One JSON file per conversation
    File,
}

/// Conversation memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Which backend to use
    pub backend: MemoryBackend,
    /// Directory for the file backend (default: ~/.local/share/reagent/conversations)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// An external program exposed to the model as a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandToolConfig {
    /// Tool name the model uses in call_tool actions
    pub name: String,
    /// Description injected into the system prompt
    pub description: String,
    /// Program to execute
    pub command: String,
    /// Fixed arguments placed before the JSON-encoded call arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Kill the program after this many seconds
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,
}

fn default_tool_timeout() -> u64 {
    60
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key).ok().map(|v| v == "true" || v == "1")
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let kind = env::var("REAGENT_PROVIDER")
            .ok()
            .and_then(|k| k.parse().ok())
            .unwrap_or(ProviderKind::Ollama);

        let default_model = match kind {
            ProviderKind::Ollama => "qwen3:8b",
            ProviderKind::OpenAi => "gpt-4o-mini",
        };

        Self {
            kind,
            base_url: env::var("REAGENT_BASE_URL").ok(),
            api_key: env::var("REAGENT_API_KEY")
                .or_else(|_| env::var("OPENAI_API_KEY"))
                .ok(),
            model: env::var("REAGENT_MODEL").unwrap_or_else(|_| default_model.to_string()),
            timeout_secs: 120,
            temperature: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: env::var("REAGENT_MAX_ITERATIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
            debug: env_flag("REAGENT_DEBUG").unwrap_or(false),
            conversation_id: env::var("REAGENT_CONVERSATION_ID").ok(),
            system_prompt: None,
            channel_capacity: 10,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        let backend = match env::var("REAGENT_MEMORY").as_deref() {
            Ok("none") => MemoryBackend::None,
            Ok("file") => MemoryBackend::File,
            _ => MemoryBackend::Buffer,
        };

        Self { backend, dir: None }
    }
}

impl ProviderConfig {
    /// Base URL with the provider default applied
    pub fn base_url(&self) -> String {
        match (&self.base_url, self.kind) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, ProviderKind::Ollama) => "http://localhost:11434".to_string(),
            (None, ProviderKind::OpenAi) => "https://api.openai.com/v1".to_string(),
        }
    }
}

impl MemoryConfig {
    /// Directory used by the file backend
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("reagent")
                .join("conversations")
        })
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reagent")
    }

    /// Get the config file path
    pub fn config_file() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from file, environment, and defaults
    /// Priority: CLI args > config file > env vars > defaults
    pub fn load() -> Self {
        let _ = dotenvy::dotenv();

        match Self::load_from_file() {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("Using default configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Load configuration from file only
    pub fn load_from_file() -> Result<Self> {
        let config_path = Self::config_file();

        if !config_path.exists() {
            return Err(ReagentError::config("Config file not found"));
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| ReagentError::config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| ReagentError::config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        let config_dir = Self::config_dir();
        let config_path = Self::config_file();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|e| {
                ReagentError::config(format!("Failed to create config dir: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ReagentError::config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, content)
            .map_err(|e| ReagentError::config(format!("Failed to write config: {}", e)))?;

        Ok(config_path)
    }

    /// Reject settings the agent cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations == 0 {
            return Err(ReagentError::config("max_iterations must be greater than 0"));
        }

        if self.agent.channel_capacity == 0 {
            return Err(ReagentError::config(
                "channel_capacity must be greater than 0",
            ));
        }

        let base_url = self.provider.base_url();
        url::Url::parse(&base_url).map_err(|e| {
            ReagentError::config(format!("Invalid provider base_url '{}': {}", base_url, e))
        })?;

        for (i, tool) in self.tools.iter().enumerate() {
            if tool.name.trim().is_empty() {
                return Err(ReagentError::config(format!("tools[{}] has an empty name", i)));
            }
            if self.tools[..i].iter().any(|t| t.name == tool.name) {
                tracing::warn!(tool = %tool.name, "Duplicate tool name; the first definition wins");
            }
        }

        Ok(())
    }

    /// Generate a default config file content for display
    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&Config::default())
            .unwrap_or_else(|_| String::from("# Error generating config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.agent.max_iterations > 0);
        assert_eq!(config.agent.channel_capacity, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_url_defaults() {
        let mut provider = ProviderConfig::default();
        provider.base_url = None;

        provider.kind = ProviderKind::Ollama;
        assert_eq!(provider.base_url(), "http://localhost:11434");

        provider.kind = ProviderKind::OpenAi;
        assert_eq!(provider.base_url(), "https://api.openai.com/v1");

        provider.base_url = Some("https://api.deepseek.com/v1/".to_string());
        assert_eq!(provider.base_url(), "https://api.deepseek.com/v1");
    }

    #[test]
    fn test_parse_toml() {
        let config = Config::from_toml(
            r#"
            [provider]
            kind = "openai"
            base_url = "https://api.deepseek.com/v1"
            model = "deepseek-chat"
            timeout_secs = 30

            [agent]
            max_iterations = 4
            debug = false
            channel_capacity = 16
            conversation_id = "abc"

            [memory]
            backend = "file"
            dir = "/tmp/reagent"

            [[tools]]
            name = "date"
            description = "Prints the current date"
            command = "date"
            "#,
        )
        .unwrap();

        assert_eq!(config.provider.kind, ProviderKind::OpenAi);
        assert_eq!(config.agent.max_iterations, 4);
        assert_eq!(config.agent.conversation_id.as_deref(), Some("abc"));
        assert_eq!(config.memory.backend, MemoryBackend::File);
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.tools[0].timeout_secs, 60);
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let config = Config::from_toml(
            r#"
            [provider]
            kind = "ollama"

            [agent]
            max_iterations = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.provider.timeout_secs, 120);
        assert_eq!(config.agent.max_iterations, 3);
        assert_eq!(config.agent.channel_capacity, 10);
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut config = Config::default();
        config.agent.max_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut config = Config::default();
        config.provider.base_url = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialization() {
        let toml_str = Config::default_config_toml();
        assert!(toml_str.contains("max_iterations"));
        assert!(toml_str.contains("model"));
    }

    #[test]
    fn test_provider_kind_parse() {
        assert_eq!("Ollama".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert!("gemini".parse::<ProviderKind>().is_err());
    }
}
