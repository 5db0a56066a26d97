//! Configuration loader and validator for the daily-quote bot.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub telegram: Telegram,
    pub providers: Providers,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    /// Debounce before each auto-fill scan, in milliseconds.
    pub autofill_debounce_ms: u64,
}

/// Telegram bot settings. `admin_password` is the shared secret that
/// unlocks editorial commands for a chat session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Telegram {
    pub bot_token: String,
    pub admin_password: String,
}

/// Content-generation provider settings. `secondary` is optional; with
/// neither configured the chain serves only pool quotes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Providers {
    pub primary: Option<Provider>,
    pub secondary: Option<Provider>,
    /// Cooldown after a quota/rate error, in minutes.
    pub cooldown_minutes: u64,
    /// Upstream request timeout, in seconds.
    pub request_timeout_seconds: u64,
}

/// One OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Provider {
    /// Base URL including `/v1`, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.autofill_debounce_ms == 0 {
        return Err(ConfigError::Invalid("app.autofill_debounce_ms must be > 0"));
    }

    if cfg.telegram.bot_token.trim().is_empty() {
        return Err(ConfigError::Invalid("telegram.bot_token must be non-empty"));
    }
    if cfg.telegram.admin_password.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "telegram.admin_password must be non-empty",
        ));
    }

    if cfg.providers.cooldown_minutes == 0 {
        return Err(ConfigError::Invalid(
            "providers.cooldown_minutes must be > 0",
        ));
    }
    if cfg.providers.request_timeout_seconds == 0 {
        return Err(ConfigError::Invalid(
            "providers.request_timeout_seconds must be > 0",
        ));
    }

    for (provider, label) in [
        (&cfg.providers.primary, "primary"),
        (&cfg.providers.secondary, "secondary"),
    ] {
        let Some(p) = provider else { continue };
        if p.api_base.trim().is_empty() {
            return Err(match label {
                "primary" => ConfigError::Invalid("providers.primary.api_base must be non-empty"),
                _ => ConfigError::Invalid("providers.secondary.api_base must be non-empty"),
            });
        }
        if p.api_key.trim().is_empty() {
            return Err(match label {
                "primary" => ConfigError::Invalid("providers.primary.api_key must be non-empty"),
                _ => ConfigError::Invalid("providers.secondary.api_key must be non-empty"),
            });
        }
        if p.model.trim().is_empty() {
            return Err(match label {
                "primary" => ConfigError::Invalid("providers.primary.model must be non-empty"),
                _ => ConfigError::Invalid("providers.secondary.model must be non-empty"),
            });
        }
    }

    Ok(())
}

/// Example YAML configuration.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  autofill_debounce_ms: 1500

telegram:
  bot_token: "YOUR_TELEGRAM_BOT_TOKEN"
  admin_password: "CHANGE_ME"

providers:
  cooldown_minutes: 10
  request_timeout_seconds: 30
  primary:
    api_base: "https://api.openai.com/v1"
    api_key: "YOUR_OPENAI_API_KEY"
    model: "gpt-4o-mini"
  secondary:
    api_base: "https://openrouter.ai/api/v1"
    api_key: "YOUR_OPENROUTER_API_KEY"
    model: "google/gemini-flash-1.5"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
    }

    #[test]
    fn invalid_bot_token() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.telegram.bot_token = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("telegram.bot_token")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_admin_password() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.telegram.admin_password = "  ".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("admin_password")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn providers_are_optional() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.providers.primary = None;
        cfg.providers.secondary = None;
        validate(&cfg).unwrap();
    }

    #[test]
    fn invalid_provider_fields() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.providers.primary.as_mut().unwrap().api_key = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("primary.api_key")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.providers.secondary.as_mut().unwrap().model = "".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_cooldown() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.providers.cooldown_minutes = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.providers.cooldown_minutes, 10);
        assert!(cfg.providers.primary.is_some());
    }
}
