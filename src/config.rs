//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Default chat model.
pub const DEFAULT_OLLAMA_MODEL: &str = "mistral";

/// Runtime configuration for the assistant.
#[derive(Debug, Clone)]
pub struct AuroraConfig {
    /// Agent name used in prompts and status output.
    pub agent_name: String,
    /// Root directory for profile, learning, and context data.
    pub data_dir: PathBuf,
    /// Directory holding static context documents (founder-profile.md etc).
    pub context_dir: PathBuf,
    /// Master switch for the pattern store's observation path.
    pub learning_enabled: bool,
    /// When true, only interactions with positive feedback are observed.
    pub feedback_required: bool,
    /// Interval between meal reminders.
    pub meal_reminder_interval: Duration,
    /// Focus threshold used when the profile does not specify one.
    pub default_focus_minutes: u32,
    /// Max characters of assembled context handed to the model.
    pub max_context_chars: usize,
    /// Number of prior exchanges replayed to the model.
    pub history_window: usize,
    /// Inference backend settings.
    pub llm: LlmSettings,
}

/// Inference backend settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub host: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_OLLAMA_HOST.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(120),
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl Default for AuroraConfig {
    fn default() -> Self {
        let data_dir = PathBuf::from(".aurora-forester");
        Self {
            agent_name: "Aurora Forester".to_string(),
            context_dir: data_dir.join("context"),
            data_dir,
            learning_enabled: true,
            feedback_required: true,
            meal_reminder_interval: Duration::from_secs(4 * 3600), // 4 hours
            default_focus_minutes: 90,
            max_context_chars: 2000,
            history_window: 5,
            llm: LlmSettings::default(),
        }
    }
}

impl AuroraConfig {
    /// Build a config rooted at `data_dir`, everything else default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            context_dir: data_dir.join("context"),
            data_dir,
            ..Default::default()
        }
    }

    /// Load configuration from `AURORA_*` / `OLLAMA_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = match std::env::var("AURORA_DATA_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => {
                let home = std::env::var("HOME")
                    .map_err(|_| ConfigError::NoHomeDir("AURORA_DATA_DIR".to_string()))?;
                PathBuf::from(home).join(".aurora-forester")
            }
        };

        let mut config = Self::with_data_dir(data_dir);

        if let Ok(dir) = std::env::var("AURORA_CONTEXT_DIR") {
            config.context_dir = PathBuf::from(dir);
        }
        if let Some(v) = env_parse::<bool>("AURORA_LEARNING_ENABLED")? {
            config.learning_enabled = v;
        }
        if let Some(v) = env_parse::<bool>("AURORA_FEEDBACK_REQUIRED")? {
            config.feedback_required = v;
        }
        if let Some(hours) = env_parse::<f64>("AURORA_MEAL_REMINDER_HOURS")? {
            if !(hours.is_finite() && hours > 0.0) {
                return Err(ConfigError::InvalidValue {
                    key: "AURORA_MEAL_REMINDER_HOURS".to_string(),
                    message: "must be a positive number of hours".to_string(),
                });
            }
            config.meal_reminder_interval = Duration::from_secs_f64(hours * 3600.0);
        }
        if let Some(v) = env_parse::<u32>("AURORA_FOCUS_MINUTES")? {
            config.default_focus_minutes = v;
        }
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            config.llm.host = host.trim_end_matches('/').to_string();
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            config.llm.model = model;
        }
        if let Ok(key) = std::env::var("OLLAMA_API_KEY")
            && !key.is_empty()
        {
            config.llm.api_key = Some(SecretString::from(key));
        }
        if let Some(v) = env_parse::<u32>("AURORA_LLM_MAX_RETRIES")? {
            config.llm.max_attempts = v.max(1);
        }

        Ok(config)
    }

    /// Directory holding the founder profile and its access log.
    pub fn profile_dir(&self) -> PathBuf {
        self.data_dir.join("secure-profile")
    }

    /// Directory holding per-domain pattern files.
    pub fn patterns_dir(&self) -> PathBuf {
        self.data_dir.join("learning").join("patterns")
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        Err(_) => Ok(None),
    }
}
