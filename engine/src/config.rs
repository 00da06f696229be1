use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use duet_types::{AiTarget, UiOptions};

/// Model handed to `claude --model` when the config has no `[claude]` section.
pub const DEFAULT_CLAUDE_MODEL: &str = "haiku";

/// Model handed to `gemini --model` when the config has no `[gemini]` section.
/// Flash over flash-lite: the lite variant drops into shell mode too eagerly.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 720;
const DEFAULT_MAX_MESSAGES: usize = 100;
const DEFAULT_CONTEXT_LIMIT: usize = 5;

/// User configuration loaded from `~/.duet/config.toml`.
///
/// Every section is optional; a missing file or empty table means defaults
/// everywhere. Accessors resolve the defaults so callers never see `Option`s.
#[derive(Debug, Default, Deserialize)]
pub struct DuetConfig {
    pub app: Option<AppSection>,
    pub claude: Option<AgentSection>,
    pub gemini: Option<AgentSection>,
    pub session: Option<SessionSection>,
    pub history: Option<HistorySection>,
}

#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppSection {
    /// Use ASCII-only glyphs for markers and spinners.
    #[serde(default)]
    pub ascii_only: bool,
    /// Enable a high-contrast color palette.
    #[serde(default)]
    pub high_contrast: bool,
    /// Disable the startup animation and spinner motion.
    #[serde(default)]
    pub reduced_motion: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct AgentSection {
    /// Model name passed to the CLI's `--model` flag.
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionSection {
    /// How long one prompt round-trip may take before it is abandoned.
    pub response_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistorySection {
    /// Oldest messages are dropped past this count.
    pub max_messages: Option<usize>,
    /// Max unseen messages injected as context per prompt.
    pub context_limit: Option<usize>,
}

impl DuetConfig {
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let path = match config_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    #[must_use]
    pub fn ui_options(&self) -> UiOptions {
        let app = self.app.as_ref();
        UiOptions {
            ascii_only: app.is_some_and(|a| a.ascii_only),
            high_contrast: app.is_some_and(|a| a.high_contrast),
            reduced_motion: app.is_some_and(|a| a.reduced_motion),
        }
    }

    #[must_use]
    pub fn model(&self, target: AiTarget) -> String {
        let (section, fallback) = match target {
            AiTarget::Claude => (self.claude.as_ref(), DEFAULT_CLAUDE_MODEL),
            AiTarget::Gemini => (self.gemini.as_ref(), DEFAULT_GEMINI_MODEL),
        };
        section
            .and_then(|s| s.model.clone())
            .unwrap_or_else(|| fallback.to_owned())
    }

    #[must_use]
    pub fn response_timeout(&self) -> Duration {
        let secs = self
            .session
            .as_ref()
            .and_then(|s| s.response_timeout_secs)
            .unwrap_or(DEFAULT_RESPONSE_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    #[must_use]
    pub fn max_messages(&self) -> usize {
        self.history
            .as_ref()
            .and_then(|h| h.max_messages)
            .unwrap_or(DEFAULT_MAX_MESSAGES)
    }

    #[must_use]
    pub fn context_limit(&self) -> usize {
        self.history
            .as_ref()
            .and_then(|h| h.context_limit)
            .unwrap_or(DEFAULT_CONTEXT_LIMIT)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".duet").join("config.toml"))
}
