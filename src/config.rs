//! Runtime configuration
//!
//! Every setting is read from the environment first and falls back to an
//! INI file (`config.ini` by default). A `.env` file is loaded beforehand
//! when present.

use std::env;
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "config.ini";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Completion endpoint settings. All four strings are required.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub basic_url: String,
    pub model_name: String,
    pub api_version: String,
    pub access_token: String,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub completion: CompletionConfig,
    /// Postgres URL for the document store; in-memory when absent
    pub store_url: Option<String>,
    pub log_level: String,
    pub port: u16,
}

/// One setting: env var name plus its `[SECTION] KEY` fallback.
struct Setting {
    env: &'static str,
    section: &'static str,
    key: &'static str,
}

const BASIC_URL: Setting = Setting { env: "CHATGPT_BASIC_URL", section: "CHATGPT", key: "BASICURL" };
const MODEL_NAME: Setting = Setting { env: "CHATGPT_MODEL_NAME", section: "CHATGPT", key: "MODELNAME" };
const API_VERSION: Setting = Setting { env: "CHATGPT_API_VERSION", section: "CHATGPT", key: "APIVERSION" };
const ACCESS_TOKEN: Setting = Setting { env: "CHATGPT_ACCESS_TOKEN", section: "CHATGPT", key: "ACCESS_TOKEN" };
const TIMEOUT_SECS: Setting = Setting { env: "CHATGPT_TIMEOUT_SECS", section: "CHATGPT", key: "TIMEOUT_SECS" };
const STORE_URL: Setting = Setting { env: "STORE_URL", section: "STORE", key: "URL" };
const LOG_LEVEL: Setting = Setting { env: "LOG_LEVEL", section: "LOGGING", key: "LEVEL" };
const PORT: Setting = Setting { env: "PORT", section: "SERVER", key: "PORT" };

/// Layered lookup over an environment and an optional config file.
pub struct ConfigSource<E> {
    env: E,
    file: Option<config::Config>,
}

impl ConfigSource<fn(&str) -> Option<String>> {
    /// Process environment plus `config.ini` in the working directory.
    pub fn from_environment() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::with_file(|key| env::var(key).ok(), DEFAULT_CONFIG_FILE)
    }
}

impl<E> ConfigSource<E>
where
    E: Fn(&str) -> Option<String>,
{
    pub fn with_file(env: E, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = if path.exists() {
            let built = config::Config::builder()
                .add_source(config::File::from(path).format(config::FileFormat::Ini))
                .build()?;
            Some(built)
        } else {
            None
        };

        Ok(Self { env, file })
    }

    pub fn env_only(env: E) -> Self {
        Self { env, file: None }
    }

    fn lookup(&self, setting: &Setting) -> Option<String> {
        if let Some(value) = (self.env)(setting.env).filter(|v| !v.trim().is_empty()) {
            return Some(value);
        }

        let file = self.file.as_ref()?;
        let exact = format!("{}.{}", setting.section, setting.key);
        file.get_string(&exact)
            .or_else(|_| file.get_string(&exact.to_lowercase()))
            .ok()
            .filter(|v| !v.trim().is_empty())
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let required = [
            ("basic_url", self.lookup(&BASIC_URL)),
            ("model_name", self.lookup(&MODEL_NAME)),
            ("api_version", self.lookup(&API_VERSION)),
            ("access_token", self.lookup(&ACCESS_TOKEN)),
        ];

        let missing: Vec<&'static str> = required
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        let [basic_url, model_name, api_version, access_token] =
            required.map(|(_, value)| value.unwrap_or_default());

        let timeout = match self.lookup(&TIMEOUT_SECS) {
            Some(raw) => Some(Duration::from_secs(raw.trim().parse().map_err(|_| {
                ConfigError::Invalid { key: TIMEOUT_SECS.env, value: raw.clone() }
            })?)),
            None => None,
        };

        let port = match self.lookup(&PORT) {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key: PORT.env, value: raw.clone() })?,
            None => DEFAULT_PORT,
        };

        let store_url = self
            .lookup(&STORE_URL)
            .or_else(|| (self.env)("DATABASE_URL").filter(|v| !v.trim().is_empty()));

        Ok(AppConfig {
            completion: CompletionConfig {
                basic_url,
                model_name,
                api_version,
                access_token,
                timeout,
            },
            store_url,
            log_level: self
                .lookup(&LOG_LEVEL)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            port,
        })
    }

    /// Only the store URL, for tools that never talk to the model.
    pub fn store_url(&self) -> Option<String> {
        self.lookup(&STORE_URL)
            .or_else(|| (self.env)("DATABASE_URL").filter(|v| !v.trim().is_empty()))
    }

    pub fn log_level(&self) -> String {
        self.lookup(&LOG_LEVEL)
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }
}
