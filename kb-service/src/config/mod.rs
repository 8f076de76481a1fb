use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct KbConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub llm: LlmConfig,
    pub firecrawl: FirecrawlSettings,
    pub session: SessionConfig,
    pub sitemap_path: String,
    /// Upper bound for every LLM, fetch, sitemap and store call.
    pub external_call_timeout_seconds: u64,
    /// `*` allows any origin.
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    Gemini,
    Mock,
}

impl FromStr for LlmProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "mock" => Ok(Self::Mock),
            other => Err(format!("unknown LLM provider '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub api_key: String,
    /// Chat model (e.g., gemini-2.0-flash)
    pub model: String,
    pub temperature: f32,
    /// Retries after the first attempt for transient failures.
    pub max_retries: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirecrawlSettings {
    pub api_key: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    Redis,
    Memory,
}

impl FromStr for SessionBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown session backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    pub redis_url: String,
    pub key_prefix: String,
    pub ttl_seconds: u64,
}

impl KbConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let provider: LlmProviderKind = parse_env("LLM_PROVIDER", "gemini")?;

        Ok(KbConfig {
            common: common_config,
            llm: LlmConfig {
                provider,
                api_key: get_secret(
                    "GOOGLE_API_KEY",
                    provider == LlmProviderKind::Gemini,
                )?,
                model: get_env("GENAI_TEXT_MODEL", Some("gemini-2.0-flash"))?,
                temperature: parse_env("LLM_TEMPERATURE", "0")?,
                max_retries: parse_env("LLM_MAX_RETRIES", "1")?,
            },
            firecrawl: FirecrawlSettings {
                api_key: get_secret("FIRECRAWL_API_KEY", is_prod)?,
                base_url: get_env("FIRECRAWL_BASE_URL", Some("https://api.firecrawl.dev"))?,
            },
            session: SessionConfig {
                backend: parse_env("SESSION_BACKEND", if is_prod { "redis" } else { "memory" })?,
                redis_url: get_env("REDIS_URL", Some("redis://127.0.0.1:6379"))?,
                key_prefix: get_env("SESSION_KEY_PREFIX", Some("kb:session"))?,
                ttl_seconds: parse_env("SESSION_TTL_SECONDS", "86400")?,
            },
            sitemap_path: get_env("SITEMAP_PATH", Some("data/sitemap.xml"))?,
            external_call_timeout_seconds: parse_env("EXTERNAL_CALL_TIMEOUT_SECONDS", "30")?,
            cors_allowed_origins: get_env("CORS_ALLOWED_ORIGINS", Some("*"))?
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        })
    }

    pub fn external_call_timeout(&self) -> Duration {
        Duration::from_secs(self.external_call_timeout_seconds)
    }
}

fn get_env(key: &str, default: Option<&str>) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => match default {
            Some(def) => Ok(def.to_string()),
            None => Err(AppError::ConfigError(anyhow::anyhow!(
                "{} is required but not set",
                key
            ))),
        },
    }
}

/// API keys are empty when not required; a required one must be non-empty.
fn get_secret(key: &str, required: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ if required => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} is required but not set",
            key
        ))),
        _ => Ok(String::new()),
    }
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, Some(default))?;
    raw.parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("Gemini".parse::<LlmProviderKind>(), Ok(LlmProviderKind::Gemini));
        assert_eq!("mock".parse::<LlmProviderKind>(), Ok(LlmProviderKind::Mock));
        assert!("openai".parse::<LlmProviderKind>().is_err());
    }

    #[test]
    fn session_backend_parses() {
        assert_eq!("redis".parse::<SessionBackend>(), Ok(SessionBackend::Redis));
        assert_eq!(" MEMORY ".parse::<SessionBackend>(), Ok(SessionBackend::Memory));
        assert!("postgres".parse::<SessionBackend>().is_err());
    }

    #[test]
    fn parse_env_uses_default_and_rejects_garbage() {
        let ttl: u64 = parse_env("KB_TEST_UNSET_TTL_SECONDS", "86400").unwrap();
        assert_eq!(ttl, 86400);

        let bad: Result<u64, _> = parse_env("KB_TEST_UNSET_BAD", "soon");
        assert!(bad.is_err());
    }

    #[test]
    fn unset_optional_secret_is_empty() {
        assert_eq!(get_secret("KB_TEST_UNSET_SECRET", false).unwrap(), "");
        assert!(get_secret("KB_TEST_UNSET_SECRET", true).is_err());
    }
}
