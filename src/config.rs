use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    /// `None` disables the AI stage; records then fall back to mined facts.
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub fetch_timeout: Duration,
    pub ai_timeout: Duration,
    /// Number of vendor pipelines allowed in flight at once.
    pub max_concurrency: usize,
    /// Cleaned text is truncated to this many characters before prompting.
    pub max_prompt_chars: usize,
    pub record_cache_ttl: Duration,
    pub data_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            openai_model: DEFAULT_OPENAI_MODEL.to_string(),
            fetch_timeout: Duration::from_secs(10),
            ai_timeout: Duration::from_secs(30),
            max_concurrency: 4,
            max_prompt_chars: 3000,
            record_cache_ttl: Duration::from_secs(3600),
            data_file: PathBuf::from("competitor_data.json"),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field(
                "openai_api_key",
                &self.openai_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("ai_timeout", &self.ai_timeout)
            .field("max_concurrency", &self.max_concurrency)
            .field("max_prompt_chars", &self.max_prompt_chars)
            .field("record_cache_ttl", &self.record_cache_ttl)
            .field("data_file", &self.data_file)
            .finish()
    }
}

/// Reads an optional variable, treating blank values as unset.
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match env_opt(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let config = Self {
            port: env_parse("PORT", defaults.port)
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_base_url: env_opt("OPENAI_BASE_URL")
                .unwrap_or(defaults.openai_base_url)
                .trim_end_matches('/')
                .to_string(),
            openai_model: env_opt("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            fetch_timeout: Duration::from_secs(env_parse(
                "FETCH_TIMEOUT_SECS",
                defaults.fetch_timeout.as_secs(),
            )?),
            ai_timeout: Duration::from_secs(env_parse(
                "AI_TIMEOUT_SECS",
                defaults.ai_timeout.as_secs(),
            )?),
            max_concurrency: env_parse("MAX_CONCURRENCY", defaults.max_concurrency)?,
            max_prompt_chars: env_parse("MAX_PROMPT_CHARS", defaults.max_prompt_chars)?,
            record_cache_ttl: Duration::from_secs(env_parse(
                "RECORD_CACHE_TTL_SECS",
                defaults.record_cache_ttl.as_secs(),
            )?),
            data_file: env_opt("DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_file),
        };

        config.validate()?;

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("OpenAI base URL: {}", config.openai_base_url);
        tracing::debug!("OpenAI model: {}", config.openai_model);
        if config.openai_api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY not set, AI normalization disabled");
        }
        tracing::debug!(
            "Timeouts: fetch {:?}, AI {:?}; concurrency {}",
            config.fetch_timeout,
            config.ai_timeout,
            config.max_concurrency
        );
        tracing::debug!("Data file: {}", config.data_file.display());

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let base = url::Url::parse(&self.openai_base_url)
            .map_err(|e| anyhow::anyhow!("OPENAI_BASE_URL is not a valid URL: {}", e))?;
        if base.scheme() != "http" && base.scheme() != "https" {
            anyhow::bail!("OPENAI_BASE_URL must start with http:// or https://");
        }
        if !(1..=16).contains(&self.max_concurrency) {
            anyhow::bail!("MAX_CONCURRENCY must be between 1 and 16");
        }
        if self.max_prompt_chars < 200 {
            anyhow::bail!("MAX_PROMPT_CHARS must be at least 200");
        }
        if self.fetch_timeout.is_zero() || self.ai_timeout.is_zero() {
            anyhow::bail!("FETCH_TIMEOUT_SECS and AI_TIMEOUT_SECS must be positive");
        }
        Ok(())
    }
}
