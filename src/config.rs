// Configuration for backend clients
//
// Sensitive values (API keys, bearer tokens) come from environment variables,
// optionally seeded from a .env file via dotenvy. Configuration is read once
// and is immutable afterwards, so a single BenchConfig can be shared by every
// concurrent invocation.
//
// Credentials are optional at load time: a benchmark run that only targets
// OpenRouter models should not need AWS settings. A missing credential is
// reported when the backend that needs it is constructed.

use crate::error::{BenchError, Result};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_AWS_REGION: &str = "us-east-1";
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// Process-wide, read-only settings for backend clients
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// OPENROUTER_API_KEY
    pub openrouter_api_key: Option<String>,

    /// OPENROUTER_BASE_URL, without the trailing /chat/completions
    pub openrouter_base_url: String,

    /// AWS_BEARER_TOKEN_BEDROCK
    pub bedrock_bearer_token: Option<String>,

    /// AWS_REGION
    pub aws_region: String,

    /// BEDROCK_ENDPOINT, derived from the region when unset
    pub bedrock_endpoint: String,

    /// Used when an invocation does not supply its own system instructions
    pub default_system_instructions: Option<String>,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,

    /// Unit for exponential backoff between throttled attempts
    pub backoff_base: Duration,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            openrouter_api_key: None,
            openrouter_base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
            bedrock_bearer_token: None,
            aws_region: DEFAULT_AWS_REGION.to_string(),
            bedrock_endpoint: bedrock_endpoint_for(DEFAULT_AWS_REGION),
            default_system_instructions: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
        }
    }
}

fn bedrock_endpoint_for(region: &str) -> String {
    format!("https://bedrock-runtime.{}.amazonaws.com", region)
}

impl BenchConfig {
    /// Load configuration from the process environment
    ///
    /// A .env file in the working directory is loaded first if present.
    ///
    /// # Errors
    /// - REQUEST_TIMEOUT_SECS or BACKOFF_BASE_MS is not a number
    pub fn from_env() -> Result<Self> {
        // Missing .env is fine
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from a specific .env file
    ///
    /// Values in the file take precedence; anything it does not define falls
    /// back to the process environment. The process environment is not
    /// modified.
    pub fn from_env_file(path: &Path) -> Result<Self> {
        let iter = dotenvy::from_path_iter(path).map_err(|e| {
            BenchError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut values = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|e| {
                BenchError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
            })?;
            values.insert(key, value);
        }

        Self::from_lookup(|key| values.get(key).cloned().or_else(|| std::env::var(key).ok()))
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let aws_region = non_empty("AWS_REGION").unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());
        let bedrock_endpoint = non_empty("BEDROCK_ENDPOINT")
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| bedrock_endpoint_for(&aws_region));

        let request_timeout = match non_empty("REQUEST_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number("REQUEST_TIMEOUT_SECS", &raw)?),
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };
        let backoff_base = match non_empty("BACKOFF_BASE_MS") {
            Some(raw) => Duration::from_millis(parse_number("BACKOFF_BASE_MS", &raw)?),
            None => Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
        };

        Ok(Self {
            openrouter_api_key: non_empty("OPENROUTER_API_KEY"),
            openrouter_base_url: non_empty("OPENROUTER_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_OPENROUTER_BASE_URL.to_string()),
            bedrock_bearer_token: non_empty("AWS_BEARER_TOKEN_BEDROCK"),
            aws_region,
            bedrock_endpoint,
            default_system_instructions: non_empty("DEFAULT_SYSTEM_INSTRUCTIONS"),
            request_timeout,
            backoff_base,
        })
    }

    /// OpenRouter key, or an EnvError naming the missing variable
    pub fn require_openrouter_key(&self) -> Result<&str> {
        self.openrouter_api_key.as_deref().ok_or_else(|| {
            BenchError::EnvError("OPENROUTER_API_KEY environment variable not set".to_string())
        })
    }

    /// Bedrock bearer token, or an EnvError naming the missing variable
    pub fn require_bedrock_token(&self) -> Result<&str> {
        self.bedrock_bearer_token.as_deref().ok_or_else(|| {
            BenchError::EnvError(
                "AWS_BEARER_TOKEN_BEDROCK environment variable not set".to_string(),
            )
        })
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| BenchError::ConfigError(format!("{} is not a number ({}): {}", key, raw, e)))
}
