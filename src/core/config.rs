use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use super::error::ConfigError;
use super::retry::RetryPolicy;
use super::types::{DEFAULT_FETCH_RETRIES, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_BYTES};

pub const ENV_CONFIG_PATH: &str = "PAGE_SCOUT_CONFIG";
pub const ENV_BASE_URL: &str = "PAGE_SCOUT_BASE_URL";
pub const ENV_API_KEY: &str = "PAGE_SCOUT_API_KEY";
pub const ENV_MODEL: &str = "PAGE_SCOUT_MODEL";
pub const ENV_CHROME_EXECUTABLE: &str = "CHROME_EXECUTABLE";

pub const DEFAULT_CONTEXT_CHARS: usize = 15_000;
pub const DEFAULT_API_RETRIES: u32 = 3;
pub const DEFAULT_API_RETRY_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

// ---------------------------------------------------------------------------
// FileConfig: optional page-scout.json
// ---------------------------------------------------------------------------

/// Everything `page-scout.json` may carry. All fields optional; environment
/// variables fill the gaps.
#[derive(serde::Deserialize, Default, Clone, Debug)]
#[serde(default)]
pub struct FileConfig {
    /// Chat-completion API base, e.g. `https://api.openai.com/v1`.
    pub llm_base_url: Option<String>,
    /// Never logged.
    pub llm_api_key: Option<String>,
    pub llm_model: Option<String>,
    pub fetch_max_bytes: Option<usize>,
    pub fetch_retries: Option<u32>,
    pub fetch_timeout_secs: Option<u64>,
    /// Characters of page text sent with every prompt.
    pub context_chars: Option<usize>,
    pub api_retries: Option<u32>,
    pub api_retry_initial_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
    pub chrome_executable: Option<String>,
}

/// Load `page-scout.json` from standard locations.
///
/// Search order (first found wins):
/// 1. `PAGE_SCOUT_CONFIG` env var path
/// 2. `./page-scout.json`
/// 3. `../page-scout.json`
///
/// Missing file → `FileConfig::default()`.
/// Parse error → log a warning, return `FileConfig::default()`.
pub fn load_file_config() -> FileConfig {
    let mut candidates = vec![
        PathBuf::from("page-scout.json"),
        PathBuf::from("../page-scout.json"),
    ];
    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        candidates.insert(0, PathBuf::from(env_path));
    }

    for path in &candidates {
        let Ok(contents) = std::fs::read_to_string(path) else {
            continue;
        };
        return match serde_json::from_str::<FileConfig>(&contents) {
            Ok(cfg) => {
                tracing::info!("page-scout.json loaded from {}", path.display());
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    "page-scout.json parse error at {}: {} (ignoring file)",
                    path.display(),
                    e
                );
                FileConfig::default()
            }
        };
    }

    FileConfig::default()
}

// ---------------------------------------------------------------------------
// ScoutConfig: resolved, validated settings
// ---------------------------------------------------------------------------

/// Remote endpoint identity. Required; there are no defaults.
#[derive(Clone)]
pub struct LlmSettings {
    pub base_url: Url,
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub max_bytes: usize,
    pub retries: u32,
    pub timeout: Duration,
    pub chrome_executable: Option<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            retries: DEFAULT_FETCH_RETRIES,
            timeout: DEFAULT_FETCH_TIMEOUT,
            chrome_executable: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub context_chars: usize,
    pub api_retry: RetryPolicy,
}

impl Default for ExtractSettings {
    fn default() -> Self {
        Self {
            context_chars: DEFAULT_CONTEXT_CHARS,
            api_retry: RetryPolicy::exponential(DEFAULT_API_RETRIES, DEFAULT_API_RETRY_DELAY),
        }
    }
}

/// Fully resolved configuration, built once at startup and passed down.
#[derive(Debug, Clone)]
pub struct ScoutConfig {
    pub llm: LlmSettings,
    pub fetch: FetchSettings,
    pub extract: ExtractSettings,
}

impl ScoutConfig {
    /// Resolve from `page-scout.json` and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = load_file_config();
        Self::resolve(&file, |key| std::env::var(key).ok())
    }

    /// Resolve from an explicit file config and an environment lookup.
    ///
    /// Precedence per option: file → primary env var → fallback env var.
    /// Blank values are treated as absent.
    pub fn resolve<F>(file: &FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |from_file: &Option<String>, keys: &[&str]| -> Option<String> {
            non_blank(from_file.clone()).or_else(|| keys.iter().find_map(|k| non_blank(env(k))))
        };

        let base_url = lookup(&file.llm_base_url, &[ENV_BASE_URL, "OPENAI_BASE_URL"]);
        let api_key = lookup(&file.llm_api_key, &[ENV_API_KEY, "OPENAI_API_KEY"]);
        let model = lookup(&file.llm_model, &[ENV_MODEL, "MODEL"]);

        let mut missing = Vec::new();
        if base_url.is_none() {
            missing.push("remote_endpoint_base_url");
        }
        if api_key.is_none() {
            missing.push("remote_api_key");
        }
        if model.is_none() {
            missing.push("model_identifier");
        }
        let (Some(base_url), Some(api_key), Some(model)) = (base_url, api_key, model) else {
            return Err(ConfigError::Missing(missing));
        };

        let base_url = parse_base_url(&base_url)?;

        let fetch = FetchSettings {
            max_bytes: positive(file.fetch_max_bytes, DEFAULT_MAX_BYTES, "fetch_max_bytes")?,
            retries: positive(file.fetch_retries, DEFAULT_FETCH_RETRIES, "fetch_retries")?,
            timeout: Duration::from_secs(positive(
                file.fetch_timeout_secs,
                DEFAULT_FETCH_TIMEOUT.as_secs(),
                "fetch_timeout_secs",
            )?),
            chrome_executable: non_blank(file.chrome_executable.clone())
                .or_else(|| non_blank(env(ENV_CHROME_EXECUTABLE))),
        };

        let api_retry = RetryPolicy::exponential(
            positive(file.api_retries, DEFAULT_API_RETRIES, "api_retries")?,
            file.api_retry_initial_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_API_RETRY_DELAY),
        );
        let extract = ExtractSettings {
            context_chars: positive(file.context_chars, DEFAULT_CONTEXT_CHARS, "context_chars")?,
            api_retry,
        };

        let llm = LlmSettings {
            base_url,
            api_key,
            model,
            request_timeout: file
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        };

        Ok(Self {
            llm,
            fetch,
            extract,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        option: "remote_endpoint_base_url",
        reason: format!("{raw}: {e}"),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid {
            option: "remote_endpoint_base_url",
            reason: format!("{raw}: scheme must be http or https"),
        });
    }
    Ok(url)
}

fn positive<T>(value: Option<T>, default: T, option: &'static str) -> Result<T, ConfigError>
where
    T: PartialOrd + Default + Copy,
{
    match value {
        None => Ok(default),
        Some(v) if v > T::default() => Ok(v),
        Some(_) => Err(ConfigError::Invalid {
            option,
            reason: "must be greater than zero".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn all_required_options_from_env() {
        let cfg = ScoutConfig::resolve(
            &FileConfig::default(),
            env_of(&[
                (ENV_BASE_URL, "https://llm.example.com/v1"),
                (ENV_API_KEY, "sk-test"),
                (ENV_MODEL, "Qwen2-0.5B-Instruct"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.llm.base_url.as_str(), "https://llm.example.com/v1");
        assert_eq!(cfg.llm.model, "Qwen2-0.5B-Instruct");
        assert_eq!(cfg.fetch.retries, 3);
        assert_eq!(cfg.fetch.max_bytes, 100 * 1024 * 1024);
        assert_eq!(cfg.extract.context_chars, 15_000);
        assert_eq!(cfg.extract.api_retry.max_attempts, 3);
    }

    #[test]
    fn missing_options_are_all_reported() {
        let err = ScoutConfig::resolve(
            &FileConfig::default(),
            env_of(&[(ENV_BASE_URL, "https://llm.example.com/v1"), (ENV_API_KEY, "  ")]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Missing(vec!["remote_api_key", "model_identifier"])
        );
    }

    #[test]
    fn file_wins_over_env_and_fallback_vars_apply() {
        let file = FileConfig {
            llm_model: Some("from-file".into()),
            context_chars: Some(8_000),
            ..Default::default()
        };
        let cfg = ScoutConfig::resolve(
            &file,
            env_of(&[
                ("OPENAI_BASE_URL", "http://127.0.0.1:11434/v1"),
                ("OPENAI_API_KEY", "k"),
                (ENV_MODEL, "from-env"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.llm.model, "from-file");
        assert_eq!(cfg.llm.base_url.host_str(), Some("127.0.0.1"));
        assert_eq!(cfg.extract.context_chars, 8_000);
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let err = ScoutConfig::resolve(
            &FileConfig::default(),
            env_of(&[
                (ENV_BASE_URL, "not a url"),
                (ENV_API_KEY, "k"),
                (ENV_MODEL, "m"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                option: "remote_endpoint_base_url",
                ..
            }
        ));
    }

    #[test]
    fn zero_tunables_are_rejected() {
        let file = FileConfig {
            fetch_retries: Some(0),
            ..Default::default()
        };
        let err = ScoutConfig::resolve(
            &file,
            env_of(&[(ENV_BASE_URL, "https://x.dev/v1"), (ENV_API_KEY, "k"), (ENV_MODEL, "m")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { option: "fetch_retries", .. }));
    }

    #[test]
    fn zero_page_load_timeout_is_rejected() {
        let file = FileConfig {
            fetch_timeout_secs: Some(0),
            ..Default::default()
        };
        let err = ScoutConfig::resolve(
            &file,
            env_of(&[(ENV_BASE_URL, "https://x.dev/v1"), (ENV_API_KEY, "k"), (ENV_MODEL, "m")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { option: "fetch_timeout_secs", .. }));
    }

    #[test]
    fn api_key_is_redacted_in_debug() {
        let cfg = ScoutConfig::resolve(
            &FileConfig::default(),
            env_of(&[(ENV_BASE_URL, "https://x.dev/v1"), (ENV_API_KEY, "sk-secret"), (ENV_MODEL, "m")]),
        )
        .unwrap();
        assert!(!format!("{:?}", cfg).contains("sk-secret"));
    }
}
