use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::collections::BTreeSet;
use std::env;

/// Compiled-in blacklist: namespaces that only republish or quantize
/// upstream models.
const STATIC_BLACKLIST: &[&str] = &[
    "ubergarm",
    "unsloth",
    "mradermacher",
    "bartowski",
    "mlx-community",
    "noctrex",
    "onnxruntime",
    "lmstudio-community",
    "ggml-org",
    "devquasar",
    "thireus",
];

/// Compiled-in whitelist: established research orgs whose terse model cards
/// are still worth reviewing.
const STATIC_WHITELIST: &[&str] = &[
    "allenai",
    "apple",
    "arcee-ai",
    "baai",
    "bytedance",
    "coherelabs",
    "deepseek-ai",
    "facebook",
    "google",
    "huggingfacetb",
    "ibm-granite",
    "intfloat",
    "jinaai",
    "liquidai",
    "meta-llama",
    "microsoft",
    "mistralai",
    "nomic-ai",
    "nousresearch",
    "nvidia",
    "openai",
    "openbmb",
    "opengvlab",
    "qwen",
    "salesforce",
    "sentence-transformers",
    "skywork",
    "stepfun-ai",
    "tencent",
    "zai-org",
];

/// Per-policy quality gate minimums, kept as plain data.
#[derive(Debug, Clone, Copy)]
pub struct QualityThresholds {
    /// Tier1 / Normal policy.
    pub strict: u32,
    /// Tier2 without whitelist membership.
    pub intermediate: u32,
    /// FastPass (whitelisted or Tier3 org).
    pub relaxed: u32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            strict: 3,
            intermediate: 2,
            relaxed: 1,
        }
    }
}

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,

    /// Base URL of the model hub API.
    pub hub_api_url: String,
    /// Optional hub API token for higher rate limits.
    pub hub_token: Option<String>,
    /// OpenAI-compatible chat completions endpoint.
    pub llm_api_url: String,
    pub llm_model: String,
    pub llm_api_key: Option<String>,

    /// Reject candidates whose estimated total parameter count exceeds this
    /// many billions.
    pub max_total_params_b: f64,
    /// Bytes per parameter assumed by the file-size fallback (fp16/bf16).
    pub bytes_per_param: f64,

    pub duplicate_block_limit: u32,
    pub author_cache_ttl_days: i64,
    pub tier2_follower_threshold: i64,

    pub dynamic_whitelist_enabled: bool,
    pub tier3_auto_add: bool,
    pub tier2_review_enabled: bool,
    pub tier2_review_max: usize,
    /// Minimum per-uploader `no-readme` skips before dynamic blacklisting.
    pub dynamic_blacklist_no_readme_min: u64,

    pub quality: QualityThresholds,

    /// Incremental fetch window on the very first run.
    pub first_run_window_hours: i64,
    /// Bounded retries for transient hub/LLM failures.
    pub max_retries: u32,

    pub static_whitelist: BTreeSet<String>,
    pub static_blacklist: BTreeSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: "models.db".to_string(),
            hub_api_url: "https://huggingface.co".to_string(),
            hub_token: None,
            llm_api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            llm_api_key: None,
            max_total_params_b: 40.0,
            bytes_per_param: 2.0,
            duplicate_block_limit: 3,
            author_cache_ttl_days: 14,
            tier2_follower_threshold: 200,
            dynamic_whitelist_enabled: true,
            tier3_auto_add: true,
            tier2_review_enabled: true,
            tier2_review_max: 20,
            dynamic_blacklist_no_readme_min: 20,
            quality: QualityThresholds::default(),
            first_run_window_hours: 24,
            max_retries: 3,
            static_whitelist: STATIC_WHITELIST.iter().map(|s| s.to_string()).collect(),
            static_blacklist: STATIC_BLACKLIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to the
    /// compiled defaults.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let mut config = Config::default();

        if let Ok(path) = env::var("SCOUT_DB_PATH") {
            config.database_path = path;
        }
        if let Ok(url) = env::var("SCOUT_HUB_API_URL") {
            config.hub_api_url = url;
        }
        config.hub_token = env::var("SCOUT_HUB_TOKEN").ok().filter(|t| !t.is_empty());
        if let Ok(url) = env::var("SCOUT_LLM_API_URL") {
            config.llm_api_url = url;
        }
        if let Ok(model) = env::var("SCOUT_LLM_MODEL") {
            config.llm_model = model;
        }
        config.llm_api_key = env::var("SCOUT_LLM_API_KEY").ok().filter(|k| !k.is_empty());
        config.max_total_params_b =
            parse_or("SCOUT_MAX_TOTAL_PARAMS_B", config.max_total_params_b)?;
        config.bytes_per_param = parse_or("SCOUT_BYTES_PER_PARAM", config.bytes_per_param)?;
        config.duplicate_block_limit =
            parse_or("SCOUT_DUPLICATE_BLOCK_LIMIT", config.duplicate_block_limit)?;
        config.author_cache_ttl_days =
            parse_or("SCOUT_AUTHOR_CACHE_TTL_DAYS", config.author_cache_ttl_days)?;
        config.tier2_follower_threshold =
            parse_or("SCOUT_TIER2_FOLLOWERS", config.tier2_follower_threshold)?;
        config.dynamic_whitelist_enabled =
            parse_bool_or("SCOUT_DYNAMIC_WHITELIST", config.dynamic_whitelist_enabled)?;
        config.tier3_auto_add = parse_bool_or("SCOUT_TIER3_AUTOADD", config.tier3_auto_add)?;
        config.tier2_review_enabled =
            parse_bool_or("SCOUT_TIER2_REVIEW", config.tier2_review_enabled)?;
        config.tier2_review_max = parse_or("SCOUT_TIER2_REVIEW_MAX", config.tier2_review_max)?;
        config.dynamic_blacklist_no_readme_min = parse_or(
            "SCOUT_DYNAMIC_BLACKLIST_NO_README_MIN",
            config.dynamic_blacklist_no_readme_min,
        )?;
        config.quality.strict = parse_or("SCOUT_QUALITY_STRICT", config.quality.strict)?;
        config.quality.intermediate =
            parse_or("SCOUT_QUALITY_INTERMEDIATE", config.quality.intermediate)?;
        config.quality.relaxed = parse_or("SCOUT_QUALITY_RELAXED", config.quality.relaxed)?;
        config.first_run_window_hours =
            parse_or("SCOUT_FIRST_RUN_WINDOW_HOURS", config.first_run_window_hours)?;
        config.max_retries = parse_or("SCOUT_MAX_RETRIES", config.max_retries)?;

        config
            .static_whitelist
            .extend(parse_csv(env::var("SCOUT_WHITELIST").ok().as_deref()));
        config
            .static_blacklist
            .extend(parse_csv(env::var("SCOUT_BLACKLIST").ok().as_deref()));

        Ok(config)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

fn parse_bool_or(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => anyhow::bail!("{key} must be a boolean, got '{other}'"),
        },
        Err(_) => Ok(default),
    }
}

fn parse_csv(value: Option<&str>) -> BTreeSet<String> {
    value
        .unwrap_or("")
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
