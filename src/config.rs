// =============================================================================
// config.rs — THE CHAMBERS
// =============================================================================
//
// Every tunable knob of the engine. All values can be overridden through
// environment variables prefixed with COURTVISION_, and a .env file is read
// first if one exists. The defaults are the numbers the web app has been
// running with: five strikes for a flaky AI service, five minutes in the
// penalty box, a day of cached summaries, an hour of cached trends.
// =============================================================================

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Every tunable parameter in the engine lives here.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // REDIS
    // =========================================================================

    /// Redis connection URL. Default: redis://127.0.0.1:6379
    pub redis_url: String,

    /// The Redis list the web app pushes jobs onto.
    pub job_queue_key: String,

    /// The pub/sub channel results are announced on.
    pub result_channel: String,

    /// Results are also stored at `{result_key_prefix}{job_id}`.
    pub result_key_prefix: String,

    /// How long a stored result survives. Default: 15 minutes.
    pub result_ttl: Duration,

    // =========================================================================
    // INTAKE
    // =========================================================================

    /// How often to poll the job list when it was empty. Default: 250ms.
    pub poll_interval: Duration,

    /// Maximum jobs popped per poll.
    pub intake_batch_size: usize,

    /// Capacity of the channel between the job handler and the publisher.
    pub channel_capacity: usize,

    // =========================================================================
    // CIRCUIT BREAKER
    // =========================================================================

    /// Consecutive errors before a service is marked unavailable. Default: 5
    pub circuit_breaker_max_errors: u32,

    /// How long an unavailable service sits out. Default: 300 seconds.
    pub circuit_breaker_cooldown: Duration,

    // =========================================================================
    // CACHES
    // =========================================================================

    /// Entries kept in the AI response cache.
    pub ai_cache_capacity: usize,

    /// Lifetime of a cached AI response. Default: 24 hours.
    pub ai_cache_ttl: Duration,

    /// Lifetime of a cached trend report. Default: 1 hour.
    pub trend_cache_ttl: Duration,

    /// Trend reports kept before the least recently used is evicted.
    pub trend_cache_capacity: usize,

    // =========================================================================
    // CHAT COMPLETION SERVICE
    // =========================================================================

    /// OpenAI-compatible chat completions endpoint.
    pub chat_endpoint: String,

    pub chat_model: String,

    /// Bearer token. Empty sends requests without an Authorization header,
    /// for local gateways that don't want one.
    pub chat_api_key: String,

    pub chat_timeout: Duration,

    // =========================================================================
    // JURISDICTION TABLES
    // =========================================================================

    /// Optional JSON file that adds to or overrides the built-in court rules
    /// and precedent weights.
    pub court_rules_path: Option<PathBuf>,

    // =========================================================================
    // METRICS SERVER
    // =========================================================================

    /// Port for the metrics HTTP server. Default: 9090
    pub metrics_port: u16,
}

impl Config {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        // A missing .env file is fine.
        let _ = dotenvy::dotenv();

        Config {
            // Redis
            redis_url: env_or_default("COURTVISION_REDIS_URL", "redis://127.0.0.1:6379"),
            job_queue_key: env_or_default("COURTVISION_JOB_QUEUE", "courtvision:jobs"),
            result_channel: env_or_default("COURTVISION_RESULT_CHANNEL", "courtvision:results"),
            result_key_prefix: env_or_default("COURTVISION_RESULT_KEY_PREFIX", "courtvision:result:"),
            result_ttl: Duration::from_secs(
                env_or_default("COURTVISION_RESULT_TTL_SECS", "900").parse().unwrap_or(900)
            ),

            // Intake
            poll_interval: Duration::from_millis(
                env_or_default("COURTVISION_POLL_MILLIS", "250").parse().unwrap_or(250)
            ),
            intake_batch_size: env_or_default("COURTVISION_INTAKE_BATCH", "32")
                .parse().unwrap_or(32),
            channel_capacity: env_or_default("COURTVISION_CHANNEL_CAPACITY", "1024")
                .parse().unwrap_or(1024),

            // Circuit breaker
            circuit_breaker_max_errors: env_or_default("COURTVISION_CB_MAX_ERRORS", "5")
                .parse().unwrap_or(5),
            circuit_breaker_cooldown: Duration::from_secs(
                env_or_default("COURTVISION_CB_COOLDOWN_SECS", "300").parse().unwrap_or(300)
            ),

            // Caches
            ai_cache_capacity: env_or_default("COURTVISION_AI_CACHE_SIZE", "10000")
                .parse().unwrap_or(10_000),
            ai_cache_ttl: Duration::from_secs(
                env_or_default("COURTVISION_AI_CACHE_TTL_SECS", "86400").parse().unwrap_or(86_400)
            ),
            trend_cache_ttl: Duration::from_secs(
                env_or_default("COURTVISION_TREND_CACHE_TTL_SECS", "3600").parse().unwrap_or(3600)
            ),
            trend_cache_capacity: env_or_default("COURTVISION_TREND_CACHE_SIZE", "256")
                .parse().unwrap_or(256),

            // Chat completion service
            chat_endpoint: env_or_default(
                "COURTVISION_CHAT_ENDPOINT",
                "https://api.openai.com/v1/chat/completions"
            ),
            chat_model: env_or_default("COURTVISION_CHAT_MODEL", "gpt-4-turbo-preview"),
            chat_api_key: env_or_default("COURTVISION_CHAT_API_KEY", ""),
            chat_timeout: Duration::from_secs(
                env_or_default("COURTVISION_CHAT_TIMEOUT_SECS", "60").parse().unwrap_or(60)
            ),

            // Jurisdiction tables
            court_rules_path: env::var("COURTVISION_COURT_RULES_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),

            // Metrics
            metrics_port: env_or_default("COURTVISION_METRICS_PORT", "9090")
                .parse().unwrap_or(9090),
        }
    }

    pub fn result_key(&self, job_id: &str) -> String {
        format!("{}{}", self.result_key_prefix, job_id)
    }
}

fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
