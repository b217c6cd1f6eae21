use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Runtime configuration — loaded from environment variables
// ---------------------------------------------------------------------------

/// Configuration for the demo control-surface binary.
///
/// Every field can be set via an environment variable prefixed with
/// `PLAYOUT_`. Defaults are suitable for local development.
///
/// Unlike a full gateway's config, this crate has no TLS/TURN/ICE fields —
/// the RTP relay transport and peer-connection lifecycle are external
/// collaborators (see SPEC_FULL.md §1) owned by the embedding gateway, not
/// by this crate.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the demo HTTP listener to.
    pub bind_addr: String,

    /// Base directory recordings are resolved relative to, joined with each
    /// track's `dir`/`file` pair per SPEC_FULL.md §6.
    pub recordings_dir: String,

    /// API key required on the demo binary's control endpoints.
    pub api_key: String,

    /// CORS allowed origins for the demo binary ("*" = permissive).
    pub allowed_origins: String,

    /// Log level passed to the `tracing_subscriber` `EnvFilter`.
    pub log_level: String,

    /// Idle-sleep duration used by the playout worker between pacing
    /// iterations that sent nothing. Overridable so tests can shrink the
    /// 5 ms default down to keep suites fast.
    pub idle_sleep_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Automatically loads a `.env` file if present (via `dotenvy`).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let api_key = match std::env::var("PLAYOUT_API_KEY") {
            Ok(s) if !s.is_empty() => {
                info!("API key loaded from PLAYOUT_API_KEY");
                s
            }
            _ => {
                let key = format!("pk_{}", uuid::Uuid::new_v4());
                warn!("PLAYOUT_API_KEY not set — using a generated value: {key}");
                key
            }
        };

        let config = Config {
            bind_addr: env_or("PLAYOUT_BIND_ADDR", "0.0.0.0:8088"),
            recordings_dir: env_or("PLAYOUT_RECORDINGS_DIR", "./recordings"),
            api_key,
            allowed_origins: env_or("PLAYOUT_ALLOWED_ORIGINS", "*"),
            log_level: env_or("PLAYOUT_LOG_LEVEL", "info"),
            idle_sleep_ms: env_or("PLAYOUT_IDLE_SLEEP_MS", "5")
                .parse::<u64>()
                .unwrap_or(5),
        };

        config.log_summary();
        config
    }

    fn log_summary(&self) {
        info!("──── Playout Configuration ────");
        info!("  bind_addr        : {}", self.bind_addr);
        info!("  recordings_dir   : {}", self.recordings_dir);
        info!("  idle_sleep_ms    : {}", self.idle_sleep_ms);
        info!(
            "  cors_origins     : {}",
            if self.allowed_origins == "*" {
                "* (permissive)"
            } else {
                &self.allowed_origins
            }
        );
        info!("  log_level        : {}", self.log_level);
        info!("───────────────────────────────");
    }
}

// ---------------------------------------------------------------------------
// Environment helpers
// ---------------------------------------------------------------------------

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
