//! Environment-driven server configuration.

/// Runtime knobs for the match server. Every value has a fallback so a bare
/// `cargo run` starts a playable dev server.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Time a human player gets per roll/selection.
    pub turn_timeout_ms: u64,
    /// Artificial pacing delay before an AI seat acts.
    pub ai_move_delay_ms: u64,
    /// How long an active player may stay disconnected before the sweep
    /// treats it as a timeout.
    pub absence_timeout_ms: u64,
    /// Consecutive timeouts before a seat is forfeited.
    pub max_skips: u8,
    /// Garbage-collection sweep cadence.
    pub gc_interval_ms: u64,
    /// Waiting rooms older than this are torn down.
    pub waiting_max_age_ms: u64,
    /// Active rooms with zero connected humans for this long are torn down.
    pub abandoned_active_ms: u64,
    /// Stake verification oracle; unset means permissive dev mode.
    pub stake_oracle_url: Option<String>,
    /// Payout authority; unset means locally-stubbed dev tickets.
    pub payout_authority_url: Option<String>,
    /// Validity window stamped on dev payout tickets.
    pub payout_deadline_ms: u64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("MATCH_SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: read_u16("MATCH_SERVER_PORT", 9200),
            turn_timeout_ms: read_ms("MATCH_TURN_TIMEOUT_MS", 30_000),
            ai_move_delay_ms: read_ms("MATCH_AI_DELAY_MS", 600),
            absence_timeout_ms: read_ms("MATCH_ABSENCE_TIMEOUT_MS", 45_000),
            max_skips: read_u8("MATCH_MAX_SKIPS", 3),
            gc_interval_ms: read_ms("MATCH_GC_INTERVAL_MS", 30_000),
            waiting_max_age_ms: read_ms("MATCH_WAITING_MAX_AGE_MS", 300_000),
            abandoned_active_ms: read_ms("MATCH_ABANDONED_ACTIVE_MS", 120_000),
            stake_oracle_url: std::env::var("STAKE_ORACLE_URL").ok(),
            payout_authority_url: std::env::var("PAYOUT_AUTHORITY_URL").ok(),
            payout_deadline_ms: read_ms("PAYOUT_DEADLINE_MS", 3_600_000),
        }
    }
}

fn read_ms(key: &str, fallback: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(fallback)
}

fn read_u16(key: &str, fallback: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(fallback)
}

fn read_u8(key: &str, fallback: u8) -> u8 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u8>().ok())
        .unwrap_or(fallback)
}
