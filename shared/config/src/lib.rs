//! Process configuration, loaded from environment variables plus an optional `.env`
//! file. `database_url` and `jwt_secret` are the only hard requirements; every other
//! key has a typed default.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database connection URL (required).
    pub database_url: String,

    /// HMAC secret used to sign and verify bearer tokens (required).
    pub jwt_secret: String,

    /// Access-token TTL in seconds. Deliberately independent of
    /// `jwt_refresh_expiration_seconds`; see DESIGN.md's Open Question decision.
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_seconds: i64,

    /// Refresh-token TTL in seconds.
    #[serde(default = "default_jwt_refresh_expiration")]
    pub jwt_refresh_expiration_seconds: i64,

    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,

    #[serde(default = "default_jwt_audience")]
    pub jwt_audience: String,

    /// Idle session timeout. Informational: enforced by session bookkeeping, never by
    /// token signature/expiry validation itself.
    #[serde(default = "default_session_timeout_minutes")]
    pub session_timeout_minutes: i64,

    #[serde(default = "default_max_failed_attempts")]
    pub session_max_failed_attempts: u32,

    #[serde(default = "default_lockout_minutes")]
    pub session_lockout_minutes: u64,

    #[serde(default = "default_bus_max_retries")]
    pub bus_max_retries: u32,

    #[serde(default = "default_bus_base_backoff_seconds")]
    pub bus_base_backoff_seconds: u64,

    #[serde(default = "default_bus_request_timeout_seconds")]
    pub bus_request_timeout_seconds: u64,

    #[serde(default = "default_rpc_max_message_size_bytes")]
    pub rpc_max_message_size_bytes: usize,

    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Hours a confirmed visit's `visit_date` must be in the past before
    /// `mark_no_show` is allowed to fire.
    #[serde(default = "default_no_show_threshold_hours")]
    pub no_show_threshold_hours: i64,

    /// Tenant-wide switch allowing `check_in` directly from `pending` (skipping the
    /// `confirm` step) rather than only from `confirmed`.
    #[serde(default = "default_allow_direct_check_in")]
    pub allow_direct_check_in: bool,

    #[serde(default = "default_outbox_poll_interval_seconds")]
    pub outbox_poll_interval_seconds: u64,

    #[serde(default = "default_outbox_batch_size")]
    pub outbox_batch_size: i64,

    #[serde(default = "default_outbox_max_retries")]
    pub outbox_max_retries: i32,

    #[serde(default = "default_agreement_expiry_sweep_interval_seconds")]
    pub agreement_expiry_sweep_interval_seconds: u64,
}

fn default_jwt_expiration() -> i64 {
    900 // 15 minutes
}

fn default_jwt_refresh_expiration() -> i64 {
    604_800 // 7 days
}

fn default_jwt_issuer() -> String {
    "reciprocal-clubs".to_string()
}

fn default_jwt_audience() -> String {
    "reciprocal-clubs-api".to_string()
}

fn default_session_timeout_minutes() -> i64 {
    60
}

fn default_max_failed_attempts() -> u32 {
    5
}

fn default_lockout_minutes() -> u64 {
    15
}

fn default_bus_max_retries() -> u32 {
    3
}

fn default_bus_base_backoff_seconds() -> u64 {
    1
}

fn default_bus_request_timeout_seconds() -> u64 {
    10
}

fn default_rpc_max_message_size_bytes() -> usize {
    4 * 1024 * 1024
}

fn default_nats_url() -> String {
    "nats://127.0.0.1:4222".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_no_show_threshold_hours() -> i64 {
    24
}

fn default_allow_direct_check_in() -> bool {
    false
}

fn default_outbox_poll_interval_seconds() -> u64 {
    5
}

fn default_outbox_batch_size() -> i64 {
    50
}

fn default_outbox_max_retries() -> i32 {
    3
}

fn default_agreement_expiry_sweep_interval_seconds() -> u64 {
    3600
}

impl Config {
    /// Loads configuration from environment variables, after loading a `.env` file if
    /// present. Fails if `DATABASE_URL` or `JWT_SECRET` is unset.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let builder = config::Config::builder()
            .set_default("jwt_expiration_seconds", default_jwt_expiration())?
            .set_default("jwt_refresh_expiration_seconds", default_jwt_refresh_expiration())?
            .set_default("jwt_issuer", default_jwt_issuer())?
            .set_default("jwt_audience", default_jwt_audience())?
            .set_default("session_timeout_minutes", default_session_timeout_minutes())?
            .set_default("session_max_failed_attempts", default_max_failed_attempts())?
            .set_default("session_lockout_minutes", default_lockout_minutes())?
            .set_default("bus_max_retries", default_bus_max_retries())?
            .set_default("bus_base_backoff_seconds", default_bus_base_backoff_seconds())?
            .set_default("bus_request_timeout_seconds", default_bus_request_timeout_seconds())?
            .set_default("rpc_max_message_size_bytes", default_rpc_max_message_size_bytes() as i64)?
            .set_default("nats_url", default_nats_url())?
            .set_default("host", default_host())?
            .set_default("port", default_port() as i64)?
            .set_default("no_show_threshold_hours", default_no_show_threshold_hours())?
            .set_default("allow_direct_check_in", default_allow_direct_check_in())?
            .set_default("outbox_poll_interval_seconds", default_outbox_poll_interval_seconds() as i64)?
            .set_default("outbox_batch_size", default_outbox_batch_size())?
            .set_default("outbox_max_retries", default_outbox_max_retries())?
            .set_default(
                "agreement_expiry_sweep_interval_seconds",
                default_agreement_expiry_sweep_interval_seconds() as i64,
            )?
            .add_source(config::Environment::default());

        builder.build()?.try_deserialize::<Config>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_and_refresh_ttls_are_independent_defaults() {
        assert_eq!(default_jwt_expiration(), 900);
        assert_eq!(default_jwt_refresh_expiration(), 604_800);
        assert_ne!(default_jwt_expiration(), default_jwt_refresh_expiration());
    }

    #[test]
    fn rpc_message_size_default_is_four_mebibytes() {
        assert_eq!(default_rpc_max_message_size_bytes(), 4 * 1024 * 1024);
    }
}
