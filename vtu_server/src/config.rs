//! Server configuration.
//!
//! Everything is read from the environment once, at startup. The variables are:
//!
//! * `VTU_HOST`, `VTU_PORT`: the listener address. Defaults to 127.0.0.1:4460.
//! * `VTU_DATABASE_URL`: the sqlite database url.
//! * `VTU_SWEEP_INTERVAL_SECS`: how often the reconciliation sweep runs. Default 300.
//! * `VTU_SWEEP_STALENESS_SECS`: how old a pending transaction must be before the sweep picks it up. Default 600.
//! * `VTU_SWEEP_BATCH`: maximum rows per sweep pass. Default 50.
//! * `VTU_FUNDING_ABANDON_WINDOW_HOURS`: how long an unverifiable funding stays open before it is abandoned.
//!   Default 24.
//! * `VTU_REFUND_CORRECTION_WINDOW_HOURS`: how far back an operator may correct an erroneous refund. Default 24.
//! * `VTU_PAYSTACK_WEBHOOK_SECRET`, `VTU_MONNIFY_WEBHOOK_SECRET`: HMAC keys for webhook signatures.
//! * `VTU_FLUTTERWAVE_VERIF_HASH`: the static `verif-hash` value Flutterwave sends with every webhook.
//! * `VTU_SKIP_WEBHOOK_SIGNATURE_CHECKS`: set to `1`/`true` to accept unsigned webhooks. For local testing only.
//! * `VTU_DEFAULT_GATEWAY`: gateway tag used when a funding request does not name one. Default `paystack`.
//! * `VTU_DEFAULT_PROVIDER`: fulfillment tag used when a purchase does not name one. Default `vtpass`.
//!
//! The upstream adapters read their own credentials; see the provider crate's `config` module.
use std::env;

use chrono::Duration;
use log::*;
use vtu_common::{parse_boolean_flag, Secret};

pub const DEFAULT_VTU_HOST: &str = "127.0.0.1";
pub const DEFAULT_VTU_PORT: u16 = 4460;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub sweep_interval_secs: u64,
    pub sweep_staleness: Duration,
    pub sweep_batch: usize,
    pub funding_abandon_window: Duration,
    pub refund_correction_window: Duration,
    pub paystack_webhook_secret: Secret,
    pub monnify_webhook_secret: Secret,
    pub flutterwave_verif_hash: Secret,
    pub skip_webhook_signature_checks: bool,
    pub default_gateway: String,
    pub default_provider: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_VTU_HOST.into(),
            port: DEFAULT_VTU_PORT,
            database_url: String::default(),
            sweep_interval_secs: 300,
            sweep_staleness: Duration::seconds(600),
            sweep_batch: 50,
            funding_abandon_window: Duration::hours(24),
            refund_correction_window: Duration::hours(24),
            paystack_webhook_secret: Secret::default(),
            monnify_webhook_secret: Secret::default(),
            flutterwave_verif_hash: Secret::default(),
            skip_webhook_signature_checks: false,
            default_gateway: "paystack".into(),
            default_provider: "vtpass".into(),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16, database_url: &str) -> Self {
        Self { host: host.into(), port, database_url: database_url.into(), ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("VTU_HOST").ok().unwrap_or_else(|| {
            warn!("🪛️ VTU_HOST is not set. Using the default, {DEFAULT_VTU_HOST}, instead.");
            DEFAULT_VTU_HOST.into()
        });
        let port = env::var("VTU_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for VTU_PORT. {e} Using the default, {DEFAULT_VTU_PORT}.");
                    DEFAULT_VTU_PORT
                })
            })
            .unwrap_or(DEFAULT_VTU_PORT);
        let database_url = env::var("VTU_DATABASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ VTU_DATABASE_URL is not set. Using an in-memory database that will vanish on shutdown.");
            "sqlite::memory:".into()
        });
        let sweep_interval_secs = env_u64("VTU_SWEEP_INTERVAL_SECS", 300);
        let sweep_staleness = Duration::seconds(env_u64("VTU_SWEEP_STALENESS_SECS", 600) as i64);
        let sweep_batch = env_u64("VTU_SWEEP_BATCH", 50) as usize;
        let funding_abandon_window = Duration::hours(env_u64("VTU_FUNDING_ABANDON_WINDOW_HOURS", 24) as i64);
        let refund_correction_window = Duration::hours(env_u64("VTU_REFUND_CORRECTION_WINDOW_HOURS", 24) as i64);
        let paystack_webhook_secret = env_secret("VTU_PAYSTACK_WEBHOOK_SECRET");
        let monnify_webhook_secret = env_secret("VTU_MONNIFY_WEBHOOK_SECRET");
        let flutterwave_verif_hash = env_secret("VTU_FLUTTERWAVE_VERIF_HASH");
        let skip_webhook_signature_checks =
            parse_boolean_flag(env::var("VTU_SKIP_WEBHOOK_SIGNATURE_CHECKS").ok(), false);
        if skip_webhook_signature_checks {
            warn!("🪛️ Webhook signature checks are DISABLED. Anyone can credit wallets. Never run like this in production.");
        }
        let default_gateway = env::var("VTU_DEFAULT_GATEWAY").unwrap_or_else(|_| "paystack".into());
        let default_provider = env::var("VTU_DEFAULT_PROVIDER").unwrap_or_else(|_| "vtpass".into());
        Self {
            host,
            port,
            database_url,
            sweep_interval_secs,
            sweep_staleness,
            sweep_batch,
            funding_abandon_window,
            refund_correction_window,
            paystack_webhook_secret,
            monnify_webhook_secret,
            flutterwave_verif_hash,
            skip_webhook_signature_checks,
            default_gateway,
            default_provider,
        }
    }
}

fn env_u64(var: &str, default: u64) -> u64 {
    match env::var(var) {
        Ok(s) => s.parse::<u64>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default}.");
            default
        }),
        Err(_) => default,
    }
}

fn env_secret(var: &str) -> Secret {
    match env::var(var) {
        Ok(s) => Secret::new(s),
        Err(_) => {
            warn!("🪛️ {var} is not set. Webhooks relying on it will be rejected.");
            Secret::default()
        },
    }
}
