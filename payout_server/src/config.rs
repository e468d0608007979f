//! Server configuration.
//!
//! Everything is read from environment variables (a `.env` file is loaded first, if present). Values that are missing
//! or cannot be parsed are logged and replaced with their defaults, so the server always starts.
use std::{env, fmt::Display, str::FromStr};

use chrono::Duration;
use log::*;
use payout_engine::{
    alert_rules::{AlertPolicy, DEFAULT_MISMATCH_TOLERANCE, DEFAULT_MISSING_CONFIRMATION_HOURS},
    db_types::{Amount, OrganizationId},
};

const DEFAULT_PAYOUT_HOST: &str = "127.0.0.1";
const DEFAULT_PAYOUT_PORT: u16 = 8370;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/payouts.db";
const DEFAULT_ORGANIZATION_ID: &str = "default";
const DEFAULT_ALERT_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(300);
const DEFAULT_MAX_CONNECTIONS: u32 = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// If true, pending schema migrations are applied when the server starts.
    pub auto_migrate: bool,
    /// The organization that requests without an `X-Organization-Id` header act on.
    pub default_organization: OrganizationId,
    /// Thresholds used by the alert rules, both on writes and in the sweep.
    pub alert_policy: AlertPolicy,
    /// The time between two runs of the alert sweep worker.
    pub sweep_interval: std::time::Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PAYOUT_HOST.to_string(),
            port: DEFAULT_PAYOUT_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            auto_migrate: true,
            default_organization: OrganizationId::from(DEFAULT_ORGANIZATION_ID),
            alert_policy: AlertPolicy::default(),
            sweep_interval: DEFAULT_ALERT_SWEEP_INTERVAL,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("PAYOUT_HOST").ok().unwrap_or_else(|| DEFAULT_PAYOUT_HOST.into());
        let port = parse_env("PAYOUT_PORT", DEFAULT_PAYOUT_PORT);
        let database_url = env::var("PAYOUT_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ PAYOUT_DATABASE_URL is not set. Using the default, {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let max_connections = parse_env("PAYOUT_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let auto_migrate = env::var("PAYOUT_AUTO_MIGRATE").map(|s| &s != "0" && &s != "false").unwrap_or(true);
        let default_organization = match env::var("PAYOUT_DEFAULT_ORGANIZATION_ID") {
            Ok(s) if !s.trim().is_empty() => OrganizationId::new(s.trim()),
            _ => {
                info!("🪛️ PAYOUT_DEFAULT_ORGANIZATION_ID is not set. Using '{DEFAULT_ORGANIZATION_ID}'.");
                OrganizationId::from(DEFAULT_ORGANIZATION_ID)
            },
        };
        let alert_policy = configure_alert_policy();
        let sweep_interval =
            sweep_interval_from_secs(parse_env("PAYOUT_ALERT_SWEEP_INTERVAL_SECS", DEFAULT_ALERT_SWEEP_INTERVAL.as_secs()));
        Self {
            host,
            port,
            database_url,
            max_connections,
            auto_migrate,
            default_organization,
            alert_policy,
            sweep_interval,
        }
    }
}

fn configure_alert_policy() -> AlertPolicy {
    let hours = parse_env("PAYOUT_MISSING_CONFIRMATION_HOURS", DEFAULT_MISSING_CONFIRMATION_HOURS);
    let tolerance = parse_env("PAYOUT_MISMATCH_TOLERANCE", DEFAULT_MISMATCH_TOLERANCE.value());
    alert_policy_from(hours, tolerance)
}

fn alert_policy_from(hours: i64, tolerance: i64) -> AlertPolicy {
    let missing_confirmation_after = match Duration::try_hours(hours) {
        Some(d) if hours >= 0 => d,
        Some(_) => {
            warn!("🪛️ PAYOUT_MISSING_CONFIRMATION_HOURS cannot be negative. Using the default instead.");
            AlertPolicy::default().missing_confirmation_after
        },
        None => {
            warn!("🪛️ PAYOUT_MISSING_CONFIRMATION_HOURS ({hours}) is too large. Using the default instead.");
            AlertPolicy::default().missing_confirmation_after
        },
    };
    let tolerance = if tolerance < 0 {
        warn!("🪛️ PAYOUT_MISMATCH_TOLERANCE cannot be negative. Using the default instead.");
        DEFAULT_MISMATCH_TOLERANCE
    } else {
        Amount::from(tolerance)
    };
    info!(
        "🪛️ Missing confirmation alerts after {} hrs. Mismatch tolerance is {tolerance} minor units.",
        missing_confirmation_after.num_hours()
    );
    AlertPolicy::new(missing_confirmation_after, tolerance)
}

fn sweep_interval_from_secs(secs: u64) -> std::time::Duration {
    if secs == 0 {
        warn!(
            "🪛️ PAYOUT_ALERT_SWEEP_INTERVAL_SECS must be at least 1. Using the default, {}s, instead.",
            DEFAULT_ALERT_SWEEP_INTERVAL.as_secs()
        );
        DEFAULT_ALERT_SWEEP_INTERVAL
    } else {
        std::time::Duration::from_secs(secs)
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}
