use anyhow::Context;
use std::str::FromStr;
use std::sync::Arc;

use crate::push::{DispatchService, DispatchSettings, PushTransport};
use crate::schedule::{Clock, ScheduleService, ScheduleStore};
use crate::subscription::SubscriptionStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub subscription_store: Arc<dyn SubscriptionStore>,
    pub dispatch_service: DispatchService,
    pub schedule_service: ScheduleService,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        subscription_store: Arc<dyn SubscriptionStore>,
        schedule_store: Arc<dyn ScheduleStore>,
        transport: Arc<dyn PushTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let dispatch_service = DispatchService::new(
            subscription_store.clone(),
            transport,
            config.dispatch_settings(),
        );
        let schedule_service = ScheduleService::new(schedule_store, dispatch_service.clone(), clock);

        Self {
            config,
            subscription_store,
            dispatch_service,
            schedule_service,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres connection string; in-memory stores are used when absent.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub push_ttl_seconds: u32,
    pub push_max_concurrency: usize,
    pub push_request_timeout_secs: u64,
    pub push_prune_gone: bool,
    pub scheduler_cron: String,
    pub scheduler_batch_size: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let scheduler_batch_size: i64 = setting(&lookup, "SCHEDULER_BATCH_SIZE", "50")?;
        anyhow::ensure!(
            scheduler_batch_size >= 1,
            "SCHEDULER_BATCH_SIZE must be at least 1, got {}",
            scheduler_batch_size
        );

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: setting(&lookup, "PORT", "3000")?,
            push_ttl_seconds: setting(&lookup, "PUSH_TTL_SECONDS", "86400")?,
            push_max_concurrency: setting(&lookup, "PUSH_MAX_CONCURRENCY", "8")?,
            push_request_timeout_secs: setting(&lookup, "PUSH_REQUEST_TIMEOUT_SECS", "10")?,
            push_prune_gone: setting(&lookup, "PUSH_PRUNE_GONE", "true")?,
            scheduler_cron: lookup("SCHEDULER_CRON").unwrap_or_else(|| "* * * * * *".to_string()),
            scheduler_batch_size,
        })
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            ttl_seconds: self.push_ttl_seconds,
            max_concurrency: self.push_max_concurrency,
            prune_gone: self.push_prune_gone,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn setting<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .with_context(|| format!("{} must be a valid value, got {:?}", key, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();

        assert_eq!(config.database_url, None);
        assert_eq!(config.addr(), "127.0.0.1:3000");
        assert_eq!(config.push_ttl_seconds, 86400);
        assert_eq!(config.push_max_concurrency, 8);
        assert!(config.push_prune_gone);
        assert_eq!(config.scheduler_cron, "* * * * * *");
        assert_eq!(config.scheduler_batch_size, 50);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/push"),
            ("PORT", "8080"),
            ("PUSH_PRUNE_GONE", "false"),
            ("PUSH_MAX_CONCURRENCY", "2"),
        ])
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/push"));
        assert_eq!(config.port, 8080);
        assert!(!config.push_prune_gone);
        assert_eq!(config.dispatch_settings().max_concurrency, 2);
    }

    #[test]
    fn test_invalid_number_is_an_error() {
        let err = config(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_batch_size_must_be_positive() {
        for value in ["0", "-5"] {
            let err = config(&[("SCHEDULER_BATCH_SIZE", value)]).unwrap_err();
            assert!(err.to_string().contains("SCHEDULER_BATCH_SIZE"));
        }
        assert_eq!(config(&[("SCHEDULER_BATCH_SIZE", "1")]).unwrap().scheduler_batch_size, 1);
    }
}
