use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, bail};
use deferd_core::{SchedulerConfig, TimeoutPolicy, Whitelist};
use deferd_observe::{LoggerConfig, LoggerFormat};

const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
const DEFAULT_DATA_DIR: &str = ".";

/// Process configuration assembled from `DEFERD_*` environment variables.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub listen: SocketAddr,
    pub scheduler: SchedulerConfig,
    pub logger: LoggerConfig,
}

impl AgentConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen = parse(var("DEFERD_LISTEN").as_deref().unwrap_or(DEFAULT_LISTEN), "DEFERD_LISTEN")?;

        let mut scheduler = SchedulerConfig {
            data_dir: Some(PathBuf::from(
                var("DEFERD_DATA_DIR").unwrap_or_else(|| DEFAULT_DATA_DIR.to_string()),
            )),
            ..Default::default()
        };
        if let Some(raw) = var("DEFERD_MAX_IN_FLIGHT") {
            scheduler.max_in_flight = parse(&raw, "DEFERD_MAX_IN_FLIGHT")?;
            if scheduler.max_in_flight == 0 {
                bail!("DEFERD_MAX_IN_FLIGHT must be at least 1");
            }
        }
        if let Some(raw) = var("DEFERD_SAFETY_TIMEOUT_SECS") {
            let secs: u64 = parse(&raw, "DEFERD_SAFETY_TIMEOUT_SECS")?;
            if secs == 0 {
                bail!("DEFERD_SAFETY_TIMEOUT_SECS must be at least 1");
            }
            scheduler.safety_timeout = Duration::from_secs(secs);
        }
        if let Some(raw) = var("DEFERD_TIMEOUT_POLICY") {
            scheduler.timeout_policy = raw.parse::<TimeoutPolicy>()?;
        }
        if let Some(raw) = var("DEFERD_WHITELIST") {
            scheduler.whitelist = Whitelist::new(raw.split(','));
            if scheduler.whitelist.is_empty() {
                bail!("DEFERD_WHITELIST contains no commands");
            }
        }

        let mut logger = LoggerConfig::default();
        if let Some(level) = var("DEFERD_LOG_LEVEL") {
            logger = logger.with_level(level);
        }
        if let Some(raw) = var("DEFERD_LOG_FORMAT") {
            logger = logger.with_format(raw.parse::<LoggerFormat>()?);
        }

        Ok(Self {
            listen,
            scheduler,
            logger,
        })
    }
}

fn parse<T>(raw: &str, key: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("invalid value for {key}: '{raw}'"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<AgentConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AgentConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.listen, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.scheduler.max_in_flight, 5);
        assert_eq!(cfg.scheduler.safety_timeout, Duration::from_secs(30));
        assert_eq!(cfg.scheduler.timeout_policy, TimeoutPolicy::Cancel);
        assert_eq!(cfg.scheduler.data_dir, Some(PathBuf::from(".")));
        assert!(cfg.scheduler.whitelist.contains("ping"));
        assert_eq!(cfg.logger.level, "info");
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = config(&[
            ("DEFERD_LISTEN", "127.0.0.1:9000"),
            ("DEFERD_DATA_DIR", "/var/lib/deferd"),
            ("DEFERD_MAX_IN_FLIGHT", "2"),
            ("DEFERD_SAFETY_TIMEOUT_SECS", "90"),
            ("DEFERD_TIMEOUT_POLICY", "extend"),
            ("DEFERD_WHITELIST", "echo, hostname"),
            ("DEFERD_LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(cfg.listen.port(), 9000);
        assert_eq!(cfg.scheduler.data_dir, Some(PathBuf::from("/var/lib/deferd")));
        assert_eq!(cfg.scheduler.max_in_flight, 2);
        assert_eq!(cfg.scheduler.safety_timeout, Duration::from_secs(90));
        assert_eq!(cfg.scheduler.timeout_policy, TimeoutPolicy::Extend);
        assert!(cfg.scheduler.whitelist.contains("hostname"));
        assert!(!cfg.scheduler.whitelist.contains("ls"));
        assert_eq!(cfg.logger.format, LoggerFormat::Json);
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(config(&[("DEFERD_MAX_IN_FLIGHT", "many")]).is_err());
        assert!(config(&[("DEFERD_MAX_IN_FLIGHT", "0")]).is_err());
        assert!(config(&[("DEFERD_SAFETY_TIMEOUT_SECS", "0")]).is_err());
        assert!(config(&[("DEFERD_TIMEOUT_POLICY", "ignore")]).is_err());
        assert!(config(&[("DEFERD_WHITELIST", " , ")]).is_err());
        assert!(config(&[("DEFERD_LISTEN", "localhost")]).is_err());
    }
}
