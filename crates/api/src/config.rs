use anyhow::{bail, Context};
use scheduler::SchedulerConfig;
use std::net::SocketAddr;
use std::path::PathBuf;

const PREFIX: &str = "TIMETABLER__";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub scheduler: SchedulerConfig,
    pub log_format: LogFormat,
    /// JSON array of school datasets imported before the server starts.
    pub seed_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            scheduler: SchedulerConfig::default(),
            log_format: LogFormat::Json,
            seed_path: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// `lookup` receives the full variable name, e.g.
    /// `TIMETABLER__SERVER__PORT`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(&format!("{PREFIX}{key}")).filter(|v| !v.trim().is_empty());
        let mut cfg = Config::default();

        if let Some(host) = get("SERVER__HOST") {
            cfg.host = host;
        }
        if let Some(port) = get("SERVER__PORT") {
            cfg.port = port
                .trim()
                .parse()
                .with_context(|| format!("{PREFIX}SERVER__PORT={port} is not a port"))?;
        }
        if let Some(factor) = get("SCHEDULER__RETRY_FACTOR") {
            cfg.scheduler.retry_factor = factor
                .trim()
                .parse()
                .with_context(|| format!("{PREFIX}SCHEDULER__RETRY_FACTOR={factor} is not a count"))?;
        }
        if let Some(format) = get("LOG__FORMAT") {
            cfg.log_format = match format.trim().to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => bail!("{PREFIX}LOG__FORMAT must be json or pretty, got {other}"),
            };
        }
        cfg.seed_path = get("DATA__SEED_PATH").map(PathBuf::from);
        Ok(cfg)
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.scheduler.retry_factor, 32);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.addr().unwrap().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn reads_every_section() {
        let cfg = Config::from_lookup(lookup(&[
            ("TIMETABLER__SERVER__HOST", "127.0.0.1"),
            ("TIMETABLER__SERVER__PORT", "9000"),
            ("TIMETABLER__SCHEDULER__RETRY_FACTOR", "4"),
            ("TIMETABLER__LOG__FORMAT", "Pretty"),
            ("TIMETABLER__DATA__SEED_PATH", "/srv/seed.json"),
        ]))
        .unwrap();
        assert_eq!(cfg.addr().unwrap().to_string(), "127.0.0.1:9000");
        assert_eq!(cfg.scheduler.retry_factor, 4);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.seed_path, Some(PathBuf::from("/srv/seed.json")));
    }

    #[test]
    fn bad_values_are_startup_errors() {
        assert!(Config::from_lookup(lookup(&[("TIMETABLER__SERVER__PORT", "eighty")])).is_err());
        assert!(Config::from_lookup(lookup(&[("TIMETABLER__LOG__FORMAT", "xml")])).is_err());
    }
}
