use serde::Deserialize;
use std::env;

/// Well-known service ports probed when no override is configured.
pub const DEFAULT_PORTS: &str = "21,22,25,53,80,110,143,443,445,993,995,1433,1521,3306,3389,5432,5900,6379,8000,8080,8443,8888,9200,27017";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: String,

    // External tool binaries; resolved through PATH unless absolute.
    pub subfinder_bin: String,
    pub naabu_bin: String,
    pub httpx_bin: String,
    pub gau_bin: String,

    pub port_spec: String,

    // Per-stage timeouts, seconds.
    pub enumerate_timeout_secs: u64,
    pub port_scan_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub discover_timeout_secs: u64,

    /// Upper bound on one whole scan run.
    pub scan_timeout_secs: u64,

    /// How often the schedule checker wakes up.
    pub schedule_poll_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://recon.db".into(),
            bind_addr: "127.0.0.1:8000".into(),
            subfinder_bin: "subfinder".into(),
            naabu_bin: "naabu".into(),
            httpx_bin: "httpx".into(),
            gau_bin: "gau".into(),
            port_spec: DEFAULT_PORTS.into(),
            enumerate_timeout_secs: 600,
            port_scan_timeout_secs: 1200,
            probe_timeout_secs: 900,
            discover_timeout_secs: 600,
            scan_timeout_secs: 3600,
            schedule_poll_secs: 3600,
        }
    }
}

impl Config {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            database_url: var_or("DATABASE_URL", base.database_url),
            bind_addr: var_or("BIND_ADDR", base.bind_addr),
            subfinder_bin: var_or("SUBFINDER_PATH", base.subfinder_bin),
            naabu_bin: var_or("NAABU_PATH", base.naabu_bin),
            httpx_bin: var_or("HTTPX_PATH", base.httpx_bin),
            gau_bin: var_or("GAU_PATH", base.gau_bin),
            port_spec: var_or("PORT_SPEC", base.port_spec),
            enumerate_timeout_secs: var_or_u64("ENUMERATE_TIMEOUT", base.enumerate_timeout_secs),
            port_scan_timeout_secs: var_or_u64("PORT_SCAN_TIMEOUT", base.port_scan_timeout_secs),
            probe_timeout_secs: var_or_u64("PROBE_TIMEOUT", base.probe_timeout_secs),
            discover_timeout_secs: var_or_u64("DISCOVER_TIMEOUT", base.discover_timeout_secs),
            scan_timeout_secs: var_or_u64("SCAN_TIMEOUT", base.scan_timeout_secs),
            schedule_poll_secs: var_or_u64("SCHEDULE_POLL_SECS", base.schedule_poll_secs),
        }
    }
}

fn var_or(key: &str, default: String) -> String {
    env::var(key).unwrap_or(default)
}

fn var_or_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
