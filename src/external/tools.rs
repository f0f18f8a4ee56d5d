use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tempfile::NamedTempFile;
use which::which;

use crate::config::Config;
use crate::external::runner::run_capture;
use crate::model::HttpProbe;

/// The four stage capabilities the orchestrator drives. [`ExternalTools`]
/// shells out to real binaries; tests substitute a canned suite.
#[async_trait]
pub trait ToolSuite: Send + Sync {
    async fn enumerate_subdomains(&self, domain: &str) -> Vec<String>;
    async fn scan_ports(&self, hosts: &[String]) -> HashMap<String, Vec<u16>>;
    async fn probe_http(&self, hosts: &[String]) -> Vec<HttpProbe>;
    async fn discover_urls(&self, domain: &str) -> Vec<String>;
}

pub struct ExternalTools {
    config: Arc<Config>,
}

impl ExternalTools {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ToolSuite for ExternalTools {
    async fn enumerate_subdomains(&self, domain: &str) -> Vec<String> {
        let bin = &self.config.subfinder_bin;
        if !tool_available(bin) {
            return Vec::new();
        }
        let out = run_capture(
            bin,
            &["-d", domain, "-silent", "-all"],
            self.config.enumerate_timeout_secs,
        )
        .await;
        parse_plain_lines(&out)
    }

    async fn scan_ports(&self, hosts: &[String]) -> HashMap<String, Vec<u16>> {
        if hosts.is_empty() {
            return HashMap::new();
        }
        let bin = &self.config.naabu_bin;
        if !tool_available(bin) {
            return HashMap::new();
        }
        let Some(list) = write_host_list(hosts) else {
            return HashMap::new();
        };
        let Some(path) = list.path().to_str() else {
            return HashMap::new();
        };
        let out = run_capture(
            bin,
            &["-list", path, "-p", &self.config.port_spec, "-silent", "-json"],
            self.config.port_scan_timeout_secs,
        )
        .await;
        // `list` lives until here; the temp file is removed on drop even
        // when the tool timed out or died.
        let (ports, malformed) = parse_port_lines(&out);
        if malformed > 0 {
            tracing::warn!(malformed, "skipped malformed port-scan output lines");
        }
        ports
    }

    async fn probe_http(&self, hosts: &[String]) -> Vec<HttpProbe> {
        if hosts.is_empty() {
            return Vec::new();
        }
        let bin = &self.config.httpx_bin;
        if !tool_available(bin) {
            return Vec::new();
        }
        let Some(list) = write_host_list(hosts) else {
            return Vec::new();
        };
        let Some(path) = list.path().to_str() else {
            return Vec::new();
        };
        let out = run_capture(
            bin,
            &["-l", path, "-silent", "-json", "-td", "-sc", "-cl", "-title", "-ip"],
            self.config.probe_timeout_secs,
        )
        .await;
        let (probes, malformed) = parse_probe_lines(&out);
        if malformed > 0 {
            tracing::warn!(malformed, "skipped malformed http-probe output lines");
        }
        probes
    }

    async fn discover_urls(&self, domain: &str) -> Vec<String> {
        let bin = &self.config.gau_bin;
        if !tool_available(bin) {
            return Vec::new();
        }
        let out = run_capture(bin, &["--subs", domain], self.config.discover_timeout_secs).await;
        parse_plain_lines(&out)
    }
}

fn tool_available(bin: &str) -> bool {
    if which(bin).is_err() {
        tracing::warn!(%bin, "external tool not found, stage yields no data");
        return false;
    }
    true
}

/// Newline-delimited host list handed to tools that take `-list`/`-l`.
/// Returns None (with a log) on I/O failure; the stage degrades to empty.
fn write_host_list(hosts: &[String]) -> Option<NamedTempFile> {
    let mut file = match NamedTempFile::new() {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(error = %e, "could not create host list file");
            return None;
        }
    };
    if let Err(e) = file.write_all(hosts.join("\n").as_bytes()) {
        tracing::warn!(error = %e, "could not write host list file");
        return None;
    }
    Some(file)
}

/// Plain line-oriented output: trimmed, empties dropped, duplicates removed
/// with first-seen order preserved.
pub fn parse_plain_lines(output: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if seen.insert(line.to_string()) {
            out.push(line.to_string());
        }
    }
    out
}

#[derive(Debug, Deserialize)]
struct PortLine {
    host: Option<String>,
    ip: Option<String>,
    port: Option<u16>,
}

/// One JSON object per line with `host` (or `ip`) and `port`. Returns the
/// host->ports mapping, ports in output order, plus the count of lines that
/// could not be used.
pub fn parse_port_lines(output: &str) -> (HashMap<String, Vec<u16>>, usize) {
    let mut map: HashMap<String, Vec<u16>> = HashMap::new();
    let mut malformed = 0usize;
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed: PortLine = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => {
                malformed += 1;
                continue;
            }
        };
        let host = parsed.host.filter(|h| !h.is_empty()).or(parsed.ip);
        let (Some(host), Some(port)) = (host, parsed.port) else {
            malformed += 1;
            continue;
        };
        map.entry(host).or_default().push(port);
    }
    (map, malformed)
}

#[derive(Debug, Deserialize)]
struct ProbeLine {
    /// The host as it was fed to the tool.
    input: Option<String>,
    /// Resolved address.
    host: Option<String>,
    status_code: Option<u16>,
    content_length: Option<i64>,
    title: Option<String>,
    #[serde(default)]
    tech: Vec<String>,
}

/// One JSON object per line of http-probe output. Every parsed row is a live
/// host; malformed lines are skipped and counted.
pub fn parse_probe_lines(output: &str) -> (Vec<HttpProbe>, usize) {
    let mut probes = Vec::new();
    let mut malformed = 0usize;
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed: ProbeLine = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => {
                malformed += 1;
                continue;
            }
        };
        let Some(host) = parsed.input.filter(|h| !h.is_empty()) else {
            malformed += 1;
            continue;
        };
        probes.push(HttpProbe {
            host,
            ip: parsed.host.filter(|ip| !ip.is_empty()),
            status_code: parsed.status_code,
            content_length: parsed.content_length,
            title: parsed.title.filter(|t| !t.is_empty()),
            technologies: parsed.tech,
            alive: true,
        });
    }
    (probes, malformed)
}
