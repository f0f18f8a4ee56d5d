use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a scan. Transitions are one-way:
/// pending -> running -> completed | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }
}

impl std::str::FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanStatus::Pending),
            "running" => Ok(ScanStatus::Running),
            "completed" => Ok(ScanStatus::Completed),
            "failed" => Ok(ScanStatus::Failed),
            other => Err(format!("unknown scan status '{other}'")),
        }
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: i64,
    pub domain: String,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub is_scheduled: bool,
}

/// One investigated host, written once after every pipeline stage of its scan
/// has finished. `ports` and `urls` are `None` when a stage produced nothing
/// for the host, never an empty list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubdomainRecord {
    pub id: i64,
    pub scan_id: i64,
    pub hostname: String,
    pub ip_address: Option<String>,
    pub ports: Option<Vec<u16>>,
    pub status_code: Option<u16>,
    pub content_length: Option<i64>,
    pub title: Option<String>,
    pub technologies: Vec<String>,
    pub urls: Option<Vec<String>>,
    pub is_alive: bool,
    pub created_at: DateTime<Utc>,
}

/// Correlator output, not yet persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubdomainRecord {
    pub scan_id: i64,
    pub hostname: String,
    pub ip_address: Option<String>,
    pub ports: Option<Vec<u16>>,
    pub status_code: Option<u16>,
    pub content_length: Option<i64>,
    pub title: Option<String>,
    pub technologies: Vec<String>,
    pub urls: Option<Vec<String>>,
    pub is_alive: bool,
}

/// One parsed row of http-probe output. Hosts absent from probe output have
/// no row and are treated as not alive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpProbe {
    pub host: String,
    pub ip: Option<String>,
    pub status_code: Option<u16>,
    pub content_length: Option<i64>,
    pub title: Option<String>,
    pub technologies: Vec<String>,
    pub alive: bool,
}

/// Recurring scan definition with a five-field crontab expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDefinition {
    pub id: i64,
    pub domain: String,
    pub cron_expression: String,
    pub is_active: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanTotals {
    pub total: i64,
    pub completed: i64,
    pub running: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubdomainTotals {
    pub total: i64,
    pub alive: i64,
    pub with_open_ports: i64,
}

/// Aggregates across all scans, served by the stats endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalStats {
    pub scans: ScanTotals,
    pub subdomains: SubdomainTotals,
    pub top_technologies: Vec<(String, i64)>,
    pub top_ports: Vec<(String, i64)>,
}
