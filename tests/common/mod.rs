//! Shared fakes: an in-memory store and a canned tool suite.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use recon_forge::error::{ReconError, Result};
use recon_forge::external::tools::ToolSuite;
use recon_forge::model::{
    HttpProbe, NewSubdomainRecord, Scan, ScanStatus, ScheduleDefinition,
};
use recon_forge::store::ScanStore;

#[derive(Default)]
struct MemoryState {
    next_scan_id: i64,
    scans: HashMap<i64, Scan>,
    records: Vec<NewSubdomainRecord>,
    next_schedule_id: i64,
    schedules: HashMap<i64, ScheduleDefinition>,
}

/// In-memory [`ScanStore`] with the same terminal-state semantics as the
/// real one. `fail_inserts` simulates the store going away mid-pipeline.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    pub fail_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn records(&self) -> Vec<NewSubdomainRecord> {
        self.state.lock().records.clone()
    }

    pub fn scan_count(&self) -> usize {
        self.state.lock().scans.len()
    }

    pub fn add_schedule(
        &self,
        domain: &str,
        cron_expression: &str,
        last_run: Option<DateTime<Utc>>,
    ) -> i64 {
        let mut state = self.state.lock();
        state.next_schedule_id += 1;
        let id = state.next_schedule_id;
        state.schedules.insert(
            id,
            ScheduleDefinition {
                id,
                domain: domain.to_string(),
                cron_expression: cron_expression.to_string(),
                is_active: true,
                last_run,
                next_run: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn schedule(&self, id: i64) -> Option<ScheduleDefinition> {
        self.state.lock().schedules.get(&id).cloned()
    }
}

#[async_trait]
impl ScanStore for MemoryStore {
    async fn create_scan(&self, domain: &str, scheduled: bool) -> Result<i64> {
        let mut state = self.state.lock();
        state.next_scan_id += 1;
        let id = state.next_scan_id;
        state.scans.insert(
            id,
            Scan {
                id,
                domain: domain.to_string(),
                status: ScanStatus::Pending,
                created_at: Utc::now(),
                completed_at: None,
                is_scheduled: scheduled,
            },
        );
        Ok(id)
    }

    async fn get_scan(&self, id: i64) -> Result<Scan> {
        self.state
            .lock()
            .scans
            .get(&id)
            .cloned()
            .ok_or(ReconError::ScanNotFound(id))
    }

    async fn update_scan_status(
        &self,
        id: i64,
        status: ScanStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if let Some(scan) = state.scans.get_mut(&id) {
            if !scan.status.is_terminal() {
                scan.status = status;
                scan.completed_at = completed_at;
            }
        }
        Ok(())
    }

    async fn insert_subdomain_record(&self, record: &NewSubdomainRecord) -> Result<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(ReconError::Internal("store unavailable".into()));
        }
        self.state.lock().records.push(record.clone());
        Ok(())
    }

    async fn list_active_schedules(&self) -> Result<Vec<ScheduleDefinition>> {
        let state = self.state.lock();
        let mut defs: Vec<_> = state
            .schedules
            .values()
            .filter(|d| d.is_active)
            .cloned()
            .collect();
        defs.sort_by_key(|d| d.id);
        Ok(defs)
    }

    async fn update_schedule_run_times(
        &self,
        id: i64,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        let def = state
            .schedules
            .get_mut(&id)
            .ok_or(ReconError::ScheduleNotFound(id))?;
        def.last_run = Some(last_run);
        def.next_run = next_run;
        Ok(())
    }
}

/// Tool suite returning canned stage outputs.
#[derive(Default)]
pub struct StaticTools {
    pub subdomains: Vec<String>,
    pub ports: HashMap<String, Vec<u16>>,
    pub probes: Vec<HttpProbe>,
    pub urls: Vec<String>,
}

#[async_trait]
impl ToolSuite for StaticTools {
    async fn enumerate_subdomains(&self, _domain: &str) -> Vec<String> {
        self.subdomains.clone()
    }

    async fn scan_ports(&self, _hosts: &[String]) -> HashMap<String, Vec<u16>> {
        self.ports.clone()
    }

    async fn probe_http(&self, _hosts: &[String]) -> Vec<HttpProbe> {
        self.probes.clone()
    }

    async fn discover_urls(&self, _domain: &str) -> Vec<String> {
        self.urls.clone()
    }
}

pub fn probe(host: &str, status: u16) -> HttpProbe {
    HttpProbe {
        host: host.to_string(),
        ip: Some("203.0.113.10".to_string()),
        status_code: Some(status),
        content_length: Some(1234),
        title: Some("Example".to_string()),
        technologies: vec!["nginx".to_string()],
        alive: true,
    }
}
