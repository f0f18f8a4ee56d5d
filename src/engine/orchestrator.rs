use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;

use crate::config::Config;
use crate::engine::correlate::{correlate, StageOutputs};
use crate::error::{ReconError, Result};
use crate::external::tools::ToolSuite;
use crate::model::ScanStatus;
use crate::store::ScanStore;

/// Scan ids currently being driven by this process. Advisory only: it is
/// lost on restart, so the persisted status field stays the authority.
#[derive(Clone, Default)]
pub struct InFlight(Arc<Mutex<HashSet<i64>>>);

impl InFlight {
    pub fn try_claim(&self, id: i64) -> bool {
        self.0.lock().insert(id)
    }

    pub fn release(&self, id: i64) {
        self.0.lock().remove(&id);
    }

    pub fn contains(&self, id: i64) -> bool {
        self.0.lock().contains(&id)
    }
}

/// Drives scans through the pipeline:
/// enumerate -> port-scan -> http-probe -> url-discovery -> correlate -> persist.
///
/// Stage failures are absorbed (the stage contributes nothing); store
/// failures abort the scan and mark it failed. That asymmetry is deliberate:
/// external tools break routinely, infrastructure must not.
pub struct Orchestrator {
    store: Arc<dyn ScanStore>,
    tools: Arc<dyn ToolSuite>,
    config: Arc<Config>,
    in_flight: InFlight,
}

impl Orchestrator {
    pub fn new(store: Arc<dyn ScanStore>, tools: Arc<dyn ToolSuite>, config: Arc<Config>) -> Self {
        Self {
            store,
            tools,
            config,
            in_flight: InFlight::default(),
        }
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Run one scan to a terminal state. A duplicate start for an id already
    /// in flight is ignored.
    pub async fn execute(&self, scan_id: i64) -> Result<()> {
        if !self.in_flight.try_claim(scan_id) {
            tracing::warn!(scan_id, "scan already in flight, ignoring duplicate start");
            return Ok(());
        }

        let overall = Duration::from_secs(self.config.scan_timeout_secs);
        let result = match tokio::time::timeout(overall, self.run_pipeline(scan_id)).await {
            Ok(res) => res,
            Err(_) => Err(ReconError::Internal(format!(
                "scan exceeded overall timeout of {}s",
                self.config.scan_timeout_secs
            ))),
        };
        self.in_flight.release(scan_id);

        if let Err(err) = &result {
            tracing::error!(scan_id, error = %err, "scan failed");
            // The scan must not stay in `running`; best effort if the store
            // itself is what broke.
            if let Err(e) = self
                .store
                .update_scan_status(scan_id, ScanStatus::Failed, None)
                .await
            {
                tracing::error!(scan_id, error = %e, "could not mark scan failed");
            }
        }
        result
    }

    async fn run_pipeline(&self, scan_id: i64) -> Result<()> {
        let scan = self.store.get_scan(scan_id).await?;
        let domain = scan.domain;

        // Committed before any stage work so observers see progress.
        self.store
            .update_scan_status(scan_id, ScanStatus::Running, None)
            .await?;
        tracing::info!(scan_id, %domain, "starting scan");

        let mut subdomains = self.tools.enumerate_subdomains(&domain).await;
        tracing::info!(scan_id, found = subdomains.len(), "subdomain enumeration done");
        if subdomains.is_empty() {
            // At least investigate the target itself.
            subdomains.push(domain.clone());
        }

        let ports = self.tools.scan_ports(&subdomains).await;
        tracing::info!(scan_id, hosts_with_ports = ports.len(), "port scan done");

        let probes = self.tools.probe_http(&subdomains).await;
        tracing::info!(scan_id, live = probes.len(), "http probe done");

        // Root domain only; crawling every subdomain for URLs is too
        // expensive for one scan.
        let urls = self.tools.discover_urls(&domain).await;
        tracing::info!(scan_id, urls = urls.len(), "url discovery done");

        let records = correlate(
            scan_id,
            &domain,
            StageOutputs {
                subdomains,
                ports,
                probes,
                urls,
            },
        );
        for record in &records {
            self.store.insert_subdomain_record(record).await?;
        }

        self.store
            .update_scan_status(scan_id, ScanStatus::Completed, Some(Utc::now()))
            .await?;
        tracing::info!(scan_id, %domain, records = records.len(), "scan completed");
        Ok(())
    }
}
