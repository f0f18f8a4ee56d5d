use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;

use recon_forge::config::Config;
use recon_forge::engine::orchestrator::Orchestrator;
use recon_forge::external::tools::ToolSuite;
use recon_forge::model::{HttpProbe, ScanStatus};
use recon_forge::store::ScanStore;

mod common;
use common::{probe, MemoryStore, StaticTools};

fn orchestrator(
    store: Arc<MemoryStore>,
    tools: Arc<dyn ToolSuite>,
    config: Config,
) -> Orchestrator {
    Orchestrator::new(store as Arc<dyn ScanStore>, tools, Arc::new(config))
}

#[tokio::test]
async fn full_pipeline_correlates_and_completes() {
    let store = Arc::new(MemoryStore::default());
    let tools = Arc::new(StaticTools {
        subdomains: vec!["a.example.com".to_string(), "b.example.com".to_string()],
        ports: HashMap::from([("a.example.com".to_string(), vec![80, 443])]),
        probes: vec![probe("a.example.com", 200)],
        urls: vec!["http://a.example.com/x".to_string()],
    });
    let orch = orchestrator(store.clone(), tools, Config::default());

    let id = store.create_scan("example.com", false).await.unwrap();
    orch.execute(id).await.unwrap();

    let scan = store.get_scan(id).await.unwrap();
    assert_eq!(scan.status, ScanStatus::Completed);
    assert!(scan.completed_at.is_some());

    let records = store.records();
    assert_eq!(records.len(), 2);
    let a = records.iter().find(|r| r.hostname == "a.example.com").unwrap();
    assert_eq!(a.ports.as_deref(), Some(&[80, 443][..]));
    assert_eq!(a.status_code, Some(200));
    assert!(a.is_alive);
    assert_eq!(
        a.urls.as_deref(),
        Some(&["http://a.example.com/x".to_string()][..])
    );
    let b = records.iter().find(|r| r.hostname == "b.example.com").unwrap();
    assert!(b.ports.is_none());
    assert!(!b.is_alive);
    assert!(b.urls.is_none());
}

#[tokio::test]
async fn empty_enumeration_still_investigates_the_target() {
    let store = Arc::new(MemoryStore::default());
    let tools = Arc::new(StaticTools {
        probes: vec![probe("example.com", 200)],
        ..Default::default()
    });
    let orch = orchestrator(store.clone(), tools, Config::default());

    let id = store.create_scan("example.com", false).await.unwrap();
    orch.execute(id).await.unwrap();

    let records = store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].hostname, "example.com");
    assert!(records[0].is_alive);
}

#[tokio::test]
async fn dead_stages_degrade_to_empty_data_and_scan_completes() {
    // Every tool yields nothing, as after timeouts or missing binaries.
    let store = Arc::new(MemoryStore::default());
    let orch = orchestrator(
        store.clone(),
        Arc::new(StaticTools::default()),
        Config::default(),
    );

    let id = store.create_scan("example.com", false).await.unwrap();
    orch.execute(id).await.unwrap();

    let scan = store.get_scan(id).await.unwrap();
    assert_eq!(scan.status, ScanStatus::Completed);
    let records = store.records();
    assert_eq!(records.len(), 1);
    assert!(!records[0].is_alive);
    assert!(records[0].ports.is_none());
}

#[tokio::test]
async fn store_failure_marks_scan_failed_without_completion_time() {
    let store = Arc::new(MemoryStore::default());
    store.fail_inserts.store(true, Ordering::SeqCst);
    let orch = orchestrator(
        store.clone(),
        Arc::new(StaticTools::default()),
        Config::default(),
    );

    let id = store.create_scan("example.com", false).await.unwrap();
    assert!(orch.execute(id).await.is_err());

    let scan = store.get_scan(id).await.unwrap();
    assert_eq!(scan.status, ScanStatus::Failed);
    assert!(scan.completed_at.is_none());
}

#[tokio::test]
async fn missing_scan_is_reported_and_nothing_is_written() {
    let store = Arc::new(MemoryStore::default());
    let orch = orchestrator(
        store.clone(),
        Arc::new(StaticTools::default()),
        Config::default(),
    );

    assert!(orch.execute(999).await.is_err());
    assert!(store.records().is_empty());
}

#[tokio::test]
async fn duplicate_start_is_ignored() {
    let store = Arc::new(MemoryStore::default());
    let orch = orchestrator(
        store.clone(),
        Arc::new(StaticTools::default()),
        Config::default(),
    );

    let id = store.create_scan("example.com", false).await.unwrap();
    assert!(orch.in_flight().try_claim(id));

    // Claimed elsewhere: the second start is a no-op, the scan untouched.
    orch.execute(id).await.unwrap();
    let scan = store.get_scan(id).await.unwrap();
    assert_eq!(scan.status, ScanStatus::Pending);
    assert!(store.records().is_empty());
}

/// Tool suite that hangs long enough to trip the overall scan timeout.
struct StalledTools;

#[async_trait]
impl ToolSuite for StalledTools {
    async fn enumerate_subdomains(&self, _domain: &str) -> Vec<String> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Vec::new()
    }

    async fn scan_ports(&self, _hosts: &[String]) -> HashMap<String, Vec<u16>> {
        HashMap::new()
    }

    async fn probe_http(&self, _hosts: &[String]) -> Vec<HttpProbe> {
        Vec::new()
    }

    async fn discover_urls(&self, _domain: &str) -> Vec<String> {
        Vec::new()
    }
}

#[tokio::test(start_paused = true)]
async fn overall_timeout_leaves_scan_in_a_terminal_state() {
    let store = Arc::new(MemoryStore::default());
    let config = Config {
        scan_timeout_secs: 5,
        ..Default::default()
    };
    let orch = orchestrator(store.clone(), Arc::new(StalledTools), config);

    let id = store.create_scan("example.com", false).await.unwrap();
    assert!(orch.execute(id).await.is_err());

    let scan = store.get_scan(id).await.unwrap();
    assert_eq!(scan.status, ScanStatus::Failed);
    assert!(scan.completed_at.is_none());
}
