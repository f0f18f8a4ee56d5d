use std::sync::Arc;
use std::time::Duration;

use crate::cli::{Cli, Commands};
use recon_forge::api::{self, AppState};
use recon_forge::config::Config;
use recon_forge::engine::orchestrator::Orchestrator;
use recon_forge::engine::scheduler::{Scheduler, SystemClock};
use recon_forge::external::tools::ExternalTools;
use recon_forge::store::{ScanStore, SqliteStore};

pub async fn run_from_cli(cli: Cli) -> anyhow::Result<()> {
    // Configure logging based on global flags. Keep infrastructure crates
    // (axum/tower/sqlx) quiet so debug runs stay readable.
    use tracing_subscriber::EnvFilter;
    let crate_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let filter_str = format!(
        "recon_forge={level},tower_http=info,sqlx=warn,hyper=info",
        level = crate_level
    );
    let env_filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(crate_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(true)
        .with_target(false)
        .init();

    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { bind, db } => {
            let mut config = Config::from_env();
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(db) = db {
                config.database_url = db;
            }
            serve(config).await
        }
        Commands::Scan {
            domain,
            db,
            timeout,
            json,
        } => {
            let mut config = Config::from_env();
            if let Some(db) = db {
                config.database_url = db;
            }
            if let Some(timeout) = timeout {
                config.scan_timeout_secs = timeout;
            }
            scan_once(config, domain, json).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let config = Arc::new(config);
    let store = SqliteStore::connect(&config.database_url).await?;
    tracing::info!(db = %config.database_url, "store initialized");

    let tools = Arc::new(ExternalTools::new(Arc::clone(&config)));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(store.clone()),
        tools,
        Arc::clone(&config),
    ));

    let scheduler = Scheduler::new(
        Arc::new(store.clone()),
        Arc::clone(&orchestrator),
        Arc::new(SystemClock),
        Duration::from_secs(config.schedule_poll_secs),
    );
    tokio::spawn(async move { scheduler.run().await });
    tracing::info!(poll_secs = config.schedule_poll_secs, "schedule checker started");

    let app = api::router(AppState {
        store,
        orchestrator,
    });
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    println!("[*] recon_forge listening on {}", config.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn scan_once(config: Config, target: String, json: bool) -> anyhow::Result<()> {
    let domain = normalize_domain(&target);
    let config = Arc::new(config);
    let store = SqliteStore::connect(&config.database_url).await?;
    let tools = Arc::new(ExternalTools::new(Arc::clone(&config)));
    let orchestrator = Orchestrator::new(Arc::new(store.clone()), tools, Arc::clone(&config));

    println!("[>] Target: {domain}");
    println!("[~] Stage timeouts: enum {}s, ports {}s, probe {}s, urls {}s",
        config.enumerate_timeout_secs,
        config.port_scan_timeout_secs,
        config.probe_timeout_secs,
        config.discover_timeout_secs
    );
    println!("\n{}\n", "-".repeat(60));

    let scan_id = store.create_scan(&domain, false).await?;
    let started = std::time::Instant::now();
    if let Err(e) = orchestrator.execute(scan_id).await {
        eprintln!("[!] Scan failed: {e}");
    }

    let scan = store.get_scan(scan_id).await?;
    let records = store.records_for_scan(scan_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(60));
    println!("              SCAN {}", scan.status.as_str().to_uppercase());
    println!("{}", "=".repeat(60));
    println!("\n[*] Summary:");
    println!("   Target: {domain}");
    println!("   Duration: {}s", started.elapsed().as_secs());
    println!("   Subdomains: {}", records.len());
    println!(
        "   Alive hosts: {}",
        records.iter().filter(|r| r.is_alive).count()
    );
    println!(
        "   With open ports: {}",
        records.iter().filter(|r| r.ports.is_some()).count()
    );
    for record in records.iter().take(20) {
        let ports = record
            .ports
            .as_ref()
            .map(|p| {
                p.iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(",")
            })
            .unwrap_or_else(|| "-".into());
        let status = record
            .status_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".into());
        println!("   {:<40} [{}] ports: {}", record.hostname, status, ports);
    }
    println!();
    Ok(())
}

/// Accept a bare domain or a full URL and reduce it to the host.
fn normalize_domain(target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        if let Ok(u) = url::Url::parse(target) {
            if let Some(host) = u.host_str() {
                return host.to_lowercase();
            }
        }
    }
    target.trim().trim_end_matches('/').to_lowercase()
}
