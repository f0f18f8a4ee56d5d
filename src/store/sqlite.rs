use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::error::{ReconError, Result};
use crate::model::{
    GlobalStats, NewSubdomainRecord, Scan, ScanStatus, ScanTotals, ScheduleDefinition,
    SubdomainRecord, SubdomainTotals,
};
use crate::store::ScanStore;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS scans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        domain TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at TEXT NOT NULL,
        completed_at TEXT,
        is_scheduled INTEGER NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS subdomains (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        scan_id INTEGER NOT NULL REFERENCES scans(id) ON DELETE CASCADE,
        hostname TEXT NOT NULL,
        ip_address TEXT,
        ports TEXT,
        status_code INTEGER,
        content_length INTEGER,
        title TEXT,
        technologies TEXT NOT NULL DEFAULT '[]',
        urls TEXT,
        is_alive INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_subdomains_scan ON subdomains(scan_id)",
    "CREATE TABLE IF NOT EXISTS schedules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        domain TEXT NOT NULL,
        cron_expression TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        last_run TEXT,
        next_run TEXT,
        created_at TEXT NOT NULL
    )",
];

/// SQLite-backed store. List-valued record fields (ports, technologies,
/// urls) are kept as JSON text columns.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Private in-memory database, one connection so it isn't dropped (and
    /// with it the data) between pool checkouts.
    pub async fn in_memory() -> Result<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn list_scans(&self, limit: i64, offset: i64) -> Result<(Vec<Scan>, i64)> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scans")
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query(
            "SELECT * FROM scans ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        let scans = rows.iter().map(scan_from_row).collect::<Result<Vec<_>>>()?;
        Ok((scans, total))
    }

    /// Delete a scan; its subdomain records go with it (cascade).
    pub async fn delete_scan(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM scans WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(ReconError::ScanNotFound(id));
        }
        Ok(())
    }

    pub async fn records_for_scan(&self, scan_id: i64) -> Result<Vec<SubdomainRecord>> {
        let rows = sqlx::query("SELECT * FROM subdomains WHERE scan_id = ? ORDER BY id")
            .bind(scan_id)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    pub async fn list_records(
        &self,
        scan_id: Option<i64>,
        alive_only: bool,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<SubdomainRecord>, i64)> {
        let mut filter = String::from(" WHERE 1=1");
        if scan_id.is_some() {
            filter.push_str(" AND scan_id = ?");
        }
        if alive_only {
            filter.push_str(" AND is_alive = 1");
        }

        let count_sql = format!("SELECT COUNT(*) FROM subdomains{filter}");
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(id) = scan_id {
            count_q = count_q.bind(id);
        }
        let total = count_q.fetch_one(&self.pool).await?;

        let rows_sql = format!("SELECT * FROM subdomains{filter} ORDER BY id DESC LIMIT ? OFFSET ?");
        let mut rows_q = sqlx::query(&rows_sql);
        if let Some(id) = scan_id {
            rows_q = rows_q.bind(id);
        }
        let rows = rows_q
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        let records = rows.iter().map(record_from_row).collect::<Result<Vec<_>>>()?;
        Ok((records, total))
    }

    pub async fn create_schedule(
        &self,
        domain: &str,
        cron_expression: &str,
    ) -> Result<ScheduleDefinition> {
        let res = sqlx::query(
            "INSERT INTO schedules (domain, cron_expression, is_active, created_at)
             VALUES (?, ?, 1, ?)",
        )
        .bind(domain)
        .bind(cron_expression)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        self.get_schedule(res.last_insert_rowid()).await
    }

    pub async fn get_schedule(&self, id: i64) -> Result<ScheduleDefinition> {
        let row = sqlx::query("SELECT * FROM schedules WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => schedule_from_row(&row),
            None => Err(ReconError::ScheduleNotFound(id)),
        }
    }

    pub async fn list_schedules(&self) -> Result<Vec<ScheduleDefinition>> {
        let rows = sqlx::query("SELECT * FROM schedules ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(schedule_from_row).collect()
    }

    pub async fn delete_schedule(&self, id: i64) -> Result<()> {
        let res = sqlx::query("DELETE FROM schedules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(ReconError::ScheduleNotFound(id));
        }
        Ok(())
    }

    pub async fn toggle_schedule(&self, id: i64) -> Result<ScheduleDefinition> {
        let res = sqlx::query("UPDATE schedules SET is_active = 1 - is_active WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(ReconError::ScheduleNotFound(id));
        }
        self.get_schedule(id).await
    }

    pub async fn global_stats(&self) -> Result<GlobalStats> {
        let total: i64 = self.count_scalar("SELECT COUNT(*) FROM scans").await?;
        let completed: i64 = self
            .count_scalar("SELECT COUNT(*) FROM scans WHERE status = 'completed'")
            .await?;
        let running: i64 = self
            .count_scalar("SELECT COUNT(*) FROM scans WHERE status = 'running'")
            .await?;
        let sub_total: i64 = self.count_scalar("SELECT COUNT(*) FROM subdomains").await?;
        let alive: i64 = self
            .count_scalar("SELECT COUNT(*) FROM subdomains WHERE is_alive = 1")
            .await?;
        let with_ports: i64 = self
            .count_scalar("SELECT COUNT(*) FROM subdomains WHERE ports IS NOT NULL")
            .await?;

        // Technology and port distributions live inside JSON columns, so the
        // tallying happens here rather than in SQL.
        let tech_rows: Vec<String> = sqlx::query_scalar("SELECT technologies FROM subdomains")
            .fetch_all(&self.pool)
            .await?;
        let mut tech_counts: HashMap<String, i64> = HashMap::new();
        for raw in tech_rows {
            if let Ok(list) = serde_json::from_str::<Vec<String>>(&raw) {
                for tech in list {
                    *tech_counts.entry(tech).or_insert(0) += 1;
                }
            }
        }

        let port_rows: Vec<String> =
            sqlx::query_scalar("SELECT ports FROM subdomains WHERE ports IS NOT NULL")
                .fetch_all(&self.pool)
                .await?;
        let mut port_counts: HashMap<String, i64> = HashMap::new();
        for raw in port_rows {
            if let Ok(list) = serde_json::from_str::<Vec<u16>>(&raw) {
                for port in list {
                    *port_counts.entry(port.to_string()).or_insert(0) += 1;
                }
            }
        }

        Ok(GlobalStats {
            scans: ScanTotals {
                total,
                completed,
                running,
            },
            subdomains: SubdomainTotals {
                total: sub_total,
                alive,
                with_open_ports: with_ports,
            },
            top_technologies: top_n(tech_counts, 10),
            top_ports: top_n(port_counts, 10),
        })
    }

    async fn count_scalar(&self, sql: &str) -> Result<i64> {
        Ok(sqlx::query_scalar(sql).fetch_one(&self.pool).await?)
    }
}

#[async_trait]
impl ScanStore for SqliteStore {
    async fn create_scan(&self, domain: &str, scheduled: bool) -> Result<i64> {
        let res = sqlx::query(
            "INSERT INTO scans (domain, status, created_at, is_scheduled)
             VALUES (?, 'pending', ?, ?)",
        )
        .bind(domain)
        .bind(Utc::now())
        .bind(scheduled)
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    async fn get_scan(&self, id: i64) -> Result<Scan> {
        let row = sqlx::query("SELECT * FROM scans WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => scan_from_row(&row),
            None => Err(ReconError::ScanNotFound(id)),
        }
    }

    async fn update_scan_status(
        &self,
        id: i64,
        status: ScanStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        // The status guard makes terminal states sticky; a vanished row
        // (deleted mid-run) is also a silent no-op.
        sqlx::query(
            "UPDATE scans SET status = ?, completed_at = ?
             WHERE id = ? AND status NOT IN ('completed', 'failed')",
        )
        .bind(status.as_str())
        .bind(completed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_subdomain_record(&self, record: &NewSubdomainRecord) -> Result<()> {
        let ports = record
            .ports
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let urls = record
            .urls
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let technologies = serde_json::to_string(&record.technologies)?;
        sqlx::query(
            "INSERT INTO subdomains
             (scan_id, hostname, ip_address, ports, status_code, content_length,
              title, technologies, urls, is_alive, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.scan_id)
        .bind(&record.hostname)
        .bind(&record.ip_address)
        .bind(ports)
        .bind(record.status_code.map(|c| c as i64))
        .bind(record.content_length)
        .bind(&record.title)
        .bind(technologies)
        .bind(urls)
        .bind(record.is_alive)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_active_schedules(&self) -> Result<Vec<ScheduleDefinition>> {
        let rows = sqlx::query("SELECT * FROM schedules WHERE is_active = 1 ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(schedule_from_row).collect()
    }

    async fn update_schedule_run_times(
        &self,
        id: i64,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let res = sqlx::query("UPDATE schedules SET last_run = ?, next_run = ? WHERE id = ?")
            .bind(last_run)
            .bind(next_run)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(ReconError::ScheduleNotFound(id));
        }
        Ok(())
    }
}

fn scan_from_row(row: &SqliteRow) -> Result<Scan> {
    let status: String = row.try_get("status")?;
    Ok(Scan {
        id: row.try_get("id")?,
        domain: row.try_get("domain")?,
        status: status.parse().map_err(ReconError::Internal)?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
        is_scheduled: row.try_get("is_scheduled")?,
    })
}

fn record_from_row(row: &SqliteRow) -> Result<SubdomainRecord> {
    let ports: Option<String> = row.try_get("ports")?;
    let urls: Option<String> = row.try_get("urls")?;
    let technologies: String = row.try_get("technologies")?;
    let status_code: Option<i64> = row.try_get("status_code")?;
    Ok(SubdomainRecord {
        id: row.try_get("id")?,
        scan_id: row.try_get("scan_id")?,
        hostname: row.try_get("hostname")?,
        ip_address: row.try_get("ip_address")?,
        ports: ports
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Vec<u16>>(raw).ok())
            .filter(|p| !p.is_empty()),
        status_code: status_code.map(|c| c as u16),
        content_length: row.try_get("content_length")?,
        title: row.try_get("title")?,
        technologies: serde_json::from_str(&technologies).unwrap_or_default(),
        urls: urls
            .as_deref()
            .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
            .filter(|u| !u.is_empty()),
        is_alive: row.try_get("is_alive")?,
        created_at: row.try_get("created_at")?,
    })
}

fn schedule_from_row(row: &SqliteRow) -> Result<ScheduleDefinition> {
    Ok(ScheduleDefinition {
        id: row.try_get("id")?,
        domain: row.try_get("domain")?,
        cron_expression: row.try_get("cron_expression")?,
        is_active: row.try_get("is_active")?,
        last_run: row.try_get("last_run")?,
        next_run: row.try_get("next_run")?,
        created_at: row.try_get("created_at")?,
    })
}

fn top_n(counts: HashMap<String, i64>, n: usize) -> Vec<(String, i64)> {
    let mut entries: Vec<(String, i64)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(n);
    entries
}
