pub mod sqlite;

pub use sqlite::SqliteStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{NewSubdomainRecord, Scan, ScanStatus, ScheduleDefinition};

/// The store operations the engine needs. The HTTP layer works against the
/// concrete [`SqliteStore`]; the orchestrator and scheduler only ever see
/// this trait, so tests drive them with an in-memory fake.
#[async_trait]
pub trait ScanStore: Send + Sync {
    async fn create_scan(&self, domain: &str, scheduled: bool) -> Result<i64>;

    async fn get_scan(&self, id: i64) -> Result<Scan>;

    /// Terminal states are sticky: updating a completed or failed scan is a
    /// no-op, as is updating a scan that was deleted mid-run.
    async fn update_scan_status(
        &self,
        id: i64,
        status: ScanStatus,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn insert_subdomain_record(&self, record: &NewSubdomainRecord) -> Result<()>;

    async fn list_active_schedules(&self) -> Result<Vec<ScheduleDefinition>>;

    async fn update_schedule_run_times(
        &self,
        id: i64,
        last_run: DateTime<Utc>,
        next_run: Option<DateTime<Utc>>,
    ) -> Result<()>;
}
