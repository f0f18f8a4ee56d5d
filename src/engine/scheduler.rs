use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;

use crate::engine::orchestrator::Orchestrator;
use crate::error::{ReconError, Result};
use crate::model::ScheduleDefinition;
use crate::store::ScanStore;

/// Time source for due-checks. Tests drive a manual clock instead of
/// sleeping through real time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Parse a five-field crontab expression like `0 0 * * *`. The parser wants
/// a seconds field, so one is prepended.
pub fn parse_expression(expr: &str) -> Result<Schedule> {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() != 5 {
        return Err(ReconError::BadSchedule(expr.to_string()));
    }
    Schedule::from_str(&format!("0 {trimmed}"))
        .map_err(|_| ReconError::BadSchedule(expr.to_string()))
}

/// Next fire time strictly after `after`, or None for expressions with no
/// future occurrence.
pub fn next_fire_after(expr: &str, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
    Ok(parse_expression(expr)?.after(&after).next())
}

/// A definition that has never run fires immediately; otherwise it fires
/// once the expression's next time after `last_run` has passed.
pub fn is_due(def: &ScheduleDefinition, now: DateTime<Utc>) -> Result<bool> {
    match def.last_run {
        None => {
            // Still reject malformed expressions rather than firing them.
            parse_expression(&def.cron_expression)?;
            Ok(true)
        }
        Some(last) => {
            Ok(next_fire_after(&def.cron_expression, last)?.is_some_and(|next| next <= now))
        }
    }
}

/// Fixed-interval loop over the active schedule definitions. Each tick
/// evaluates every definition independently; one bad expression or store row
/// never blocks the others.
pub struct Scheduler {
    store: Arc<dyn ScanStore>,
    orchestrator: Arc<Orchestrator>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn ScanStore>,
        orchestrator: Arc<Orchestrator>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            orchestrator,
            clock,
            poll_interval,
        }
    }

    /// Periodic loop; never returns.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// Evaluate every active definition once.
    pub async fn tick(&self) {
        let schedules = match self.store.list_active_schedules().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "could not list active schedules");
                return;
            }
        };
        let now = self.clock.now();
        for def in schedules {
            if let Err(e) = self.fire_if_due(&def, now).await {
                tracing::error!(
                    schedule_id = def.id,
                    domain = %def.domain,
                    error = %e,
                    "schedule evaluation failed"
                );
            }
        }
    }

    async fn fire_if_due(&self, def: &ScheduleDefinition, now: DateTime<Utc>) -> Result<()> {
        if !is_due(def, now)? {
            return Ok(());
        }
        let scan_id = self.store.create_scan(&def.domain, true).await?;
        let next = next_fire_after(&def.cron_expression, now)?;
        // Run times are committed before handoff so the next tick cannot
        // fire this definition again for the same window.
        self.store
            .update_schedule_run_times(def.id, now, next)
            .await?;
        tracing::info!(
            schedule_id = def.id,
            domain = %def.domain,
            scan_id,
            "firing scheduled scan"
        );
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            let _ = orchestrator.execute(scan_id).await;
        });
        Ok(())
    }
}
