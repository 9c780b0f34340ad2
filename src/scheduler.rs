use crate::db::{self, DbPool};
use crate::engine::{EngagementLoop, RunSummary};
use crate::error::CarlError;
use crate::ledger::{self, ActionType, ActivityEntry};
use crate::schema::scheduler_status;
use crate::settings::settings;
use crate::utils;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant};

const STATUS_ID: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RunTrigger {
    Schedule,
    Admin,
    Api,
}

impl RunTrigger {
    fn action(self) -> ActionType {
        match self {
            Self::Api => ActionType::AutoInteract,
            Self::Schedule | Self::Admin => ActionType::SchedulerRun,
        }
    }
}

#[derive(Queryable, Selectable, Debug, Clone)]
#[diesel(table_name = scheduler_status)]
struct StatusRow {
    last_run: Option<i64>,
    next_run: Option<i64>,
    interval_minutes: i32,
    is_running: bool,
    last_run_result: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub last_run: Option<i64>,
    pub next_run: Option<i64>,
    pub interval_minutes: i32,
    pub is_running: bool,
    pub last_run_result: Option<Value>,
    pub running_in_process: bool,
    pub started: bool,
}

fn read_status(conn: &mut SqliteConnection) -> QueryResult<Option<StatusRow>> {
    scheduler_status::table
        .find(STATUS_ID)
        .select(StatusRow::as_select())
        .first(conn)
        .optional()
}

fn mark_running(conn: &mut SqliteConnection, interval_minutes: i32) -> QueryResult<usize> {
    diesel::insert_into(scheduler_status::table)
        .values((
            scheduler_status::id.eq(STATUS_ID),
            scheduler_status::interval_minutes.eq(interval_minutes),
            scheduler_status::is_running.eq(true),
        ))
        .on_conflict(scheduler_status::id)
        .do_update()
        .set((
            scheduler_status::interval_minutes.eq(interval_minutes),
            scheduler_status::is_running.eq(true),
        ))
        .execute(conn)
}

fn record_completion(
    conn: &mut SqliteConnection,
    interval_minutes: i32,
    finished_at: i64,
    result: &Value,
) -> QueryResult<usize> {
    let next_run = finished_at + i64::from(interval_minutes) * 60;
    let result = result.to_string();

    diesel::insert_into(scheduler_status::table)
        .values((
            scheduler_status::id.eq(STATUS_ID),
            scheduler_status::last_run.eq(finished_at),
            scheduler_status::next_run.eq(next_run),
            scheduler_status::interval_minutes.eq(interval_minutes),
            scheduler_status::is_running.eq(false),
            scheduler_status::last_run_result.eq(&result),
        ))
        .on_conflict(scheduler_status::id)
        .do_update()
        .set((
            scheduler_status::last_run.eq(finished_at),
            scheduler_status::next_run.eq(next_run),
            scheduler_status::interval_minutes.eq(interval_minutes),
            scheduler_status::is_running.eq(false),
            scheduler_status::last_run_result.eq(&result),
        ))
        .execute(conn)
}

fn result_json(result: &Result<RunSummary, CarlError>) -> Value {
    match result {
        Ok(summary) => {
            let mut value = serde_json::to_value(summary).unwrap_or_default();
            if let Value::Object(map) = &mut value {
                map.insert("success".into(), Value::Bool(true));
            }
            value
        }
        Err(e) => json!({ "success": false, "error": e.to_string() }),
    }
}

/// How long the first run waits after `start`. Later runs follow the interval.
pub fn initial_delay(next_run: Option<i64>, now: i64) -> Duration {
    match next_run {
        Some(next) if next > now => Duration::from_secs((next - now) as u64),
        _ => Duration::ZERO,
    }
}

fn interval_of(minutes: u32) -> Duration {
    Duration::from_secs(u64::from(minutes.max(1)) * 60)
}

/// Owns the engagement loop and drives it on a fixed cadence. Only one run
/// can be in flight at a time, whoever triggered it.
pub struct Scheduler {
    pool: DbPool,
    bot_id: i32,
    engine: tokio::sync::Mutex<EngagementLoop>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl Scheduler {
    pub fn new(engine: EngagementLoop) -> Self {
        Self {
            pool: engine.bot().pool().clone(),
            bot_id: engine.bot().id(),
            engine: tokio::sync::Mutex::new(engine),
            shutdown: Mutex::new(None),
        }
    }

    /// Spawns the background task. Returns false when it is already started.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut shutdown = self.shutdown.lock().unwrap_or_else(|e| e.into_inner());
        if shutdown.is_some() {
            return false;
        }
        let (tx, mut rx) = oneshot::channel::<()>();
        *shutdown = Some(tx);

        let next_run = self
            .pool
            .get()
            .ok()
            .and_then(|mut conn| read_status(&mut conn).ok().flatten())
            .and_then(|row| row.next_run);
        let first = initial_delay(next_run, db::now());

        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = &mut rx => return,
                _ = tokio::time::sleep(first) => {}
            }
            this.scheduled_run().await;

            let mut minutes = settings().scheduler.interval_minutes;
            let mut ticker = interval_at(Instant::now() + interval_of(minutes), interval_of(minutes));
            loop {
                tokio::select! {
                    _ = &mut rx => break,
                    _ = ticker.tick() => {
                        this.scheduled_run().await;
                        let current = settings().scheduler.interval_minutes;
                        if current != minutes {
                            minutes = current;
                            ticker = interval_at(Instant::now() + interval_of(minutes), interval_of(minutes));
                        }
                    }
                }
            }
            tracing::info!("scheduler task stopped");
        });

        true
    }

    pub fn stop(&self) -> bool {
        let sender = self
            .shutdown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match sender {
            Some(tx) => {
                let _ = tx.send(());
                utils::log_scheduler_stopped();
                true
            }
            None => false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.shutdown
            .lock()
            .map(|s| s.is_some())
            .unwrap_or(false)
    }

    pub fn status(&self) -> Result<SchedulerStatus, CarlError> {
        let mut conn = self.pool.get()?;
        let row = read_status(&mut conn)?;
        let running_in_process = self.engine.try_lock().is_err();
        let started = self.is_started();

        Ok(match row {
            Some(row) => SchedulerStatus {
                last_run: row.last_run,
                next_run: row.next_run,
                interval_minutes: row.interval_minutes,
                is_running: row.is_running,
                last_run_result: row
                    .last_run_result
                    .and_then(|r| serde_json::from_str(&r).ok()),
                running_in_process,
                started,
            },
            None => SchedulerStatus {
                last_run: None,
                next_run: None,
                interval_minutes: settings().scheduler.interval_minutes as i32,
                is_running: false,
                last_run_result: None,
                running_in_process,
                started,
            },
        })
    }

    /// Runs the engagement loop now, unless a run is already in progress.
    pub async fn trigger(&self, limit: usize, trigger: RunTrigger) -> Result<RunSummary, CarlError> {
        let Ok(mut engine) = self.engine.try_lock() else {
            return Err(CarlError::AlreadyRunning);
        };

        let interval_minutes = settings().scheduler.interval_minutes as i32;
        match self.pool.get() {
            Ok(mut conn) => {
                if let Err(e) = mark_running(&mut conn, interval_minutes) {
                    tracing::warn!(error = %e, "could not mark scheduler as running");
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not mark scheduler as running"),
        }

        let result = engine.run(limit).await;

        let outcome = result_json(&result);
        let finished_at = db::now();
        match self.pool.get() {
            Ok(mut conn) => {
                if let Err(e) = record_completion(&mut conn, interval_minutes, finished_at, &outcome) {
                    tracing::error!(error = %e, "could not record scheduler run");
                }
                let details = match &result {
                    Ok(summary) => format!(
                        "processed {} posts: {} comments, {} likes, {} retweets",
                        summary.processed, summary.comments, summary.likes, summary.retweets
                    ),
                    Err(_) => "engagement run failed".to_string(),
                };
                let mut entry = ActivityEntry::new(self.bot_id, trigger.action(), details)
                    .metadata(json!({ "trigger": trigger.to_string(), "result": outcome }));
                if let Err(e) = &result {
                    entry = entry.failed(e);
                }
                ledger::record(&mut conn, entry);
            }
            Err(e) => tracing::error!(error = %e, "could not record scheduler run"),
        }

        result
    }

    async fn scheduled_run(&self) {
        let limit = settings().scheduler.candidate_limit;
        match self.trigger(limit, RunTrigger::Schedule).await {
            Ok(summary) => utils::log_run_summary(&summary),
            Err(CarlError::AlreadyRunning) => {
                tracing::info!("previous engagement run still in progress, skipping tick")
            }
            Err(e) => utils::log_run_failed(&e.to_string()),
        }
    }
}
