use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::pipeline::{Pipeline, RunOutcome};

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expr}': {reason}")]
    CronParse { expr: String, reason: String },

    #[error("Schedule '{0}' has no upcoming occurrence")]
    Exhausted(String),
}

/// A cron schedule with a seconds field, e.g. `*/10 * * * * *` or `0 */5 * * * *`.
///
/// Five-field expressions get `0` prepended so they fire on the minute.
#[derive(Debug, Clone)]
pub struct Timer {
    expr: String,
    schedule: Schedule,
}

impl Timer {
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        let normalized = normalize_cron_expr(expr);
        let schedule = Schedule::from_str(&normalized).map_err(|e| ScheduleError::CronParse {
            expr: expr.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            expr: normalized,
            schedule,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn next_after(&self, after: DateTime<Utc>) -> Result<DateTime<Utc>, ScheduleError> {
        self.schedule
            .after(&after)
            .next()
            .ok_or_else(|| ScheduleError::Exhausted(self.expr.clone()))
    }

    /// The tick to wait for; never at or before `last_tick`, even when the
    /// monotonic sleep ended a little before the wall-clock tick.
    pub fn next_tick(
        &self,
        now: DateTime<Utc>,
        last_tick: Option<DateTime<Utc>>,
    ) -> Result<DateTime<Utc>, ScheduleError> {
        let from = last_tick.map_or(now, |last| last.max(now));
        self.next_after(from)
    }

    /// The next `count` firing times after `after`.
    pub fn upcoming(&self, after: DateTime<Utc>, count: usize) -> Vec<DateTime<Utc>> {
        self.schedule.after(&after).take(count).collect()
    }

    /// Fire `pipeline` on every tick until `shutdown` resolves.
    ///
    /// Each firing runs in its own task and is not awaited before the next tick,
    /// so a slow run can overlap the following one.
    pub async fn run<F>(
        &self,
        pipeline: Pipeline,
        run_on_startup: bool,
        shutdown: F,
    ) -> Result<(), ScheduleError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(schedule = %self.expr, "Timer started");

        if run_on_startup {
            spawn_run(&pipeline);
        }

        let mut last_tick = None;
        loop {
            let now = Utc::now();
            let next = self.next_tick(now, last_tick)?;
            let wait = (next - now).to_std().unwrap_or_default();
            debug!(%next, "Waiting for next tick");

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Timer stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {
                    last_tick = Some(next);
                    spawn_run(&pipeline);
                }
            }
        }
    }
}

fn spawn_run(pipeline: &Pipeline) {
    let pipeline = pipeline.clone();
    tokio::spawn(async move {
        let outcome = pipeline.run_once().await;
        if !matches!(outcome, RunOutcome::Uploaded { .. }) {
            warn!(?outcome, "Run finished without a stored blob");
        }
    });
}

fn normalize_cron_expr(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}
