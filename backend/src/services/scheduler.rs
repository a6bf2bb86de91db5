//! Cron-driven trigger for the monthly invoicing job.

use std::str::FromStr;

use anyhow::{anyhow, Result};
use chrono::Utc;
use chrono_tz::Tz;
use cron::Schedule;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::services::invoicing_job::MonthlyInvoicingJob;

pub struct InvoicingScheduler {
    job: MonthlyInvoicingJob,
    schedule: Schedule,
    time_zone: Tz,
}

/// Parses a six-field (seconds first) cron expression.
pub fn parse_schedule(expression: &str) -> Result<Schedule> {
    Schedule::from_str(expression.trim())
        .map_err(|e| anyhow!("Invalid cron expression '{}': {}", expression, e))
}

impl InvoicingScheduler {
    pub fn new(job: MonthlyInvoicingJob, expression: &str, time_zone: Tz) -> Result<Self> {
        let schedule = parse_schedule(expression)?;
        Ok(Self {
            job,
            schedule,
            time_zone,
        })
    }

    pub fn next_fire(&self) -> Option<chrono::DateTime<Tz>> {
        self.schedule.upcoming(self.time_zone).next()
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(self, cancel: CancellationToken) {
        loop {
            let Some(next) = self.next_fire() else {
                tracing::warn!("Invoicing schedule has no upcoming fire time; scheduler exiting");
                return;
            };
            let wait = (next.with_timezone(&Utc) - Utc::now())
                .to_std()
                .unwrap_or_default();
            tracing::info!(next_run = %next, "Invoicing scheduler waiting");

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Invoicing scheduler stopped");
                    return;
                }
                _ = tokio::time::sleep(wait) => {
                    match self.job.run().await {
                        Ok(summary) => tracing::info!(
                            period = %summary.period,
                            successful = summary.successful,
                            failed = summary.failed,
                            "Scheduled invoicing run completed"
                        ),
                        Err(err) => tracing::error!(error = %err, "Scheduled invoicing run failed"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_expression_fires_on_the_first_at_six() {
        let schedule = parse_schedule("0 0 6 1 * *").unwrap();
        let next = schedule
            .upcoming(chrono_tz::Europe::London)
            .next()
            .unwrap();
        use chrono::{Datelike, Timelike};
        assert_eq!(next.day(), 1);
        assert_eq!(next.hour(), 6);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn garbage_expressions_are_rejected_with_the_expression_named() {
        let err = parse_schedule("not a cron").unwrap_err();
        assert!(err
            .to_string()
            .starts_with("Invalid cron expression 'not a cron': "));
    }
}
