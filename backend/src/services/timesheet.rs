use chrono::NaiveDate;
use chrono_tz::Tz;
use sqlx::PgPool;
use validator::Validate;

use crate::error::AppError;
use crate::models::timesheet::{CreateTimesheetRequest, Timesheet, UpdateTimesheetRequest};
use crate::repositories::timesheet::TimesheetValues;
use crate::repositories::{
    begin_transaction, commit_transaction, ClientRepository, Repository, TimesheetRepository,
};
use crate::types::{ClientId, TimesheetId};
use crate::utils::time::{month_bounds, today_local};

#[derive(Clone)]
pub struct TimesheetService {
    pool: PgPool,
    time_zone: Tz,
    repo: TimesheetRepository,
    clients: ClientRepository,
}

impl TimesheetService {
    pub fn new(pool: PgPool, time_zone: Tz) -> Self {
        Self {
            pool,
            time_zone,
            repo: TimesheetRepository::new(),
            clients: ClientRepository::new(),
        }
    }

    pub async fn list_all(&self) -> Result<Vec<Timesheet>, AppError> {
        self.repo.find_all(&self.pool).await
    }

    pub async fn get(&self, id: TimesheetId) -> Result<Timesheet, AppError> {
        self.repo.find_by_id(&self.pool, id).await
    }

    pub async fn list_for_client(
        &self,
        client_id: ClientId,
        invoiced: Option<bool>,
    ) -> Result<Vec<Timesheet>, AppError> {
        self.clients.find_by_id(&self.pool, client_id).await?;
        self.repo.find_by_client(&self.pool, client_id, invoiced).await
    }

    pub async fn list_monthly(
        &self,
        client_id: ClientId,
        year: i32,
        month: u32,
    ) -> Result<Vec<Timesheet>, AppError> {
        let (from, to) = month_bounds(year, month)
            .ok_or_else(|| AppError::BadRequest("Invalid year/month".into()))?;
        self.repo
            .find_by_client_between(&self.pool, client_id, from, to)
            .await
    }

    pub async fn list_unbilled(&self) -> Result<Vec<Timesheet>, AppError> {
        self.repo.find_unbilled(&self.pool).await
    }

    pub async fn create(&self, req: CreateTimesheetRequest) -> Result<Timesheet, AppError> {
        req.validate()?;
        let client = self.clients.find_by_id(&self.pool, req.client_id).await?;
        if !client.active {
            return Err(AppError::BusinessRule(
                "Cannot log time for an inactive client".into(),
            ));
        }
        // Work settled on the day carries the service date as its payment date.
        let payment_date = req.paid.then_some(req.service_date);
        let values = TimesheetValues {
            client_id: req.client_id,
            service_date: req.service_date,
            duration: req.duration,
            hourly_rate: req.hourly_rate,
            payment_date,
        };
        let timesheet = self.repo.create(&self.pool, &values).await?;
        tracing::debug!(timesheet_id = %timesheet.id, client_id = %timesheet.client_id, "Timesheet created");
        Ok(timesheet)
    }

    pub async fn update(
        &self,
        id: TimesheetId,
        req: UpdateTimesheetRequest,
    ) -> Result<Timesheet, AppError> {
        req.validate()?;
        let existing = self.repo.find_by_id(&self.pool, id).await?;
        if existing.invoiced {
            return Err(AppError::BusinessRule(
                "Invoiced timesheets cannot be edited; edit the invoice instead".into(),
            ));
        }
        self.clients.find_by_id(&self.pool, req.client_id).await?;
        let values = TimesheetValues {
            client_id: req.client_id,
            service_date: req.service_date,
            duration: req.duration,
            hourly_rate: req.hourly_rate,
            payment_date: existing.payment_date,
        };
        self.repo.update(&self.pool, id, &values).await
    }

    pub async fn delete(&self, id: TimesheetId) -> Result<(), AppError> {
        let existing = self.repo.find_by_id(&self.pool, id).await?;
        if existing.invoiced {
            return Err(AppError::BusinessRule(
                "Cannot delete a timesheet that has been invoiced".into(),
            ));
        }
        self.repo.delete(&self.pool, id).await
    }

    /// Releases a timesheet from its invoice so it can be billed again.
    pub async fn detach(&self, id: TimesheetId) -> Result<Timesheet, AppError> {
        let existing = self.repo.find_by_id(&self.pool, id).await?;
        if !existing.invoiced {
            return Err(AppError::BusinessRule("Timesheet is not invoiced".into()));
        }
        let mut tx = begin_transaction(&self.pool).await?;
        self.repo.detach(&mut tx, &[id]).await?;
        commit_transaction(tx).await?;
        self.repo.find_by_id(&self.pool, id).await
    }

    pub async fn mark_paid(
        &self,
        id: TimesheetId,
        payment_date: Option<NaiveDate>,
    ) -> Result<Timesheet, AppError> {
        let date = payment_date.unwrap_or_else(|| today_local(&self.time_zone));
        self.repo.mark_paid(&self.pool, id, date).await
    }
}
