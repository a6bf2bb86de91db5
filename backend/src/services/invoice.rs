//! Reading, editing, deleting and reporting on invoices.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use sqlx::PgPool;
use validator::Validate;

use crate::error::AppError;
use crate::models::invoice::{
    Invoice, InvoiceDetail, InvoiceItemDraft, InvoiceListQuery, InvoiceReport,
    InvoiceReportQuery, UpdateInvoiceRequest,
};
use crate::models::PaginatedResponse;
use crate::repositories::invoice::{InvoiceFilter, InvoiceHeader};
use crate::repositories::{
    begin_transaction, commit_transaction, rollback_transaction, ClientRepository,
    InvoiceRepository, Repository, TimesheetRepository,
};
use crate::services::numbering::NumberingService;
use crate::services::storage::DocumentStorage;
use crate::types::{ClientId, InvoiceId, TimesheetId};
use crate::utils::money::{line_amount, round_money};
use crate::utils::time::{month_bounds, month_label};

/// Resolved report window: `None` means unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportWindow {
    pub range: Option<(NaiveDate, NaiveDate)>,
    pub label: String,
}

pub fn report_window(query: &InvoiceReportQuery) -> Result<ReportWindow, AppError> {
    let (Some(fy), Some(fm), Some(ty), Some(tm)) = (
        query.from_year,
        query.from_month,
        query.to_year,
        query.to_month,
    ) else {
        return Ok(ReportWindow {
            range: None,
            label: "all dates".into(),
        });
    };

    let invalid = || AppError::Validation(vec!["month: must be between 1 and 12".into()]);
    let (from, _) = month_bounds(fy, fm).ok_or_else(invalid)?;
    let (_, to) = month_bounds(ty, tm).ok_or_else(invalid)?;
    if from > to {
        return Err(AppError::Validation(vec![
            "period: start must not be after end".into(),
        ]));
    }
    Ok(ReportWindow {
        range: Some((from, to)),
        label: format!("{} - {}", month_label(fy, fm), month_label(ty, tm)),
    })
}

#[derive(Clone)]
pub struct InvoiceService {
    pool: PgPool,
    storage: DocumentStorage,
    invoices: InvoiceRepository,
    timesheets: TimesheetRepository,
    clients: ClientRepository,
    numbering: NumberingService,
}

impl InvoiceService {
    pub fn new(pool: PgPool, storage: DocumentStorage) -> Self {
        Self {
            numbering: NumberingService::new(pool.clone()),
            pool,
            storage,
            invoices: InvoiceRepository::new(),
            timesheets: TimesheetRepository::new(),
            clients: ClientRepository::new(),
        }
    }

    pub async fn list(
        &self,
        query: &InvoiceListQuery,
    ) -> Result<PaginatedResponse<Invoice>, AppError> {
        let page = query.pagination();
        let filter = InvoiceFilter {
            client_id: query.client_id,
            year: query.year,
            month: query.month,
        };
        let (rows, total) = self.invoices.list(&self.pool, &filter, &page).await?;
        Ok(PaginatedResponse::new(rows, total, page.limit(), page.offset()))
    }

    pub async fn get(&self, id: InvoiceId) -> Result<Invoice, AppError> {
        self.invoices.find_by_id(&self.pool, id).await
    }

    pub async fn get_detail(&self, id: InvoiceId) -> Result<InvoiceDetail, AppError> {
        let invoice = self.invoices.find_by_id(&self.pool, id).await?;
        let items = self.invoices.find_items(&self.pool, id).await?;
        Ok(InvoiceDetail { invoice, items })
    }

    pub async fn get_by_number(&self, number: &str) -> Result<InvoiceDetail, AppError> {
        let invoice = self.invoices.find_by_number(&self.pool, number).await?;
        let items = self.invoices.find_items(&self.pool, invoice.id).await?;
        Ok(InvoiceDetail { invoice, items })
    }

    /// Replaces header and items. Timesheets dropped from the item list are
    /// released; newly referenced ones are claimed.
    pub async fn update_invoice(
        &self,
        id: InvoiceId,
        mut req: UpdateInvoiceRequest,
    ) -> Result<InvoiceDetail, AppError> {
        req.invoice_number = req.invoice_number.trim().to_string();
        req.validate()?;
        self.clients.find_by_id(&self.pool, req.client_id).await?;
        let number = req.invoice_number.clone();

        let mut tx = begin_transaction(&self.pool).await?;
        let current = self.invoices.find_by_id(&self.pool, id).await?;
        let (period_year, period_month) = if req.issue_date == current.issue_date {
            (current.period_year, current.period_month)
        } else {
            let scheme = self
                .numbering
                .effective_scheme(&mut tx, current.seller_id, req.issue_date)
                .await?;
            scheme
                .reset_period
                .period_components(req.issue_date.year(), req.issue_date.month())
        };
        if number != current.invoice_number
            && self.invoices.number_taken(&mut tx, &number, Some(id)).await?
        {
            return Err(AppError::Conflict(format!(
                "Invoice number {} is already in use",
                number
            )));
        }

        let previous: HashSet<TimesheetId> = self
            .invoices
            .find_items_tx(&mut tx, id)
            .await?
            .into_iter()
            .filter_map(|item| item.timesheet_id)
            .collect();
        let kept: HashSet<TimesheetId> =
            req.items.iter().filter_map(|item| item.timesheet_id).collect();

        let released: Vec<TimesheetId> = previous.difference(&kept).copied().collect();
        if !released.is_empty() {
            self.timesheets.detach(&mut tx, &released).await?;
        }
        let added: Vec<TimesheetId> = kept.difference(&previous).copied().collect();
        if !added.is_empty() {
            let claimed = self.timesheets.attach_to_invoice(&mut tx, &added, id).await?;
            if claimed != added.len() as u64 {
                rollback_transaction(tx).await?;
                return Err(AppError::Conflict(
                    "One or more timesheets are already invoiced".into(),
                ));
            }
        }

        let drafts: Vec<InvoiceItemDraft> = req
            .items
            .iter()
            .map(|item| InvoiceItemDraft {
                service_date: item.service_date,
                description: item.description.trim().to_string(),
                duration: item.duration,
                hourly_rate: item.hourly_rate,
                amount: line_amount(item.duration, item.hourly_rate),
                timesheet_id: item.timesheet_id,
            })
            .collect();
        let total = round_money(drafts.iter().map(|d| d.amount).sum::<Decimal>());

        self.invoices.delete_items(&mut tx, id).await?;
        self.invoices.insert_items(&mut tx, id, &drafts).await?;
        self.invoices
            .update_header(
                &mut tx,
                id,
                InvoiceHeader {
                    client_id: req.client_id,
                    issue_date: req.issue_date,
                    invoice_number: &number,
                    total_amount: total,
                    period_year,
                    period_month,
                },
            )
            .await?;
        commit_transaction(tx).await?;

        tracing::info!(
            invoice_id = %id,
            invoice_number = %number,
            released = released.len(),
            added = added.len(),
            total = %total,
            period_year,
            period_month,
            "Invoice updated"
        );
        self.get_detail(id).await
    }

    pub async fn delete_invoice(
        &self,
        id: InvoiceId,
        delete_timesheets: bool,
    ) -> Result<(), AppError> {
        let mut tx = begin_transaction(&self.pool).await?;
        let timesheets = if delete_timesheets {
            self.timesheets.delete_all_for_invoice(&mut tx, id).await?
        } else {
            self.timesheets.detach_all_from_invoice(&mut tx, id).await?
        };
        self.invoices.delete_items(&mut tx, id).await?;
        self.invoices.delete(&mut tx, id).await?;
        commit_transaction(tx).await?;

        tracing::info!(
            invoice_id = %id,
            delete_timesheets,
            timesheets,
            "Invoice deleted"
        );
        Ok(())
    }

    pub async fn generate_report(
        &self,
        query: &InvoiceReportQuery,
    ) -> Result<InvoiceReport, AppError> {
        let window = report_window(query)?;
        let client_name = match query.client_id {
            Some(client_id) => Some(self.clients.find_by_id(&self.pool, client_id).await?.name),
            None => None,
        };
        let (from, to) = match window.range {
            Some((from, to)) => (Some(from), Some(to)),
            None => (None, None),
        };
        let invoices = self
            .invoices
            .find_for_report(&self.pool, from, to, query.client_id)
            .await?;
        let total_amount = invoices.iter().map(|inv| inv.total_amount).sum();
        Ok(InvoiceReport {
            invoices,
            total_amount,
            period_label: window.label,
            client_name,
        })
    }

    pub async fn list_monthly(
        &self,
        client_id: ClientId,
        year: i32,
        month: u32,
    ) -> Result<Vec<Invoice>, AppError> {
        let (from, to) = month_bounds(year, month)
            .ok_or_else(|| AppError::BadRequest("Invalid year/month".into()))?;
        self.invoices
            .find_by_client_between(&self.pool, client_id, from, to)
            .await
    }

    pub async fn list_yearly(&self, client_id: ClientId, year: i32) -> Result<Vec<Invoice>, AppError> {
        let (from, _) = month_bounds(year, 1)
            .ok_or_else(|| AppError::BadRequest("Invalid year".into()))?;
        let (_, to) = month_bounds(year, 12)
            .ok_or_else(|| AppError::BadRequest("Invalid year".into()))?;
        self.invoices
            .find_by_client_between(&self.pool, client_id, from, to)
            .await
    }

    /// Stored PDF bytes with the download file name.
    pub async fn pdf(&self, id: InvoiceId) -> Result<(String, Vec<u8>), AppError> {
        let invoice = self.invoices.find_by_id(&self.pool, id).await?;
        let path = invoice
            .pdf_path
            .as_deref()
            .ok_or_else(|| AppError::NotFound("Invoice PDF has not been generated".into()))?;
        let bytes = self.storage.read(path).await?;
        Ok((format!("{}.pdf", invoice.file_stem()), bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(from: (i32, u32), to: (i32, u32)) -> InvoiceReportQuery {
        InvoiceReportQuery {
            from_year: Some(from.0),
            from_month: Some(from.1),
            to_year: Some(to.0),
            to_month: Some(to.1),
            client_id: None,
        }
    }

    #[test]
    fn report_window_spans_whole_months() {
        let window = report_window(&query((2026, 1), (2026, 3))).unwrap();
        assert_eq!(
            window.range,
            Some((
                NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 3, 31).unwrap()
            ))
        );
        assert_eq!(window.label, "January 2026 - March 2026");
    }

    #[test]
    fn missing_bound_means_all_dates() {
        let mut q = query((2026, 1), (2026, 3));
        q.to_month = None;
        let window = report_window(&q).unwrap();
        assert!(window.range.is_none());
        assert_eq!(window.label, "all dates");
    }

    #[test]
    fn inverted_window_is_rejected() {
        let err = report_window(&query((2026, 4), (2026, 3))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn out_of_range_month_is_rejected() {
        let err = report_window(&query((2026, 13), (2027, 1))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
