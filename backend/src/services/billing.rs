//! Turns timesheets into numbered invoices.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::error::AppError;
use crate::models::invoice::{
    CreateInvoiceRequest, Invoice, InvoiceDetail, InvoiceItemDraft, InvoicePreview,
};
use crate::models::seller::Seller;
use crate::models::timesheet::Timesheet;
use crate::repositories::invoice::NewInvoice;
use crate::repositories::{
    begin_transaction, commit_transaction, rollback_transaction, ClientRepository,
    InvoiceRepository, Repository, SellerRepository, TimesheetRepository,
};
use crate::services::numbering::NumberingService;
use crate::services::seller::SellerService;
use crate::types::{ClientId, SellerId, TimesheetId};
use crate::utils::money::round_money;
use crate::utils::time::month_bounds;

/// One line per timesheet, in the order given.
pub fn build_items(seller: &Seller, timesheets: &[Timesheet]) -> Vec<InvoiceItemDraft> {
    let label = seller.line_label();
    timesheets
        .iter()
        .map(|sheet| InvoiceItemDraft {
            service_date: sheet.service_date,
            description: format!("{} {}", label, sheet.service_date.format("%Y-%m-%d")),
            duration: sheet.duration,
            hourly_rate: sheet.effective_rate(),
            amount: sheet.amount(),
            timesheet_id: Some(sheet.id),
        })
        .collect()
}

pub fn items_total(items: &[InvoiceItemDraft]) -> Decimal {
    round_money(items.iter().map(|item| item.amount).sum())
}

/// Every requested id must have come back from the database.
fn ensure_all_found(requested: &[TimesheetId], found: &[Timesheet]) -> Result<(), AppError> {
    let missing: Vec<String> = requested
        .iter()
        .filter(|id| !found.iter().any(|sheet| sheet.id == **id))
        .map(|id| id.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::NotFound(format!(
            "Timesheet(s) not found: {}",
            missing.join(", ")
        )))
    }
}

/// Drops already-invoiced timesheets and checks the rest belong to `client_id`.
fn billable_for_client(
    client_id: ClientId,
    timesheets: Vec<Timesheet>,
) -> Result<Vec<Timesheet>, AppError> {
    let billable: Vec<Timesheet> = timesheets.into_iter().filter(|t| !t.invoiced).collect();
    if billable.is_empty() {
        return Err(AppError::BusinessRule(
            "No uninvoiced timesheets to bill".into(),
        ));
    }
    if let Some(foreign) = billable.iter().find(|t| t.client_id != client_id) {
        return Err(AppError::BusinessRule(format!(
            "Timesheet {} does not belong to the selected client",
            foreign.id
        )));
    }
    Ok(billable)
}

#[derive(Clone)]
pub struct BillingService {
    pool: PgPool,
    invoices: InvoiceRepository,
    timesheets: TimesheetRepository,
    clients: ClientRepository,
    sellers: SellerRepository,
    numbering: NumberingService,
    seller_service: SellerService,
}

impl BillingService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            invoices: InvoiceRepository::new(),
            timesheets: TimesheetRepository::new(),
            clients: ClientRepository::new(),
            sellers: SellerRepository::new(),
            numbering: NumberingService::new(pool.clone()),
            seller_service: SellerService::new(pool.clone()),
            pool,
        }
    }

    async fn active_seller(&self, seller_id: SellerId) -> Result<Seller, AppError> {
        let seller = self.sellers.find_by_id(&self.pool, seller_id).await?;
        if !seller.active {
            return Err(AppError::BusinessRule(format!(
                "Seller {} is not active",
                seller.name
            )));
        }
        Ok(seller)
    }

    /// Creates one invoice in its own transaction and attaches its timesheets.
    pub async fn create_invoice(
        &self,
        client_id: ClientId,
        seller_id: SellerId,
        issue_date: NaiveDate,
        timesheet_ids: &[TimesheetId],
    ) -> Result<InvoiceDetail, AppError> {
        if timesheet_ids.is_empty() {
            return Err(AppError::Validation(vec![
                "timesheet_ids: at least one timesheet is required".into(),
            ]));
        }
        self.clients.find_by_id(&self.pool, client_id).await?;
        let seller = self.active_seller(seller_id).await?;

        let mut tx = begin_transaction(&self.pool).await?;
        let timesheets = self.timesheets.find_by_ids(&mut tx, timesheet_ids).await?;
        ensure_all_found(timesheet_ids, &timesheets)?;
        let billable = billable_for_client(client_id, timesheets)?;
        let items = build_items(&seller, &billable);
        let total = items_total(&items);

        let number = self
            .numbering
            .next_number(&mut tx, seller.id, issue_date)
            .await?;
        let invoice_id = self
            .invoices
            .insert(
                &mut tx,
                &NewInvoice {
                    invoice_number: number.invoice_number.clone(),
                    issue_date,
                    total_amount: total,
                    client_id,
                    seller_id: seller.id,
                    sequence_number: number.sequence_number,
                    period_year: number.period_year,
                    period_month: number.period_month,
                    numbering_scheme_id: number.scheme_id,
                },
            )
            .await?;
        self.invoices.insert_items(&mut tx, invoice_id, &items).await?;

        let ids: Vec<TimesheetId> = billable.iter().map(|t| t.id).collect();
        let claimed = self
            .timesheets
            .attach_to_invoice(&mut tx, &ids, invoice_id)
            .await?;
        if claimed != ids.len() as u64 {
            rollback_transaction(tx).await?;
            tracing::warn!(
                client_id = %client_id,
                expected = ids.len(),
                claimed,
                "Timesheets were invoiced concurrently"
            );
            return Err(AppError::Conflict(
                "One or more timesheets were invoiced concurrently".into(),
            ));
        }

        let invoice_items = self.invoices.find_items_tx(&mut tx, invoice_id).await?;
        commit_transaction(tx).await?;

        let invoice = self.invoices.find_by_id(&self.pool, invoice_id).await?;
        tracing::info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            client_id = %client_id,
            items = invoice_items.len(),
            total = %invoice.total_amount,
            "Invoice created"
        );
        Ok(InvoiceDetail {
            invoice,
            items: invoice_items,
        })
    }

    pub async fn create_from_request(
        &self,
        req: &CreateInvoiceRequest,
    ) -> Result<InvoiceDetail, AppError> {
        self.create_invoice(req.client_id, req.seller_id, req.issue_date, &req.timesheet_ids)
            .await
    }

    /// Same computation as `create_invoice`, nothing persisted.
    pub async fn build_invoice_preview(
        &self,
        req: &CreateInvoiceRequest,
    ) -> Result<InvoicePreview, AppError> {
        if req.timesheet_ids.is_empty() {
            return Err(AppError::Validation(vec![
                "timesheet_ids: at least one timesheet is required".into(),
            ]));
        }
        let client = self.clients.find_by_id(&self.pool, req.client_id).await?;
        let seller = self.active_seller(req.seller_id).await?;

        let mut conn = self.pool.acquire().await?;
        let timesheets = self
            .timesheets
            .find_by_ids(&mut conn, &req.timesheet_ids)
            .await?;
        ensure_all_found(&req.timesheet_ids, &timesheets)?;
        let billable = billable_for_client(client.id, timesheets)?;
        let items = build_items(&seller, &billable);
        let number = self
            .numbering
            .peek_number(&mut conn, seller.id, req.issue_date)
            .await?;

        Ok(InvoicePreview {
            invoice_number: number.invoice_number,
            issue_date: req.issue_date,
            client_id: client.id,
            client_name: client.name,
            seller_id: seller.id,
            total_amount: items_total(&items),
            items,
        })
    }

    /// Bills every client's unbilled timesheets for the month, issued on the
    /// month's last day. A missing seller fails the whole run. A failure for
    /// one client is returned alongside the invoices that did get created.
    pub async fn generate_monthly_invoices(
        &self,
        year: i32,
        month: u32,
    ) -> Result<MonthlyGeneration, AppError> {
        let (from, to) = month_bounds(year, month)
            .ok_or_else(|| AppError::Validation(vec!["month: must be between 1 and 12".into()]))?;
        let seller = self.seller_service.billing_seller().await?;

        let unbilled = self
            .timesheets
            .find_unbilled_between(&self.pool, from, to)
            .await?;

        let mut groups: Vec<(ClientId, String, Vec<TimesheetId>)> = Vec::new();
        for sheet in &unbilled {
            match groups.iter_mut().find(|(client_id, _, _)| *client_id == sheet.client_id) {
                Some((_, _, ids)) => ids.push(sheet.id),
                None => groups.push((sheet.client_id, sheet.client_name.clone(), vec![sheet.id])),
            }
        }

        tracing::info!(
            year,
            month,
            clients = groups.len(),
            timesheets = unbilled.len(),
            seller_id = %seller.id,
            "Generating monthly invoices"
        );

        let mut generation = MonthlyGeneration::default();
        for (client_id, client_name, ids) in groups {
            match self.create_invoice(client_id, seller.id, to, &ids).await {
                Ok(detail) => generation.created.push(detail.invoice),
                Err(error) => {
                    tracing::error!(
                        client_id = %client_id,
                        error = %error,
                        "Failed to create monthly invoice for client"
                    );
                    generation.failures.push(ClientBillingFailure {
                        client_id,
                        client_name,
                        error,
                    });
                }
            }
        }
        Ok(generation)
    }
}

/// Result of a monthly generation pass.
#[derive(Debug, Default)]
pub struct MonthlyGeneration {
    pub created: Vec<Invoice>,
    pub failures: Vec<ClientBillingFailure>,
}

#[derive(Debug)]
pub struct ClientBillingFailure {
    pub client_id: ClientId,
    pub client_name: String,
    pub error: AppError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SellerId;
    use chrono::Utc;
    use std::str::FromStr;

    fn seller(description: &str) -> Seller {
        let now = Utc::now();
        Seller {
            id: SellerId::new(),
            name: "Sparkle".into(),
            street: "1 Main St".into(),
            postcode: "BS1 1AA".into(),
            city: "Bristol".into(),
            service_description: description.into(),
            bank_name: None,
            account_number: None,
            sort_code: None,
            email: None,
            phone: None,
            company_registration_number: None,
            legal_form: None,
            vat_number: None,
            tax_id: None,
            active: true,
            is_system_default: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn sheet(client_id: ClientId, day: u32, hours: &str, rate: Option<&str>) -> Timesheet {
        let now = Utc::now();
        Timesheet {
            id: TimesheetId::new(),
            client_id,
            client_name: "Jane Doe".into(),
            service_date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            duration: Decimal::from_str(hours).unwrap(),
            hourly_rate: rate.map(|r| Decimal::from_str(r).unwrap()),
            client_hourly_rate: Decimal::from_str("15.00").unwrap(),
            invoiced: false,
            invoice_id: None,
            payment_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn items_use_snapshot_rate_and_label() {
        let client = ClientId::new();
        let sheets = vec![
            sheet(client, 5, "2.5", Some("17.50")),
            sheet(client, 12, "1.333", None),
        ];
        let items = build_items(&seller("Cleaning"), &sheets);

        assert_eq!(items[0].description, "Cleaning 2026-01-05");
        assert_eq!(items[0].amount, Decimal::from_str("43.75").unwrap());
        assert_eq!(items[1].hourly_rate, Decimal::from_str("15.00").unwrap());
        // 1.333 * 15 = 19.995 rounds half up
        assert_eq!(items[1].amount, Decimal::from_str("20.00").unwrap());
        assert_eq!(items[1].timesheet_id, Some(sheets[1].id));
        assert_eq!(items_total(&items), Decimal::from_str("63.75").unwrap());
    }

    #[test]
    fn blank_service_description_falls_back_to_service() {
        let client = ClientId::new();
        let items = build_items(&seller("  "), &[sheet(client, 3, "1", None)]);
        assert_eq!(items[0].description, "Service 2026-01-03");
    }

    #[test]
    fn invoiced_sheets_are_filtered_out() {
        let client = ClientId::new();
        let mut done = sheet(client, 1, "1", None);
        done.invoiced = true;
        let open = sheet(client, 2, "1", None);
        let billable = billable_for_client(client, vec![done, open.clone()]).unwrap();
        assert_eq!(billable.len(), 1);
        assert_eq!(billable[0].id, open.id);
    }

    #[test]
    fn nothing_left_to_bill_is_a_business_rule_error() {
        let client = ClientId::new();
        let mut done = sheet(client, 1, "1", None);
        done.invoiced = true;
        let err = billable_for_client(client, vec![done]).unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }

    #[test]
    fn unknown_timesheet_ids_are_not_found() {
        let client = ClientId::new();
        let known = sheet(client, 1, "1", None);
        let unknown = TimesheetId::new();
        let err = ensure_all_found(&[known.id, unknown], &[known.clone()]).unwrap_err();
        match err {
            AppError::NotFound(msg) => {
                assert!(msg.contains(&unknown.to_string()));
                assert!(!msg.contains(&known.id.to_string()));
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(ensure_all_found(&[known.id, known.id], &[known]).is_ok());
    }

    #[test]
    fn foreign_client_timesheets_are_rejected() {
        let client = ClientId::new();
        let other = sheet(ClientId::new(), 1, "1", None);
        let err = billable_for_client(client, vec![other]).unwrap_err();
        assert!(matches!(err, AppError::BusinessRule(_)));
    }
}
