use std::sync::Arc;

use crate::{
    config::Config,
    db::connection::DbPool,
    services::{
        admin_notification::AdminNotificationService,
        auth::AuthService,
        billing::BillingService,
        client::ClientService,
        document::InvoiceDocumentService,
        email_tracking::EmailTrackingService,
        invoice::InvoiceService,
        invoicing_job::MonthlyInvoicingJob,
        numbering::NumberingService,
        password_reset::{PasswordResetService, ResetRateLimiter},
        seller::SellerService,
        storage::DocumentStorage,
        timesheet::TimesheetService,
        tracking_notifier::TrackingNotifier,
        user::UserService,
    },
    utils::email::Mailer,
};

/// Shared handler state. Everything in here is cheap to clone; services are
/// built per request from the pool and config.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Config,
    pub mailer: Arc<dyn Mailer>,
    pub notifier: TrackingNotifier,
    pub reset_limiter: Arc<ResetRateLimiter>,
    pub storage: DocumentStorage,
}

impl AppState {
    pub fn new(pool: DbPool, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        let notifier = TrackingNotifier::new(&config.tracking);
        let reset_limiter = Arc::new(ResetRateLimiter::new(&config.password_reset));
        let storage = DocumentStorage::new(config.storage_dir.clone());
        Self {
            pool,
            config,
            mailer,
            notifier,
            reset_limiter,
            storage,
        }
    }

    pub fn clients(&self) -> ClientService {
        ClientService::new(self.pool.clone())
    }

    pub fn sellers(&self) -> SellerService {
        SellerService::new(self.pool.clone())
    }

    pub fn timesheets(&self) -> TimesheetService {
        TimesheetService::new(self.pool.clone(), self.config.app_timezone)
    }

    pub fn invoices(&self) -> InvoiceService {
        InvoiceService::new(self.pool.clone(), self.storage.clone())
    }

    pub fn billing(&self) -> BillingService {
        BillingService::new(self.pool.clone())
    }

    pub fn numbering(&self) -> NumberingService {
        NumberingService::new(self.pool.clone())
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.pool.clone())
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(self.pool.clone(), &self.config)
    }

    pub fn password_reset(&self) -> PasswordResetService {
        PasswordResetService::new(
            self.pool.clone(),
            &self.config,
            self.mailer.clone(),
            self.reset_limiter.clone(),
        )
    }

    pub fn tracking(&self) -> EmailTrackingService {
        EmailTrackingService::new(self.pool.clone(), &self.config.tracking)
    }

    pub fn documents(&self) -> InvoiceDocumentService {
        InvoiceDocumentService::new(
            self.pool.clone(),
            &self.config,
            self.storage.clone(),
            self.mailer.clone(),
        )
    }

    pub fn notifications(&self) -> AdminNotificationService {
        AdminNotificationService::new(
            self.mailer.clone(),
            self.config.invoicing.admin_email.clone(),
            self.config.tracking.notification_email.clone(),
        )
    }

    pub fn invoicing_job(&self) -> MonthlyInvoicingJob {
        MonthlyInvoicingJob::new(
            self.pool.clone(),
            self.documents(),
            self.notifications(),
            self.config.invoicing.clone(),
            self.config.app_timezone,
        )
    }
}
