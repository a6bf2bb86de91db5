//! Business logic. Handlers and the scheduler call into these; none of them
//! know about HTTP beyond `AppError`.

pub mod admin_notification;
pub mod auth;
pub mod billing;
pub mod client;
pub mod document;
pub mod email_tracking;
pub mod invoice;
pub mod invoicing_job;
pub mod numbering;
pub mod password_reset;
pub mod pdf;
pub mod scheduler;
pub mod seller;
pub mod storage;
pub mod timesheet;
pub mod tracking_notifier;
pub mod user;
