//! SQL access, one module per aggregate.

pub mod client;
pub mod common;
pub mod email_tracking;
pub mod invoice;
pub mod numbering;
pub mod password_reset;
pub mod repository;
pub mod seller;
pub mod timesheet;
pub mod transaction;
pub mod user;

pub use client::ClientRepository;
pub use email_tracking::EmailTrackingRepository;
pub use invoice::InvoiceRepository;
pub use numbering::NumberingRepository;
pub use repository::Repository;
pub use seller::SellerRepository;
pub use timesheet::TimesheetRepository;
pub use transaction::*;
pub use user::UserRepository;
