//! Duplicate detection for scanned electronic invoices (fapiao).
//!
//! A scanner delivers the comma-separated text of an invoice QR code. The
//! [`Checker`] extracts the invoice code, number, issue date, pre-tax amount
//! and check code, and looks the `(code, number)` pair up in a CSV
//! [`Ledger`] of invoices that were already reimbursed. New invoices are
//! appended; known ones are reported as duplicates and left alone.

mod checker;
mod error;
mod ledger;
mod record;
mod session;

pub use checker::{Checker, Outcome, EXIT_SENTINEL};
pub use error::{CheckError, PayloadError};
pub use ledger::{write_records, Ledger, HEADER};
pub use record::{parse_payload, InvoiceRecord};
pub use session::{Session, SessionSummary};
