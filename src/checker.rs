use crate::error::{CheckError, PayloadError};
use crate::ledger::Ledger;
use crate::record::{parse_payload, InvoiceRecord};
use log::{debug, info, warn};

/// Typed in place of a scan to stop checking.
pub const EXIT_SENTINEL: &str = "n";

/// What a single check decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The exit sentinel was given; the ledger was not touched.
    Terminate,
    /// The payload could not be parsed; scan again.
    Retry(PayloadError),
    /// The invoice is already in the ledger.
    Duplicate(InvoiceRecord),
    /// The invoice was new and has been appended.
    Accepted(InvoiceRecord),
}

pub struct Checker {
    ledger: Ledger,
}

impl Checker {
    pub fn new(ledger: Ledger) -> Self {
        Checker { ledger }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Parses `payload`, looks its key up in the ledger and appends it when new.
    ///
    /// Nothing is remembered between calls; the ledger is re-read every time.
    pub fn check(&self, payload: &str) -> Result<Outcome, CheckError> {
        if payload == EXIT_SENTINEL {
            return Ok(Outcome::Terminate);
        }

        let record = match parse_payload(payload) {
            Ok(record) => record,
            Err(err) => {
                debug!("rejected payload {:?}: {}", payload, err);
                return Ok(Outcome::Retry(err));
            }
        };

        let numbers = self.ledger.numbers_for_code(&record.invoice_code)?;
        if numbers.iter().any(|number| *number == record.invoice_number) {
            warn!(
                "duplicate invoice {}/{}",
                record.invoice_code, record.invoice_number
            );
            return Ok(Outcome::Duplicate(record));
        }

        self.ledger.append(&record)?;
        info!(
            "recorded invoice {}/{}",
            record.invoice_code, record.invoice_number
        );
        Ok(Outcome::Accepted(record))
    }
}

#[cfg(test)]
use std::fs;
#[cfg(test)]
use tempfile::TempDir;

#[cfg(test)]
fn checker(tmp: &TempDir) -> Checker {
    let ledger = Ledger::create(tmp.path().join("data.csv")).expect("create");
    Checker::new(ledger)
}

#[test]
fn sentinel_terminates_without_a_ledger() {
    let tmp = TempDir::new().expect("tmp");
    let checker = Checker::new(Ledger::new(tmp.path().join("missing.csv")));
    assert_eq!(checker.check("n").expect("check"), Outcome::Terminate);
    assert!(!checker.ledger().path().exists());
}

#[test]
fn sentinel_must_match_exactly() {
    let tmp = TempDir::new().expect("tmp");
    let checker = checker(&tmp);
    assert!(matches!(
        checker.check("N").expect("check"),
        Outcome::Retry(PayloadError::TooFewFields { .. })
    ));
}

#[test]
fn malformed_payload_leaves_ledger_alone() {
    let tmp = TempDir::new().expect("tmp");
    let checker = checker(&tmp);
    let before = fs::read(checker.ledger().path()).expect("read");

    let outcome = checker.check("x,y,A001,N001").expect("check");
    assert_eq!(
        outcome,
        Outcome::Retry(PayloadError::TooFewFields { expected: 7, found: 4 })
    );
    assert_eq!(fs::read(checker.ledger().path()).expect("read"), before);
}

#[test]
fn accepted_then_duplicate() {
    let tmp = TempDir::new().expect("tmp");
    let checker = checker(&tmp);
    let payload = "01,10,A001,N001,100.00,20230101,XYZABC123";
    let record = InvoiceRecord::new("A001", "N001", "20230101", "100.00", "ABC123");

    assert_eq!(checker.check(payload).expect("first"), Outcome::Accepted(record.clone()));
    assert_eq!(checker.check(payload).expect("second"), Outcome::Duplicate(record.clone()));
    assert_eq!(checker.ledger().records().expect("records"), vec![record]);
}

#[test]
fn missing_ledger_is_fatal() {
    let tmp = TempDir::new().expect("tmp");
    let checker = Checker::new(Ledger::new(tmp.path().join("missing.csv")));
    let err = checker
        .check("01,10,A001,N001,100.00,20230101,XYZABC123")
        .unwrap_err();
    assert!(matches!(err, CheckError::StoreUnavailable { .. }));
}

#[test]
fn headerless_ledger_never_accepts() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("data.csv");
    fs::write(&path, "").expect("write ledger");
    let checker = Checker::new(Ledger::new(path));
    let payload = "x,y,A001,N001,100.00,20230101,XYZABC123";

    for _ in 0..2 {
        assert!(matches!(
            checker.check(payload),
            Err(CheckError::MissingHeader { .. })
        ));
    }
    assert!(fs::read(checker.ledger().path()).expect("read").is_empty());
}
