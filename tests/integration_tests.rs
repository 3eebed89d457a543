use fapiao::{parse_payload, CheckError, Checker, InvoiceRecord, Ledger, Outcome, PayloadError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HEADER_LINE: &str = "发票代码,发票号码,开票时间,不含税金额,校验码\n";

fn seeded(dir: &Path, rows: &[&str]) -> Checker {
    let path = dir.join("data.csv");
    let mut contents = HEADER_LINE.to_string();
    for row in rows {
        contents.push_str(row);
        contents.push('\n');
    }
    fs::write(&path, contents).expect("seed ledger");
    Checker::new(Ledger::new(path))
}

fn ledger_text(checker: &Checker) -> String {
    fs::read_to_string(checker.ledger().path()).expect("read ledger")
}

#[test]
fn known_invoice_is_a_duplicate() {
    let tmp = TempDir::new().expect("tmp");
    let checker = seeded(tmp.path(), &["A001,N001,20230101,100.00,ABC123"]);
    let before = ledger_text(&checker);

    let outcome = checker
        .check("x,y,A001,N001,100.00,2023010112:00,XYZABC123")
        .expect("check");

    assert_eq!(
        outcome,
        Outcome::Duplicate(InvoiceRecord::new("A001", "N001", "20230101", "100.00", "ABC123"))
    );
    assert_eq!(ledger_text(&checker), before);
}

#[test]
fn new_number_under_known_code_is_accepted() {
    let tmp = TempDir::new().expect("tmp");
    let checker = seeded(tmp.path(), &["A001,N001,20230101,100.00,ABC123"]);

    let outcome = checker
        .check("x,y,A001,N002,200.00,2023010212:00,XYZABC456")
        .expect("check");

    assert_eq!(
        outcome,
        Outcome::Accepted(InvoiceRecord::new("A001", "N002", "20230102", "200.00", "ABC456"))
    );
    assert_eq!(
        ledger_text(&checker),
        format!("{HEADER_LINE}A001,N001,20230101,100.00,ABC123\nA001,N002,20230102,200.00,ABC456\n")
    );
}

#[test]
fn same_number_under_another_code_is_accepted() {
    let tmp = TempDir::new().expect("tmp");
    let checker = seeded(tmp.path(), &["A001,N001,20230101,100.00,ABC123"]);

    let outcome = checker
        .check("x,y,B002,N001,100.00,20230101,XYZABC123")
        .expect("check");

    assert!(matches!(outcome, Outcome::Accepted(_)));
    assert_eq!(checker.ledger().records().expect("records").len(), 2);
}

#[test]
fn repeated_scan_appends_exactly_once() {
    let tmp = TempDir::new().expect("tmp");
    let checker = seeded(tmp.path(), &[]);
    let payload = "01,10,044031900111,12345678,88.50,20240315,01234567890123456789,F1E2";

    assert!(matches!(checker.check(payload).expect("first"), Outcome::Accepted(_)));
    assert!(matches!(checker.check(payload).expect("second"), Outcome::Duplicate(_)));
    assert_eq!(
        ledger_text(&checker),
        format!("{HEADER_LINE}044031900111,12345678,20240315,88.50,456789\n")
    );
}

#[test]
fn malformed_scan_asks_for_retry() {
    let tmp = TempDir::new().expect("tmp");
    let checker = seeded(tmp.path(), &[]);

    let outcome = checker.check("01,10,A001,N001,100.00,20230101").expect("check");
    assert_eq!(
        outcome,
        Outcome::Retry(PayloadError::TooFewFields { expected: 7, found: 6 })
    );
    assert_eq!(ledger_text(&checker), HEADER_LINE);

    let err: CheckError = parse_payload("x,y").unwrap_err().into();
    assert!(matches!(err, CheckError::MalformedPayload(_)));
}

#[test]
fn exit_sentinel_never_touches_the_ledger() {
    let tmp = TempDir::new().expect("tmp");
    let checker = Checker::new(Ledger::new(tmp.path().join("never-created.csv")));

    assert_eq!(checker.check("n").expect("check"), Outcome::Terminate);
    assert!(!checker.ledger().path().exists());
}

#[test]
fn created_ledger_accepts_first_invoice() {
    let tmp = TempDir::new().expect("tmp");
    let ledger = Ledger::create(tmp.path().join("data.csv")).expect("create");
    let checker = Checker::new(ledger);

    assert!(matches!(
        checker.check("01,10,A001,N001,100.00,20230101,XYZABC123").expect("check"),
        Outcome::Accepted(_)
    ));
    assert_eq!(
        ledger_text(&checker),
        format!("{HEADER_LINE}A001,N001,20230101,100.00,ABC123\n")
    );
}
