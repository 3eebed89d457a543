use crate::error::PayloadError;
use serde::{Deserialize, Serialize};

/// Payload positions, 0-indexed. Positions 0 and 1 and anything past 6 are ignored.
const CODE_FIELD: usize = 2;
const NUMBER_FIELD: usize = 3;
const AMOUNT_FIELD: usize = 4;
const DATE_FIELD: usize = 5;
const CHECK_CODE_FIELD: usize = 6;
const MIN_FIELDS: usize = CHECK_CODE_FIELD + 1;

/// The date token carries a time suffix; only the leading `YYYYMMDD` is kept.
const DATE_WIDTH: usize = 8;
/// Only the trailing six characters of the verification token are kept.
const CHECK_CODE_WIDTH: usize = 6;

/// One invoice as recorded in the ledger.
///
/// The serde names double as the ledger's column titles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    #[serde(rename = "发票代码")]
    pub invoice_code: String,
    #[serde(rename = "发票号码")]
    pub invoice_number: String,
    #[serde(rename = "开票时间")]
    pub issue_date: String,
    #[serde(rename = "不含税金额")]
    pub amount_excl_tax: String,
    #[serde(rename = "校验码")]
    pub check_code: String,
}

impl InvoiceRecord {
    pub fn new(
        invoice_code: &str,
        invoice_number: &str,
        issue_date: &str,
        amount_excl_tax: &str,
        check_code: &str,
    ) -> Self {
        InvoiceRecord {
            invoice_code: invoice_code.to_string(),
            invoice_number: invoice_number.to_string(),
            issue_date: issue_date.to_string(),
            amount_excl_tax: amount_excl_tax.to_string(),
            check_code: check_code.to_string(),
        }
    }

    /// `(invoice_code, invoice_number)`, the only fields that decide duplicates.
    pub fn key(&self) -> (&str, &str) {
        (&self.invoice_code, &self.invoice_number)
    }

    /// The five fields joined by commas, in ledger column order.
    pub fn to_line(&self) -> String {
        [
            self.invoice_code.as_str(),
            self.invoice_number.as_str(),
            self.issue_date.as_str(),
            self.amount_excl_tax.as_str(),
            self.check_code.as_str(),
        ]
        .join(",")
    }
}

/// Parses the comma-separated text of a scanned invoice QR code.
pub fn parse_payload(payload: &str) -> Result<InvoiceRecord, PayloadError> {
    let fields: Vec<&str> = payload.split(',').collect();
    if fields.len() < MIN_FIELDS {
        return Err(PayloadError::TooFewFields {
            expected: MIN_FIELDS,
            found: fields.len(),
        });
    }

    let issue_date = head(fields[DATE_FIELD], DATE_WIDTH);
    if issue_date.is_empty() {
        return Err(PayloadError::EmptyField {
            field: "issue_date",
        });
    }
    let check_code = tail(fields[CHECK_CODE_FIELD], CHECK_CODE_WIDTH);
    if check_code.is_empty() {
        return Err(PayloadError::EmptyField {
            field: "check_code",
        });
    }

    Ok(InvoiceRecord::new(
        fields[CODE_FIELD],
        fields[NUMBER_FIELD],
        issue_date,
        fields[AMOUNT_FIELD],
        check_code,
    ))
}

// Both slice on char boundaries; a short token comes back whole.
fn head(token: &str, width: usize) -> &str {
    match token.char_indices().nth(width) {
        Some((end, _)) => &token[..end],
        None => token,
    }
}

fn tail(token: &str, width: usize) -> &str {
    match width.checked_sub(1).and_then(|n| token.char_indices().rev().nth(n)) {
        Some((start, _)) => &token[start..],
        None => token,
    }
}

#[test]
fn extracts_fields_by_position() {
    let record = parse_payload("01,10,A001,N001,100.00,2023010112:00,XYZABC123").unwrap();
    assert_eq!(record, InvoiceRecord::new("A001", "N001", "20230101", "100.00", "ABC123"));
    assert_eq!(record.key(), ("A001", "N001"));
}

#[test]
fn ignores_trailing_fields() {
    let record = parse_payload("x,y,A001,N001,100.00,20230101,ABC123,extra,,more").unwrap();
    assert_eq!(record.to_line(), "A001,N001,20230101,100.00,ABC123");
}

#[test]
fn too_few_fields() {
    assert_eq!(
        parse_payload("x,y,A001,N001,100.00,20230101"),
        Err(PayloadError::TooFewFields { expected: 7, found: 6 })
    );
    assert_eq!(
        parse_payload(""),
        Err(PayloadError::TooFewFields { expected: 7, found: 1 })
    );
}

#[test]
fn short_tokens_are_kept_whole() {
    let record = parse_payload("x,y,A001,N001,9.9,2023,AB").unwrap();
    assert_eq!(record.issue_date, "2023");
    assert_eq!(record.check_code, "AB");
}

#[test]
fn empty_slices_are_malformed() {
    assert_eq!(
        parse_payload("x,y,A001,N001,100.00,,ABC123"),
        Err(PayloadError::EmptyField { field: "issue_date" })
    );
    assert_eq!(
        parse_payload("x,y,A001,N001,100.00,20230101,"),
        Err(PayloadError::EmptyField { field: "check_code" })
    );
}

#[test]
fn slices_by_character() {
    assert_eq!(head("二〇二三年一月一日十二时", 8), "二〇二三年一月一");
    assert_eq!(tail("校验码一二三四五六", 6), "一二三四五六");
    assert_eq!(tail("abc", 0), "abc");
}
