use crate::error::CheckError;
use crate::record::InvoiceRecord;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use log::{debug, warn};
use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Column titles of the mandatory first row.
pub const HEADER: [&str; 5] = ["发票代码", "发票号码", "开票时间", "不含税金额", "校验码"];

/// Append-only CSV file of invoices that were already reimbursed.
///
/// Nothing is cached and no handle is kept open: every call opens the file,
/// does its work and closes it again. There is no locking, so only one
/// process should use a given ledger at a time.
#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Ledger { path: path.into() }
    }

    /// Creates a fresh ledger holding only the header row. Refuses to touch an existing file.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, CheckError> {
        let ledger = Ledger::new(path);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&ledger.path)
            .map_err(|source| ledger.create_error(source))?;

        let mut writer = WriterBuilder::new().from_writer(file);
        writer
            .write_record(HEADER)
            .map_err(|err| ledger.create_error(err.into()))?;
        writer.flush().map_err(|source| ledger.create_error(source))?;

        debug!("created ledger {}", ledger.path.display());
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Invoice numbers recorded under `invoice_code`, in file order.
    pub fn numbers_for_code(&self, invoice_code: &str) -> Result<Vec<String>, CheckError> {
        let mut numbers = Vec::new();
        for row in self.rows()? {
            let row = row.map_err(|source| self.unavailable(source))?;
            if row.get(0) == Some(invoice_code) {
                numbers.push(row[1].to_string());
            }
        }
        debug!(
            "{} number(s) recorded under code {} in {}",
            numbers.len(),
            invoice_code,
            self.path.display()
        );
        Ok(numbers)
    }

    /// Every well-formed row of the ledger, in file order.
    pub fn records(&self) -> Result<Vec<InvoiceRecord>, CheckError> {
        let mut records = Vec::new();
        for row in self.rows()? {
            let row = row.map_err(|source| self.unavailable(source))?;
            match row.deserialize::<InvoiceRecord>(None) {
                Ok(record) => records.push(record),
                Err(err) => warn!("skipping unreadable ledger row {:?}: {}", row, err),
            }
        }
        Ok(records)
    }

    /// Appends one record as a single line. The file must already exist.
    pub fn append(&self, record: &InvoiceRecord) -> Result<(), CheckError> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| self.append_error(source))?;
        terminate_last_line(&mut file).map_err(|source| self.append_error(source))?;

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer
            .serialize(record)
            .map_err(|err| self.append_error(err.into()))?;
        writer.flush().map_err(|source| self.append_error(source))?;

        debug!("appended {} to {}", record.to_line(), self.path.display());
        Ok(())
    }

    // Data rows that carry at least a code and a number; the header is skipped.
    fn rows(&self) -> Result<impl Iterator<Item = csv::Result<StringRecord>>, CheckError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
            .map_err(|source| self.unavailable(source))?;
        let header = reader
            .byte_headers()
            .map_err(|source| self.unavailable(source))?;
        if header.is_empty() {
            return Err(CheckError::MissingHeader {
                path: self.path.clone(),
            });
        }

        let path = self.path.clone();
        Ok(reader.into_records().filter(move |row| match row {
            Ok(row) if row.len() < 2 => {
                warn!("skipping short ledger row {:?} in {}", row, path.display());
                false
            }
            _ => true,
        }))
    }

    fn unavailable(&self, source: csv::Error) -> CheckError {
        CheckError::StoreUnavailable {
            path: self.path.clone(),
            source,
        }
    }

    fn append_error(&self, source: io::Error) -> CheckError {
        CheckError::Append {
            path: self.path.clone(),
            source,
        }
    }

    fn create_error(&self, source: io::Error) -> CheckError {
        CheckError::Create {
            path: self.path.clone(),
            source,
        }
    }
}

// A hand-written ledger may lack the final newline; the next record must not join that line.
fn terminate_last_line<F: Read + Seek + Write>(file: &mut F) -> io::Result<()> {
    if file.seek(SeekFrom::End(0))? == 0 {
        return Ok(());
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        file.write_all(b"\n")?;
    }
    Ok(())
}

/// Writes records as CSV, header row first.
pub fn write_records<T: Write>(records: &[InvoiceRecord], target: T) -> Result<(), CheckError> {
    let mut writer = WriterBuilder::new().from_writer(target);
    if records.is_empty() {
        writer.write_record(HEADER).map_err(io::Error::from)?;
    }
    for record in records {
        writer.serialize(record).map_err(io::Error::from)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
use std::fs;
#[cfg(test)]
use tempfile::TempDir;

#[cfg(test)]
fn ledger_with(tmp: &TempDir, body: &str) -> Ledger {
    let path = tmp.path().join("data.csv");
    fs::write(&path, format!("{}\n{}", HEADER.join(","), body)).expect("write ledger");
    Ledger::new(path)
}

#[test]
fn create_writes_header_only() {
    let tmp = TempDir::new().expect("tmp");
    let ledger = Ledger::create(tmp.path().join("data.csv")).expect("create");
    let contents = fs::read_to_string(ledger.path()).expect("read");
    assert_eq!(contents, "发票代码,发票号码,开票时间,不含税金额,校验码\n");
    assert!(ledger.records().expect("records").is_empty());
}

#[test]
fn create_refuses_existing_file() {
    let tmp = TempDir::new().expect("tmp");
    let ledger = ledger_with(&tmp, "A001,N001,20230101,100.00,ABC123\n");
    let err = Ledger::create(ledger.path()).unwrap_err();
    assert!(matches!(err, CheckError::Create { .. }));
    assert_eq!(ledger.records().expect("records").len(), 1);
}

#[test]
fn numbers_are_collected_in_file_order() {
    let tmp = TempDir::new().expect("tmp");
    let ledger = ledger_with(
        &tmp,
        "A001,N003,20230101,1.00,AAAAAA\n\
         B002,N001,20230101,2.00,BBBBBB\n\
         A001,N001,20230102,3.00,CCCCCC\n",
    );
    assert_eq!(ledger.numbers_for_code("A001").expect("query"), vec!["N003", "N001"]);
    assert_eq!(ledger.numbers_for_code("B002").expect("query"), vec!["N001"]);
    assert!(ledger.numbers_for_code("Z999").expect("query").is_empty());
}

#[test]
fn header_row_is_never_matched() {
    let tmp = TempDir::new().expect("tmp");
    let ledger = ledger_with(&tmp, "");
    assert!(ledger.numbers_for_code("发票代码").expect("query").is_empty());
}

#[test]
fn short_rows_are_skipped() {
    let tmp = TempDir::new().expect("tmp");
    let ledger = ledger_with(&tmp, "A001\nA001,N002,20230101,1.00,AAAAAA\n");
    assert_eq!(ledger.numbers_for_code("A001").expect("query"), vec!["N002"]);
}

#[test]
fn missing_file_is_unavailable() {
    let tmp = TempDir::new().expect("tmp");
    let ledger = Ledger::new(tmp.path().join("missing.csv"));
    let err = ledger.numbers_for_code("A001").unwrap_err();
    assert!(matches!(err, CheckError::StoreUnavailable { .. }));
}

#[test]
fn append_adds_one_line_and_never_creates() {
    let tmp = TempDir::new().expect("tmp");
    let ledger = ledger_with(&tmp, "");
    let record = InvoiceRecord::new("A001", "N002", "20230102", "200.00", "ABC456");
    ledger.append(&record).expect("append");

    let contents = fs::read_to_string(ledger.path()).expect("read");
    assert_eq!(
        contents,
        "发票代码,发票号码,开票时间,不含税金额,校验码\nA001,N002,20230102,200.00,ABC456\n"
    );
    assert_eq!(ledger.records().expect("records"), vec![record.clone()]);

    let missing = Ledger::new(tmp.path().join("missing.csv"));
    assert!(matches!(missing.append(&record), Err(CheckError::Append { .. })));
    assert!(!missing.path().exists());
}

#[test]
fn write_records_emits_header() {
    let mut output = Vec::new();
    write_records(&[], &mut output).expect("write");
    assert_eq!(output, "发票代码,发票号码,开票时间,不含税金额,校验码\n".as_bytes());

    let mut output = Vec::new();
    let record = InvoiceRecord::new("A001", "N001", "20230101", "100.00", "ABC123");
    write_records(&[record], &mut output).expect("write");
    assert_eq!(
        String::from_utf8(output).expect("utf8"),
        "发票代码,发票号码,开票时间,不含税金额,校验码\nA001,N001,20230101,100.00,ABC123\n"
    );
}

#[test]
fn zero_byte_ledger_has_no_header() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("data.csv");
    fs::write(&path, "").expect("write ledger");
    let ledger = Ledger::new(path);

    assert!(matches!(
        ledger.numbers_for_code("A001"),
        Err(CheckError::MissingHeader { .. })
    ));
    assert!(matches!(ledger.records(), Err(CheckError::MissingHeader { .. })));
}

#[test]
fn append_after_unterminated_header() {
    let tmp = TempDir::new().expect("tmp");
    let path = tmp.path().join("data.csv");
    fs::write(&path, HEADER.join(",")).expect("write ledger");
    let ledger = Ledger::new(path);
    let record = InvoiceRecord::new("A001", "N001", "20230101", "100.00", "ABC123");

    ledger.append(&record).expect("append");
    assert_eq!(
        fs::read_to_string(ledger.path()).expect("read"),
        "发票代码,发票号码,开票时间,不含税金额,校验码\nA001,N001,20230101,100.00,ABC123\n"
    );
    assert_eq!(ledger.numbers_for_code("A001").expect("query"), vec!["N001"]);
}
