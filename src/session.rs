use crate::checker::{Checker, Outcome, EXIT_SENTINEL};
use crate::error::CheckError;
use crate::record::InvoiceRecord;
use log::info;
use std::io::{BufRead, Write};

const BANNER: &str = "\
*******************************
*  E-invoice duplicate check  *
*******************************
";
const RULE: &str = "------------------------------------";

/// Counts reported when a session ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// Operator loop: read a scan, check it, report, ask whether to go on.
///
/// All console text goes through `output`; the checker itself never prints.
pub struct Session<'a, R, W> {
    checker: &'a Checker,
    input: R,
    output: W,
}

impl<'a, R: BufRead, W: Write> Session<'a, R, W> {
    pub fn new(checker: &'a Checker, input: R, output: W) -> Self {
        Session {
            checker,
            input,
            output,
        }
    }

    pub fn run(mut self) -> Result<SessionSummary, CheckError> {
        let mut summary = SessionSummary::default();
        writeln!(self.output, "{}", BANNER)?;

        loop {
            writeln!(
                self.output,
                "Scan the e-invoice QR code, or enter {} to quit...",
                EXIT_SENTINEL
            )?;
            self.output.flush()?;

            // end of input counts as the exit sentinel
            let line = match self.read_line()? {
                Some(line) => line,
                None => break,
            };

            match self.checker.check(&line)? {
                Outcome::Terminate => break,
                Outcome::Retry(err) => {
                    summary.rejected += 1;
                    writeln!(
                        self.output,
                        "Invalid invoice QR code ({}), please scan again.\n",
                        err
                    )?;
                    continue;
                }
                Outcome::Duplicate(record) => {
                    summary.duplicates += 1;
                    self.show(&record)?;
                    writeln!(self.output, "************* WARNING *************")?;
                    writeln!(self.output, "This invoice has already been reimbursed!")?;
                    writeln!(self.output, "Do not reimburse it again.")?;
                    writeln!(self.output, "***********************************\n")?;
                }
                Outcome::Accepted(record) => {
                    summary.accepted += 1;
                    self.show(&record)?;
                    writeln!(self.output, "------- Invoice OK, saved. -------\n")?;
                }
            }

            if !self.ask_continue()? {
                break;
            }
            writeln!(self.output, "{}\n", RULE)?;
        }

        self.output.flush()?;
        info!(
            "session ended: {} accepted, {} duplicate(s), {} rejected scan(s)",
            summary.accepted, summary.duplicates, summary.rejected
        );
        Ok(summary)
    }

    fn show(&mut self, record: &InvoiceRecord) -> Result<(), CheckError> {
        writeln!(self.output, "QR code read successfully.\n")?;
        writeln!(self.output, "Invoice code: {}", record.invoice_code)?;
        writeln!(self.output, "Invoice number: {}", record.invoice_number)?;
        writeln!(self.output, "Issue date: {}", record.issue_date)?;
        writeln!(self.output, "Amount excl. tax: {}", record.amount_excl_tax)?;
        writeln!(self.output, "Check code (last 6): {}\n", record.check_code)?;
        Ok(())
    }

    fn ask_continue(&mut self) -> Result<bool, CheckError> {
        loop {
            write!(self.output, "Continue checking invoices? (y/n) ")?;
            self.output.flush()?;
            match self.read_line()?.as_deref() {
                Some("y") => return Ok(true),
                Some("n") | None => return Ok(false),
                Some(_) => writeln!(self.output, "Invalid input, please try again.\n")?,
            }
        }
    }

    fn read_line(&mut self) -> Result<Option<String>, CheckError> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(&['\n', '\r'][..]).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }
}

#[cfg(test)]
use crate::ledger::Ledger;
#[cfg(test)]
use std::io::Cursor;
#[cfg(test)]
use tempfile::TempDir;

#[cfg(test)]
fn run_session(checker: &Checker, input: &str) -> (SessionSummary, String) {
    let mut output = Vec::new();
    let summary = Session::new(checker, Cursor::new(input), &mut output)
        .run()
        .expect("session");
    (summary, String::from_utf8(output).expect("utf8"))
}

#[test]
fn rescans_after_malformed_payload() {
    let tmp = TempDir::new().expect("tmp");
    let checker = Checker::new(Ledger::create(tmp.path().join("data.csv")).expect("create"));

    let (summary, output) = run_session(
        &checker,
        "garbage\r\n01,10,A001,N001,100.00,20230101,XYZABC123\r\nn\r\n",
    );
    assert_eq!(
        summary,
        SessionSummary {
            accepted: 1,
            duplicates: 0,
            rejected: 1
        }
    );
    assert!(output.contains("please scan again"));
    assert!(output.contains("Invoice number: N001"));
    assert!(output.contains("Invoice OK, saved."));
    assert_eq!(checker.ledger().records().expect("records").len(), 1);
}

#[test]
fn continue_prompt_repeats_until_answered() {
    let tmp = TempDir::new().expect("tmp");
    let checker = Checker::new(Ledger::create(tmp.path().join("data.csv")).expect("create"));
    let payload = "01,10,A001,N001,100.00,20230101,XYZABC123";

    let (summary, output) = run_session(&checker, &format!("{payload}\nmaybe\ny\n{payload}\nn\n"));
    assert_eq!(summary.accepted, 1);
    assert_eq!(summary.duplicates, 1);
    assert!(output.contains("Invalid input, please try again."));
    assert!(output.contains("already been reimbursed"));
}

#[test]
fn sentinel_and_end_of_input_stop_quietly() {
    let tmp = TempDir::new().expect("tmp");
    let checker = Checker::new(Ledger::new(tmp.path().join("missing.csv")));

    let (summary, _) = run_session(&checker, "n\n");
    assert_eq!(summary, SessionSummary::default());
    let (summary, _) = run_session(&checker, "");
    assert_eq!(summary, SessionSummary::default());
}

#[test]
fn missing_ledger_ends_the_session_with_an_error() {
    let tmp = TempDir::new().expect("tmp");
    let checker = Checker::new(Ledger::new(tmp.path().join("missing.csv")));
    let result = Session::new(
        &checker,
        Cursor::new("01,10,A001,N001,100.00,20230101,XYZABC123\n"),
        Vec::new(),
    )
    .run();
    assert!(matches!(result, Err(CheckError::StoreUnavailable { .. })));
}
