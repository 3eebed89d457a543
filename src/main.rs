use clap::{Parser, Subcommand};
use log::error;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use fapiao::{write_records, CheckError, Checker, Ledger, Outcome, Session};

/// Flags electronic invoices that were already reimbursed
#[derive(Parser)]
#[command(name = "fapiao-check")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Ledger of reimbursed invoices
    #[arg(short, long, default_value = "data.csv")]
    ledger: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create an empty ledger holding only the header row
    Init,

    /// Check one payload and exit with status 2 if it is a duplicate
    Check {
        /// Raw text of the invoice QR code
        payload: String,
    },

    /// Print every recorded invoice as CSV
    List,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CheckError> {
    match cli.command {
        None => {
            let checker = Checker::new(Ledger::new(cli.ledger));
            Session::new(&checker, io::stdin().lock(), io::stdout()).run()?;
        }
        Some(Command::Init) => {
            let ledger = Ledger::create(cli.ledger)?;
            println!("created {}", ledger.path().display());
        }
        Some(Command::Check { payload }) => {
            let checker = Checker::new(Ledger::new(cli.ledger));
            match checker.check(&payload)? {
                Outcome::Terminate => {}
                Outcome::Retry(err) => return Err(err.into()),
                Outcome::Duplicate(record) => {
                    println!("duplicate: {}", record.to_line());
                    return Ok(ExitCode::from(2));
                }
                Outcome::Accepted(record) => println!("accepted: {}", record.to_line()),
            }
        }
        Some(Command::List) => {
            let records = Ledger::new(cli.ledger).records()?;
            write_records(&records, io::stdout())?;
        }
    }
    Ok(ExitCode::SUCCESS)
}
