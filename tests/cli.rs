use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const HEADER_LINE: &str = "发票代码,发票号码,开票时间,不含税金额,校验码\n";
const PAYLOAD: &str = "01,10,A001,N001,100.00,20230101,XYZABC123";

fn fapiao(ledger: &Path) -> Command {
    let mut cmd = Command::cargo_bin("fapiao-check").expect("binary");
    cmd.env("RUST_LOG", "error").arg("--ledger").arg(ledger);
    cmd
}

#[test]
fn check_accepts_then_flags_duplicate() {
    let tmp = TempDir::new().expect("tmp");
    let ledger = tmp.path().join("data.csv");
    fapiao(&ledger).arg("init").assert().success();

    fapiao(&ledger)
        .args(["check", PAYLOAD])
        .assert()
        .code(0)
        .stdout("accepted: A001,N001,20230101,100.00,ABC123\n");
    fapiao(&ledger)
        .args(["check", PAYLOAD])
        .assert()
        .code(2)
        .stdout("duplicate: A001,N001,20230101,100.00,ABC123\n");

    assert_eq!(
        fs::read_to_string(&ledger).expect("read"),
        format!("{HEADER_LINE}A001,N001,20230101,100.00,ABC123\n")
    );
}

#[test]
fn check_rejects_malformed_payload() {
    let tmp = TempDir::new().expect("tmp");
    let ledger = tmp.path().join("data.csv");
    fapiao(&ledger).arg("init").assert().success();

    fapiao(&ledger)
        .args(["check", "x,y,A001,N001"])
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("malformed payload"));
    assert_eq!(fs::read_to_string(&ledger).expect("read"), HEADER_LINE);
}

#[test]
fn check_fails_on_headerless_ledger() {
    let tmp = TempDir::new().expect("tmp");
    let ledger = tmp.path().join("data.csv");
    fs::write(&ledger, "").expect("write ledger");

    fapiao(&ledger)
        .args(["check", PAYLOAD])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no header row"));
    assert_eq!(fs::read_to_string(&ledger).expect("read"), "");
}

#[test]
fn init_refuses_existing_ledger() {
    let tmp = TempDir::new().expect("tmp");
    let ledger = tmp.path().join("data.csv");
    let contents = format!("{HEADER_LINE}A001,N001,20230101,100.00,ABC123\n");
    fs::write(&ledger, &contents).expect("write ledger");

    fapiao(&ledger)
        .arg("init")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to create ledger"));
    assert_eq!(fs::read_to_string(&ledger).expect("read"), contents);
}

#[test]
fn list_prints_header_and_rows() {
    let tmp = TempDir::new().expect("tmp");
    let ledger = tmp.path().join("data.csv");
    let contents = format!(
        "{HEADER_LINE}A001,N001,20230101,100.00,ABC123\nB002,N009,20230205,7.50,DEF456\n"
    );
    fs::write(&ledger, &contents).expect("write ledger");

    fapiao(&ledger).arg("list").assert().success().stdout(contents);
}

#[test]
fn list_of_fresh_ledger_is_header_only() {
    let tmp = TempDir::new().expect("tmp");
    let ledger = tmp.path().join("data.csv");
    fapiao(&ledger).arg("init").assert().success();

    fapiao(&ledger).arg("list").assert().success().stdout(HEADER_LINE);
}
