use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

const SAMPLE: &str = r#"{
  "Transactions": [
    {"TransactionID": "TX-100", "FullName": "Marie Tremblay", "TransactionType": "EFT Funding",
     "TransactionStatus": "completed", "CreditAmount": "144,00",
     "TransactionDateTime": "2024-12-13T10:05:46", "LastModified": "2024-12-13T11:00:00",
     "ClientReferenceNumber": "100234"},
    {"TransactionID": "TX-200", "FullName": "Élodie Gagné", "TransactionType": "EFT Funding",
     "TransactionStatus": "failed", "CreditAmount": 1234.56,
     "TransactionDateTime": "2024-12-13T09:00:00", "LastModified": "2024-12-16T08:00:00",
     "ClientAccountID": "778899", "TransactionErrorCode": "R01",
     "TransactionFailureReason": "Fonds insuffisants"},
    {"TransactionID": "TX-300", "AccountName": "Compte Roy", "TransactionType": "EFT Funding",
     "TransactionStatus": "cancelled", "CreditAmount": "50",
     "TransactionDateTime": "2024-12-12T09:00:00", "LastModified": "2024-12-12T10:00:00"},
    {"TransactionID": "TX-900", "TransactionType": "Wire", "TransactionStatus": "completed"}
  ]
}"#;

struct Env {
    home: tempfile::TempDir,
}

impl Env {
    fn new() -> Self {
        let env = Self {
            home: tempfile::tempdir().unwrap(),
        };
        env.cmd()
            .args(["init", "--data-dir"])
            .arg(env.data_dir())
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized"));
        env
    }

    fn data_dir(&self) -> PathBuf {
        self.home.path().join("data")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("txdesk").unwrap();
        cmd.env("HOME", self.home.path())
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG");
        cmd
    }

    fn import_sample(&self) {
        let file = self.home.path().join("sample.json");
        std::fs::write(&file, SAMPLE).unwrap();
        self.cmd()
            .arg("import")
            .arg(&file)
            .assert()
            .success()
            .stdout(predicate::str::contains("3 inserted, 0 updated, 1 skipped"));
    }

    /// Merge `fields` into the settings file written by `init`.
    fn set_settings(&self, fields: serde_json::Value) {
        let path = self.home.path().join(".config/txdesk/settings.json");
        let mut settings: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        for (key, value) in fields.as_object().unwrap() {
            settings[key.as_str()] = value.clone();
        }
        std::fs::write(&path, settings.to_string()).unwrap();
    }

    /// Import the sample and debit TX-200 so it waits in the NSF queue.
    fn nsf_ready(&self) {
        self.import_sample();
        self.cmd()
            .args(["process", "prelevements", "TX-200"])
            .assert()
            .success();
    }

    fn batch_nsf(&self) -> assert_cmd::assert::Assert {
        self.cmd()
            .args(["batch", "nsf", "--all", "--format", "text"])
            .assert()
    }
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                out.extend(files_in(&path));
            } else {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

#[test]
fn commands_without_database_fail_cleanly() {
    let home = tempfile::tempdir().unwrap();
    Command::cargo_bin("txdesk")
        .unwrap()
        .env("HOME", home.path())
        .args(["queue", "nsf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:").and(predicate::str::contains("txdesk init")));
}

#[test]
fn import_and_list_queues() {
    let env = Env::new();
    env.import_sample();

    env.cmd()
        .args(["queue", "prelevements"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TX-100").and(predicate::str::contains("TX-200")))
        .stdout(predicate::str::contains("TX-300").not());

    env.cmd()
        .args(["queue", "exceptions"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TX-300"));

    env.cmd()
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("Transactions:").and(predicate::str::contains("3")));
}

#[test]
fn unknown_queue_is_rejected() {
    let env = Env::new();
    env.cmd().args(["queue", "bogus"]).assert().failure();
}

#[test]
fn nsf_requires_debit_first() {
    let env = Env::new();
    env.import_sample();

    env.cmd()
        .args(["process", "nsf", "TX-200"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not in the NSF queue"));

    env.cmd()
        .args(["process", "prelevements", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 2"));

    env.cmd()
        .args(["queue", "nsf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TX-200"));
}

#[test]
fn nsf_batch_archives_locked_file_and_prints() {
    let env = Env::new();
    env.import_sample();
    env.cmd()
        .args(["process", "prelevements", "TX-200"])
        .assert()
        .success();

    env.cmd()
        .args(["batch", "nsf", "--all", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("NSF file archived to"));

    let archived: Vec<PathBuf> = files_in(&env.data_dir().join("archive"));
    assert_eq!(archived.len(), 1);
    let bytes = std::fs::read(&archived[0]).unwrap();
    assert!(bytes.starts_with(b"\"TX-200\",,\""));
    assert!(bytes.ends_with(b",\"\"\r\n"));
    assert!(bytes.contains(&0xC9)); // É in cp1252

    let reports = files_in(&env.data_dir().join("reports"));
    assert_eq!(reports.len(), 1);
    let text = std::fs::read_to_string(&reports[0]).unwrap();
    assert!(text.contains("Rapport de Transactions"));
    assert!(text.contains("Référence : 16/12/2024"));
    assert!(text.contains("778899"));

    env.cmd()
        .args(["queue", "nsf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no transactions"));

    let reprints = env.home.path().join("reprints");
    env.cmd()
        .args(["reprint", "--format", "text", "--output-dir"])
        .arg(&reprints)
        .assert()
        .success()
        .stdout(predicate::str::contains("Reprinted batch #1"));
    let again = files_in(&reprints);
    assert_eq!(again.len(), 1);
    assert_eq!(std::fs::read_to_string(&again[0]).unwrap(), text);
}

#[test]
fn export_nsf_summary() {
    let env = Env::new();
    env.import_sample();
    env.cmd()
        .args(["process", "prelevements", "TX-200"])
        .assert()
        .success();

    let out = env.home.path().join("summary.csv");
    env.cmd()
        .args(["export", "nsf", "--all", "--summary", "--output"])
        .arg(&out)
        .assert()
        .success();

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("Client,Nom,Montant,DateNSF,TransmisLe,Code,Raison,TransactionID\r\n"));
    assert!(text.contains("\"778899\",\"Élodie Gagné\",\"1234,56\",\"16-12-2024\",\"13-12-2024\""));
}

#[test]
fn verifying_exceptions_clears_the_queue() {
    let env = Env::new();
    env.import_sample();
    env.cmd()
        .args(["process", "exceptions", "--all"])
        .assert()
        .success();
    env.cmd()
        .args(["queue", "exceptions"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no transactions"));
}

#[test]
fn reprint_without_history_fails() {
    let env = Env::new();
    env.cmd()
        .arg("reprint")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing has been printed yet"));
}

#[test]
fn backup_writes_copy() {
    let env = Env::new();
    let out = env.home.path().join("copy.db");
    env.cmd()
        .args(["backup", "--output"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup saved"));
    assert!(out.exists());
}

#[test]
fn missing_post_nsf_program_only_warns() {
    let env = Env::new();
    env.nsf_ready();
    env.set_settings(serde_json::json!({"post_nsf_command": "/nonexistent/credit-feed --nsf"}));

    env.batch_nsf()
        .success()
        .stderr(predicate::str::contains("Warning: could not start /nonexistent/credit-feed"))
        .stdout(predicate::str::contains("NSF file archived to"));
    assert_eq!(files_in(&env.data_dir().join("archive")).len(), 1);
    assert_eq!(files_in(&env.data_dir().join("reports")).len(), 1);
}

#[test]
fn post_nsf_command_receives_arguments() {
    let env = Env::new();
    env.nsf_ready();
    let marker = env.home.path().join("hook-ran");
    env.set_settings(serde_json::json!({
        "post_nsf_command": format!("touch {}", marker.display())
    }));

    env.batch_nsf().success();
    for _ in 0..100 {
        if marker.exists() {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }
    assert!(marker.exists());
}

#[test]
fn nsf_export_failure_keeps_saved_state_and_prints() {
    let env = Env::new();
    env.nsf_ready();
    let blocker = env.home.path().join("not-a-dir");
    std::fs::write(&blocker, b"").unwrap();
    env.set_settings(serde_json::json!({"nsf_output_dir": blocker.to_string_lossy()}));

    env.batch_nsf()
        .success()
        .stderr(predicate::str::contains("NSF export/archive failed"));

    env.cmd()
        .args(["queue", "nsf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no transactions"));
    assert!(files_in(&env.data_dir().join("archive")).is_empty());
    assert_eq!(files_in(&env.data_dir().join("reports")).len(), 1);

    env.cmd()
        .args(["reprint", "--format", "text", "--output-dir"])
        .arg(env.home.path().join("again"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Reprinted batch #1"));
}

#[test]
fn invalid_date_format_blocks_batch_before_saving() {
    let env = Env::new();
    env.nsf_ready();
    env.set_settings(serde_json::json!({"date_format": "%Q"}));

    env.batch_nsf()
        .failure()
        .stderr(predicate::str::contains("invalid date format"));
    env.cmd()
        .args(["queue", "nsf"])
        .assert()
        .success()
        .stdout(predicate::str::contains("TX-200"));
    assert!(files_in(&env.data_dir().join("reports")).is_empty());

    env.cmd()
        .args(["export", "nsf", "--all", "--date-format", "yyyy-MM-dd"])
        .assert()
        .failure();
}
