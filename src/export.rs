use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use encoding_rs::WINDOWS_1252;

use crate::error::{Result, TxError};
use crate::fmt::{amount_plain_fr, format_date, money_fr};
use crate::importer::IMPORTED_TYPE;
use crate::models::Transaction;

// ---------------------------------------------------------------------------
// Locked NSF format
// ---------------------------------------------------------------------------
//
// The downstream credit system reads these files byte for byte: cp1252,
// CRLF, no header, twelve fields plus a trailing empty quoted field.

const DEBIT_LABEL: &str = "Débit";
const CREDIT_LABEL: &str = "Crédit";

/// `NSF_yyyyMMdd_HHmmss.csv`
pub fn locked_file_name(now: NaiveDateTime) -> String {
    format!("NSF_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

fn locked_field(value: &str) -> String {
    if value.trim().is_empty() {
        String::new()
    } else {
        format!("\"{}\"", value.replace('"', "\"\""))
    }
}

fn direction_label(tx: &Transaction) -> &'static str {
    if tx.transaction_type.trim().eq_ignore_ascii_case(IMPORTED_TYPE) {
        DEBIT_LABEL
    } else {
        CREDIT_LABEL
    }
}

/// One CRLF-terminated line of the locked format, still as text.
pub fn locked_line(tx: &Transaction, date_format: &str) -> String {
    let amount = tx
        .credit_amount
        .or(tx.debit_amount)
        .map(money_fr)
        .unwrap_or_default();
    let opt = |v: &Option<String>| v.clone().unwrap_or_default();

    let fields = [
        tx.transaction_id.clone(),
        opt(&tx.client_reference_number),
        tx.display_name().to_string(),
        amount,
        direction_label(tx).to_string(),
        String::new(),
        String::new(),
        opt(&tx.scheduled_transaction_id),
        format_date(tx.transaction_datetime.as_deref(), date_format),
        format_date(tx.last_modified.as_deref(), date_format),
        opt(&tx.transaction_error_code),
        opt(&tx.transaction_failure_reason),
    ];
    let mut line = fields
        .iter()
        .map(|f| locked_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push_str(",\"\"\r\n");
    line
}

/// Encode to Windows-1252, refusing anything it cannot represent.
pub fn encode_cp1252(text: &str) -> Result<Vec<u8>> {
    let (bytes, _, had_errors) = WINDOWS_1252.encode(text);
    if had_errors {
        let bad: String = text
            .chars()
            .filter(|c| WINDOWS_1252.encode(c.encode_utf8(&mut [0; 4])).2)
            .collect();
        return Err(TxError::Encoding(bad));
    }
    Ok(bytes.into_owned())
}

pub fn locked_csv_bytes(txs: &[Transaction], date_format: &str) -> Result<Vec<u8>> {
    let text: String = txs.iter().map(|t| locked_line(t, date_format)).collect();
    encode_cp1252(&text)
}

/// Write the locked file for `txs` into `dir`. Returns the written path.
pub fn write_locked_csv(
    txs: &[Transaction],
    dir: &Path,
    date_format: &str,
    now: NaiveDateTime,
) -> Result<PathBuf> {
    if txs.is_empty() {
        return Err(TxError::EmptySelection);
    }
    let bytes = locked_csv_bytes(txs, date_format)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(locked_file_name(now));
    std::fs::write(&path, bytes)?;
    log::info!("event=export format=locked rows={} path={}", txs.len(), path.display());
    Ok(path)
}

// ---------------------------------------------------------------------------
// NSF summary
// ---------------------------------------------------------------------------

/// Written bare; only the data rows are quoted.
const SUMMARY_HEADER: &str = "Client,Nom,Montant,DateNSF,TransmisLe,Code,Raison,TransactionID\r\n";

fn one_line(value: &str) -> String {
    value.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

pub fn summary_csv_bytes(txs: &[Transaction]) -> Result<Vec<u8>> {
    if txs.is_empty() {
        return Err(TxError::EmptySelection);
    }
    let mut sorted: Vec<&Transaction> = txs.iter().collect();
    sorted.sort_by(|a, b| {
        a.last_modified
            .cmp(&b.last_modified)
            .then_with(|| a.transaction_id.cmp(&b.transaction_id))
    });

    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .from_writer(SUMMARY_HEADER.as_bytes().to_vec());
    for tx in sorted {
        let opt = |v: &Option<String>| one_line(v.as_deref().unwrap_or(""));
        wtr.write_record([
            one_line(&tx.client_ref()),
            opt(&tx.full_name),
            tx.credit_amount.map(amount_plain_fr).unwrap_or_default(),
            format_date(tx.last_modified.as_deref(), "%d-%m-%Y"),
            format_date(tx.transaction_datetime.as_deref(), "%d-%m-%Y"),
            opt(&tx.transaction_error_code),
            opt(&tx.transaction_failure_reason),
            one_line(&tx.transaction_id),
        ])?;
    }
    wtr.into_inner().map_err(|e| TxError::Io(e.into_error()))
}

pub fn write_summary_csv(txs: &[Transaction], path: &Path) -> Result<()> {
    let bytes = summary_csv_bytes(txs)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    log::info!("event=export format=summary rows={} path={}", txs.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn nsf_tx() -> Transaction {
        Transaction {
            transaction_id: "T-001".into(),
            client_reference_number: Some("100234".into()),
            full_name: Some("Élodie \"Lo\" Gagné".into()),
            transaction_type: "EFT Funding".into(),
            transaction_status: "failed".into(),
            credit_amount: Some(1234.56),
            scheduled_transaction_id: Some("S-9".into()),
            transaction_datetime: Some("2024-12-13 10:05:46".into()),
            last_modified: Some("2024-12-16 08:00:00".into()),
            transaction_error_code: Some("R01".into()),
            transaction_failure_reason: Some("Fonds insuffisants".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_locked_line_layout() {
        let line = locked_line(&nsf_tx(), "%Y-%m-%d");
        assert_eq!(
            line,
            "\"T-001\",\"100234\",\"Élodie \"\"Lo\"\" Gagné\",\"1\u{a0}234,56 $\",\"Débit\",,,\
             \"S-9\",\"2024-12-13\",\"2024-12-16\",\"R01\",\"Fonds insuffisants\",\"\"\r\n"
        );
    }

    #[test]
    fn test_locked_line_blanks_and_fallbacks() {
        let tx = Transaction {
            transaction_id: "T-2".into(),
            account_name: Some("Compte Roy".into()),
            full_name: Some("   ".into()),
            transaction_type: "Refund".into(),
            debit_amount: Some(50.0),
            ..Default::default()
        };
        assert_eq!(
            locked_line(&tx, "%Y-%m-%d"),
            "\"T-2\",,\"Compte Roy\",\"50,00 $\",\"Crédit\",,,,,,,,\"\"\r\n"
        );
    }

    #[test]
    fn test_locked_bytes_are_cp1252() {
        let bytes = locked_csv_bytes(&[nsf_tx()], "%Y-%m-%d").unwrap();
        // É, é, nbsp as single bytes
        assert!(bytes.contains(&0xC9));
        assert!(bytes.contains(&0xE9));
        assert!(bytes.contains(&0xA0));
        assert!(bytes.ends_with(b",\"\"\r\n"));
        assert!(std::str::from_utf8(&bytes).is_err());
    }

    #[test]
    fn test_unencodable_character_is_an_error() {
        let mut tx = nsf_tx();
        tx.full_name = Some("Zhāng 张".into());
        match locked_csv_bytes(&[tx], "%Y-%m-%d") {
            Err(TxError::Encoding(bad)) => assert_eq!(bad, "ā张"),
            other => panic!("expected encoding error, got {other:?}"),
        }
    }

    #[test]
    fn test_locked_date_format_is_configurable() {
        let line = locked_line(&nsf_tx(), "%d/%m/%Y");
        assert!(line.contains("\"13/12/2024\",\"16/12/2024\""));
    }

    #[test]
    fn test_locked_file_name() {
        let now = NaiveDate::from_ymd_opt(2024, 12, 16)
            .unwrap()
            .and_hms_opt(9, 5, 3)
            .unwrap();
        assert_eq!(locked_file_name(now), "NSF_20241216_090503.csv");
    }

    #[test]
    fn test_write_locked_csv_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output").join("nsf");
        let now = NaiveDate::from_ymd_opt(2024, 12, 16).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let path = write_locked_csv(&[nsf_tx()], &out, "%Y-%m-%d", now).unwrap();
        assert_eq!(path, out.join("NSF_20241216_090000.csv"));
        assert!(path.exists());
        assert!(matches!(write_locked_csv(&[], &out, "%Y-%m-%d", now), Err(TxError::EmptySelection)));
    }

    #[test]
    fn test_summary_sorted_and_quoted() {
        let mut early = nsf_tx();
        early.transaction_id = "T-000".into();
        early.last_modified = Some("2024-12-15 08:00:00".into());
        early.transaction_failure_reason = Some("ligne 1\r\nligne 2".into());
        early.credit_amount = Some(144.0);

        let bytes = summary_csv_bytes(&[nsf_tx(), early]).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(
            lines[0],
            "Client,Nom,Montant,DateNSF,TransmisLe,Code,Raison,TransactionID"
        );
        assert_eq!(
            lines[1],
            "\"100234\",\"Élodie \"\"Lo\"\" Gagné\",\"144,00\",\"15-12-2024\",\"13-12-2024\",\"R01\",\"ligne 1 ligne 2\",\"T-000\""
        );
        assert!(lines[2].ends_with("\"T-001\""));
        assert!(lines[2].contains("\"1234,56\""));
        assert_eq!(lines[3], "");
    }

    #[test]
    fn test_summary_name_is_full_name_only() {
        let mut t = nsf_tx();
        t.full_name = None;
        t.account_name = Some("Compte Roy".into());
        let text = String::from_utf8(summary_csv_bytes(&[t]).unwrap()).unwrap();
        assert!(text.contains("\"100234\",\"\",\"1234,56\""));
        assert!(!text.contains("Compte Roy"));
    }

    #[test]
    fn test_summary_of_nothing_is_an_error() {
        assert!(matches!(summary_csv_bytes(&[]), Err(TxError::EmptySelection)));
    }
}
