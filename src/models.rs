use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};

/// One financial transfer attempt plus its triage flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    pub transaction_id: String,
    pub full_name: Option<String>,
    pub account_name: Option<String>,
    /// Normalized `YYYY-MM-DD HH:MM:SS`.
    pub transaction_datetime: Option<String>,
    pub transaction_type: String,
    pub transaction_status: String,
    pub notes: Option<String>,
    pub debit_amount: Option<f64>,
    pub credit_amount: Option<f64>,
    pub currency: Option<String>,
    pub hold_amount: Option<f64>,
    /// Normalized `YYYY-MM-DD HH:MM:SS`.
    pub last_modified: Option<String>,
    pub parent_transaction_id: Option<String>,
    pub child_transaction_ids: Vec<String>,
    pub client_reference_number: Option<String>,
    pub scheduled_transaction_id: Option<String>,
    pub wallet_id: Option<String>,
    pub wallet_name1: Option<String>,
    pub wallet_name2: Option<String>,
    pub client_account_id: Option<String>,
    pub transaction_error_code: Option<String>,
    pub transaction_failure_reason: Option<String>,
    pub transaction_flag: Option<String>,
    pub elinx_request_id: Option<String>,
    pub is_refunded: bool,
    pub is_refund: bool,
    pub is_prelevement_done: bool,
    pub is_nsf_done: bool,
    pub is_exception: bool,
    pub is_verifier: bool,
}

fn digits_only() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+$").expect("static regex"))
}

impl Transaction {
    /// Client number shown on reports: the reference number, else a purely
    /// numeric client account id, else empty.
    pub fn client_ref(&self) -> String {
        let reference = self.client_reference_number.as_deref().unwrap_or("").trim();
        if !reference.is_empty() {
            return reference.to_string();
        }
        let account = self.client_account_id.as_deref().unwrap_or("").trim();
        if digits_only().is_match(account) {
            return account.to_string();
        }
        String::new()
    }

    /// Full name, or the account name when the full name is blank.
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.account_name.as_deref().unwrap_or(""),
        }
    }

    /// Date part of `transaction_datetime`.
    pub fn transaction_date(&self) -> Option<chrono::NaiveDate> {
        self.transaction_datetime.as_deref().and_then(crate::fmt::parse_date)
    }

    /// Date part of `last_modified`.
    pub fn last_modified_date(&self) -> Option<chrono::NaiveDate> {
        self.last_modified.as_deref().and_then(crate::fmt::parse_date)
    }
}

/// Top level of an import file.
#[derive(Debug, Deserialize)]
pub struct ImportDocument {
    #[serde(rename = "Transactions", default)]
    pub transactions: Option<Vec<JsonTransaction>>,
}

/// A transaction as it appears in an import file. Every field is optional
/// and kept as raw text; normalization happens at import time.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JsonTransaction {
    #[serde(rename = "TransactionID", deserialize_with = "lenient_text")]
    pub transaction_id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub account_name: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub transaction_date_time: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub transaction_type: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub transaction_status: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub notes: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub debit_amount: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub credit_amount: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub currency: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub hold_amount: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub last_modified: Option<String>,
    #[serde(rename = "ParentTransactionID", deserialize_with = "lenient_text")]
    pub parent_transaction_id: Option<String>,
    #[serde(rename = "ChildTransactionIDs")]
    pub child_transaction_ids: Option<Vec<String>>,
    #[serde(deserialize_with = "lenient_text")]
    pub client_reference_number: Option<String>,
    #[serde(rename = "ScheduledTransactionID", deserialize_with = "lenient_text")]
    pub scheduled_transaction_id: Option<String>,
    #[serde(rename = "WalletID", deserialize_with = "lenient_text")]
    pub wallet_id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub wallet_name1: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub wallet_name2: Option<String>,
    #[serde(rename = "ClientAccountID", deserialize_with = "lenient_text")]
    pub client_account_id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub transaction_error_code: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub transaction_failure_reason: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub transaction_flag: Option<String>,
    #[serde(rename = "ELinxRequestID", deserialize_with = "lenient_text")]
    pub elinx_request_id: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_refunded: bool,
    #[serde(deserialize_with = "lenient_bool")]
    pub is_refund: bool,
    #[serde(deserialize_with = "lenient_text")]
    pub full_name: Option<String>,
}

/// Accepts strings, numbers and booleans as text; null stays `None`.
fn lenient_text<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

/// Accepts `true`/`false`, `"true"`/`"false"`, `1`/`0`; anything else is false.
fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1")
        }
        Some(serde_json::Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(reference: Option<&str>, account: Option<&str>) -> Transaction {
        Transaction {
            transaction_id: "T1".into(),
            client_reference_number: reference.map(String::from),
            client_account_id: account.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_client_ref_prefers_reference_number() {
        assert_eq!(tx(Some("  REF-9 "), Some("123")).client_ref(), "REF-9");
    }

    #[test]
    fn test_client_ref_falls_back_to_numeric_account() {
        assert_eq!(tx(Some("   "), Some(" 004512 ")).client_ref(), "004512");
        assert_eq!(tx(None, Some("12-34")).client_ref(), "");
        assert_eq!(tx(None, Some("AB12")).client_ref(), "");
        assert_eq!(tx(None, None).client_ref(), "");
    }

    #[test]
    fn test_display_name_fallback() {
        let mut t = tx(None, None);
        t.account_name = Some("Compte Tremblay".into());
        t.full_name = Some("  ".into());
        assert_eq!(t.display_name(), "Compte Tremblay");
        t.full_name = Some("Marie Tremblay".into());
        assert_eq!(t.display_name(), "Marie Tremblay");
    }

    #[test]
    fn test_json_transaction_accepts_numbers_and_nulls() {
        let json = r#"{
            "TransactionID": "abc",
            "CreditAmount": 144.5,
            "DebitAmount": null,
            "IsRefunded": "true",
            "IsRefund": 0,
            "ChildTransactionIDs": ["c1", "c2"],
            "SomethingElse": {"nested": true}
        }"#;
        let t: JsonTransaction = serde_json::from_str(json).unwrap();
        assert_eq!(t.transaction_id.as_deref(), Some("abc"));
        assert_eq!(t.credit_amount.as_deref(), Some("144.5"));
        assert!(t.debit_amount.is_none());
        assert!(t.is_refunded);
        assert!(!t.is_refund);
        assert_eq!(t.child_transaction_ids.unwrap(), vec!["c1", "c2"]);
    }

    #[test]
    fn test_import_document_without_transactions() {
        let doc: ImportDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.transactions.is_none());
        let doc: ImportDocument = serde_json::from_str(r#"{"Transactions": null}"#).unwrap();
        assert!(doc.transactions.is_none());
    }
}
