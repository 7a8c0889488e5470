use std::fmt::Write as _;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{Result, TxError};

/// Storage format for every date-time column.
pub const DB_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// fr-CA digit group separator (no-break space).
const GROUP_SEP: char = '\u{a0}';

/// Format a float the fr-CA `N2` way: 1 234,56
pub fn number_fr(val: f64) -> String {
    let negative = val < 0.0 && format!("{:.2}", val.abs()) != "0.00";
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(GROUP_SEP);
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    if negative {
        format!("-{grouped},{dec_part}")
    } else {
        format!("{grouped},{dec_part}")
    }
}

/// fr-CA currency as printed on reports and the locked CSV: 1 234,56 $
pub fn money_fr(val: f64) -> String {
    format!("{} $", number_fr(val))
}

/// fr-CA `0.00` without grouping or symbol: 1234,56
pub fn amount_plain_fr(val: f64) -> String {
    format!("{val:.2}").replace('.', ",")
}

/// Lenient amount parser: strips `$`, `CAD`, spaces and thousands
/// separators; `(12.50)` is negative. A lone comma followed by one or two
/// digits is a decimal comma (`144,00`).
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut s: String = raw
        .replace("CAD", "")
        .replace('$', "")
        .chars()
        .filter(|c| !c.is_whitespace() && *c != GROUP_SEP && *c != '\u{202f}')
        .collect();
    if s.is_empty() {
        return None;
    }

    let mut negative = false;
    if let Some(inner) = s.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        negative = true;
        s = inner.to_string();
    }

    let commas = s.matches(',').count();
    let normalized = if s.contains('.') {
        s.replace(',', "")
    } else if commas == 1 {
        let (_, decimals) = s.split_once(',').unwrap_or(("", ""));
        if (1..=2).contains(&decimals.len()) {
            s.replace(',', ".")
        } else {
            s.replace(',', "")
        }
    } else {
        s.replace(',', "")
    };

    let val: f64 = normalized.parse().ok()?;
    if !val.is_finite() {
        return None;
    }
    Some(if negative { -val } else { val })
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parse the date-time shapes found in import files. Offsets are dropped:
/// the wall-clock time as written is kept.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    if let Some(stripped) = s.strip_suffix('Z') {
        if let Some(dt) = parse_datetime(stripped) {
            return Some(dt);
        }
    }
    for f in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, f) {
            return Some(dt);
        }
    }
    for f in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, f) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Normalize to the storage format, `None` when unparseable.
pub fn normalize_datetime(raw: &str) -> Option<String> {
    parse_datetime(raw).map(|dt| dt.format(DB_DATETIME).to_string())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_datetime(raw).map(|dt| dt.date())
}

/// Format the date part of a stored date-time, empty when missing or when
/// `fmt` cannot render it.
pub fn format_date(raw: Option<&str>, fmt: &str) -> String {
    let Some(date) = raw.and_then(parse_date) else {
        return String::new();
    };
    let mut out = String::new();
    match write!(out, "{}", date.format(fmt)) {
        Ok(()) => out,
        Err(_) => String::new(),
    }
}

/// A user-supplied chrono format must parse and contain at least one date
/// field. `yyyy-MM-dd` style patterns are all literal text and are refused.
pub fn check_date_format(fmt: &str) -> Result<()> {
    let mut has_field = false;
    for item in StrftimeItems::new(fmt) {
        match item {
            Item::Error => {
                return Err(TxError::Settings(format!("invalid date format {fmt:?}")));
            }
            Item::Numeric(..) | Item::Fixed(..) => has_field = true,
            _ => {}
        }
    }
    if !has_field {
        return Err(TxError::Settings(format!(
            "date format {fmt:?} has no chrono field (use e.g. %Y-%m-%d)"
        )));
    }
    Ok(())
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
