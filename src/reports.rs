use std::collections::BTreeMap;
use std::ops::Range;

use chrono::NaiveDate;

use crate::error::{Result, TxError};
use crate::fmt::{format_date, money_fr};
use crate::models::Transaction;
use crate::queues::Queue;

pub const REPORT_TITLE: &str = "Rapport de Transactions";

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

/// A report column. Widths are in hundredths of an inch.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub header: &'static str,
    pub width: u32,
    pub align: Align,
}

const fn col(header: &'static str, width: u32, align: Align) -> Column {
    Column { header, width, align }
}

const PRELEVEMENT_COLUMNS: [Column; 5] = [
    col("# Client", 90, Align::Left),
    col("Nom du client", 280, Align::Left),
    col("Montant", 90, Align::Left),
    col("Transmis Le", 110, Align::Center),
    col("TransactionID", 120, Align::Center),
];

const NSF_COLUMNS: [Column; 7] = [
    col("# Client", 90, Align::Left),
    col("Nom du Client", 280, Align::Left),
    col("Montant", 90, Align::Left),
    col("Date NSF", 110, Align::Center),
    col("Transmis Le", 110, Align::Center),
    col("Code", 60, Align::Left),
    col("NSF Raison", 220, Align::Left),
];

const EXCEPTION_COLUMNS: [Column; 7] = [
    col("# Client", 90, Align::Left),
    col("Nom du Client", 280, Align::Left),
    col("Montant", 90, Align::Right),
    col("Transmis Le", 110, Align::Center),
    col("Date Exception", 110, Align::Center),
    col("Code", 60, Align::Left),
    col("Raison", 220, Align::Left),
];

/// Vertical budget of a page, in the same units as column widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMetrics {
    pub body_height: u32,
    pub line_height: u32,
    /// Space taken by the header block and column headers on page 1.
    pub first_reserved: u32,
    /// Space taken by the column headers on later pages.
    pub next_reserved: u32,
}

pub const LINE_HEIGHT: u32 = 18;
const PORTRAIT_BODY: u32 = 900;
const LANDSCAPE_BODY: u32 = 650;

impl PageMetrics {
    fn rows_for(&self, reserved: u32) -> usize {
        let usable = self.body_height.saturating_sub(reserved);
        ((usable / self.line_height.max(1)) as usize).max(1)
    }

    pub fn rows_first(&self) -> usize {
        self.rows_for(self.first_reserved)
    }

    pub fn rows_next(&self) -> usize {
        self.rows_for(self.next_reserved)
    }
}

/// Split `len` rows into page ranges. An empty report still has one page.
pub fn paginate(len: usize, metrics: &PageMetrics) -> Vec<Range<usize>> {
    let first = metrics.rows_first();
    let next = metrics.rows_next();
    let mut pages = vec![0..len.min(first)];
    let mut start = first;
    while start < len {
        let end = (start + next).min(len);
        pages.push(start..end);
        start = end;
    }
    pages
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Prelevements,
    Nsf,
    Exceptions,
}

impl From<Queue> for ReportKind {
    fn from(queue: Queue) -> Self {
        match queue {
            Queue::Prelevements => Self::Prelevements,
            Queue::Nsf => Self::Nsf,
            Queue::Exceptions => Self::Exceptions,
        }
    }
}

impl ReportKind {
    pub fn key(&self) -> &'static str {
        match self {
            Self::Prelevements => "prelevements",
            Self::Nsf => "nsf",
            Self::Exceptions => "exceptions",
        }
    }

    pub fn subtitle(&self) -> &'static str {
        match self {
            Self::Prelevements => "Prélèvements",
            Self::Nsf => "NSF",
            Self::Exceptions => "Exceptions",
        }
    }

    pub fn orientation(&self) -> Orientation {
        match self {
            Self::Prelevements => Orientation::Portrait,
            Self::Nsf | Self::Exceptions => Orientation::Landscape,
        }
    }

    pub fn columns(&self) -> &'static [Column] {
        match self {
            Self::Prelevements => &PRELEVEMENT_COLUMNS,
            Self::Nsf => &NSF_COLUMNS,
            Self::Exceptions => &EXCEPTION_COLUMNS,
        }
    }

    pub fn metrics(&self) -> PageMetrics {
        let (body_height, first_reserved, next_reserved) = match self {
            Self::Prelevements => (PORTRAIT_BODY, 210, 140),
            Self::Nsf => (LANDSCAPE_BODY, 200, 130),
            Self::Exceptions => (LANDSCAPE_BODY, 284, 168),
        };
        PageMetrics {
            body_height,
            line_height: LINE_HEIGHT,
            first_reserved,
            next_reserved,
        }
    }

    /// chrono format for the reference date and the row dates.
    fn date_format(&self) -> &'static str {
        match self {
            Self::Prelevements => "%d-%m-%Y",
            Self::Nsf | Self::Exceptions => "%d/%m/%Y",
        }
    }

    fn reference_source<'a>(&self, tx: &'a Transaction) -> Option<&'a str> {
        match self {
            Self::Prelevements => tx.transaction_datetime.as_deref(),
            Self::Nsf | Self::Exceptions => tx.last_modified.as_deref(),
        }
    }

    fn cells(&self, tx: &Transaction) -> Vec<String> {
        let fmt = self.date_format();
        let amount = tx.credit_amount.map(money_fr).unwrap_or_default();
        let sent = format_date(tx.transaction_datetime.as_deref(), fmt);
        let modified = format_date(tx.last_modified.as_deref(), fmt);
        let code = tx.transaction_error_code.clone().unwrap_or_default();
        let reason = tx.transaction_failure_reason.clone().unwrap_or_default();
        match self {
            Self::Prelevements => vec![
                tx.client_ref(),
                tx.display_name().to_string(),
                amount,
                sent,
                tx.transaction_id.clone(),
            ],
            Self::Nsf => vec![
                tx.client_ref(),
                tx.display_name().to_string(),
                amount,
                modified,
                sent,
                code,
                reason,
            ],
            Self::Exceptions => vec![
                tx.client_ref(),
                tx.display_name().to_string(),
                amount,
                sent,
                modified,
                code,
                reason,
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Report model
// ---------------------------------------------------------------------------

/// One printable report: a header block, rows and page breaks.
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub kind: ReportKind,
    pub company: String,
    /// Calendar date the rows were grouped by, when grouped.
    pub group_date: Option<NaiveDate>,
    pub transaction_type: String,
    pub total: f64,
    pub reference: String,
    pub printed_on: NaiveDate,
    pub rows: Vec<Vec<String>>,
    pub transaction_ids: Vec<String>,
}

impl BatchReport {
    fn build(
        kind: ReportKind,
        txs: &[&Transaction],
        company: &str,
        group_date: Option<NaiveDate>,
        printed_on: NaiveDate,
    ) -> Self {
        let first = txs.first();
        Self {
            kind,
            company: company.to_string(),
            group_date,
            transaction_type: first.map(|t| t.transaction_type.clone()).unwrap_or_default(),
            total: txs.iter().filter_map(|t| t.credit_amount).sum(),
            reference: first
                .map(|t| format_date(kind.reference_source(t), kind.date_format()))
                .unwrap_or_default(),
            printed_on,
            rows: txs.iter().map(|t| kind.cells(t)).collect(),
            transaction_ids: txs.iter().map(|t| t.transaction_id.clone()).collect(),
        }
    }

    /// Header block printed at the top of page 1.
    pub fn header_lines(&self) -> Vec<String> {
        vec![
            REPORT_TITLE.to_string(),
            self.kind.subtitle().to_string(),
            format!("Nom : {}", self.company),
            format!("Type: {}", self.transaction_type),
            format!("Total : {}", money_fr(self.total)),
            format!("Référence : {}", self.reference),
        ]
    }

    pub fn footer_date(&self) -> String {
        format!("Date : {}", self.printed_on.format("%d/%m/%Y"))
    }

    pub fn pages(&self) -> Vec<Range<usize>> {
        paginate(self.rows.len(), &self.kind.metrics())
    }
}

pub fn page_label(page: usize) -> String {
    format!("Page {}", page + 1)
}

/// Build the reports for a batch. Pending debits are split per transaction
/// date, NSF per last-modified date; exceptions stay in one report.
pub fn build_reports(
    kind: ReportKind,
    txs: &[Transaction],
    company: &str,
    printed_on: NaiveDate,
) -> Result<Vec<BatchReport>> {
    let group_key: fn(&Transaction) -> Option<NaiveDate> = match kind {
        ReportKind::Exceptions => {
            let all: Vec<&Transaction> = txs.iter().collect();
            return Ok(vec![BatchReport::build(kind, &all, company, None, printed_on)]);
        }
        ReportKind::Prelevements => Transaction::transaction_date,
        ReportKind::Nsf => Transaction::last_modified_date,
    };

    let mut groups: BTreeMap<NaiveDate, Vec<&Transaction>> = BTreeMap::new();
    let mut dropped = 0usize;
    for tx in txs {
        match group_key(tx) {
            Some(date) => groups.entry(date).or_default().push(tx),
            None => dropped += 1,
        }
    }
    if dropped > 0 {
        log::warn!("event=report kind={} status=dropped_undated count={dropped}", kind.key());
    }
    if groups.is_empty() {
        return Err(TxError::NoValidDates(match kind {
            ReportKind::Prelevements => "transaction",
            _ => "last-modified",
        }));
    }

    Ok(groups
        .into_iter()
        .map(|(date, mut rows)| {
            if kind == ReportKind::Nsf {
                rows.sort_by(|a, b| {
                    a.credit_amount
                        .unwrap_or(0.0)
                        .total_cmp(&b.credit_amount.unwrap_or(0.0))
                });
            }
            BatchReport::build(kind, &rows, company, Some(date), printed_on)
        })
        .collect())
}
