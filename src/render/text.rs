use crate::reports::{page_label, Align, BatchReport, Column};

/// Report units per text column.
const UNITS_PER_CHAR: u32 = 8;
const FORM_FEED: char = '\u{0c}';

fn char_width(col: &Column) -> usize {
    (col.width / UNITS_PER_CHAR).max(1) as usize
}

fn fit(value: &str, width: usize, align: Align) -> String {
    let clipped: String = value.chars().take(width).collect();
    match align {
        Align::Left => format!("{clipped:<width$}"),
        Align::Center => format!("{clipped:^width$}"),
        Align::Right => format!("{clipped:>width$}"),
    }
}

fn line(columns: &[Column], values: &[String]) -> String {
    let cells: Vec<String> = columns
        .iter()
        .zip(values)
        .map(|(c, v)| fit(v, char_width(c), c.align))
        .collect();
    cells.join(" ").trim_end().to_string()
}

fn total_width(columns: &[Column]) -> usize {
    columns.iter().map(char_width).sum::<usize>() + columns.len().saturating_sub(1)
}

/// Plain-text rendering, one block per page separated by form feeds.
pub fn render(report: &BatchReport) -> String {
    let columns = report.kind.columns();
    let width = total_width(columns);
    let rule = "-".repeat(width);
    let headers: Vec<String> = columns.iter().map(|c| c.header.to_string()).collect();

    let mut pages = Vec::new();
    for (n, range) in report.pages().into_iter().enumerate() {
        let mut out = String::new();
        if n == 0 {
            for l in report.header_lines() {
                out.push_str(&l);
                out.push('\n');
            }
            out.push('\n');
        }
        out.push_str(&line(columns, &headers));
        out.push('\n');
        out.push_str(&rule);
        out.push('\n');
        for row in &report.rows[range] {
            out.push_str(&line(columns, row));
            out.push('\n');
        }
        out.push_str(&rule);
        out.push('\n');

        let date = report.footer_date();
        let page = page_label(n);
        let gap = width.saturating_sub(date.chars().count() + page.chars().count()).max(1);
        out.push_str(&format!("{date}{}{page}\n", " ".repeat(gap)));
        pages.push(out);
    }
    pages.join(&FORM_FEED.to_string())
}
