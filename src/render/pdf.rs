use std::io::BufWriter;

use printpdf::*;

use crate::error::{Result, TxError};
use crate::reports::{page_label, Align, BatchReport, Column, Orientation};

// US Letter dimensions (mm)
const LETTER_SHORT: f32 = 215.9;
const LETTER_LONG: f32 = 279.4;
/// One layout unit is a hundredth of an inch.
const UNIT_MM: f32 = 0.254;
const FONT_SIZE: f32 = 9.0;
const TITLE_SIZE: f32 = 16.0;
const SUBTITLE_SIZE: f32 = 12.0;
const HEADER_LINE: f32 = 24.0;

fn units(u: f32) -> f32 {
    u * UNIT_MM
}

fn approx_text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.18
}

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    current_page: PdfPageIndex,
    current_layer: PdfLayerIndex,
    page_w: f32,
    page_h: f32,
    /// Distance from the top edge, in mm.
    y: f32,
}

impl PdfWriter {
    fn new(title: &str, orientation: Orientation) -> Result<Self> {
        let (page_w, page_h) = match orientation {
            Orientation::Portrait => (LETTER_SHORT, LETTER_LONG),
            Orientation::Landscape => (LETTER_LONG, LETTER_SHORT),
        };
        let (doc, page, layer) = PdfDocument::new(title, Mm(page_w), Mm(page_h), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| TxError::Pdf(format!("{e:?}")))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| TxError::Pdf(format!("{e:?}")))?;
        Ok(Self {
            doc,
            font,
            font_bold,
            current_page: page,
            current_layer: layer,
            page_w,
            page_h,
            y: 0.0,
        })
    }

    fn pdf_y(&self) -> f32 {
        self.page_h - self.y
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(self.page_w), Mm(self.page_h), "Layer");
        self.current_page = page;
        self.current_layer = layer;
        self.y = 0.0;
    }

    fn text(&self, s: &str, x: f32, size: f32, bold: bool) {
        let font = if bold {
            self.font_bold.clone()
        } else {
            self.font.clone()
        };
        let layer = self
            .doc
            .get_page(self.current_page)
            .get_layer(self.current_layer);
        layer.use_text(s, size, Mm(x), Mm(self.pdf_y()), &font);
    }

    fn aligned(&self, s: &str, x: f32, width: f32, align: Align, bold: bool) {
        let tw = approx_text_width(s, FONT_SIZE);
        let left = match align {
            Align::Left => x,
            Align::Center => x + (width - tw).max(0.0) / 2.0,
            Align::Right => x + (width - tw).max(0.0),
        };
        self.text(s, left, FONT_SIZE, bold);
    }

    fn hline(&self, x1: f32, x2: f32) {
        let layer = self
            .doc
            .get_page(self.current_page)
            .get_layer(self.current_layer);
        layer.set_outline_thickness(0.5);
        let line = Line {
            points: vec![
                (Point::new(Mm(x1), Mm(self.pdf_y())), false),
                (Point::new(Mm(x2), Mm(self.pdf_y())), false),
            ],
            is_closed: false,
        };
        layer.add_line(line);
    }

    fn table_row(&self, left: f32, cols: &[Column], values: &[String], bold: bool) {
        let mut x = left;
        for (col, value) in cols.iter().zip(values) {
            let w = units(col.width as f32);
            self.aligned(value, x, w, col.align, bold);
            x += w;
        }
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| TxError::Pdf(format!("{e:?}")))?;
        buf.into_inner().map_err(|e| TxError::Pdf(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

/// Render one report. The body area is centred on the page; rows start
/// below the reserved band so every page holds exactly its share of rows.
pub fn render(report: &BatchReport) -> Result<Vec<u8>> {
    let kind = report.kind;
    let metrics = kind.metrics();
    let cols = kind.columns();
    let mut pdf = PdfWriter::new(kind.subtitle(), kind.orientation())?;

    let table_w = units(cols.iter().map(|c| c.width).sum::<u32>() as f32);
    let left = ((pdf.page_w - table_w) / 2.0).max(0.0);
    let right = left + table_w;
    let top = ((pdf.page_h - units(metrics.body_height as f32)) / 2.0).max(0.0);
    let line_h = units(metrics.line_height as f32);
    let headers: Vec<String> = cols.iter().map(|c| c.header.to_string()).collect();

    for (n, range) in report.pages().into_iter().enumerate() {
        if n > 0 {
            pdf.new_page();
        }
        let reserved = if n == 0 {
            metrics.first_reserved
        } else {
            metrics.next_reserved
        };

        if n == 0 {
            pdf.y = top;
            for (i, line) in report.header_lines().iter().enumerate() {
                let size = match i {
                    0 => TITLE_SIZE,
                    1 => SUBTITLE_SIZE,
                    _ => FONT_SIZE + 1.0,
                };
                pdf.y += units(HEADER_LINE);
                pdf.text(line, left, size, i < 2);
            }
        }

        // column headers sit at the bottom of the reserved band
        pdf.y = top + units(reserved as f32) - units(6.0);
        pdf.table_row(left, cols, &headers, true);
        pdf.y += units(4.0);
        pdf.hline(left, right);

        pdf.y = top + units(reserved as f32);
        for row in &report.rows[range] {
            pdf.y += line_h;
            pdf.table_row(left, cols, row, false);
        }

        pdf.y = top + units(metrics.body_height as f32) + units(30.0);
        pdf.hline(left, right);
        pdf.y += units(HEADER_LINE);
        pdf.text(&report.footer_date(), left, FONT_SIZE, false);
        let label = page_label(n);
        pdf.text(&label, right - approx_text_width(&label, FONT_SIZE), FONT_SIZE, false);
    }

    pdf.to_bytes()
}
