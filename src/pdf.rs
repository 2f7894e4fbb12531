use std::io::BufWriter;

use printpdf::path::{PaintMode, WindingOrder};
use printpdf::*;

use crate::document::{Figure, Panel, ReportDocument, ResultTable, RunInfo, Section};
use crate::error::{Result, StormError};

// US Letter dimensions (mm)
const PAGE_W: f32 = 215.9;
const PAGE_H: f32 = 279.4;
const MARGIN_TOP: f32 = 25.4;
const MARGIN_BOTTOM: f32 = 25.4;
const MARGIN_LEFT: f32 = 19.05;
const MARGIN_RIGHT: f32 = 19.05;
const CONTENT_W: f32 = PAGE_W - MARGIN_LEFT - MARGIN_RIGHT;
const ROW_H: f32 = 5.0;
const FONT_SIZE: f32 = 10.0;
const SMALL_SIZE: f32 = 8.0;
const TITLE_SIZE: f32 = 16.0;
const HEADING_SIZE: f32 = 12.0;
const WRAP_CHARS: usize = 100;

// Bar charts
const BAR_LABEL_W: f32 = 48.0;
const BAR_MAX_W: f32 = 100.0;
const BAR_H: f32 = 3.6;
const NUMERIC_COL_W: f32 = 28.0;

fn approx_text_width(text: &str, size: f32) -> f32 {
    text.len() as f32 * size * 0.18
}

fn pdf_err(e: impl std::fmt::Debug) -> StormError {
    StormError::Pdf(format!("{e:?}"))
}

fn black() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}

fn bar_color() -> Color {
    Color::Rgb(Rgb::new(0.23, 0.42, 0.64, None))
}

#[derive(Clone, Copy)]
enum Align {
    Left,
    Right,
}

struct Col {
    width: f32,
    align: Align,
}

/// Column layout: numeric columns get a fixed width, text columns share the rest.
fn layout(table: &ResultTable) -> Vec<Col> {
    let numeric = table.columns.iter().filter(|c| c.numeric).count();
    let text = (table.columns.len() - numeric).max(1);
    let text_w = (CONTENT_W - numeric as f32 * NUMERIC_COL_W) / text as f32;
    table
        .columns
        .iter()
        .map(|c| {
            if c.numeric {
                Col { width: NUMERIC_COL_W, align: Align::Right }
            } else {
                Col { width: text_w, align: Align::Left }
            }
        })
        .collect()
}

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    current_page: PdfPageIndex,
    current_layer: PdfLayerIndex,
    y: f32,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let font = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_err)?;
        Ok(Self {
            doc,
            font,
            font_bold,
            current_page: page,
            current_layer: layer,
            y: MARGIN_TOP,
        })
    }

    fn pdf_y(&self) -> f32 {
        PAGE_H - self.y
    }

    fn layer(&self) -> PdfLayerReference {
        self.doc
            .get_page(self.current_page)
            .get_layer(self.current_layer)
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer");
        self.current_page = page;
        self.current_layer = layer;
        self.y = MARGIN_TOP;
    }

    fn ensure_space(&mut self, needed: f32) {
        if self.y + needed > PAGE_H - MARGIN_BOTTOM {
            self.new_page();
        }
    }

    fn text(&self, s: &str, x: f32, size: f32, bold: bool) {
        let font = if bold { &self.font_bold } else { &self.font };
        self.layer().use_text(s, size, Mm(x), Mm(self.pdf_y()), font);
    }

    fn hline(&self, x1: f32, x2: f32) {
        let layer = self.layer();
        layer.set_outline_thickness(0.5);
        layer.add_line(Line {
            points: vec![
                (Point::new(Mm(x1), Mm(self.pdf_y())), false),
                (Point::new(Mm(x2), Mm(self.pdf_y())), false),
            ],
            is_closed: false,
        });
    }

    /// Filled rectangle whose top edge sits at the current baseline minus `height`.
    fn bar(&self, x: f32, width: f32, height: f32) {
        let bottom = self.pdf_y() - 0.8;
        let top = bottom + height;
        let layer = self.layer();
        layer.set_fill_color(bar_color());
        layer.add_polygon(Polygon {
            rings: vec![vec![
                (Point::new(Mm(x), Mm(bottom)), false),
                (Point::new(Mm(x + width), Mm(bottom)), false),
                (Point::new(Mm(x + width), Mm(top)), false),
                (Point::new(Mm(x), Mm(top)), false),
            ]],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
        layer.set_fill_color(black());
    }

    fn header(&mut self, title: &str, subtitle: &str, generated: &str) {
        self.text(title, MARGIN_LEFT, TITLE_SIZE, true);
        self.y += 7.0;
        self.text(subtitle, MARGIN_LEFT, FONT_SIZE, false);
        self.y += 5.0;
        self.text(&format!("Generated {generated}"), MARGIN_LEFT, SMALL_SIZE, false);
        self.y += 5.0;
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        self.y += 6.0;
    }

    fn heading(&mut self, s: &str, size: f32) {
        self.ensure_space(ROW_H * 3.0);
        self.y += 2.0;
        self.text(s, MARGIN_LEFT, size, true);
        self.y += ROW_H + 1.0;
    }

    fn paragraph(&mut self, s: &str) {
        for line in textwrap::wrap(s, WRAP_CHARS) {
            self.ensure_space(ROW_H);
            self.text(&line, MARGIN_LEFT, FONT_SIZE, false);
            self.y += ROW_H;
        }
        self.y += 2.0;
    }

    fn cells(&mut self, cols: &[Col], values: &[&str], bold: bool) {
        let mut x = MARGIN_LEFT;
        for (col, value) in cols.iter().zip(values) {
            match col.align {
                Align::Left => self.text(value, x, FONT_SIZE, bold),
                Align::Right => {
                    let tw = approx_text_width(value, FONT_SIZE);
                    self.text(value, x + col.width - tw, FONT_SIZE, bold);
                }
            }
            x += col.width;
        }
        self.y += ROW_H;
    }

    fn table_header(&mut self, cols: &[Col], headers: &[&str]) {
        self.ensure_space(ROW_H * 2.0);
        self.cells(cols, headers, true);
        self.y -= ROW_H - 1.5;
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        self.y += ROW_H - 1.5;
    }

    fn table(&mut self, table: &ResultTable) {
        let cols = layout(table);
        self.ensure_space(ROW_H * 3.0);
        self.text(&table.title, MARGIN_LEFT, FONT_SIZE, true);
        self.y += ROW_H + 1.0;
        let headers: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
        self.table_header(&cols, &headers);
        for row in &table.rows {
            if self.y + ROW_H > PAGE_H - MARGIN_BOTTOM {
                self.new_page();
                self.table_header(&cols, &headers);
            }
            let values: Vec<&str> = row.iter().map(String::as_str).collect();
            self.cells(&cols, &values, false);
        }
        self.y += ROW_H;
    }

    fn section(&mut self, section: &Section) {
        self.heading(&section.heading, HEADING_SIZE);
        for p in &section.paragraphs {
            self.paragraph(p);
        }
        for t in &section.tables {
            self.table(t);
        }
    }

    fn panel(&mut self, panel: &Panel) {
        self.ensure_space(ROW_H * (panel.bars.len() as f32 + 2.0));
        self.text(&panel.title, MARGIN_LEFT, FONT_SIZE, true);
        self.y += ROW_H + 1.0;
        if panel.bars.is_empty() {
            self.text("(no data)", MARGIN_LEFT, SMALL_SIZE, false);
            self.y += ROW_H;
            return;
        }
        let max = panel.max_value();
        let bar_x = MARGIN_LEFT + BAR_LABEL_W;
        for bar in &panel.bars {
            let width = if max > 0.0 {
                (bar.value / max) as f32 * BAR_MAX_W
            } else {
                0.0
            };
            self.text(&bar.label, MARGIN_LEFT, SMALL_SIZE, false);
            self.bar(bar_x, width.max(0.5), BAR_H);
            let value = panel.unit.format(bar.value);
            self.text(&value, bar_x + width.max(0.5) + 2.0, SMALL_SIZE, false);
            self.y += ROW_H;
        }
        self.y += 3.0;
    }

    fn figure(&mut self, number: usize, figure: &Figure) {
        self.heading(&format!("Figure {number}: {}", figure.title), FONT_SIZE + 1.0);
        for panel in &figure.panels {
            self.panel(panel);
        }
        for line in textwrap::wrap(&figure.caption, WRAP_CHARS + 10) {
            self.ensure_space(ROW_H);
            self.text(&line, MARGIN_LEFT, SMALL_SIZE, false);
            self.y += ROW_H - 1.0;
        }
        self.y += ROW_H;
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc.save(&mut buf).map_err(pdf_err)?;
        buf.into_inner().map_err(|e| StormError::Pdf(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Render
// ---------------------------------------------------------------------------

pub fn render_document(doc: &ReportDocument, run: &RunInfo) -> Result<Vec<u8>> {
    let mut pdf = PdfWriter::new(&doc.title)?;
    let subtitle = format!("Source: {} ({} strategy)", run.source, run.strategy.name());
    pdf.header(&doc.title, &subtitle, &run.generated);

    pdf.heading("Synopsis", HEADING_SIZE);
    pdf.paragraph(&doc.synopsis);

    pdf.heading("Data Processing", TITLE_SIZE - 2.0);
    for section in &doc.processing {
        pdf.section(section);
    }

    pdf.section(&doc.results);

    for (i, figure) in doc.figures().iter().enumerate() {
        pdf.figure(i + 1, figure);
    }

    pdf.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorizer::{Categorizer, Strategy};
    use crate::document::build_document;
    use crate::importer::{cutoff_date, read_records};
    use crate::normalizer::normalize_records;
    use crate::reports::summarize;

    const CSV: &str = "\
STATE__,BGN_DATE,COUNTYNAME,STATE,EVTYPE,BGN_LOCATI,FATALITIES,INJURIES,PROPDMG,PROPDMGEXP,CROPDMG,CROPDMGEXP,REMARKS,REFNUM
1.00,4/18/2000 0:00:00,MOBILE,AL,TORNADO,,5.00,40.00,2.5,B,0.00,,,1
29.00,7/19/1999 0:00:00,ST LOUIS,MO,EXCESSIVE HEAT,,12.00,30.00,0.00,,0.00,,,2
29.00,5/5/2003 0:00:00,ST LOUIS,MO,HAIL,,0.00,0.00,3.00,Z,5.00,M,,3
";

    #[test]
    fn test_render_document_produces_pdf() {
        let load = read_records(CSV.as_bytes(), cutoff_date()).unwrap();
        let clean = normalize_records(load.records, &Categorizer::new(Strategy::Keyword).unwrap());
        let run = RunInfo {
            source: "fixture.csv".to_string(),
            checksum: Some("abc123".to_string()),
            strategy: Strategy::Keyword,
            rows_read: load.rows_read,
            kept: clean.len(),
            before_cutoff: load.before_cutoff,
            issues: load.issues.len(),
            corrected_states: 0,
            generated: "2024-01-01 00:00".to_string(),
        };
        let by_state = summarize(&clean, true);
        let doc = build_document(&summarize(&clean, false), Some(&by_state), &run, 10).unwrap();
        let bytes = render_document(&doc, &run).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_layout_fills_content_width() {
        let table = ResultTable {
            title: "t".to_string(),
            columns: vec![
                crate::document::Column { name: "Event type".to_string(), numeric: false },
                crate::document::Column { name: "Events".to_string(), numeric: true },
                crate::document::Column { name: "Total".to_string(), numeric: true },
            ],
            rows: Vec::new(),
        };
        let cols = layout(&table);
        let total: f32 = cols.iter().map(|c| c.width).sum();
        assert!((total - CONTENT_W).abs() < 0.01);
        assert_eq!(cols[1].width, NUMERIC_COL_W);
    }
}
