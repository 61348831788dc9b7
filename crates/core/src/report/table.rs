//! Fixed-column record table with two-line value/gain cells and automatic page breaks.

use crate::domain::record::AnalysisRecord;
use crate::metrics::{classify_tier, format_gain, format_number, gain_percent, Tier};
use crate::report::surface::{Align, Rgb, Surface, TextStyle};
use crate::report::timeline::{self, CellRect};

const PT_TO_MM: f64 = 0.3528;
const CELL_PADDING_X: f64 = 1.5;
const ANNOTATED_PADDING_X: f64 = 2.0;
const BODY_FONT_PT: f64 = 8.0;
const ANNOTATION_FONT_PT: f64 = 6.5;

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub title: &'static str,
    pub width: f64,
    pub align: Align,
    pub color: Rgb,
    pub bold: bool,
    pub font_pt: f64,
}

const fn column(title: &'static str, width: f64, align: Align, color: Rgb) -> Column {
    Column {
        title,
        width,
        align,
        color,
        bold: false,
        font_pt: BODY_FONT_PT,
    }
}

pub const HIGH_COLUMN: usize = 5;
pub const CLOSE_COLUMN: usize = 6;
pub const PERFORMANCE_COLUMN: usize = 10;

pub const COLUMNS: [Column; 11] = [
    column("Date", 14.0, Align::Left, Rgb::TEXT),
    Column {
        bold: true,
        ..column("Instrument", 15.0, Align::Left, Rgb::ACCENT_BLUE)
    },
    column("Entry", 14.0, Align::Right, Rgb::TEXT),
    column("Target R1", 17.0, Align::Right, Rgb::SUCCESS_GREEN),
    column("Target Max", 17.0, Align::Right, Rgb::WARNING_RED),
    column("High", 17.0, Align::Right, Rgb::TEXT),
    column("Close", 17.0, Align::Right, Rgb::TEXT),
    column("Cpty", 14.0, Align::Left, Rgb::TEXT),
    Column {
        font_pt: 7.0,
        ..column("Cpty Vol", 16.0, Align::Right, Rgb::TEXT)
    },
    column("Cpty Avg", 17.0, Align::Right, Rgb::TEXT),
    column("Performance", 28.0, Align::Center, Rgb::TEXT),
];

pub fn table_width() -> f64 {
    COLUMNS.iter().map(|c| c.width).sum()
}

/// Cell content: the value line and an optional gain annotation line (empty when absent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellText {
    pub primary: String,
    pub annotation: String,
}

impl CellText {
    fn plain(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            annotation: String::new(),
        }
    }

    fn with_gain(value: Option<f64>, gain: Option<f64>) -> Self {
        Self {
            primary: format_number(value),
            annotation: format_gain(gain),
        }
    }
}

pub fn row_cells(record: &AnalysisRecord) -> [CellText; 11] {
    let entry = record.entry_price;
    [
        CellText::plain(record.date.format("%-d-%b").to_string()),
        CellText::plain(record.instrument.clone()),
        CellText::plain(format_number(entry)),
        CellText::with_gain(record.target_r1, gain_percent(entry, record.target_r1)),
        CellText::with_gain(record.target_max, gain_percent(entry, record.target_max)),
        CellText::with_gain(record.realized_high, gain_percent(entry, record.realized_high)),
        CellText::with_gain(record.realized_close, gain_percent(entry, record.realized_close)),
        CellText::plain(record.counterparty_name().unwrap_or("-")),
        CellText::plain(format_number(record.counterparty_volume)),
        CellText::with_gain(
            record.counterparty_avg_price,
            gain_percent(record.counterparty_avg_price, entry),
        ),
        CellText::plain(""),
    ]
}

/// Text colour and weight of a realized high/close cell, by tier precedence.
pub fn realized_style(record: &AnalysisRecord, value: Option<f64>, column: &Column) -> (Rgb, bool) {
    let entry = record.entry_price.filter(|v| *v > 0.0);
    let value = value.filter(|v| *v > 0.0);
    if entry.is_none() || value.is_none() {
        return (column.color, column.bold);
    }
    match classify_tier(entry, record.target_r1, record.target_max, value) {
        Tier::Max => (Rgb::WARNING_RED, true),
        Tier::R1 => (Rgb::SUCCESS_GREEN, true),
        Tier::Partial => (Rgb::AMBER, true),
        Tier::None => (Rgb::TEXT, false),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableLayout {
    pub x: f64,
    pub start_y: f64,
    /// Where the table resumes on continuation pages.
    pub top_margin: f64,
    pub bottom_margin: f64,
    pub header_height: f64,
    pub row_height: f64,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            x: 12.0,
            start_y: 34.5,
            top_margin: 12.0,
            bottom_margin: 16.0,
            header_height: 8.0,
            row_height: 10.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TableOutcome {
    /// Pages the table touched, counting the one it started on.
    pub pages: usize,
}

fn baseline(center_y: f64, size_pt: f64) -> f64 {
    center_y + size_pt * PT_TO_MM * 0.35
}

fn anchor_x(x: f64, width: f64, align: Align, padding: f64) -> f64 {
    match align {
        Align::Left => x + padding,
        Align::Center => x + width / 2.0,
        Align::Right => x + width - padding,
    }
}

fn draw_header(surface: &mut dyn Surface, layout: &TableLayout, y: f64) {
    surface.rect(layout.x, y, table_width(), layout.header_height, Rgb::HEADER_FILL);
    let style = TextStyle::new(BODY_FONT_PT, Rgb::WHITE)
        .bold(true)
        .align(Align::Center);
    let center_y = y + layout.header_height / 2.0;
    let mut x = layout.x;
    for c in &COLUMNS {
        surface.text(x + c.width / 2.0, baseline(center_y, BODY_FONT_PT), c.title, style);
        x += c.width;
    }
}

fn draw_row(surface: &mut dyn Surface, layout: &TableLayout, y: f64, record: &AnalysisRecord) {
    let cells = row_cells(record);
    let center_y = y + layout.row_height / 2.0;
    let mut x = layout.x;

    for (idx, (c, cell)) in COLUMNS.iter().zip(cells.iter()).enumerate() {
        if idx == PERFORMANCE_COLUMN {
            timeline::render(
                surface,
                record,
                CellRect {
                    x,
                    y,
                    width: c.width,
                    height: layout.row_height,
                },
            );
            x += c.width;
            continue;
        }

        let (color, bold) = match idx {
            HIGH_COLUMN => realized_style(record, record.realized_high, c),
            CLOSE_COLUMN => realized_style(record, record.realized_close, c),
            _ => (c.color, c.bold),
        };
        let style = TextStyle::new(c.font_pt, color).bold(bold).align(c.align);

        if cell.annotation.is_empty() {
            let ax = anchor_x(x, c.width, c.align, CELL_PADDING_X);
            surface.text(ax, baseline(center_y, c.font_pt), &cell.primary, style);
        } else {
            let ax = anchor_x(x, c.width, Align::Right, ANNOTATED_PADDING_X);
            surface.text(ax, center_y - 1.0, &cell.primary, style.align(Align::Right));
            surface.text(
                ax,
                center_y + 3.5,
                &cell.annotation,
                TextStyle::new(ANNOTATION_FONT_PT, Rgb::SUBTLE).align(Align::Right),
            );
        }
        x += c.width;
    }
}

/// Draws header and rows from `layout.start_y`, repeating the header on each continuation page.
/// An empty `records` slice renders a single row carrying `empty_message`.
pub fn draw_table(
    surface: &mut dyn Surface,
    layout: &TableLayout,
    records: &[AnalysisRecord],
    empty_message: &str,
) -> TableOutcome {
    let first_page = surface.page_count();
    let (_, page_height) = surface.page_size();
    let limit = page_height - layout.bottom_margin;

    let mut y = layout.start_y;
    draw_header(surface, layout, y);
    y += layout.header_height;

    if records.is_empty() {
        let style = TextStyle::new(BODY_FONT_PT, Rgb::SUBTLE).align(Align::Center);
        let center_y = y + layout.row_height / 2.0;
        surface.text(
            layout.x + table_width() / 2.0,
            baseline(center_y, BODY_FONT_PT),
            empty_message,
            style,
        );
        y += layout.row_height;
    }

    for (i, record) in records.iter().enumerate() {
        if y + layout.row_height > limit {
            surface.add_page();
            y = layout.top_margin;
            draw_header(surface, layout, y);
            y += layout.header_height;
        }
        if i % 2 == 1 {
            surface.rect(layout.x, y, table_width(), layout.row_height, Rgb::ALT_ROW_FILL);
        }
        draw_row(surface, layout, y, record);
        y += layout.row_height;
    }

    TableOutcome {
        pages: surface.page_count() - first_page + 1,
    }
}
