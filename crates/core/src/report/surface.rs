//! Drawing primitives the report is written against. Units are millimetres, font sizes points.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const TEXT: Rgb = Rgb(40, 40, 40);
    pub const SUBTLE: Rgb = Rgb(100, 100, 100);
    pub const STATS: Rgb = Rgb(60, 60, 60);
    pub const FOOTER: Rgb = Rgb(150, 150, 150);
    pub const SUCCESS_GREEN: Rgb = Rgb(21, 128, 61);
    pub const WARNING_RED: Rgb = Rgb(185, 28, 28);
    pub const ACCENT_BLUE: Rgb = Rgb(37, 99, 235);
    pub const AMBER: Rgb = Rgb(180, 120, 0);
    pub const NEUTRAL: Rgb = Rgb(156, 163, 175);
    pub const NEAR_BLACK: Rgb = Rgb(31, 41, 55);
    pub const HEADER_FILL: Rgb = Rgb(20, 20, 31);
    pub const ALT_ROW_FILL: Rgb = Rgb(248, 249, 250);

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size_pt: f64,
    pub color: Rgb,
    pub bold: bool,
    pub align: Align,
}

impl TextStyle {
    pub fn new(size_pt: f64, color: Rgb) -> Self {
        Self {
            size_pt,
            color,
            bold: false,
            align: Align::Left,
        }
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgb,
    pub width: f64,
    pub opacity: f64,
}

pub trait Surface {
    /// (width, height) of a page.
    fn page_size(&self) -> (f64, f64);

    /// Starts a new page; subsequent calls draw on it.
    fn add_page(&mut self);

    /// Number of pages started so far (at least 1).
    fn page_count(&self) -> usize;

    /// `y` is the text baseline.
    fn text(&mut self, x: f64, y: f64, text: &str, style: TextStyle);

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, stroke: Stroke);

    fn circle(&mut self, cx: f64, cy: f64, r: f64, fill: Rgb);

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, fill: Rgb);
}
