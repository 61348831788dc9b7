use crate::report::surface::{Align, Rgb, Stroke, Surface, TextStyle};
use std::fmt::Write as _;

pub const A4_WIDTH_MM: f64 = 210.0;
pub const A4_HEIGHT_MM: f64 = 297.0;

const PT_TO_MM: f64 = 0.3528;

/// Paginated document rendered as one inline SVG per page inside a print-ready HTML file.
#[derive(Debug, Clone)]
pub struct SvgDocument {
    width: f64,
    height: f64,
    pages: Vec<String>,
}

impl SvgDocument {
    pub fn a4_portrait() -> Self {
        Self {
            width: A4_WIDTH_MM,
            height: A4_HEIGHT_MM,
            pages: vec![String::new()],
        }
    }

    fn current(&mut self) -> &mut String {
        if self.pages.is_empty() {
            self.pages.push(String::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn finish(self, title: &str) -> String {
        let mut html = String::new();
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n\
             <style>\n@page {{ size: A4 portrait; margin: 0; }}\n\
             body {{ margin: 0; background: #e5e7eb; }}\n\
             svg.page {{ display: block; margin: 0 auto 8mm; background: #ffffff; page-break-after: always; }}\n\
             svg.page:last-of-type {{ page-break-after: auto; }}\n\
             @media print {{ body {{ background: none; }} svg.page {{ margin: 0; }} }}\n\
             </style>\n</head>\n<body>\n",
            escape(title)
        );
        for body in &self.pages {
            let _ = write!(
                html,
                "<svg class=\"page\" xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}mm\" height=\"{h}mm\" \
                 viewBox=\"0 0 {w} {h}\" font-family=\"Helvetica, Arial, sans-serif\">\n{body}</svg>\n",
                w = self.width,
                h = self.height,
            );
        }
        html.push_str("</body>\n</html>\n");
        html
    }
}

impl Surface for SvgDocument {
    fn page_size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn add_page(&mut self) {
        self.pages.push(String::new());
    }

    fn page_count(&self) -> usize {
        self.pages.len().max(1)
    }

    fn text(&mut self, x: f64, y: f64, text: &str, style: TextStyle) {
        let anchor = match style.align {
            Align::Left => "start",
            Align::Center => "middle",
            Align::Right => "end",
        };
        let weight = if style.bold { "bold" } else { "normal" };
        let line = format!(
            "<text x=\"{x:.2}\" y=\"{y:.2}\" font-size=\"{:.2}\" font-weight=\"{weight}\" fill=\"{}\" text-anchor=\"{anchor}\">{}</text>\n",
            style.size_pt * PT_TO_MM,
            style.color.hex(),
            escape(text)
        );
        self.current().push_str(&line);
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, stroke: Stroke) {
        let line = format!(
            "<line x1=\"{x1:.2}\" y1=\"{y1:.2}\" x2=\"{x2:.2}\" y2=\"{y2:.2}\" stroke=\"{}\" stroke-width=\"{:.2}\" stroke-opacity=\"{:.2}\"/>\n",
            stroke.color.hex(),
            stroke.width,
            stroke.opacity
        );
        self.current().push_str(&line);
    }

    fn circle(&mut self, cx: f64, cy: f64, r: f64, fill: Rgb) {
        let line = format!(
            "<circle cx=\"{cx:.2}\" cy=\"{cy:.2}\" r=\"{r:.2}\" fill=\"{}\"/>\n",
            fill.hex()
        );
        self.current().push_str(&line);
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64, fill: Rgb) {
        let line = format!(
            "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{width:.2}\" height=\"{height:.2}\" fill=\"{}\"/>\n",
            fill.hex()
        );
        self.current().push_str(&line);
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
