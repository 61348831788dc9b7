//! Inline per-row price timeline: every known price point of one record on a single scaled axis.

use crate::domain::record::AnalysisRecord;
use crate::metrics::{classify_tier, Tier};
use crate::report::surface::{Rgb, Stroke, Surface};

const PADDING_X: f64 = 4.0;
const GUIDE_INSET_Y: f64 = 2.0;
const GUIDE_OPACITY: f64 = 0.3;
const GUIDE_WIDTH: f64 = 0.4;
const MARKER_RADIUS: f64 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricePoint {
    Entry,
    TargetR1,
    TargetMax,
    High,
    Close,
}

/// Vertical target line spanning the row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Guide {
    pub point: PricePoint,
    pub x: f64,
    pub y_top: f64,
    pub y_bottom: f64,
    pub stroke: Stroke,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marker {
    pub point: PricePoint,
    pub x: f64,
    pub y: f64,
    pub fill: Rgb,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelinePlan {
    pub domain: (f64, f64),
    pub guides: Vec<Guide>,
    pub markers: Vec<Marker>,
}

/// Linear map of the padded price domain onto the cell's drawable width.
#[derive(Debug, Clone, Copy)]
struct Scale {
    min: f64,
    range: f64,
    left: f64,
    width: f64,
}

impl Scale {
    fn x(&self, price: f64) -> f64 {
        self.left + (price - self.min) / self.range * self.width
    }
}

fn present(v: Option<f64>) -> Option<f64> {
    v.filter(|p| p.is_finite() && *p > 0.0)
}

/// Geometry and colours for one record. `None` when the record has no usable price.
pub fn plan(record: &AnalysisRecord, cell: CellRect) -> Option<TimelinePlan> {
    let entry = present(record.entry_price);
    let r1 = present(record.target_r1);
    let max = present(record.target_max);
    let high = present(record.realized_high);
    let close = present(record.realized_close);

    let prices: Vec<f64> = [entry, r1, max, high, close].into_iter().flatten().collect();
    if prices.is_empty() {
        return None;
    }

    let lo = prices.iter().copied().fold(f64::INFINITY, f64::min) * 0.98;
    let hi = prices.iter().copied().fold(f64::NEG_INFINITY, f64::max) * 1.02;
    let range = if hi - lo > 0.0 { hi - lo } else { 1.0 };
    let scale = Scale {
        min: lo,
        range,
        left: cell.x + PADDING_X,
        width: cell.width - 2.0 * PADDING_X,
    };
    let center_y = cell.y + cell.height / 2.0;

    let mut guides = Vec::with_capacity(2);
    for (point, price, color) in [
        (PricePoint::TargetR1, r1, Rgb::SUCCESS_GREEN),
        (PricePoint::TargetMax, max, Rgb::WARNING_RED),
    ] {
        if let Some(price) = price {
            guides.push(Guide {
                point,
                x: scale.x(price),
                y_top: cell.y + GUIDE_INSET_Y,
                y_bottom: cell.y + cell.height - GUIDE_INSET_Y,
                stroke: Stroke {
                    color,
                    width: GUIDE_WIDTH,
                    opacity: GUIDE_OPACITY,
                },
            });
        }
    }

    let mut markers = Vec::with_capacity(3);
    if let Some(price) = entry {
        markers.push(Marker {
            point: PricePoint::Entry,
            x: scale.x(price),
            y: center_y,
            fill: Rgb::NEUTRAL,
        });
    }
    for (point, price, fallback) in [
        (PricePoint::High, high, Rgb::NEUTRAL),
        (PricePoint::Close, close, Rgb::NEAR_BLACK),
    ] {
        if let Some(price) = price {
            markers.push(Marker {
                point,
                x: scale.x(price),
                y: center_y,
                fill: marker_color(record, price, fallback),
            });
        }
    }

    Some(TimelinePlan {
        domain: (lo, hi),
        guides,
        markers,
    })
}

fn marker_color(record: &AnalysisRecord, achieved: f64, fallback: Rgb) -> Rgb {
    match classify_tier(None, record.target_r1, record.target_max, Some(achieved)) {
        Tier::Max => Rgb::WARNING_RED,
        Tier::R1 => Rgb::SUCCESS_GREEN,
        Tier::Partial | Tier::None => fallback,
    }
}

pub fn draw(surface: &mut dyn Surface, plan: &TimelinePlan) {
    for g in &plan.guides {
        surface.line(g.x, g.y_top, g.x, g.y_bottom, g.stroke);
    }
    for m in &plan.markers {
        surface.circle(m.x, m.y, MARKER_RADIUS, m.fill);
    }
}

pub fn render(surface: &mut dyn Surface, record: &AnalysisRecord, cell: CellRect) {
    if let Some(plan) = plan(record, cell) {
        draw(surface, &plan);
    }
}
