//! Map a defect's location text back onto an overlay rectangle.
//!
//! Locations look like `"(851, 501) — 517x52px"` or `"(851, 501)"`. Every run
//! of ASCII digits is read left to right; four or more give `x, y, w, h`, two
//! or three give only the origin. The rectangle is padded by 2px on each side
//! and the caption sits 24px above the element.

use tracing::debug;

use crate::model::{Defect, LocatedDefect, Overlay};

const PADDING: u32 = 2;
const LABEL_OFFSET: u32 = 24;
const DEFAULT_WIDTH: u32 = 200;
const DEFAULT_HEIGHT: u32 = 50;

/// Severity literal to presentation colour class.
pub const SEVERITY_COLOR_CLASSES: &[(&str, &str)] = &[
    ("critical", "danger"),
    ("high", "warning"),
    ("medium", "info"),
];

const FALLBACK_COLOR_CLASS: &str = "info";

pub fn color_class(severity: &str) -> &'static str {
    SEVERITY_COLOR_CLASSES
        .iter()
        .find(|(name, _)| *name == severity)
        .map(|(_, class)| *class)
        .unwrap_or(FALLBACK_COLOR_CLASS)
}

/// Origin plus the size, when the text carried one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedLocation {
    pub x: u32,
    pub y: u32,
    pub size: Option<(u32, u32)>,
}

/// Every run of ASCII digits, in order. Runs too large for `u32` saturate.
pub fn integer_runs(text: &str) -> Vec<u32> {
    let mut out = Vec::new();
    let mut current: Option<u64> = None;
    for ch in text.chars() {
        match ch.to_digit(10) {
            Some(d) => {
                let next = current.unwrap_or(0).saturating_mul(10).saturating_add(u64::from(d));
                current = Some(next.min(u64::from(u32::MAX)));
            }
            None => {
                if let Some(value) = current.take() {
                    out.push(value as u32);
                }
            }
        }
    }
    if let Some(value) = current {
        out.push(value as u32);
    }
    out
}

/// `None` when fewer than two numbers are present.
pub fn parse_location(location: &str) -> Option<ParsedLocation> {
    match integer_runs(location).as_slice() {
        [x, y, w, h, ..] => Some(ParsedLocation {
            x: *x,
            y: *y,
            size: Some((*w, *h)),
        }),
        [x, y, ..] => Some(ParsedLocation {
            x: *x,
            y: *y,
            size: None,
        }),
        _ => None,
    }
}

fn padded(x: u32, y: u32, w: u32, h: u32, severity: &str) -> Overlay {
    Overlay {
        x: x.saturating_sub(PADDING),
        y: y.saturating_sub(PADDING),
        w: w.saturating_add(PADDING * 2),
        h: h.saturating_add(PADDING * 2),
        label_x: x,
        label_y: y.saturating_sub(LABEL_OFFSET),
        color_class: color_class(severity).to_string(),
    }
}

/// Overlay for one defect. Missing geometry falls back to a 200x50 box,
/// at the origin when no coordinates could be read.
pub fn locate(defect: &Defect) -> Overlay {
    let (x, y, w, h) = match parse_location(&defect.location) {
        Some(ParsedLocation {
            x,
            y,
            size: Some((w, h)),
        }) => (x, y, w, h),
        Some(ParsedLocation { x, y, size: None }) => (x, y, DEFAULT_WIDTH, DEFAULT_HEIGHT),
        None => (0, 0, DEFAULT_WIDTH, DEFAULT_HEIGHT),
    };
    padded(x, y, w, h, defect.severity.as_str())
}

/// Overlays for every defect that states a non-empty size. Others stay in the
/// textual report but get no rectangle; `idx` points back into `defects`.
pub fn locate_all(defects: &[Defect]) -> Vec<LocatedDefect> {
    let located: Vec<LocatedDefect> = defects
        .iter()
        .enumerate()
        .filter_map(|(idx, defect)| {
            let parsed = parse_location(&defect.location)?;
            let (w, h) = parsed.size?;
            if w == 0 || h == 0 {
                return None;
            }
            Some(LocatedDefect {
                idx,
                defect: defect.clone(),
                overlay: padded(parsed.x, parsed.y, w, h, defect.severity.as_str()),
            })
        })
        .collect();
    debug!(total = defects.len(), located = located.len(), "located defects");
    located
}
