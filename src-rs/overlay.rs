use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgba, RgbaImage};

use crate::model::{BoundingBox, LocatedDefect};

const OUTLINE_THICKNESS: i64 = 3;
const REGION_COLOR: Rgba<u8> = Rgba([255, 69, 58, 255]);
const LABEL_TEXT: Rgba<u8> = Rgba([255, 255, 255, 255]);
const LABEL_PAD: i64 = 3;
const LABEL_SCALE: u32 = 2;
const LABEL_ALPHA: u8 = 200;

pub fn class_color(color_class: &str) -> Rgba<u8> {
    match color_class {
        "danger" => Rgba([220, 53, 69, 255]),
        "warning" => Rgba([255, 193, 7, 255]),
        _ => Rgba([13, 202, 240, 255]),
    }
}

/// Outline each defect in its colour class and caption it with its index.
pub fn render_defect_overlay(base: &RgbaImage, located: &[LocatedDefect]) -> RgbaImage {
    let mut out = base.clone();
    for item in located {
        let overlay = &item.overlay;
        let color = class_color(&overlay.color_class);
        outline(&mut out, overlay.x, overlay.y, overlay.w, overlay.h, color);

        let caption = format!("#{}", item.idx + 1);
        let (x, y) = (i64::from(overlay.label_x), i64::from(overlay.label_y));
        let (w, h) = caption_extent(&caption, LABEL_SCALE);
        let mut background = color;
        background.0[3] = LABEL_ALPHA;
        fill(
            &mut out,
            (x - LABEL_PAD, y - LABEL_PAD),
            (x + w + LABEL_PAD, y + h + LABEL_PAD),
            background,
        );
        draw_caption(&mut out, (x, y), &caption, LABEL_TEXT, LABEL_SCALE);
    }
    out
}

pub fn render_region_overlay(base: &RgbaImage, regions: &[BoundingBox]) -> RgbaImage {
    let mut out = base.clone();
    for region in regions {
        outline(
            &mut out,
            region.x,
            region.y,
            region.width,
            region.height,
            REGION_COLOR,
        );
    }
    out
}

/// Inclusive corners clipped to the canvas, `None` when nothing is visible.
fn clip(img: &RgbaImage, from: (i64, i64), to: (i64, i64)) -> Option<((u32, u32), (u32, u32))> {
    let max_x = i64::from(img.width()) - 1;
    let max_y = i64::from(img.height()) - 1;
    let (lo_x, hi_x) = (from.0.min(to.0).max(0), from.0.max(to.0).min(max_x));
    let (lo_y, hi_y) = (from.1.min(to.1).max(0), from.1.max(to.1).min(max_y));
    if lo_x > hi_x || lo_y > hi_y {
        return None;
    }
    Some(((lo_x as u32, lo_y as u32), (hi_x as u32, hi_y as u32)))
}

fn fill(img: &mut RgbaImage, from: (i64, i64), to: (i64, i64), color: Rgba<u8>) {
    let Some(((x0, y0), (x1, y1))) = clip(img, from, to) else {
        return;
    };
    for y in y0..=y1 {
        for x in x0..=x1 {
            let px = img.get_pixel_mut(x, y);
            *px = composite(*px, color);
        }
    }
}

/// Source-over in integer arithmetic; an opaque source replaces the pixel.
fn composite(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let a = u32::from(src[3]);
    let keep = 255 - a;
    let channel = |d: u8, s: u8| ((u32::from(d) * keep + u32::from(s) * a + 127) / 255) as u8;
    let alpha = a + (u32::from(dst[3]) * keep + 127) / 255;
    Rgba([
        channel(dst[0], src[0]),
        channel(dst[1], src[1]),
        channel(dst[2], src[2]),
        alpha.min(255) as u8,
    ])
}

/// Box border growing outward from the box edge. The far edges are pulled in
/// to the canvas so a box running off-canvas still shows its visible corner.
fn outline(img: &mut RgbaImage, x: u32, y: u32, w: u32, h: u32, color: Rgba<u8>) {
    if w == 0 || h == 0 || x >= img.width() || y >= img.height() {
        return;
    }
    let left = i64::from(x);
    let top = i64::from(y);
    let right = (left + i64::from(w) - 1).min(i64::from(img.width()) - 1);
    let bottom = (top + i64::from(h) - 1).min(i64::from(img.height()) - 1);
    let grow = OUTLINE_THICKNESS - 1;

    fill(img, (left - grow, top - grow), (right + grow, top), color);
    fill(img, (left - grow, bottom), (right + grow, bottom + grow), color);
    fill(img, (left - grow, top - grow), (left, bottom + grow), color);
    fill(img, (right, top - grow), (right + grow, bottom + grow), color);
}

fn caption_extent(text: &str, scale: u32) -> (i64, i64) {
    let glyph = 8 * i64::from(scale.max(1));
    (text.chars().count() as i64 * glyph, glyph)
}

fn draw_caption(
    img: &mut RgbaImage,
    origin: (i64, i64),
    text: &str,
    color: Rgba<u8>,
    scale: u32,
) {
    let cell = i64::from(scale.max(1));
    for (i, ch) in text.chars().enumerate() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            continue;
        };
        let glyph_x = origin.0 + i as i64 * 8 * cell;
        for (row, &bits) in glyph.iter().enumerate() {
            for col in 0..8u8 {
                if (bits >> col) & 1 == 0 {
                    continue;
                }
                let px = glyph_x + i64::from(col) * cell;
                let py = origin.1 + row as i64 * cell;
                fill(img, (px, py), (px + cell - 1, py + cell - 1), color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Defect, DefectSource, DefectStatus, Overlay, Severity};

    fn located(x: u32, y: u32, w: u32, h: u32, color_class: &str) -> LocatedDefect {
        LocatedDefect {
            idx: 0,
            defect: Defect {
                element: "Div".to_string(),
                property: "width (overflow)".to_string(),
                expected: String::new(),
                actual: String::new(),
                selector: "div".to_string(),
                location: String::new(),
                severity: Severity::Critical,
                description: String::new(),
                css_fix: String::new(),
                source: DefectSource::Audit,
                status: DefectStatus::Fail,
            },
            overlay: Overlay {
                x,
                y,
                w,
                h,
                label_x: x,
                label_y: y.saturating_sub(24),
                color_class: color_class.to_string(),
            },
        }
    }

    #[test]
    fn defect_outline_uses_class_color() {
        let base = RgbaImage::from_pixel(120, 120, Rgba([0, 0, 0, 255]));
        let out = render_defect_overlay(&base, &[located(40, 60, 30, 20, "danger")]);
        assert_eq!(*out.get_pixel(55, 60), class_color("danger"));
        assert_eq!(*out.get_pixel(40, 70), class_color("danger"));
        assert_eq!(*out.get_pixel(55, 70), Rgba([0, 0, 0, 255]));
        // Caption background sits above the box.
        assert_ne!(*out.get_pixel(42, 38), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn drawing_clips_at_canvas_edge() {
        let base = RgbaImage::from_pixel(50, 50, Rgba([0, 0, 0, 255]));
        let out = render_defect_overlay(&base, &[located(45, 45, 200, 50, "info")]);
        assert_eq!(out.dimensions(), (50, 50));
        assert_eq!(*out.get_pixel(49, 49), class_color("info"));

        let off_canvas = render_defect_overlay(&base, &[located(500, 500, 10, 10, "info")]);
        assert_eq!(off_canvas, base);
    }

    #[test]
    fn region_overlay_outlines_boxes() {
        let base = RgbaImage::from_pixel(100, 100, Rgba([255, 255, 255, 255]));
        let out = render_region_overlay(
            &base,
            &[BoundingBox {
                x: 50,
                y: 50,
                width: 50,
                height: 50,
            }],
        );
        assert_eq!(*out.get_pixel(50, 75), REGION_COLOR);
        assert_eq!(*out.get_pixel(99, 99), REGION_COLOR);
        assert_eq!(*out.get_pixel(75, 75), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn translucent_fill_mixes_with_base() {
        let mixed = composite(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 200]));
        assert_eq!(mixed, Rgba([200, 200, 200, 255]));
        assert_eq!(
            composite(Rgba([1, 2, 3, 255]), Rgba([9, 9, 9, 0])),
            Rgba([1, 2, 3, 255])
        );
    }

    #[test]
    fn unknown_class_uses_info_color() {
        assert_eq!(class_color("mystery"), class_color("info"));
    }
}
