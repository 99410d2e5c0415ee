use tracing::{debug, warn};

use crate::config::AuditConfig;
use crate::model::{clip_chars, ElementRect, StyleRecord};
use crate::page::{ElementSample, PageProbe, SampleRect};

const TEXT_CHARS: usize = 50;
const SELECTOR_CLASS_TOKENS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub selector: &'static str,
    pub name: &'static str,
}

/// Element categories queried on every page, in report order.
pub const ELEMENT_CATALOG: &[CatalogEntry] = &[
    CatalogEntry { selector: "h1", name: "H1 Heading" },
    CatalogEntry { selector: "h2", name: "H2 Heading" },
    CatalogEntry { selector: "h3", name: "H3 Heading" },
    CatalogEntry { selector: "h4", name: "H4 Heading" },
    CatalogEntry { selector: "p", name: "Paragraph" },
    CatalogEntry { selector: "a", name: "Anchor Link" },
    CatalogEntry { selector: "button, .btn, [type=\"submit\"]", name: "Button" },
    CatalogEntry { selector: "img", name: "Image" },
    CatalogEntry { selector: "nav, header, [role=\"navigation\"]", name: "Navigation" },
    CatalogEntry { selector: "footer", name: "Footer" },
    CatalogEntry { selector: "input, textarea, select", name: "Form Input" },
    CatalogEntry { selector: "li", name: "List Item" },
    CatalogEntry { selector: "span", name: "Span" },
    CatalogEntry { selector: "div", name: "Div Container" },
];

/// Computed properties read for every element.
pub const STYLE_PROPERTIES: &[&str] = &[
    "font-size",
    "font-family",
    "font-weight",
    "color",
    "background-color",
    "line-height",
    "padding",
    "margin",
    "border",
    "border-radius",
    "text-decoration",
    "text-align",
    "width",
    "height",
    "display",
    "position",
];

/// Walk the catalog and record up to `per_category_limit` visible elements per
/// category. A category whose query fails is skipped.
pub fn extract_live_styles(page: &dyn PageProbe, config: &AuditConfig) -> Vec<StyleRecord> {
    let mut records = Vec::new();

    for entry in ELEMENT_CATALOG {
        let samples = match page.query_all(entry.selector, STYLE_PROPERTIES) {
            Ok(samples) => samples,
            Err(err) => {
                warn!(
                    selector = entry.selector,
                    error = %err,
                    "style query failed, skipping category"
                );
                continue;
            }
        };

        // Instance numbering counts skipped samples too.
        for (idx, sample) in samples.iter().take(config.per_category_limit).enumerate() {
            if sample.rect.width == 0.0 && sample.rect.height == 0.0 {
                continue;
            }
            if sample.rect.y > config.offscreen_cutoff {
                continue;
            }
            records.push(style_record(entry, idx, sample));
        }
    }

    debug!(count = records.len(), "extracted live element styles");
    records
}

fn style_record(entry: &CatalogEntry, idx: usize, sample: &ElementSample) -> StyleRecord {
    let tag = sample.tag.to_ascii_lowercase();
    let name = if idx > 0 {
        format!("{} #{}", entry.name, idx + 1)
    } else {
        entry.name.to_string()
    };

    StyleRecord {
        selector: element_selector(&tag, &sample.class_name),
        name,
        text: clip_chars(sample.text.trim(), TEXT_CHARS),
        tag,
        styles: sample.styles.clone(),
        position: round_rect(sample.rect),
    }
}

/// `tag.class1.class2.class3`, or the bare tag without classes.
pub fn element_selector(tag: &str, class_name: &str) -> String {
    let classes: Vec<&str> = class_name
        .split_whitespace()
        .take(SELECTOR_CLASS_TOKENS)
        .collect();
    if classes.is_empty() {
        tag.to_string()
    } else {
        format!("{tag}.{}", classes.join("."))
    }
}

/// Halves round toward positive infinity, as browsers do for layout values.
fn round_half_up(value: f64) -> i64 {
    if value.is_finite() {
        (value + 0.5).floor() as i64
    } else {
        0
    }
}

pub(crate) fn round_rect(rect: SampleRect) -> ElementRect {
    ElementRect {
        x: round_half_up(rect.x),
        y: round_half_up(rect.y),
        width: round_half_up(rect.width),
        height: round_half_up(rect.height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageError;
    use crate::page::tests::sample;
    use crate::page::{PageSnapshot, SnapshotPage};
    use std::collections::BTreeMap;
    use std::time::Duration;

    fn snapshot_page(entries: Vec<(&str, Vec<ElementSample>)>) -> SnapshotPage {
        let elements: BTreeMap<String, Vec<ElementSample>> = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        SnapshotPage::new(PageSnapshot {
            elements,
            ..PageSnapshot::default()
        })
    }

    #[test]
    fn records_follow_catalog_order_and_naming() {
        let mut para = sample(
            "P",
            "  Body copy that keeps going  ",
            (10.4, 20.5, 300.0, 18.0),
            &[],
        );
        para.class_name = "lead  text muted extra".to_string();
        let page = snapshot_page(vec![
            ("p", vec![para, sample("p", "Second", (0.0, 40.0, 300.0, 18.0), &[])]),
            ("h1", vec![sample("h1", "Title", (0.0, 0.0, 500.0, 40.0), &[])]),
        ]);
        let records = extract_live_styles(&page, &AuditConfig::default());
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["H1 Heading", "Paragraph", "Paragraph #2"]);

        let para = &records[1];
        assert_eq!(para.tag, "p");
        assert_eq!(para.selector, "p.lead.text.muted");
        assert_eq!(para.text, "Body copy that keeps going");
        assert_eq!(para.position.x, 10);
        assert_eq!(para.position.y, 21);
        assert_eq!(para.styles.len(), STYLE_PROPERTIES.len());
    }

    #[test]
    fn caps_each_category_and_skips_invisible() {
        let spans: Vec<ElementSample> = (0..8)
            .map(|i| {
                let size = if i == 1 { 0.0 } else { 10.0 };
                let y = if i == 2 { 6000.0 } else { i as f64 };
                sample("span", &format!("s{i}"), (0.0, y, size, size), &[])
            })
            .collect();
        let page = snapshot_page(vec![("span", spans)]);
        let records = extract_live_styles(&page, &AuditConfig::default());
        let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Span", "Span #4", "Span #5"]);
    }

    #[test]
    fn zero_width_image_with_height_is_kept() {
        let page = snapshot_page(vec![(
            "img",
            vec![sample("img", "", (0.0, 0.0, 0.0, 120.0), &[])],
        )]);
        let records = extract_live_styles(&page, &AuditConfig::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].position.width, 0);
    }

    #[test]
    fn long_text_is_truncated() {
        let text = "x".repeat(80);
        let page = snapshot_page(vec![(
            "li",
            vec![sample("li", &text, (0.0, 0.0, 5.0, 5.0), &[])],
        )]);
        let records = extract_live_styles(&page, &AuditConfig::default());
        assert_eq!(records[0].text.chars().count(), 50);
    }

    struct FailingPage;

    impl PageProbe for FailingPage {
        fn query_all(&self, selector: &str, _: &[&str]) -> Result<Vec<ElementSample>, PageError> {
            if selector == "h1" {
                Err(PageError::Query("detached frame".to_string()))
            } else if selector == "h2" {
                Ok(vec![sample("h2", "Sub", (0.0, 0.0, 10.0, 10.0), &[])])
            } else {
                Ok(Vec::new())
            }
        }

        fn locate_first(
            &self,
            selector: &str,
            _: &[&str],
            _: Duration,
        ) -> Result<ElementSample, PageError> {
            Err(PageError::NotFound(selector.to_string()))
        }
    }

    #[test]
    fn failed_category_query_is_skipped() {
        let records = extract_live_styles(&FailingPage, &AuditConfig::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag, "h2");
    }

    #[test]
    fn selector_and_rounding_helpers() {
        assert_eq!(element_selector("div", ""), "div");
        assert_eq!(element_selector("div", "  card  "), "div.card");
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(f64::NAN), 0);
    }
}
