//! Heuristic CSS audit of a live page.
//!
//! Checks run independently and append to one defect list in a fixed order:
//! design cross-check, same-tag consistency, container overflow, broken
//! images, zero-contrast text. Every defect carries a plain-language
//! description and a CSS snippet that can be pasted as a fix.
//!
//! Consistency uses the first element of each tag (in catalog then document
//! order) as the reference for the rest.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::AuditConfig;
use crate::design::{extract_expected, DesignData};
use crate::live::{element_selector, extract_live_styles, round_rect};
use crate::model::{
    clip_chars, Defect, DefectSource, DefectStatus, ExpectedSpec, InventoryRow, Severity,
    StyleRecord,
};
use crate::page::PageProbe;

/// Tags whose typography must agree with the first element of the same tag.
pub const CONSISTENCY_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "p", "a", "button", "li", "span"];
/// Block containers that must fit the design width.
pub const CONTAINER_TAGS: &[&str] = &["div", "nav", "header", "footer", "section", "main"];
/// Tags that carry readable text for the contrast check.
pub const READABLE_TAGS: &[&str] = &["p", "span", "a", "li", "h1", "h2", "h3", "h4", "button"];

const LABEL_TEXT_CHARS: usize = 25;
const INVENTORY_TEXT_CHARS: usize = 40;
const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditOutcome {
    pub defects: Vec<Defect>,
    pub inventory: Vec<InventoryRow>,
}

pub struct CssAuditor<'a> {
    page: &'a dyn PageProbe,
    config: &'a AuditConfig,
}

impl<'a> CssAuditor<'a> {
    pub fn new(page: &'a dyn PageProbe, config: &'a AuditConfig) -> Self {
        Self { page, config }
    }

    pub fn audit(
        &self,
        live: &[StyleRecord],
        expected: &[ExpectedSpec],
        design_width: Option<i64>,
    ) -> AuditOutcome {
        let mut defects = self.check_design_specs(expected);
        defects.extend(check_consistency(live));
        if let Some(width) = design_width {
            defects.extend(check_overflow(live, width, self.config.overflow_tolerance));
        }
        defects.extend(check_images(live));
        defects.extend(check_contrast(live));

        info!(
            defects = defects.len(),
            elements = live.len(),
            design_specs = expected.len(),
            "css audit complete"
        );

        AuditOutcome {
            defects,
            inventory: build_inventory(live),
        }
    }

    /// Compare each design expectation with the element found by its text.
    /// Any lookup failure, including a timeout, becomes one "not found" defect.
    pub fn check_design_specs(&self, expected: &[ExpectedSpec]) -> Vec<Defect> {
        let mut defects = Vec::new();

        for spec in expected {
            let properties: Vec<&str> = spec.expected.keys().map(String::as_str).collect();
            let sample = match self.page.locate_first(
                &spec.selector,
                &properties,
                self.config.lookup_timeout,
            ) {
                Ok(sample) => sample,
                Err(err) => {
                    debug!(selector = %spec.selector, error = %err, "design element lookup missed");
                    defects.push(self.not_found(spec));
                    continue;
                }
            };

            let selector = element_selector(&sample.tag.to_ascii_lowercase(), &sample.class_name);
            let location = round_rect(sample.rect).location_label();

            for (property, expected_value) in &spec.expected {
                let actual = sample.styles.get(property).map(String::as_str).unwrap_or("");
                if actual.trim() == expected_value.trim() {
                    continue;
                }
                defects.push(Defect {
                    element: spec.name.clone(),
                    property: property.clone(),
                    expected: expected_value.clone(),
                    actual: actual.to_string(),
                    selector: selector.clone(),
                    location: location.clone(),
                    severity: Severity::High,
                    description: format!(
                        "The design specifies {property}: {expected_value} for this text, but the live page renders {}.",
                        display_value(actual)
                    ),
                    css_fix: css_rule(&selector, &[(property.as_str(), expected_value.as_str())]),
                    source: DefectSource::Design,
                    status: DefectStatus::Fail,
                });
            }
        }

        defects
    }

    fn not_found(&self, spec: &ExpectedSpec) -> Defect {
        Defect {
            element: spec.name.clone(),
            property: "element_found".to_string(),
            expected: "visible".to_string(),
            actual: "not_found".to_string(),
            selector: spec.selector.clone(),
            location: String::new(),
            severity: Severity::High,
            description: format!(
                "No live element with this text appeared within {}ms. The copy may differ from the design, be truncated, or render too late.",
                self.config.lookup_timeout.as_millis()
            ),
            css_fix: format!(
                "/* Make sure the page renders this exact text: {} */",
                spec.selector
            ),
            source: DefectSource::Design,
            status: DefectStatus::Fail,
        }
    }
}

/// Full pipeline against an open page: design expectations, live styles, audit.
pub fn validate_css(
    page: &dyn PageProbe,
    design: &DesignData,
    config: &AuditConfig,
) -> AuditOutcome {
    let expected = extract_expected(design);
    let live = extract_live_styles(page, config);
    CssAuditor::new(page, config).audit(&live, &expected, design.screen_width())
}

struct TypographyReference<'r> {
    font_family: &'r str,
    font_size: &'r str,
    color: &'r str,
}

pub fn check_consistency(live: &[StyleRecord]) -> Vec<Defect> {
    let mut references: HashMap<&str, TypographyReference<'_>> = HashMap::new();
    let mut defects = Vec::new();

    for el in live {
        let tag = el.tag.as_str();
        if !CONSISTENCY_TAGS.contains(&tag) {
            continue;
        }
        let Some(reference) = references.get(tag) else {
            references.insert(
                tag,
                TypographyReference {
                    font_family: el.style("font-family"),
                    font_size: el.style("font-size"),
                    color: el.style("color"),
                },
            );
            continue;
        };

        let upper = tag.to_ascii_uppercase();
        let font_family = el.style("font-family");
        let font_size = el.style("font-size");
        let color = el.style("color");

        if font_family != reference.font_family {
            defects.push(typography_defect(
                el,
                "font-family",
                reference.font_family,
                font_family,
                Severity::Medium,
                DefectStatus::Warn,
                format!(
                    "This {upper} uses a different font-family than the first {upper} on the page. All {upper} elements should share one font for visual consistency."
                ),
            ));
        }
        if font_size != reference.font_size {
            defects.push(typography_defect(
                el,
                "font-size",
                reference.font_size,
                font_size,
                Severity::High,
                DefectStatus::Fail,
                format!(
                    "Font size mismatch: this {upper} is {font_size} but the primary {upper} is {}. This breaks the visual hierarchy and likely departs from the design.",
                    reference.font_size
                ),
            ));
        }
        if color != reference.color {
            defects.push(typography_defect(
                el,
                "color",
                reference.color,
                color,
                Severity::Medium,
                DefectStatus::Warn,
                format!(
                    "Text color inconsistency: this {upper} has color {color} but the primary {upper} uses {}.",
                    reference.color
                ),
            ));
        }
    }

    defects
}

fn typography_defect(
    el: &StyleRecord,
    property: &str,
    expected: &str,
    actual: &str,
    severity: Severity,
    status: DefectStatus,
    description: String,
) -> Defect {
    Defect {
        element: text_label(el),
        property: property.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
        selector: el.selector.clone(),
        location: el.position.location_label(),
        severity,
        description,
        css_fix: css_rule(&el.selector, &[(property, expected)]),
        source: DefectSource::Audit,
        status,
    }
}

pub fn check_overflow(live: &[StyleRecord], design_width: i64, tolerance: i64) -> Vec<Defect> {
    live.iter()
        .filter(|el| CONTAINER_TAGS.contains(&el.tag.as_str()))
        .filter(|el| el.position.width > design_width + tolerance)
        .map(|el| {
            let width = el.position.width;
            let max_width = format!("{design_width}px");
            Defect {
                element: selector_label(el),
                property: "width (overflow)".to_string(),
                expected: format!("<= {design_width}px"),
                actual: format!("{width}px"),
                selector: el.selector.clone(),
                location: el.position.origin_label(),
                severity: Severity::Critical,
                description: format!(
                    "This element is {}px wider than the design width ({design_width}px), which causes a horizontal scrollbar and layout overflow.",
                    width - design_width
                ),
                css_fix: css_rule(
                    &el.selector,
                    &[
                        ("max-width", max_width.as_str()),
                        ("overflow-x", "hidden"),
                    ],
                ),
                source: DefectSource::Audit,
                status: DefectStatus::Fail,
            }
        })
        .collect()
}

pub fn check_images(live: &[StyleRecord]) -> Vec<Defect> {
    live.iter()
        .filter(|el| el.tag == "img")
        .filter(|el| el.position.width == 0 || el.position.height == 0)
        .map(|el| Defect {
            element: selector_label(el),
            property: "dimensions".to_string(),
            expected: "visible width & height > 0".to_string(),
            actual: format!(
                "{}x{}px (broken/hidden)",
                el.position.width, el.position.height
            ),
            selector: el.selector.clone(),
            location: el.position.origin_label(),
            severity: Severity::High,
            description: "This image has zero width or height. It is either broken (missing src), hidden by CSS, or has not loaded. Check the src attribute and any rules hiding it.".to_string(),
            css_fix: format!(
                "/* Check the img src attribute in HTML */\n{}",
                css_rule(
                    &el.selector,
                    &[
                        ("display", "block"),
                        ("min-width", "100px"),
                        ("min-height", "100px"),
                    ],
                )
            ),
            source: DefectSource::Audit,
            status: DefectStatus::Fail,
        })
        .collect()
}

pub fn check_contrast(live: &[StyleRecord]) -> Vec<Defect> {
    live.iter()
        .filter(|el| READABLE_TAGS.contains(&el.tag.as_str()))
        .filter_map(|el| {
            let color = el.style("color");
            let background = el.style("background-color");
            if color.is_empty() || background.is_empty() || color != background {
                return None;
            }
            Some(Defect {
                element: text_label(el),
                property: "color vs background-color".to_string(),
                expected: "text and background must differ".to_string(),
                actual: format!("both are {color}"),
                selector: el.selector.clone(),
                location: el.position.location_label(),
                severity: Severity::Critical,
                description: format!(
                    "Invisible text: the text color and background color are both {color}, so users cannot read this element. This is an accessibility violation (WCAG 2.1)."
                ),
                css_fix: format!(
                    "{} {{\n  color: #333333; /* or another contrasting color */\n  /* OR */\n  background-color: transparent;\n}}",
                    el.selector
                ),
                source: DefectSource::Audit,
                status: DefectStatus::Fail,
            })
        })
        .collect()
}

pub fn build_inventory(live: &[StyleRecord]) -> Vec<InventoryRow> {
    live.iter()
        .map(|el| {
            let value = |property: &str| {
                el.styles
                    .get(property)
                    .cloned()
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string())
            };
            InventoryRow {
                element: el.name.clone(),
                selector: el.selector.clone(),
                text: clip_chars(&el.text, INVENTORY_TEXT_CHARS),
                position: el.position.origin_label(),
                size: el.position.size_label(),
                font: clip_chars(&value("font-family"), INVENTORY_TEXT_CHARS),
                font_size: value("font-size"),
                font_weight: value("font-weight"),
                color: value("color"),
                bg_color: value("background-color"),
                line_height: value("line-height"),
                padding: value("padding"),
                margin: value("margin"),
            }
        })
        .collect()
}

fn text_label(el: &StyleRecord) -> String {
    format!("{} — \"{}\"", el.name, clip_chars(&el.text, LABEL_TEXT_CHARS))
}

fn selector_label(el: &StyleRecord) -> String {
    format!("{} ({})", el.name, el.selector)
}

fn display_value(value: &str) -> &str {
    if value.trim().is_empty() {
        "no value"
    } else {
        value
    }
}

fn css_rule(selector: &str, declarations: &[(&str, &str)]) -> String {
    let mut rule = format!("{selector} {{\n");
    for (property, value) in declarations {
        rule.push_str(&format!("  {property}: {value};\n"));
    }
    rule.push('}');
    rule
}
