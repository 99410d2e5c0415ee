use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Axis-aligned box in union-canvas pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

/// Element geometry in viewport coordinates. Scrolled content can sit at
/// negative offsets, so the origin is signed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl ElementRect {
    pub fn origin_label(&self) -> String {
        format!("({}, {})", self.x, self.y)
    }

    pub fn size_label(&self) -> String {
        format!("{}x{}px", self.width, self.height)
    }

    pub fn location_label(&self) -> String {
        format!("{} — {}", self.origin_label(), self.size_label())
    }
}

/// One live element observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRecord {
    pub selector: String,
    pub name: String,
    pub text: String,
    pub tag: String,
    pub styles: BTreeMap<String, String>,
    pub position: ElementRect,
}

impl StyleRecord {
    /// Computed value of `property`, or the empty string when it was not read.
    pub fn style(&self, property: &str) -> &str {
        self.styles.get(property).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefectSource {
    Design,
    Audit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedSpec {
    pub selector: String,
    pub name: String,
    pub expected: BTreeMap<String, String>,
    pub source: DefectSource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    #[default]
    Medium,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DefectStatus {
    #[default]
    Fail,
    Warn,
}

/// A single visual or stylistic finding with its remediation snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defect {
    pub element: String,
    pub property: String,
    pub expected: String,
    pub actual: String,
    #[serde(default)]
    pub selector: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub css_fix: String,
    pub source: DefectSource,
    #[serde(default)]
    pub status: DefectStatus,
}

/// Catalog row describing one observed live element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRow {
    pub element: String,
    pub selector: String,
    pub text: String,
    pub position: String,
    pub size: String,
    pub font: String,
    pub font_size: String,
    pub font_weight: String,
    pub color: String,
    pub bg_color: String,
    pub line_height: String,
    pub padding: String,
    pub margin: String,
}

/// A defect resolved to an overlay rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedDefect {
    pub idx: usize,
    #[serde(flatten)]
    pub defect: Defect,
    #[serde(flatten)]
    pub overlay: Overlay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Overlay {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    pub label_x: u32,
    pub label_y: u32,
    pub color_class: String,
}

/// Truncate to at most `limit` characters.
pub fn clip_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn location_labels_match_report_format() {
        let rect = ElementRect {
            x: 851,
            y: 501,
            width: 517,
            height: 52,
        };
        assert_eq!(rect.location_label(), "(851, 501) — 517x52px");
        assert_eq!(rect.origin_label(), "(851, 501)");
    }

    #[test]
    fn defect_serializes_enum_literals() {
        let defect = Defect {
            element: "Paragraph #2".to_string(),
            property: "color".to_string(),
            expected: "rgb(0, 0, 0)".to_string(),
            actual: "rgb(255, 0, 0)".to_string(),
            selector: "p".to_string(),
            location: String::new(),
            severity: Severity::Medium,
            description: String::new(),
            css_fix: String::new(),
            source: DefectSource::Audit,
            status: DefectStatus::Warn,
        };
        let value = serde_json::to_value(&defect).unwrap();
        assert_eq!(value["severity"], json!("medium"));
        assert_eq!(value["status"], json!("WARN"));
        assert_eq!(value["source"], json!("audit"));
    }

    #[test]
    fn sparse_stored_defect_gets_defaults() {
        let raw = json!({
            "element": "Heading",
            "property": "element_found",
            "expected": "visible",
            "actual": "not_found",
            "source": "design"
        });
        let defect: Defect = serde_json::from_value(raw).unwrap();
        assert_eq!(defect.severity, Severity::Medium);
        assert_eq!(defect.status, DefectStatus::Fail);
        assert!(defect.location.is_empty());
    }

    #[test]
    fn clip_chars_counts_characters_not_bytes() {
        assert_eq!(clip_chars("héllo wörld", 4), "héll");
        assert_eq!(clip_chars("ab", 10), "ab");
    }

    #[test]
    fn bounding_box_contains_is_half_open() {
        let bbox = BoundingBox {
            x: 50,
            y: 50,
            width: 50,
            height: 50,
        };
        assert!(bbox.contains(50, 50));
        assert!(bbox.contains(99, 99));
        assert!(!bbox.contains(100, 99));
    }
}
