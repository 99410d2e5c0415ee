use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::design::parse_text_selector;
use crate::error::{AuditError, PageError, Result};

/// Raw observation of one element as the browser reports it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementSample {
    pub tag: String,
    /// The `class` attribute, space separated.
    pub class_name: String,
    pub text: String,
    pub rect: SampleRect,
    pub styles: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SampleRect {
    fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

pub trait PageProbe {
    /// Every element matching a CSS selector in document order, with the
    /// computed value of each requested property (empty when unset).
    fn query_all(
        &self,
        selector: &str,
        properties: &[&str],
    ) -> std::result::Result<Vec<ElementSample>, PageError>;

    /// First element matching `selector` (CSS or `text="..."`), waiting at
    /// most `timeout` for it to attach.
    fn locate_first(
        &self,
        selector: &str,
        properties: &[&str],
        timeout: Duration,
    ) -> std::result::Result<ElementSample, PageError>;
}

/// What the capture collaborator observed besides styles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureStats {
    pub js_errors: Vec<String>,
    pub dom_node_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSnapshot {
    pub url: Option<String>,
    pub viewport: Option<Viewport>,
    pub dom_node_count: u64,
    pub console_errors: Vec<String>,
    /// Query selector to matches, in document order.
    pub elements: BTreeMap<String, Vec<ElementSample>>,
}

/// Answers page queries from a JSON dump taken while the page was open.
#[derive(Debug, Clone, Default)]
pub struct SnapshotPage {
    snapshot: PageSnapshot,
}

impl SnapshotPage {
    pub fn new(snapshot: PageSnapshot) -> Self {
        Self { snapshot }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| AuditError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot = serde_json::from_str(&raw).map_err(|source| AuditError::Json {
            context: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(snapshot))
    }

    pub fn capture_stats(&self) -> CaptureStats {
        CaptureStats {
            js_errors: self.snapshot.console_errors.clone(),
            dom_node_count: self.snapshot.dom_node_count,
        }
    }

    /// Wrappers share their children's text, so the smallest matching box
    /// is the element that actually holds it.
    fn find_text(&self, needle: &str) -> Option<&ElementSample> {
        self.snapshot
            .elements
            .values()
            .flatten()
            .filter(|sample| collapse_whitespace(&sample.text) == needle)
            .min_by(|a, b| a.rect.area().total_cmp(&b.rect.area()))
    }
}

impl PageProbe for SnapshotPage {
    fn query_all(
        &self,
        selector: &str,
        properties: &[&str],
    ) -> std::result::Result<Vec<ElementSample>, PageError> {
        Ok(self
            .snapshot
            .elements
            .get(selector)
            .map(|samples| {
                samples
                    .iter()
                    .map(|s| with_properties(s, properties))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn locate_first(
        &self,
        selector: &str,
        properties: &[&str],
        _timeout: Duration,
    ) -> std::result::Result<ElementSample, PageError> {
        // A snapshot never changes, so there is nothing to wait for.
        let found = match parse_text_selector(selector) {
            Some(needle) => self.find_text(&collapse_whitespace(&needle)),
            None => self
                .snapshot
                .elements
                .get(selector)
                .and_then(|samples| samples.first()),
        };
        found
            .map(|s| with_properties(s, properties))
            .ok_or_else(|| PageError::NotFound(selector.to_string()))
    }
}

fn with_properties(sample: &ElementSample, properties: &[&str]) -> ElementSample {
    let styles = properties
        .iter()
        .map(|p| {
            let value = sample.styles.get(*p).cloned().unwrap_or_default();
            (p.to_string(), value)
        })
        .collect();
    ElementSample {
        styles,
        ..sample.clone()
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn sample(
        tag: &str,
        text: &str,
        rect: (f64, f64, f64, f64),
        styles: &[(&str, &str)],
    ) -> ElementSample {
        ElementSample {
            tag: tag.to_string(),
            class_name: String::new(),
            text: text.to_string(),
            rect: SampleRect {
                x: rect.0,
                y: rect.1,
                width: rect.2,
                height: rect.3,
            },
            styles: styles
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn page() -> SnapshotPage {
        let mut elements = BTreeMap::new();
        elements.insert(
            "h1".to_string(),
            vec![sample(
                "h1",
                "  Welcome\n   back ",
                (0.0, 0.0, 300.0, 40.0),
                &[("font-size", "32px"), ("color", "rgb(0, 0, 0)")],
            )],
        );
        elements.insert(
            "p".to_string(),
            vec![
                sample("p", "Say \"hi\"", (0.0, 50.0, 300.0, 20.0), &[("font-size", "16px")]),
                sample("p", "Second", (0.0, 80.0, 300.0, 20.0), &[]),
            ],
        );
        SnapshotPage::new(PageSnapshot {
            url: Some("https://example.test".to_string()),
            viewport: Some(Viewport {
                width: 1440,
                height: 900,
            }),
            dom_node_count: 120,
            console_errors: vec!["boom".to_string()],
            elements,
        })
    }

    #[test]
    fn query_all_fills_requested_properties() {
        let found = page().query_all("p", &["font-size", "color"]).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].styles["font-size"], "16px");
        assert_eq!(found[0].styles["color"], "");
        assert_eq!(found[1].styles.len(), 2);
    }

    #[test]
    fn unknown_selector_is_empty_not_error() {
        assert!(page().query_all("table", &["color"]).unwrap().is_empty());
    }

    #[test]
    fn text_lookup_normalizes_whitespace_and_quotes() {
        let page = page();
        let found = page
            .locate_first("text=\"Welcome back\"", &["font-size"], Duration::from_millis(10))
            .unwrap();
        assert_eq!(found.tag, "h1");
        assert_eq!(found.styles["font-size"], "32px");

        let quoted = page
            .locate_first("text=\"Say \\\"hi\\\"\"", &[], Duration::from_millis(10))
            .unwrap();
        assert_eq!(quoted.text, "Say \"hi\"");
    }

    #[test]
    fn text_lookup_prefers_innermost_element() {
        let mut elements = BTreeMap::new();
        elements.insert(
            "div".to_string(),
            vec![sample(
                "div",
                "Welcome",
                (0.0, 0.0, 1440.0, 200.0),
                &[("font-size", "16px")],
            )],
        );
        elements.insert(
            "h1".to_string(),
            vec![sample(
                "h1",
                "Welcome",
                (40.0, 60.0, 320.0, 40.0),
                &[("font-size", "32px")],
            )],
        );
        let page = SnapshotPage::new(PageSnapshot {
            elements,
            ..PageSnapshot::default()
        });

        let found = page
            .locate_first("text=\"Welcome\"", &["font-size"], Duration::from_millis(10))
            .unwrap();
        assert_eq!(found.tag, "h1");
        assert_eq!(found.styles["font-size"], "32px");
    }

    #[test]
    fn missing_text_reports_not_found() {
        let err = page()
            .locate_first("text=\"Nope\"", &[], Duration::from_millis(10))
            .unwrap_err();
        assert_eq!(err, PageError::NotFound("text=\"Nope\"".to_string()));
    }

    #[test]
    fn snapshot_parses_with_missing_fields() {
        let snapshot: PageSnapshot = serde_json::from_value(json!({
            "elements": {"img": [{"tag": "img", "rect": {"width": 0, "height": 10}}]}
        }))
        .unwrap();
        let page = SnapshotPage::new(snapshot);
        assert_eq!(page.capture_stats(), CaptureStats::default());
        let imgs = page.query_all("img", &[]).unwrap();
        assert_eq!(imgs[0].rect.height, 10.0);
    }

    #[test]
    fn capture_stats_come_from_snapshot() {
        let stats = page().capture_stats();
        assert_eq!(stats.dom_node_count, 120);
        assert_eq!(stats.js_errors, vec!["boom".to_string()]);
    }
}
