//! Design-source data and the expectations derived from it.
//!
//! The design payload is `{screen, layers}` as delivered by the design-spec
//! client. Every field is optional and each layer is decoded on its own, so a
//! malformed layer is dropped without affecting the others.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Number, Value};
use tracing::{debug, warn};

use crate::error::{AuditError, Result};
use crate::model::{clip_chars, DefectSource, ExpectedSpec};

const SELECTOR_TEXT_CHARS: usize = 30;
const NAME_TEXT_CHARS: usize = 40;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesignData {
    pub screen: DesignScreen,
    pub layers: Vec<DesignLayer>,
    /// Entries in the incoming `layers` array, decodable or not.
    pub raw_layer_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DesignScreen {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub image: Option<ScreenImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScreenImage {
    pub original_url: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DesignLayer {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub content: Option<String>,
    pub style: Option<LayerStyle>,
    pub rect: Option<LayerRect>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayerStyle {
    pub font: Option<FontStyle>,
    pub color: Option<LayerColor>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FontStyle {
    pub size: Option<Number>,
    pub family: Option<String>,
    pub line_height: Option<Number>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayerColor {
    pub r: Option<Number>,
    pub g: Option<Number>,
    pub b: Option<Number>,
    pub a: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayerRect {
    pub x: Option<Number>,
    pub y: Option<Number>,
    pub width: Option<Number>,
    pub height: Option<Number>,
}

impl DesignData {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| AuditError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&raw).map_err(|source| AuditError::Json {
            context: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_value(&value))
    }

    /// Decode leniently; anything unusable falls back to defaults.
    pub fn from_value(value: &Value) -> Self {
        let screen = match value.get("screen") {
            Some(raw) if !raw.is_null() => {
                serde_json::from_value(raw.clone()).unwrap_or_else(|err| {
                    warn!(error = %err, "ignoring malformed screen metadata");
                    DesignScreen::default()
                })
            }
            _ => DesignScreen::default(),
        };

        let raw_layers = value
            .get("layers")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut layers = Vec::with_capacity(raw_layers.len());
        for (idx, raw) in raw_layers.iter().enumerate() {
            match serde_json::from_value::<DesignLayer>(raw.clone()) {
                Ok(layer) => layers.push(layer),
                Err(err) => warn!(index = idx, error = %err, "skipping malformed design layer"),
            }
        }

        Self {
            screen,
            layers,
            raw_layer_count: raw_layers.len(),
        }
    }

    /// Design canvas width used for overflow checks.
    pub fn screen_width(&self) -> Option<i64> {
        self.screen
            .width
            .filter(|w| w.is_finite() && *w > 0.0)
            .map(|w| w.round() as i64)
    }
}

/// Text-based selector for a layer's content: first 30 characters, quotes escaped.
pub fn text_selector(text: &str) -> String {
    let needle = clip_chars(text, SELECTOR_TEXT_CHARS).replace('"', "\\\"");
    format!("text=\"{needle}\"")
}

/// Inverse of [`text_selector`]; `None` for any other selector form.
pub fn parse_text_selector(selector: &str) -> Option<String> {
    let inner = selector.strip_prefix("text=\"")?.strip_suffix('"')?;
    Some(inner.replace("\\\"", "\""))
}

fn px(value: &Number) -> String {
    format!("{value}px")
}

/// Expected CSS for every text layer with non-empty content.
pub fn extract_expected(design: &DesignData) -> Vec<ExpectedSpec> {
    let mut specs = Vec::new();

    for layer in &design.layers {
        if layer.kind.as_deref() != Some("text") {
            continue;
        }
        let Some(content) = layer.content.as_deref().map(str::trim) else {
            continue;
        };
        if content.is_empty() {
            continue;
        }

        let mut expected = BTreeMap::new();
        let style = layer.style.clone().unwrap_or_default();
        if let Some(font) = &style.font {
            if let Some(size) = &font.size {
                expected.insert("font-size".to_string(), px(size));
            }
            if let Some(family) = &font.family {
                expected.insert("font-family".to_string(), family.clone());
            }
            if let Some(line_height) = &font.line_height {
                expected.insert("line-height".to_string(), px(line_height));
            }
        }
        if let Some(LayerColor {
            r: Some(r),
            g: Some(g),
            b: Some(b),
            ..
        }) = &style.color
        {
            expected.insert("color".to_string(), format!("rgb({r}, {g}, {b})"));
        }
        if let Some(rect) = &layer.rect {
            if let Some(width) = &rect.width {
                expected.insert("width".to_string(), px(width));
            }
            if let Some(height) = &rect.height {
                expected.insert("height".to_string(), px(height));
            }
        }

        if expected.is_empty() {
            debug!(content, "text layer carries no comparable properties");
            continue;
        }

        specs.push(ExpectedSpec {
            selector: text_selector(content),
            name: format!("Design Layer: {}", clip_chars(content, NAME_TEXT_CHARS)),
            expected,
            source: DefectSource::Design,
        });
    }

    specs
}
