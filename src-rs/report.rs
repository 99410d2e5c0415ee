use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::validate_css;
use crate::config::AuditConfig;
use crate::design::DesignData;
use crate::diff::compare_images;
use crate::error::{AuditError, Result};
use crate::model::{BoundingBox, Defect, InventoryRow};
use crate::page::{CaptureStats, PageProbe};
use crate::raster::{ensure_parent_dir, load_raster};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportStatus {
    Pass,
    Fail,
}

impl ReportStatus {
    pub fn evaluate(
        pixel_mismatches: u64,
        css_mismatches: usize,
        js_errors: usize,
        pixel_budget: u64,
    ) -> Self {
        if pixel_mismatches < pixel_budget && css_mismatches == 0 && js_errors == 0 {
            Self::Pass
        } else {
            Self::Fail
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub created_at: DateTime<Utc>,
    pub status: ReportStatus,
    pub pixel_mismatch_count: u64,
    pub css_mismatch_count: usize,
    pub js_error_count: usize,
    pub dom_node_count: u64,
    pub design_layer_count: usize,
    pub canvas: CanvasSize,
    pub mismatch_regions: Vec<BoundingBox>,
    pub css_mismatches: Vec<Defect>,
    pub element_inventory: Vec<InventoryRow>,
    pub js_errors: Vec<String>,
    /// Input images that could not be decoded. Any entry fails the run.
    #[serde(default)]
    pub unreadable_inputs: Vec<String>,
}

impl ValidationReport {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| AuditError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| AuditError::Json {
            context: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_pretty(path, self)
    }
}

pub struct ValidationInputs<'a> {
    pub design_image: &'a Path,
    pub live_image: &'a Path,
    pub design: &'a DesignData,
    pub page: &'a dyn PageProbe,
    pub capture: CaptureStats,
}

pub struct ValidationRun {
    pub report: ValidationReport,
    pub diff_raster: RgbaImage,
}

/// Diff, cluster, extract and audit in sequence. Data problems degrade into
/// the report; nothing here fails. An unreadable image is diffed as an empty
/// raster and recorded in `unreadable_inputs`, which forces FAIL.
pub fn run_validation(inputs: ValidationInputs<'_>, config: &AuditConfig) -> ValidationRun {
    let mut unreadable_inputs = Vec::new();
    let design_raster = read_input(inputs.design_image, &mut unreadable_inputs);
    let live_raster = read_input(inputs.live_image, &mut unreadable_inputs);
    let diff = compare_images(
        &design_raster,
        &live_raster,
        config.threshold,
        config.region_size,
    );

    let audit = validate_css(inputs.page, inputs.design, config);

    let css_mismatch_count = audit.defects.len();
    let js_error_count = inputs.capture.js_errors.len();
    let status = if unreadable_inputs.is_empty() {
        ReportStatus::evaluate(
            diff.mismatch_count,
            css_mismatch_count,
            js_error_count,
            config.pass_pixel_budget,
        )
    } else {
        ReportStatus::Fail
    };

    info!(
        ?status,
        pixel_mismatches = diff.mismatch_count,
        regions = diff.regions.len(),
        css_mismatches = css_mismatch_count,
        js_errors = js_error_count,
        "validation run complete"
    );

    let report = ValidationReport {
        created_at: Utc::now(),
        status,
        pixel_mismatch_count: diff.mismatch_count,
        css_mismatch_count,
        js_error_count,
        dom_node_count: inputs.capture.dom_node_count,
        design_layer_count: inputs.design.raw_layer_count,
        canvas: CanvasSize {
            width: diff.width,
            height: diff.height,
        },
        mismatch_regions: diff.regions,
        css_mismatches: audit.defects,
        element_inventory: audit.inventory,
        js_errors: inputs.capture.js_errors,
        unreadable_inputs,
    };

    ValidationRun {
        report,
        diff_raster: diff.diff_raster,
    }
}

fn read_input(path: &Path, unreadable: &mut Vec<String>) -> RgbaImage {
    match load_raster(path) {
        Ok(img) => img,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unreadable input image");
            unreadable.push(err.to_string());
            RgbaImage::new(0, 0)
        }
    }
}

pub fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let raw = serde_json::to_string_pretty(value).map_err(|source| AuditError::Json {
        context: path.display().to_string(),
        source,
    })?;
    fs::write(path, raw).map_err(|source| AuditError::Io {
        path: path.to_path_buf(),
        source,
    })
}
