//! Design-vs-live validation.
//!
//! Compares a design reference image and its layer metadata against a
//! rendered page:
//!
//! - [`diff`] and [`cluster`] find where the pixels disagree,
//! - [`design`], [`live`] and [`audit`] turn design layers and computed
//!   styles into a defect list with ready-to-paste CSS fixes,
//! - [`locate`] and [`overlay`] turn defect locations back into rectangles.
//!
//! Browser access goes through [`page::PageProbe`]; the crate itself never
//! opens a browser or touches the network.

pub mod audit;
pub mod cluster;
pub mod config;
pub mod design;
pub mod diff;
pub mod error;
pub mod live;
pub mod locate;
pub mod model;
pub mod overlay;
pub mod page;
pub mod raster;
pub mod report;

pub use audit::{validate_css, AuditOutcome, CssAuditor};
pub use cluster::{cluster_raster, cluster_regions};
pub use config::AuditConfig;
pub use design::{extract_expected, DesignData};
pub use diff::{compare_images, diff_images, DiffResult, MismatchMask, PixelDiff};
pub use error::{AuditError, PageError, Result};
pub use live::extract_live_styles;
pub use locate::{locate, locate_all};
pub use model::{
    BoundingBox, Defect, DefectSource, DefectStatus, ElementRect, ExpectedSpec, InventoryRow,
    LocatedDefect, Overlay, Severity, StyleRecord,
};
pub use page::{CaptureStats, ElementSample, PageProbe, PageSnapshot, SnapshotPage};
pub use report::{run_validation, ReportStatus, ValidationInputs, ValidationReport, ValidationRun};
