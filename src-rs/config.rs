use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

pub const ENV_THRESHOLD: &str = "DESIGN_AUDIT_THRESHOLD";
pub const ENV_REGION_SIZE: &str = "DESIGN_AUDIT_REGION_SIZE";
pub const ENV_LOOKUP_TIMEOUT_MS: &str = "DESIGN_AUDIT_LOOKUP_TIMEOUT_MS";
pub const ENV_PASS_PIXEL_BUDGET: &str = "DESIGN_AUDIT_PASS_PIXEL_BUDGET";
pub const ENV_OUT_DIR: &str = "DESIGN_AUDIT_OUT_DIR";

/// Tunables for one validation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditConfig {
    /// Pixel comparison sensitivity in `[0, 1]`; lower is stricter.
    pub threshold: f64,
    /// Edge length of the clustering grid cells.
    pub region_size: u32,
    /// Wait budget for each design cross-check lookup.
    #[serde(with = "duration_ms")]
    pub lookup_timeout: Duration,
    /// Maximum elements examined per catalog category.
    pub per_category_limit: usize,
    /// Elements whose top edge is below this are ignored.
    pub offscreen_cutoff: f64,
    /// Slack allowed past the design width before a container overflows.
    pub overflow_tolerance: i64,
    /// A run passes only with fewer mismatched pixels than this.
    pub pass_pixel_budget: u64,
    pub viewport_width: u32,
    pub viewport_height: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            region_size: 50,
            lookup_timeout: Duration::from_millis(2000),
            per_category_limit: 5,
            offscreen_cutoff: 5000.0,
            overflow_tolerance: 20,
            pass_pixel_budget: 5000,
            viewport_width: 1440,
            viewport_height: 900,
        }
    }
}

impl AuditConfig {
    /// Defaults overridden by any parseable `DESIGN_AUDIT_*` variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(threshold) = env_value::<f64>(ENV_THRESHOLD) {
            config.threshold = threshold;
        }
        if let Some(size) = env_value::<u32>(ENV_REGION_SIZE) {
            config.region_size = size;
        }
        if let Some(ms) = env_value::<u64>(ENV_LOOKUP_TIMEOUT_MS) {
            config.lookup_timeout = Duration::from_millis(ms);
        }
        if let Some(budget) = env_value::<u64>(ENV_PASS_PIXEL_BUDGET) {
            config.pass_pixel_budget = budget;
        }
        config.normalized()
    }

    /// Clamp out-of-range values instead of rejecting them.
    pub fn normalized(mut self) -> Self {
        if !(0.0..=1.0).contains(&self.threshold) || self.threshold.is_nan() {
            let clamped = if self.threshold.is_nan() {
                Self::default().threshold
            } else {
                self.threshold.clamp(0.0, 1.0)
            };
            warn!(threshold = self.threshold, clamped, "diff threshold out of range");
            self.threshold = clamped;
        }
        if self.region_size == 0 {
            warn!("region size 0 is not usable, falling back to 1");
            self.region_size = 1;
        }
        self
    }
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = raw, "ignoring unparseable environment override");
            None
        }
    }
}

/// Artifact root: `DESIGN_AUDIT_OUT_DIR` or `.design-audit`.
pub fn out_root() -> PathBuf {
    env::var(ENV_OUT_DIR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".design-audit"))
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}
