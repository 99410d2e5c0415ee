use std::fs;
use std::path::Path;

use image::{DynamicImage, RgbaImage};

use crate::error::{AuditError, Result};

/// Decode any supported format into RGBA.
pub fn load_raster(path: &Path) -> Result<RgbaImage> {
    let bytes = fs::read(path).map_err(|source| AuditError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let decoded = image::load_from_memory(&bytes).map_err(|source| AuditError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(decoded.to_rgba8())
}

pub fn save_png(img: &RgbaImage, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    DynamicImage::ImageRgba8(img.clone())
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|source| AuditError::Image {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| AuditError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }
    Ok(())
}
