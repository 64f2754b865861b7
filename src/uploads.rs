//! Image upload intake and storage collaborator
//!
//! Multipart fields are screened for supported content types and handed to
//! an [`ImageSink`]; resizing and encoding are the sink's business. The
//! disk sink writes under `{root}/{category}/` with generated filenames.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{Error, Result};

/// Category for tour images under the upload root
pub const TOUR_IMAGES: &str = "tours";

/// Category for user photos under the upload root
pub const USER_IMAGES: &str = "users";

/// Storage collaborator for processed images
#[async_trait]
pub trait ImageSink: Send + Sync {
    async fn store(&self, category: &str, filename: &str, bytes: &[u8]) -> Result<()>;
}

/// Writes images under a root directory
pub struct DiskImageSink {
    root: PathBuf,
}

impl DiskImageSink {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl ImageSink for DiskImageSink {
    async fn store(&self, category: &str, filename: &str, bytes: &[u8]) -> Result<()> {
        let dir = self.root.join(category);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(filename), bytes).await?;
        Ok(())
    }
}

/// Discards images; used in tests
pub struct NullImageSink;

#[async_trait]
impl ImageSink for NullImageSink {
    async fn store(&self, _category: &str, _filename: &str, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }
}

/// Reject anything that is not a PNG or JPEG upload.
pub fn ensure_supported(content_type: Option<&str>) -> Result<()> {
    match content_type {
        Some("image/png" | "image/jpeg") => Ok(()),
        _ => Err(Error::BadRequest("File type unsupported".to_string())),
    }
}

/// Generated filename: `{prefix}-{millis}[-{suffix}].{ext}`, extension
/// taken from the original name.
pub fn image_filename(prefix: &str, original: Option<&str>, suffix: Option<&str>) -> String {
    let ext = original
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| matches!(ext.as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or_else(|| "jpg".to_string());
    let stamp = Utc::now().timestamp_millis();
    match suffix {
        Some(suffix) => format!("{prefix}-{stamp}-{suffix}.{ext}"),
        None => format!("{prefix}-{stamp}.{ext}"),
    }
}
