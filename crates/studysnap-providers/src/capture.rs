//! Image capture: ordered fallback over constraint sets and a file-backed device.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use studysnap_core::types::ImagePayload;

use crate::{CaptureConstraints, CaptureError, ImageCaptureDevice};

/// Try each constraint set in order; return the first image or the last failure.
pub async fn capture_with_fallback(
    device: &dyn ImageCaptureDevice,
    attempts: &[CaptureConstraints],
) -> Result<ImagePayload, CaptureError> {
    let mut last_error = CaptureError::DeviceUnavailable("no capture attempts configured".into());

    for (i, constraints) in attempts.iter().enumerate() {
        match device.capture(constraints).await {
            Ok(image) => {
                info!(attempt = i, facing = ?constraints.facing, bytes = image.len(), "Image captured");
                return Ok(image);
            }
            Err(e) => {
                warn!(attempt = i, facing = ?constraints.facing, %e, "Capture attempt failed");
                last_error = e;
            }
        }
    }

    Err(last_error)
}

/// Reads a still image from disk, standing in for a camera.
pub struct FileCaptureDevice {
    path: PathBuf,
}

impl FileCaptureDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ImageCaptureDevice for FileCaptureDevice {
    async fn capture(&self, constraints: &CaptureConstraints) -> Result<ImagePayload, CaptureError> {
        debug!(path = %self.path.display(), facing = ?constraints.facing, "Reading image file");

        let bytes = tokio::fs::read(&self.path).await.map_err(|e| match e.kind() {
            ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
            _ => CaptureError::DeviceUnavailable(format!("{}: {e}", self.path.display())),
        })?;

        if bytes.is_empty() {
            return Err(CaptureError::DeviceUnavailable(format!(
                "{} is empty",
                self.path.display()
            )));
        }

        let mime_type = mime_guess::from_path(&self.path)
            .first()
            .filter(|m| m.type_() == mime_guess::mime::IMAGE)
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "image/jpeg".to_string());

        Ok(ImagePayload::new(bytes, mime_type))
    }
}
