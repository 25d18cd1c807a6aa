//! Post image validation and storage
//!
//! An upload is accepted only if it decodes as an image whose detected
//! format is in the configured allow-list. The file name the client sent is
//! never trusted; stored files get a UUID name with the detected extension.

use crate::config::UploadConfig;
use anyhow::Context;
use image::ImageFormat;
use tokio::fs;
use uuid::Uuid;

/// Subdirectory of the media root holding post images
pub const POST_IMAGE_DIR: &str = "posts";

pub const INVALID_IMAGE: &str = "invalid_image";
pub const INVALID_IMAGE_MESSAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// A file part received from a form or API request
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("The submitted file is empty.")]
    Empty,

    #[error("The submitted file is too large. The maximum size is {max} bytes.")]
    TooLarge { max: u64 },

    #[error("{}", INVALID_IMAGE_MESSAGE)]
    Invalid,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl ImageError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ImageError::Empty => "empty",
            ImageError::TooLarge { .. } => "file_too_large",
            ImageError::Invalid => INVALID_IMAGE,
            ImageError::InternalError(_) => "internal_error",
        }
    }
}

pub struct ImageService {
    config: UploadConfig,
}

impl ImageService {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    /// Check that the bytes are a complete image of an allowed format
    pub fn validate_image(&self, data: &[u8]) -> Result<ImageFormat, ImageError> {
        if data.is_empty() {
            return Err(ImageError::Empty);
        }
        if data.len() as u64 > self.config.max_file_size {
            return Err(ImageError::TooLarge {
                max: self.config.max_file_size,
            });
        }

        let format = image::guess_format(data).map_err(|_| ImageError::Invalid)?;
        if !self.config.is_type_allowed(format.to_mime_type()) {
            return Err(ImageError::Invalid);
        }

        // Truncated or corrupted payloads fail here even with a valid header
        image::load_from_memory_with_format(data, format).map_err(|e| {
            tracing::debug!("Rejected image upload: {}", e);
            ImageError::Invalid
        })?;

        Ok(format)
    }

    /// Write a validated image, returning its path relative to the media root
    pub async fn store_image(&self, data: &[u8], format: ImageFormat) -> Result<String, ImageError> {
        let dir = self.config.path.join(POST_IMAGE_DIR);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create upload dir {}", dir.display()))?;

        let extension = format.extensions_str().first().copied().unwrap_or("bin");
        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        fs::write(dir.join(&file_name), data)
            .await
            .context("Failed to save image")?;

        tracing::debug!("Stored image {}/{}", POST_IMAGE_DIR, file_name);
        Ok(format!("{}/{}", POST_IMAGE_DIR, file_name))
    }

    /// Validate then store an upload
    pub async fn save(&self, upload: &UploadedImage) -> Result<String, ImageError> {
        let format = self.validate_image(&upload.data)?;
        self.store_image(&upload.data, format).await
    }
}
