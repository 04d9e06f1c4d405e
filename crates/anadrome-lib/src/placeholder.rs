// SPDX-License-Identifier: MPL-2.0

//! Static cover painted while the renderer has not produced its first frame.

use std::path::Path;

use image::{DynamicImage, RgbaImage, imageops::FilterType};

use crate::surface::{Surface, SurfaceError};

/// Errors that can occur when loading the placeholder.
#[derive(Debug, thiserror::Error)]
pub enum PlaceholderError {
    #[error("Failed to load image: {0}")]
    Image(#[from] image::ImageError),

    #[error("placeholder image is empty")]
    Empty,
}

/// Pre-decoded placeholder image.
#[derive(Debug, Clone)]
pub struct Placeholder {
    image: RgbaImage,
}

impl Placeholder {
    pub fn open(path: &Path) -> Result<Self, PlaceholderError> {
        let image = image::open(path)?;
        Self::from_image(image)
    }

    pub fn from_image(image: DynamicImage) -> Result<Self, PlaceholderError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PlaceholderError::Empty);
        }
        Ok(Self {
            image: image.into_rgba8(),
        })
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Stretch the image over the whole surface and paint it.
    pub fn paint(&self, surface: &dyn Surface) -> Result<(), SurfaceError> {
        let (width, height) = surface.size();
        if width == 0 || height == 0 {
            return Err(SurfaceError::Unavailable);
        }

        if self.image.dimensions() == (width, height) {
            return surface.paint(&self.image);
        }

        let scaled = image::imageops::resize(&self.image, width, height, FilterType::Triangle);
        surface.paint(&scaled)
    }
}
