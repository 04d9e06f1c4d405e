// SPDX-License-Identifier: MPL-2.0

//! The host-owned drawing target the wallpaper renders into.

use std::{fmt, sync::Arc};

use image::RgbaImage;

#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    #[error("surface could not be locked for drawing")]
    Unavailable,

    #[error("failed to draw on surface: {0}")]
    Draw(String),
}

/// Drawing target supplied by the host. Its lifecycle is owned by the host.
pub trait Surface: Send + Sync {
    /// Current size in physical pixels.
    fn size(&self) -> (u32, u32);

    /// Draw an image that already matches [`Surface::size`].
    fn paint(&self, image: &RgbaImage) -> Result<(), SurfaceError>;
}

/// Lifecycle notifications delivered by the host.
#[derive(Clone)]
pub enum SurfaceEvent {
    Created(Arc<dyn Surface>),
    Changed { width: u32, height: u32 },
    VisibilityChanged(bool),
    Destroyed,
}

impl fmt::Debug for SurfaceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created(surface) => f.debug_tuple("Created").field(&surface.size()).finish(),
            Self::Changed { width, height } => f
                .debug_struct("Changed")
                .field("width", width)
                .field("height", height)
                .finish(),
            Self::VisibilityChanged(visible) => {
                f.debug_tuple("VisibilityChanged").field(visible).finish()
            }
            Self::Destroyed => f.write_str("Destroyed"),
        }
    }
}

/// A surface with no backing pixels. Paints are counted and discarded.
#[derive(Debug, Default)]
pub struct NullSurface {
    width: u32,
    height: u32,
    paints: std::sync::atomic::AtomicUsize,
}

impl NullSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            paints: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn paint_count(&self) -> usize {
        self.paints.load(std::sync::atomic::Ordering::Relaxed)
    }
}

impl Surface for NullSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn paint(&self, image: &RgbaImage) -> Result<(), SurfaceError> {
        if image.dimensions() != (self.width, self.height) {
            return Err(SurfaceError::Draw(format!(
                "image is {}x{}, surface is {}x{}",
                image.width(),
                image.height(),
                self.width,
                self.height
            )));
        }
        self.paints
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_surface_counts_matching_paints() {
        let surface = NullSurface::new(4, 8);
        surface.paint(&RgbaImage::new(4, 8)).unwrap();
        assert!(surface.paint(&RgbaImage::new(8, 4)).is_err());
        assert_eq!(surface.paint_count(), 1);
    }
}
