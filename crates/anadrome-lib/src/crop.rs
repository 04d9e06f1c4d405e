// SPDX-License-Identifier: MPL-2.0

//! Crop geometry: where the video sits in its view, the draggable 9:16 frame
//! over it, and the affine transform that zooms the frame to full output.

use anadrome_config::PreferenceError;

use crate::transform::{ActivationError, TransformError};

/// Width over height of the crop frame.
pub const CROP_ASPECT_RATIO: f32 = 9.0 / 16.0;

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("invalid crop area {0:?}")]
    InvalidRect(NormalizedRect),

    #[error("video transform failed: {0}")]
    Transform(#[from] TransformError),

    #[error("failed to store the cropped video: {0}")]
    Store(#[from] PreferenceError),

    #[error("failed to activate the wallpaper: {0}")]
    Activation(#[from] ActivationError),
}

/// Axis-aligned rectangle in view coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    #[must_use]
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    #[must_use]
    pub fn centre(&self) -> (f32, f32) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.left < self.right && self.top < self.bottom)
    }

    /// Half-open containment: the right and bottom edges are outside.
    #[must_use]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        !self.is_empty() && x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    fn offset(&self, dx: f32, dy: f32) -> Self {
        Self::new(
            self.left + dx,
            self.top + dy,
            self.right + dx,
            self.bottom + dy,
        )
    }
}

/// Where a video scaled to fit is displayed inside a `view_w` x `view_h` view.
#[must_use]
pub fn letterbox(view_w: f32, view_h: f32, video_w: u32, video_h: u32) -> Rect {
    if video_w == 0 || video_h == 0 || view_w <= 0.0 || view_h <= 0.0 {
        return Rect::default();
    }

    let video_aspect = video_w as f32 / video_h as f32;
    let view_aspect = view_w / view_h;

    if view_aspect > video_aspect {
        let displayed_w = view_h * video_aspect;
        let offset_x = (view_w - displayed_w) / 2.0;
        Rect::new(offset_x, 0.0, offset_x + displayed_w, view_h)
    } else {
        let displayed_h = view_w / video_aspect;
        let offset_y = (view_h - displayed_h) / 2.0;
        Rect::new(0.0, offset_y, view_w, offset_y + displayed_h)
    }
}

/// Crop rectangle relative to the video, each coordinate in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NormalizedRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl NormalizedRect {
    #[must_use]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    #[must_use]
    pub fn centre(&self) -> (f32, f32) {
        (
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        )
    }

    pub fn validate(&self) -> Result<(), CropError> {
        let coords = [self.left, self.top, self.right, self.bottom];
        let in_range = coords
            .iter()
            .all(|c| c.is_finite() && (0.0..=1.0).contains(c));

        if in_range && self.width() > 0.0 && self.height() > 0.0 {
            Ok(())
        } else {
            Err(CropError::InvalidRect(*self))
        }
    }
}

/// The draggable 9:16 frame over the displayed video.
#[derive(Debug, Clone, PartialEq)]
pub struct CropFrame {
    display: Rect,
    frame: Rect,
    last_touch: Option<(f32, f32)>,
}

impl CropFrame {
    /// Largest 9:16 frame centred in `display`.
    #[must_use]
    pub fn new(display: Rect) -> Self {
        let frame = if display.is_empty() {
            // `display` would resolve to tracing's `display` helper inside the macro.
            let rect = display;
            tracing::warn!(display = ?rect, "Display rectangle is empty, no crop frame");
            Rect::default()
        } else {
            let (width, height) = if display.width() / CROP_ASPECT_RATIO <= display.height() {
                (display.width(), display.width() / CROP_ASPECT_RATIO)
            } else {
                (display.height() * CROP_ASPECT_RATIO, display.height())
            };
            let (cx, cy) = display.centre();
            Rect::new(
                cx - width / 2.0,
                cy - height / 2.0,
                cx + width / 2.0,
                cy + height / 2.0,
            )
        };

        Self {
            display,
            frame,
            last_touch: None,
        }
    }

    #[must_use]
    pub fn display(&self) -> Rect {
        self.display
    }

    #[must_use]
    pub fn frame(&self) -> Rect {
        self.frame
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.last_touch.is_some()
    }

    /// Start dragging if the press lands inside the frame.
    pub fn press(&mut self, x: f32, y: f32) -> bool {
        if self.frame.contains(x, y) {
            self.last_touch = Some((x, y));
            true
        } else {
            false
        }
    }

    /// Move the frame by the pointer delta, keeping it inside the display rectangle.
    pub fn drag_to(&mut self, x: f32, y: f32) -> bool {
        let Some((last_x, last_y)) = self.last_touch else {
            return false;
        };

        let (width, height) = (self.frame.width(), self.frame.height());
        let mut moved = self.frame.offset(x - last_x, y - last_y);

        if moved.left < self.display.left {
            moved.left = self.display.left;
            moved.right = moved.left + width;
        }
        if moved.top < self.display.top {
            moved.top = self.display.top;
            moved.bottom = moved.top + height;
        }
        if moved.right > self.display.right {
            moved.right = self.display.right;
            moved.left = moved.right - width;
        }
        if moved.bottom > self.display.bottom {
            moved.bottom = self.display.bottom;
            moved.top = moved.bottom - height;
        }

        self.frame = moved;
        self.last_touch = Some((x, y));
        true
    }

    pub fn release(&mut self) -> bool {
        let was_dragging = self.last_touch.take().is_some();
        if was_dragging {
            tracing::debug!(frame = ?self.frame, "Crop frame placed");
        }
        was_dragging
    }

    /// The frame relative to the displayed video. All zero when nothing is displayed.
    #[must_use]
    pub fn normalized(&self, video_w: u32, video_h: u32) -> NormalizedRect {
        if video_w == 0 || video_h == 0 || self.display.is_empty() {
            tracing::error!(
                video_w,
                video_h,
                display = ?self.display,
                "Cannot normalize crop frame"
            );
            return NormalizedRect::default();
        }

        let x = self.frame.left - self.display.left;
        let y = self.frame.top - self.display.top;
        let (dw, dh) = (self.display.width(), self.display.height());

        NormalizedRect {
            left: x / dw,
            top: y / dh,
            right: (x + self.frame.width()) / dw,
            bottom: (y + self.frame.height()) / dh,
        }
    }
}

/// Scale then translate, in normalised device coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub scale_x: f32,
    pub scale_y: f32,
    pub translate_x: f32,
    pub translate_y: f32,
}

impl AffineTransform {
    /// Maps the crop rectangle onto the full output frame.
    ///
    /// NDC has y pointing up while the crop rectangle has y pointing down.
    #[must_use]
    pub fn from_crop(rect: &NormalizedRect) -> Self {
        let scale_x = 1.0 / rect.width();
        let scale_y = 1.0 / rect.height();
        let (centre_x, centre_y) = rect.centre();
        let cx = 2.0 * centre_x - 1.0;
        let cy = 1.0 - 2.0 * centre_y;

        Self {
            scale_x,
            scale_y,
            translate_x: -cx * scale_x,
            translate_y: -cy * scale_y,
        }
    }

    /// Row-major 3x3 homogeneous matrix.
    #[must_use]
    pub fn matrix(&self) -> [[f32; 3]; 3] {
        [
            [self.scale_x, 0.0, self.translate_x],
            [0.0, self.scale_y, self.translate_y],
            [0.0, 0.0, 1.0],
        ]
    }

    #[must_use]
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.scale_x * x + self.translate_x,
            self.scale_y * y + self.translate_y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-3 * b.abs().max(1.0)
    }

    #[test]
    fn letterbox_pillarboxes_wide_views() {
        let rect = letterbox(2000.0, 1000.0, 1920, 1080);
        assert!(close(rect.height(), 1000.0));
        assert!(close(rect.width(), 1000.0 * 1920.0 / 1080.0));
        assert!(close(rect.centre().0, 1000.0));
    }

    #[test]
    fn letterbox_letterboxes_tall_views() {
        let rect = letterbox(1080.0, 1920.0, 1920, 1080);
        assert_eq!(rect.left, 0.0);
        assert!(close(rect.width(), 1080.0));
        assert!(close(rect.height(), 607.5));
        assert!(close(rect.centre().1, 960.0));
    }

    #[test]
    fn letterbox_without_video_is_empty() {
        assert!(letterbox(100.0, 100.0, 0, 1080).is_empty());
    }

    #[test]
    fn initial_frame_is_largest_centred_9_16() {
        let frame = CropFrame::new(Rect::new(0.0, 0.0, 1600.0, 900.0));
        let rect = frame.frame();
        assert!(close(rect.height(), 900.0));
        assert!(close(rect.width(), 900.0 * CROP_ASPECT_RATIO));
        assert!(close(rect.centre().0, 800.0));

        let frame = CropFrame::new(Rect::new(0.0, 0.0, 900.0, 1800.0));
        let rect = frame.frame();
        assert!(close(rect.width(), 900.0));
        assert!(close(rect.height(), 1600.0));
        assert!(close(rect.top, 100.0));
    }

    #[test]
    fn drag_only_starts_inside_frame() {
        let mut frame = CropFrame::new(Rect::new(0.0, 0.0, 1600.0, 900.0));
        assert!(!frame.press(10.0, 10.0));
        assert!(!frame.drag_to(20.0, 20.0));
        assert!(!frame.release());

        assert!(frame.press(800.0, 450.0));
        assert!(frame.is_dragging());
        assert!(frame.drag_to(900.0, 450.0));
        assert!(close(frame.frame().centre().0, 900.0));
        assert!(frame.release());
        assert!(!frame.is_dragging());
    }

    #[test]
    fn drag_is_clamped_to_display() {
        let display = Rect::new(100.0, 0.0, 1700.0, 900.0);
        let mut frame = CropFrame::new(display);
        let width = frame.frame().width();

        frame.press(900.0, 450.0);
        frame.drag_to(-5000.0, 9000.0);
        let rect = frame.frame();
        assert!(close(rect.left, 100.0));
        assert!(close(rect.width(), width));
        assert!(close(rect.bottom, 900.0));

        frame.drag_to(9000.0, -9000.0);
        let rect = frame.frame();
        assert!(close(rect.right, 1700.0));
        assert!(close(rect.top, 0.0));
    }

    #[test]
    fn normalized_frame_is_relative_to_display() {
        let display = Rect::new(100.0, 50.0, 1700.0, 950.0);
        let mut frame = CropFrame::new(display);
        frame.press(900.0, 500.0);
        frame.drag_to(-1000.0, 500.0);

        let rect = frame.normalized(1920, 1080);
        assert!(close(rect.left, 0.0));
        assert!(close(rect.top, 0.0));
        assert!(close(rect.bottom, 1.0));
        assert!(close(rect.right, 900.0 * CROP_ASPECT_RATIO / 1600.0));
        assert!(rect.validate().is_ok());
    }

    #[test]
    fn normalized_without_video_is_rejected() {
        let frame = CropFrame::new(Rect::new(0.0, 0.0, 1600.0, 900.0));
        let rect = frame.normalized(0, 0);
        assert_eq!(rect, NormalizedRect::default());
        assert!(matches!(rect.validate(), Err(CropError::InvalidRect(_))));
    }

    #[test]
    fn validate_rejects_degenerate_rects() {
        let bad = [
            NormalizedRect {
                left: 0.5,
                top: 0.0,
                right: 0.5,
                bottom: 1.0,
            },
            NormalizedRect {
                left: 0.0,
                top: 0.6,
                right: 1.0,
                bottom: 0.2,
            },
            NormalizedRect {
                left: -0.1,
                top: 0.0,
                right: 0.5,
                bottom: 1.0,
            },
            NormalizedRect {
                left: 0.0,
                top: 0.0,
                right: f32::NAN,
                bottom: 1.0,
            },
        ];
        for rect in bad {
            assert!(rect.validate().is_err(), "{rect:?}");
        }
    }

    #[test]
    fn transform_maps_crop_onto_full_frame() {
        let rect = NormalizedRect {
            left: 0.25,
            top: 0.0,
            right: 0.5,
            bottom: 0.5,
        };
        let transform = AffineTransform::from_crop(&rect);
        assert!(close(transform.scale_x, 4.0));
        assert!(close(transform.scale_y, 2.0));

        // crop centre (0.375, 0.25) in NDC is (-0.25, 0.5)
        let (x, y) = transform.apply(-0.25, 0.5);
        assert!(close(x, 0.0) && close(y, 0.0));

        // crop corners land on the output corners
        let (x, y) = transform.apply(2.0 * 0.25 - 1.0, 1.0 - 2.0 * 0.0);
        assert!(close(x, -1.0) && close(y, 1.0));
        let (x, y) = transform.apply(2.0 * 0.5 - 1.0, 1.0 - 2.0 * 0.5);
        assert!(close(x, 1.0) && close(y, -1.0));

        let matrix = transform.matrix();
        assert_eq!(matrix[0][2], transform.translate_x);
        assert_eq!(matrix[1][2], transform.translate_y);
        assert_eq!(matrix[2], [0.0, 0.0, 1.0]);
    }

    #[test]
    fn full_frame_crop_is_identity() {
        let rect = NormalizedRect {
            left: 0.0,
            top: 0.0,
            right: 1.0,
            bottom: 1.0,
        };
        let transform = AffineTransform::from_crop(&rect);
        assert!(close(transform.scale_x, 1.0) && close(transform.scale_y, 1.0));
        assert!(close(transform.translate_x, 0.0) && close(transform.translate_y, 0.0));
    }
}
