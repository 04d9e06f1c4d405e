// SPDX-License-Identifier: MPL-2.0

//! Crop-then-assign: run the crop transform over the source video, store the
//! result as the wallpaper video and ask the host to activate the wallpaper.

use std::time::Duration;

use anadrome_config::{PreferenceStore, VideoRef, playback::VIDEO_URI};
use tokio::sync::oneshot;

use crate::crop::{AffineTransform, CropError, NormalizedRect};

/// How often transform progress is sampled.
pub const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransformError {
    #[error("failed to start transform: {0}")]
    Start(String),

    #[error("transform failed: {0}")]
    Failed(String),

    #[error("transform finished without reporting a result")]
    Abandoned,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ActivationError {
    #[error("not allowed to change the wallpaper")]
    PermissionDenied,

    #[error("wallpaper could not be activated: {0}")]
    Unavailable(String),
}

/// Progress as reported by the transform backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    NotStarted,
    WaitingForAvailability,
    Available(u8),
    Unavailable,
}

/// Control over a running transform.
pub trait TransformControl: Send {
    fn progress(&self) -> Progress;

    fn cancel(&mut self);
}

/// A started transform. `completion` resolves with the output video.
pub struct Submission {
    pub control: Box<dyn TransformControl>,
    pub completion: oneshot::Receiver<Result<VideoRef, TransformError>>,
}

/// Re-encodes a video with an affine transform applied to every frame.
pub trait TransformService: Send {
    fn submit(
        &mut self,
        source: &VideoRef,
        transform: AffineTransform,
    ) -> Result<Submission, TransformError>;
}

/// Asks the host to make this engine the active wallpaper.
pub trait WallpaperActivator: Send {
    fn activate(&mut self) -> Result<(), ActivationError>;
}

/// User-facing messages raised by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    InvalidCropArea,
    ProcessingFailed,
    /// Activation was refused; the user should retry from the system settings.
    OpenSystemSettings,
    ActivationFailed,
}

pub trait Notifier: Send {
    fn notice(&mut self, notice: Notice);

    fn progress(&mut self, _percent: u8) {}
}

/// Cancels the transform unless disarmed, so abandoning the pipeline future
/// stops the backend.
struct CancelOnDrop {
    control: Option<Box<dyn TransformControl>>,
}

impl CancelOnDrop {
    fn progress(&self) -> Progress {
        self.control
            .as_ref()
            .map_or(Progress::Unavailable, |control| control.progress())
    }

    fn disarm(&mut self) {
        self.control = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(mut control) = self.control.take() {
            tracing::info!("Crop abandoned, cancelling transform");
            control.cancel();
        }
    }
}

pub struct CropPipeline {
    service: Box<dyn TransformService>,
    activator: Box<dyn WallpaperActivator>,
    notifier: Box<dyn Notifier>,
    store: Box<dyn PreferenceStore>,
    poll_interval: Duration,
}

impl CropPipeline {
    pub fn new(
        service: Box<dyn TransformService>,
        activator: Box<dyn WallpaperActivator>,
        notifier: Box<dyn Notifier>,
        store: Box<dyn PreferenceStore>,
    ) -> Self {
        Self {
            service,
            activator,
            notifier,
            store,
            poll_interval: PROGRESS_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Crop `source` to `crop`, store the result and activate the wallpaper.
    ///
    /// Returns the stored output video. Dropping the future before it
    /// completes cancels the transform.
    pub async fn run(
        &mut self,
        source: &VideoRef,
        crop: NormalizedRect,
    ) -> Result<VideoRef, CropError> {
        if let Err(err) = crop.validate() {
            tracing::warn!(?crop, "Rejecting crop area");
            self.notifier.notice(Notice::InvalidCropArea);
            return Err(err);
        }

        let transform = AffineTransform::from_crop(&crop);
        tracing::debug!(%source, ?transform, "Submitting crop transform");

        let Submission {
            control,
            mut completion,
        } = match self.service.submit(source, transform) {
            Ok(submission) => submission,
            Err(err) => {
                tracing::error!(?err, "Could not start transform");
                self.notifier.notice(Notice::ProcessingFailed);
                return Err(err.into());
            }
        };

        let mut guard = CancelOnDrop {
            control: Some(control),
        };
        let mut ticker = tokio::time::interval(self.poll_interval);
        let mut polling = true;

        let outcome = loop {
            tokio::select! {
                result = &mut completion => break result,
                _ = ticker.tick(), if polling => match guard.progress() {
                    Progress::Available(percent) => self.notifier.progress(percent.min(100)),
                    other => {
                        tracing::trace!(?other, "Progress no longer available");
                        polling = false;
                    }
                },
            }
        };
        guard.disarm();

        let output = match outcome {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                tracing::error!(?err, "Transform failed");
                self.notifier.notice(Notice::ProcessingFailed);
                return Err(err.into());
            }
            Err(_) => {
                tracing::error!("Transform dropped its completion");
                self.notifier.notice(Notice::ProcessingFailed);
                return Err(TransformError::Abandoned.into());
            }
        };

        if let Err(err) = self.store.set_string(VIDEO_URI, output.as_str()) {
            tracing::error!(?err, "Failed to store cropped video");
            self.notifier.notice(Notice::ProcessingFailed);
            return Err(err.into());
        }
        tracing::info!(%output, "Cropped video stored");

        match self.activator.activate() {
            Ok(()) => Ok(output),
            Err(err) => {
                tracing::warn!(?err, "Wallpaper activation failed");
                self.notifier.notice(match err {
                    ActivationError::PermissionDenied => Notice::OpenSystemSettings,
                    ActivationError::Unavailable(_) => Notice::ActivationFailed,
                });
                Err(err.into())
            }
        }
    }
}
