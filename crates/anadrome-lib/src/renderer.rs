// SPDX-License-Identifier: MPL-2.0

//! Contract between the wallpaper engine and the video renderer.
//!
//! Decoding and presentation belong to the media library behind these traits.
//! The engine only issues transport commands and listens for the handful of
//! callbacks it needs to reconcile its state.

use std::{sync::Arc, time::Duration};

use anadrome_config::VideoRef;

use crate::{engine::EngineEvent, surface::Surface};

/// Whether the renderer stops at the end of the clip or wraps around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    Once,
    Repeat,
}

impl LoopMode {
    #[must_use]
    pub fn from_continuous(loop_continuously: bool) -> Self {
        if loop_continuously {
            Self::Repeat
        } else {
            Self::Once
        }
    }
}

/// Playback state reported by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Callbacks a renderer reports back to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererEvent {
    PlaybackStateChanged(PlaybackState),
    FirstFrameRendered,
    VideoDimensions { width: u32, height: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("video {0} is missing or unreadable")]
    Unreadable(VideoRef),

    #[error("renderer backend failed: {0}")]
    Backend(String),
}

/// Channel a renderer uses to report its callbacks.
///
/// Every event is stamped with the generation of the renderer it was handed
/// to, so the engine can drop callbacks from a renderer it already released.
#[derive(Clone)]
pub struct RendererEvents {
    generation: u64,
    tx: Option<calloop::channel::Sender<EngineEvent>>,
}

impl RendererEvents {
    pub(crate) fn new(generation: u64, tx: Option<calloop::channel::Sender<EngineEvent>>) -> Self {
        Self { generation, tx }
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Report an event. Silently dropped once the engine is gone.
    pub fn emit(&self, event: RendererEvent) {
        if let Some(tx) = &self.tx {
            if tx
                .send(EngineEvent::Renderer {
                    generation: self.generation,
                    event,
                })
                .is_err()
            {
                tracing::trace!(generation = self.generation, ?event, "engine gone, dropping renderer event");
            }
        }
    }
}

impl std::fmt::Debug for RendererEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererEvents")
            .field("generation", &self.generation)
            .field("connected", &self.tx.is_some())
            .finish()
    }
}

/// One video bound to one surface.
pub trait Renderer: Send {
    fn play(&mut self);

    fn pause(&mut self);

    fn seek(&mut self, position: Duration);

    fn set_loop_mode(&mut self, mode: LoopMode);

    /// Clip length, once the media has been probed.
    fn duration(&self) -> Option<Duration>;

    /// Tear the renderer down. No event may be emitted after this returns.
    fn release(self: Box<Self>);
}

/// Creates renderers. Implemented by the media backend.
pub trait RendererFactory: Send {
    /// Load `video` onto `surface`. The renderer must start paused.
    fn create(
        &mut self,
        video: &VideoRef,
        surface: Arc<dyn Surface>,
        loop_mode: LoopMode,
        events: RendererEvents,
    ) -> Result<Box<dyn Renderer>, RendererError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_mode_follows_preference() {
        assert_eq!(LoopMode::from_continuous(true), LoopMode::Repeat);
        assert_eq!(LoopMode::from_continuous(false), LoopMode::Once);
    }

    #[test]
    fn events_without_engine_are_dropped() {
        let events = RendererEvents::new(3, None);
        assert_eq!(events.generation(), 3);
        events.emit(RendererEvent::FirstFrameRendered);
    }

    #[test]
    fn renderer_error_display() {
        let err = RendererError::Unreadable(VideoRef::from("file:///missing.mp4"));
        assert!(err.to_string().contains("missing.mp4"));
    }
}
