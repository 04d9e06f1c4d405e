// SPDX-License-Identifier: MPL-2.0

//! A renderer that decodes nothing and logs every command it receives.

use std::{sync::Arc, time::Duration};

use anadrome_config::VideoRef;
use anadrome_lib::{
    LoopMode, PlaybackState, Renderer, RendererError, RendererEvent, RendererEvents,
    RendererFactory, Surface,
};

/// Creates [`TraceRenderer`]s.
#[derive(Debug, Clone, Default)]
pub struct TraceFactory {
    clip: Option<Duration>,
    /// Report readiness and the first frame like a real backend would.
    live: bool,
}

impl TraceFactory {
    pub fn new(clip: Option<Duration>) -> Self {
        Self { clip, live: false }
    }

    pub fn live(clip: Option<Duration>) -> Self {
        Self { clip, live: true }
    }
}

impl RendererFactory for TraceFactory {
    fn create(
        &mut self,
        video: &VideoRef,
        surface: Arc<dyn Surface>,
        loop_mode: LoopMode,
        events: RendererEvents,
    ) -> Result<Box<dyn Renderer>, RendererError> {
        if video.as_str().trim().is_empty() {
            return Err(RendererError::Unreadable(video.clone()));
        }

        let (width, height) = surface.size();
        tracing::info!(
            %video,
            generation = events.generation(),
            ?loop_mode,
            width,
            height,
            "create renderer"
        );

        if self.live {
            events.emit(RendererEvent::PlaybackStateChanged(PlaybackState::Ready));
        }

        Ok(Box::new(TraceRenderer {
            clip: self.clip,
            live: self.live,
            presented: false,
            events,
        }))
    }
}

pub struct TraceRenderer {
    clip: Option<Duration>,
    live: bool,
    presented: bool,
    events: RendererEvents,
}

impl Renderer for TraceRenderer {
    fn play(&mut self) {
        tracing::info!(generation = self.events.generation(), "play");
        if self.live && !self.presented {
            self.presented = true;
            self.events.emit(RendererEvent::FirstFrameRendered);
        }
    }

    fn pause(&mut self) {
        tracing::info!(generation = self.events.generation(), "pause");
    }

    fn seek(&mut self, position: Duration) {
        tracing::info!(generation = self.events.generation(), ?position, "seek");
        // a seek shows a fresh frame once playback resumes
        self.presented = false;
    }

    fn set_loop_mode(&mut self, mode: LoopMode) {
        tracing::info!(generation = self.events.generation(), ?mode, "loop mode");
    }

    fn duration(&self) -> Option<Duration> {
        self.clip
    }

    fn release(self: Box<Self>) {
        tracing::info!(generation = self.events.generation(), "release");
    }
}
