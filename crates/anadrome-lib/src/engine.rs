// SPDX-License-Identifier: MPL-2.0

//! The wallpaper engine: reconciles host surface lifecycle, device signals and
//! user preferences into renderer commands.
//!
//! [`WallpaperEngine::handle`] is the single entry point and is fully
//! synchronous. [`EngineHandle`] owns an engine on a dedicated thread running a
//! calloop event loop, so callbacks arriving from several dispatch contexts are
//! applied one at a time, in arrival order.

use std::{sync::Arc, thread, time::Duration};

use anadrome_config::{PreferenceStore, Preferences, VideoRef};
use calloop::channel::{Channel, Sender};
use eyre::{Context, eyre};
use tracing::{debug, info, trace, warn};

use crate::{
    placeholder::Placeholder,
    renderer::{LoopMode, PlaybackState, Renderer, RendererEvent, RendererEvents, RendererFactory},
    state::EngineState,
    surface::{Surface, SurfaceEvent},
};

/// Reports whether the system power saver is on.
pub trait PowerSaveSource: Send {
    fn is_power_save_active(&self) -> bool;
}

/// Reports whether the device is currently unlocked.
pub trait LockSource: Send {
    fn is_unlocked(&self) -> bool;
}

/// Constant device state, for hosts without monitors and for tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedSource {
    pub power_save: bool,
    pub unlocked: bool,
}

impl PowerSaveSource for FixedSource {
    fn is_power_save_active(&self) -> bool {
        self.power_save
    }
}

impl LockSource for FixedSource {
    fn is_unlocked(&self) -> bool {
        self.unlocked
    }
}

/// Everything the engine reacts to.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Surface(SurfaceEvent),
    Unlocked,
    ScreenOff,
    PowerSaveChanged(bool),
    Renderer {
        generation: u64,
        event: RendererEvent,
    },
}

impl From<SurfaceEvent> for EngineEvent {
    fn from(event: SurfaceEvent) -> Self {
        Self::Surface(event)
    }
}

/// Creates renderers and stamps each one with a fresh generation.
struct Renderers {
    factory: Box<dyn RendererFactory>,
    generation: u64,
    tx: Option<Sender<EngineEvent>>,
}

impl Renderers {
    fn create(
        &mut self,
        video: &VideoRef,
        surface: &Arc<dyn Surface>,
        loop_mode: LoopMode,
    ) -> Option<Box<dyn Renderer>> {
        self.generation += 1;
        let events = RendererEvents::new(self.generation, self.tx.clone());

        match self
            .factory
            .create(video, Arc::clone(surface), loop_mode, events)
        {
            Ok(renderer) => {
                info!(%video, generation = self.generation, ?loop_mode, "Renderer created");
                Some(renderer)
            }
            Err(err) => {
                warn!(%video, ?err, "Failed to create renderer, wallpaper stays static");
                None
            }
        }
    }
}

/// State that only exists while the host has a surface for us.
struct Binding {
    state: EngineState,
    surface: Arc<dyn Surface>,
    renderer: Option<Box<dyn Renderer>>,
    loop_mode: LoopMode,
}

impl Binding {
    fn play(&mut self, placeholder: Option<&Placeholder>) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };

        if self.state.placeholder_armed && !self.state.has_rendered_first_frame {
            if let Some(placeholder) = placeholder {
                match placeholder.paint(self.surface.as_ref()) {
                    Ok(()) => debug!("Painted placeholder until the first frame arrives"),
                    Err(err) => warn!(?err, "Failed to paint placeholder"),
                }
            }
        }

        renderer.play();
    }

    fn pause(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.pause();
        }
    }

    fn seek(&mut self, position: Duration) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.seek(position);
        }
    }

    fn sync_loop_mode(&mut self) {
        let mode = LoopMode::from_continuous(self.state.loop_continuously);
        if mode == self.loop_mode {
            return;
        }
        self.loop_mode = mode;
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.set_loop_mode(mode);
        }
    }

    /// Idle-but-visible wallpapers show the final frame of the clip.
    fn rest_at_last_frame(&mut self) {
        if let Some(renderer) = self.renderer.as_mut() {
            match renderer.duration() {
                Some(duration) => renderer.seek(duration),
                None => trace!("Duration unknown, leaving position untouched"),
            }
        }
    }

    fn release_renderer(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            renderer.release();
        }
        self.state.has_rendered_first_frame = false;
        self.state.playback = PlaybackState::Idle;
        self.state.video_dimensions = None;
    }
}

/// Video wallpaper engine for one surface at a time.
pub struct WallpaperEngine {
    store: Box<dyn PreferenceStore>,
    renderers: Renderers,
    power: Box<dyn PowerSaveSource>,
    lock: Box<dyn LockSource>,
    placeholder: Option<Placeholder>,
    binding: Option<Binding>,
}

impl std::fmt::Debug for WallpaperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WallpaperEngine")
            .field("state", &self.state())
            .field("generation", &self.renderers.generation)
            .field("placeholder", &self.placeholder.is_some())
            .finish_non_exhaustive()
    }
}

impl WallpaperEngine {
    pub fn new(store: Box<dyn PreferenceStore>, factory: Box<dyn RendererFactory>) -> Self {
        Self {
            store,
            renderers: Renderers {
                factory,
                generation: 0,
                tx: None,
            },
            power: Box::new(FixedSource::default()),
            lock: Box::new(FixedSource::default()),
            placeholder: None,
            binding: None,
        }
    }

    #[must_use]
    pub fn with_power_source(mut self, power: impl PowerSaveSource + 'static) -> Self {
        self.power = Box::new(power);
        self
    }

    #[must_use]
    pub fn with_lock_source(mut self, lock: impl LockSource + 'static) -> Self {
        self.lock = Box::new(lock);
        self
    }

    #[must_use]
    pub fn with_placeholder(mut self, placeholder: Placeholder) -> Self {
        let (width, height) = placeholder.dimensions();
        info!(width, height, "Placeholder loaded");
        self.placeholder = Some(placeholder);
        self
    }

    /// Route renderer callbacks through `tx` for renderers created from now on.
    pub fn connect(&mut self, tx: Sender<EngineEvent>) {
        self.renderers.tx = Some(tx);
    }

    /// State of the bound surface, `None` while unbound.
    #[must_use]
    pub fn state(&self) -> Option<&EngineState> {
        self.binding.as_ref().map(|binding| &binding.state)
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    #[must_use]
    pub fn has_renderer(&self) -> bool {
        self.binding
            .as_ref()
            .is_some_and(|binding| binding.renderer.is_some())
    }

    /// Generation of the most recently created renderer.
    #[must_use]
    pub fn renderer_generation(&self) -> u64 {
        self.renderers.generation
    }

    pub fn handle(&mut self, event: EngineEvent) {
        trace!(?event, "Engine event");

        match event {
            EngineEvent::Surface(SurfaceEvent::Created(surface)) => self.surface_created(surface),
            EngineEvent::Surface(SurfaceEvent::Changed { width, height }) => {
                if let Some(binding) = self.binding.as_mut() {
                    debug!(width, height, "Surface changed");
                    binding.state.surface_size = (width, height);
                }
            }
            EngineEvent::Surface(SurfaceEvent::VisibilityChanged(true)) => self.became_visible(),
            EngineEvent::Surface(SurfaceEvent::VisibilityChanged(false)) => self.became_hidden(),
            EngineEvent::Surface(SurfaceEvent::Destroyed) => self.shutdown(),
            EngineEvent::Unlocked => self.unlocked(),
            EngineEvent::ScreenOff => self.screen_off(),
            EngineEvent::PowerSaveChanged(active) => self.power_save_changed(active),
            EngineEvent::Renderer { generation, event } => self.renderer_event(generation, event),
        }

        if let Some(state) = self.state() {
            debug!(
                should_play = state.should_play(),
                visible = state.is_surface_visible,
                unlocked = state.is_unlocked,
                power_save = state.is_power_save_active,
                "Engine state"
            );
        }
    }

    /// Release the renderer and forget the surface.
    pub fn shutdown(&mut self) {
        if let Some(mut binding) = self.binding.take() {
            binding.release_renderer();
            info!("Surface released");
        }
    }

    fn surface_created(&mut self, surface: Arc<dyn Surface>) {
        if self.binding.is_some() {
            warn!("Surface created while another is bound, releasing the old one");
            self.shutdown();
        }

        let preferences = Preferences::load(self.store.as_ref());
        let mut state = EngineState {
            is_unlocked: self.lock.is_unlocked(),
            is_power_save_active: self.power.is_power_save_active(),
            placeholder_armed: true,
            surface_size: surface.size(),
            ..EngineState::default()
        };
        state.apply_preferences(&preferences);

        let loop_mode = LoopMode::from_continuous(state.loop_continuously);
        let renderer = match &preferences.video {
            Some(video) => {
                let renderer = self.renderers.create(video, &surface, loop_mode);
                if renderer.is_some() {
                    state.active_video = Some(video.clone());
                }
                renderer
            }
            None => {
                warn!("No video selected, wallpaper stays static");
                None
            }
        };

        info!(?state, "Surface created");
        self.binding = Some(Binding {
            state,
            surface,
            renderer,
            loop_mode,
        });

        let Some(binding) = self.binding.as_mut() else {
            return;
        };
        if binding.state.should_play() {
            binding.play(self.placeholder.as_ref());
        } else {
            binding.pause();
        }
    }

    fn became_visible(&mut self) {
        let preferences = Preferences::load(self.store.as_ref());
        let Some(binding) = self.binding.as_mut() else {
            trace!("Visibility changed while unbound");
            return;
        };

        binding.state.is_surface_visible = true;
        binding.state.apply_preferences(&preferences);
        binding.sync_loop_mode();
        self.check_and_update_video(preferences.video);

        let Some(binding) = self.binding.as_mut() else {
            return;
        };
        let should_play = binding.state.should_play();

        if binding.state.replay_on_return && should_play {
            debug!("Replaying from the start on return");
            binding.seek(Duration::ZERO);
            binding.play(self.placeholder.as_ref());
        } else {
            binding.rest_at_last_frame();
            if should_play && binding.state.loop_continuously {
                binding.play(self.placeholder.as_ref());
            } else {
                binding.pause();
            }
        }
    }

    fn became_hidden(&mut self) {
        let Some(binding) = self.binding.as_mut() else {
            trace!("Visibility changed while unbound");
            return;
        };

        binding.state.is_surface_visible = false;
        if !binding.state.loop_continuously {
            binding.pause();
        }
    }

    fn unlocked(&mut self) {
        let preferences = Preferences::load(self.store.as_ref());
        let Some(binding) = self.binding.as_mut() else {
            trace!("Unlocked while unbound");
            return;
        };

        binding.state.apply_preferences(&preferences);
        binding.sync_loop_mode();
        let was_playing = binding.state.should_play();
        binding.state.is_unlocked = true;
        let replaced = self.check_and_update_video(preferences.video);

        let Some(binding) = self.binding.as_mut() else {
            return;
        };
        // restart only when the decision flips on or the clip was swapped
        if binding.state.should_play() && (!was_playing || replaced) {
            binding.seek(Duration::ZERO);
            binding.play(self.placeholder.as_ref());
        }
    }

    fn screen_off(&mut self) {
        let Some(binding) = self.binding.as_mut() else {
            trace!("Screen off while unbound");
            return;
        };

        binding.state.is_unlocked = false;
        binding.pause();
        binding.seek(Duration::ZERO);
        binding.state.has_rendered_first_frame = false;
        binding.state.placeholder_armed = true;
    }

    fn power_save_changed(&mut self, active: bool) {
        let Some(binding) = self.binding.as_mut() else {
            trace!(active, "Power save changed while unbound");
            return;
        };

        let was_playing = binding.state.should_play();
        binding.state.is_power_save_active = active;

        match (was_playing, binding.state.should_play()) {
            (true, false) => binding.pause(),
            (false, true) => binding.play(self.placeholder.as_ref()),
            _ => trace!(active, "Play decision unchanged"),
        }
    }

    fn renderer_event(&mut self, generation: u64, event: RendererEvent) {
        let Some(binding) = self.binding.as_mut() else {
            trace!(generation, ?event, "Renderer event while unbound");
            return;
        };
        if generation != self.renderers.generation || binding.renderer.is_none() {
            debug!(generation, ?event, "Dropping event from a released renderer");
            return;
        }

        match event {
            RendererEvent::FirstFrameRendered => {
                binding.state.has_rendered_first_frame = true;
                binding.state.placeholder_armed = false;
            }
            RendererEvent::PlaybackStateChanged(playback) => {
                binding.state.playback = playback;
                if playback == PlaybackState::Ready
                    && binding.state.respect_power_saver
                    && binding.state.is_power_save_active
                {
                    debug!("Power saver on, holding the first frame");
                    binding.pause();
                }
            }
            RendererEvent::VideoDimensions { width, height } => {
                debug!(width, height, "Video dimensions");
                binding.state.video_dimensions = Some((width, height));
            }
        }
    }

    /// Make the renderer match the stored video, recreating it on mismatch.
    /// Returns whether the renderer was replaced.
    fn check_and_update_video(&mut self, stored: Option<VideoRef>) -> bool {
        let Some(binding) = self.binding.as_mut() else {
            return false;
        };
        if binding.state.active_video == stored {
            return false;
        }

        info!(from = ?binding.state.active_video, to = ?stored, "Video changed");
        binding.release_renderer();
        binding.state.active_video = None;

        if let Some(video) = stored {
            binding.loop_mode = LoopMode::from_continuous(binding.state.loop_continuously);
            binding.renderer = self.renderers.create(&video, &binding.surface, binding.loop_mode);
            if binding.renderer.is_some() {
                binding.state.active_video = Some(video);
            }
        }
        true
    }
}

/// Channel feeding an [`EngineHandle`]. Hand clones of the sender to monitors.
pub fn event_channel() -> (Sender<EngineEvent>, Channel<EngineEvent>) {
    calloop::channel::channel()
}

struct EngineLoop {
    engine: WallpaperEngine,
    exit: bool,
}

fn run_loop(
    mut engine: WallpaperEngine,
    events_tx: Sender<EngineEvent>,
    events_rx: Channel<EngineEvent>,
    stop_rx: Channel<()>,
) -> eyre::Result<()> {
    let mut event_loop: calloop::EventLoop<'static, EngineLoop> =
        calloop::EventLoop::try_new().wrap_err("failed to create event loop")?;

    event_loop
        .handle()
        .insert_source(events_rx, |event, _, state| {
            if let calloop::channel::Event::Msg(event) = event {
                state.engine.handle(event);
            }
        })
        .map_err(|err| eyre!("failed to insert engine events into event loop: {err}"))?;

    event_loop
        .handle()
        .insert_source(stop_rx, |event, _, state| match event {
            calloop::channel::Event::Msg(()) | calloop::channel::Event::Closed => {
                state.exit = true;
            }
        })
        .map_err(|err| eyre!("failed to insert stop channel into event loop: {err}"))?;

    engine.connect(events_tx);
    let mut state = EngineLoop {
        engine,
        exit: false,
    };

    while !state.exit {
        event_loop.dispatch(None, &mut state)?;
    }

    state.engine.shutdown();
    Ok(())
}

/// Owns a [`WallpaperEngine`] on its own thread.
pub struct EngineHandle {
    events: Sender<EngineEvent>,
    stop_tx: Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl EngineHandle {
    pub fn spawn(engine: WallpaperEngine, channel: (Sender<EngineEvent>, Channel<EngineEvent>)) -> Self {
        let (events, events_rx) = channel;
        let (stop_tx, stop_rx) = calloop::channel::channel();
        let loop_tx = events.clone();

        let join = thread::Builder::new()
            .name("anadrome-engine".into())
            .spawn(move || {
                if let Err(err) = run_loop(engine, loop_tx, events_rx, stop_rx) {
                    tracing::error!(?err, "wallpaper engine exited with error");
                }
            })
            .map_err(|err| tracing::error!(?err, "failed to spawn engine thread"))
            .ok();

        Self {
            events,
            stop_tx,
            join,
        }
    }

    /// A sender for surface hosts and monitors.
    #[must_use]
    pub fn sender(&self) -> Sender<EngineEvent> {
        self.events.clone()
    }

    /// Queue an event. Returns `false` once the engine has stopped.
    pub fn send(&self, event: impl Into<EngineEvent>) -> bool {
        self.events.send(event.into()).is_ok()
    }

    pub fn stop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
