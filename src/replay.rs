// SPDX-License-Identifier: MPL-2.0

//! Replay a scripted sequence of host and device events against the engine.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use anadrome_config::{
    MemoryStore, PreferenceStore, Preferences,
    playback::{LOOP_CONTINUOUSLY, REPLAY_ON_RETURN, RESPECT_POWER_SAVER, VIDEO_URI},
};
use anadrome_lib::{
    EngineEvent, EngineState, LockSource, NullSurface, Placeholder, PlaybackState,
    PowerSaveSource, RendererEvent, SurfaceEvent, WallpaperEngine,
};
use eyre::Context;
use serde::Deserialize;

use crate::trace::TraceFactory;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub preferences: Preferences,
    pub power_save: bool,
    pub unlocked: bool,
    /// Length reported by the renderer, in seconds.
    pub clip_secs: Option<f64>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum Step {
    Created { width: u32, height: u32 },
    Changed { width: u32, height: u32 },
    Visible,
    Hidden,
    Destroyed,
    Unlock,
    ScreenOff,
    PowerSave(bool),
    /// `None` clears the selection.
    SetVideo(Option<String>),
    RespectPowerSaver(bool),
    LoopContinuously(bool),
    ReplayOnReturn(bool),
    FirstFrame,
    Ready,
}

impl Scenario {
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read scenario {}", path.display()))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> eyre::Result<Self> {
        ron::from_str(text).wrap_err("invalid scenario")
    }
}

/// Device state the scenario toggles as it goes.
#[derive(Debug, Clone, Default)]
struct Device {
    power_save: Arc<AtomicBool>,
    unlocked: Arc<AtomicBool>,
}

impl PowerSaveSource for Device {
    fn is_power_save_active(&self) -> bool {
        self.power_save.load(Ordering::Relaxed)
    }
}

impl LockSource for Device {
    fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::Relaxed)
    }
}

/// Run every step in order. Returns the final state, `None` if unbound.
pub fn run(scenario: &Scenario, placeholder: Option<Placeholder>) -> eyre::Result<Option<EngineState>> {
    let store = MemoryStore::with_preferences(&scenario.preferences);
    let device = Device::default();
    device.power_save.store(scenario.power_save, Ordering::Relaxed);
    device.unlocked.store(scenario.unlocked, Ordering::Relaxed);

    let clip = scenario.clip_secs.map(Duration::from_secs_f64);
    let mut engine = WallpaperEngine::new(Box::new(store.clone()), Box::new(TraceFactory::new(clip)))
        .with_power_source(device.clone())
        .with_lock_source(device.clone());
    if let Some(placeholder) = placeholder {
        engine = engine.with_placeholder(placeholder);
    }

    for (index, step) in scenario.steps.iter().enumerate() {
        tracing::info!(index, ?step, "replay step");

        let event = match step {
            Step::Created { width, height } => {
                SurfaceEvent::Created(Arc::new(NullSurface::new(*width, *height))).into()
            }
            Step::Changed { width, height } => SurfaceEvent::Changed {
                width: *width,
                height: *height,
            }
            .into(),
            Step::Visible => SurfaceEvent::VisibilityChanged(true).into(),
            Step::Hidden => SurfaceEvent::VisibilityChanged(false).into(),
            Step::Destroyed => SurfaceEvent::Destroyed.into(),
            Step::Unlock => {
                device.unlocked.store(true, Ordering::Relaxed);
                EngineEvent::Unlocked
            }
            Step::ScreenOff => {
                device.unlocked.store(false, Ordering::Relaxed);
                EngineEvent::ScreenOff
            }
            Step::PowerSave(active) => {
                device.power_save.store(*active, Ordering::Relaxed);
                EngineEvent::PowerSaveChanged(*active)
            }
            Step::SetVideo(video) => {
                store.set_string(VIDEO_URI, video.as_deref().unwrap_or_default())?;
                continue;
            }
            Step::RespectPowerSaver(value) => {
                store.set_bool(RESPECT_POWER_SAVER, *value)?;
                continue;
            }
            Step::LoopContinuously(value) => {
                store.set_bool(LOOP_CONTINUOUSLY, *value)?;
                continue;
            }
            Step::ReplayOnReturn(value) => {
                store.set_bool(REPLAY_ON_RETURN, *value)?;
                continue;
            }
            Step::FirstFrame => EngineEvent::Renderer {
                generation: engine.renderer_generation(),
                event: RendererEvent::FirstFrameRendered,
            },
            Step::Ready => EngineEvent::Renderer {
                generation: engine.renderer_generation(),
                event: RendererEvent::PlaybackStateChanged(PlaybackState::Ready),
            },
        };

        engine.handle(event);
    }

    Ok(engine.state().cloned())
}
