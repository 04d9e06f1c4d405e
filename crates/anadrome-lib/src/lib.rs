pub mod crop;
pub mod engine;
pub mod lock;
pub mod placeholder;
pub mod power;
pub mod renderer;
pub mod state;
pub mod surface;
pub mod transform;

pub use crop::{AffineTransform, CropError, CropFrame, NormalizedRect, Rect, letterbox};
pub use engine::{
    EngineEvent, EngineHandle, FixedSource, LockSource, PowerSaveSource, WallpaperEngine,
    event_channel,
};
pub use lock::{LockHandle, LockMonitor, start_lock_monitor};
pub use placeholder::{Placeholder, PlaceholderError};
pub use power::{PowerSaveHandle, PowerSaveMonitor, start_power_save_monitor};
pub use renderer::{
    LoopMode, PlaybackState, Renderer, RendererError, RendererEvent, RendererEvents,
    RendererFactory,
};
pub use state::EngineState;
pub use surface::{NullSurface, Surface, SurfaceError, SurfaceEvent};
pub use transform::{
    ActivationError, CropPipeline, Notice, Notifier, Progress, Submission, TransformControl,
    TransformError, TransformService, WallpaperActivator,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_source_defaults_to_locked_without_power_saver() {
        let source = FixedSource::default();
        assert!(!source.is_unlocked());
        assert!(!source.is_power_save_active());
    }
}
