// SPDX-License-Identifier: MPL-2.0

//! Per-surface engine state and the play decision derived from it.

use anadrome_config::{Preferences, VideoRef};

use crate::renderer::PlaybackState;

/// Everything the engine knows about one bound surface.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
pub struct EngineState {
    pub is_surface_visible: bool,
    pub is_unlocked: bool,
    pub is_power_save_active: bool,
    pub respect_power_saver: bool,
    pub loop_continuously: bool,
    pub replay_on_return: bool,
    /// Only set by a renderer callback; reset on screen-off and renderer teardown.
    pub has_rendered_first_frame: bool,
    pub active_video: Option<VideoRef>,
    /// Cleared by the first rendered frame, re-armed only by screen-off.
    pub placeholder_armed: bool,
    pub surface_size: (u32, u32),
    pub video_dimensions: Option<(u32, u32)>,
    pub playback: PlaybackState,
}

impl EngineState {
    /// Whether the wallpaper should currently be animating.
    #[must_use]
    pub fn should_play(&self) -> bool {
        self.is_surface_visible
            && self.is_unlocked
            && !(self.respect_power_saver && self.is_power_save_active)
    }

    /// Copy the preference flags from a fresh snapshot. The video is reconciled separately.
    pub fn apply_preferences(&mut self, preferences: &Preferences) {
        self.respect_power_saver = preferences.respect_power_saver;
        self.loop_continuously = preferences.loop_continuously;
        self.replay_on_return = preferences.replay_on_return;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_play_matches_gate_for_every_combination() {
        for bits in 0u8..16 {
            let state = EngineState {
                is_surface_visible: bits & 1 != 0,
                is_unlocked: bits & 2 != 0,
                is_power_save_active: bits & 4 != 0,
                respect_power_saver: bits & 8 != 0,
                ..EngineState::default()
            };
            let expected = state.is_surface_visible
                && state.is_unlocked
                && !(state.respect_power_saver && state.is_power_save_active);
            assert_eq!(state.should_play(), expected, "{state:?}");
        }
    }

    #[test]
    fn power_save_only_gates_when_respected() {
        let mut state = EngineState {
            is_surface_visible: true,
            is_unlocked: true,
            is_power_save_active: true,
            respect_power_saver: false,
            ..EngineState::default()
        };
        assert!(state.should_play());
        state.respect_power_saver = true;
        assert!(!state.should_play());
    }

    #[test]
    fn apply_preferences_keeps_active_video() {
        let mut state = EngineState {
            active_video: Some(VideoRef::from("a.mp4")),
            ..EngineState::default()
        };
        state.apply_preferences(&Preferences {
            video: Some(VideoRef::from("b.mp4")),
            respect_power_saver: false,
            loop_continuously: true,
            replay_on_return: true,
        });
        assert_eq!(state.active_video, Some(VideoRef::from("a.mp4")));
        assert!(state.loop_continuously && state.replay_on_return);
        assert!(!state.respect_power_saver);
    }
}
