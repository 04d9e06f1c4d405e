// SPDX-License-Identifier: MPL-2.0

//! Playback preferences for the video wallpaper.

use crate::{Context, PreferenceError, PreferenceStore, VideoRef};

// Config keys
pub const VIDEO_URI: &str = "video-uri";
pub const RESPECT_POWER_SAVER: &str = "respect-power-saver";
pub const LOOP_CONTINUOUSLY: &str = "loop-continuously";
pub const REPLAY_ON_RETURN: &str = "replay-on-return";

/// Snapshot of every preference the engine reads.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Video to load into the renderer, if one has been selected.
    pub video: Option<VideoRef>,
    /// Freeze playback while the system power saver is on
    pub respect_power_saver: bool,
    /// Repeat the clip forever instead of playing it once
    pub loop_continuously: bool,
    /// Play the clip from the start each time the wallpaper becomes visible
    pub replay_on_return: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            video: None,
            respect_power_saver: true, // On by default
            loop_continuously: false,
            replay_on_return: false,
        }
    }
}

impl Preferences {
    /// Read all preferences, falling back to defaults for missing keys.
    pub fn load(store: &dyn PreferenceStore) -> Self {
        let defaults = Self::default();
        Self {
            video: store.get_string(VIDEO_URI).map(VideoRef::from),
            respect_power_saver: store
                .get_bool(RESPECT_POWER_SAVER, defaults.respect_power_saver),
            loop_continuously: store.get_bool(LOOP_CONTINUOUSLY, defaults.loop_continuously),
            replay_on_return: store.get_bool(REPLAY_ON_RETURN, defaults.replay_on_return),
        }
    }

    /// Write every preference. The video key is left untouched when no video is set.
    pub fn save(&self, store: &dyn PreferenceStore) -> Result<(), PreferenceError> {
        if let Some(video) = &self.video {
            store.set_string(VIDEO_URI, video.as_str())?;
        }
        store.set_bool(RESPECT_POWER_SAVER, self.respect_power_saver)?;
        store.set_bool(LOOP_CONTINUOUSLY, self.loop_continuously)?;
        store.set_bool(REPLAY_ON_RETURN, self.replay_on_return)?;
        Ok(())
    }
}

impl Context {
    /// Get the selected video.
    #[must_use]
    pub fn video(&self) -> Option<VideoRef> {
        self.get_string(VIDEO_URI).map(VideoRef::from)
    }

    /// Set the selected video.
    pub fn set_video(&self, video: &VideoRef) -> Result<(), PreferenceError> {
        self.set_string(VIDEO_URI, video.as_str())
    }

    /// Get the respect power saver setting.
    #[must_use]
    pub fn respect_power_saver(&self) -> bool {
        self.get_bool(RESPECT_POWER_SAVER, true)
    }

    /// Set the respect power saver setting.
    pub fn set_respect_power_saver(&self, value: bool) -> Result<(), PreferenceError> {
        self.set_bool(RESPECT_POWER_SAVER, value)
    }

    /// Get the loop continuously setting.
    #[must_use]
    pub fn loop_continuously(&self) -> bool {
        self.get_bool(LOOP_CONTINUOUSLY, false)
    }

    /// Set the loop continuously setting.
    pub fn set_loop_continuously(&self, value: bool) -> Result<(), PreferenceError> {
        self.set_bool(LOOP_CONTINUOUSLY, value)
    }

    /// Get the replay on return setting.
    #[must_use]
    pub fn replay_on_return(&self) -> bool {
        self.get_bool(REPLAY_ON_RETURN, false)
    }

    /// Set the replay on return setting.
    pub fn set_replay_on_return(&self, value: bool) -> Result<(), PreferenceError> {
        self.set_bool(REPLAY_ON_RETURN, value)
    }

    /// Load the full preference snapshot.
    #[must_use]
    pub fn preferences(&self) -> Preferences {
        Preferences::load(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn empty_store_yields_defaults() {
        let store = MemoryStore::new();
        let prefs = Preferences::load(&store);
        assert_eq!(prefs, Preferences::default());
        assert!(prefs.respect_power_saver);
        assert!(!prefs.loop_continuously);
        assert!(!prefs.replay_on_return);
        assert!(prefs.video.is_none());
    }

    #[test]
    fn save_then_load_preserves_snapshot() {
        let prefs = Preferences {
            video: Some(VideoRef::from("file:///clip.mp4")),
            respect_power_saver: false,
            loop_continuously: true,
            replay_on_return: true,
        };
        let store = MemoryStore::with_preferences(&prefs);
        assert_eq!(Preferences::load(&store), prefs);
    }

    #[test]
    fn save_without_video_keeps_existing_selection() {
        let store = MemoryStore::new();
        store.set_string(VIDEO_URI, "file:///old.mp4").unwrap();

        Preferences::default().save(&store).unwrap();

        assert_eq!(
            Preferences::load(&store).video,
            Some(VideoRef::from("file:///old.mp4"))
        );
    }
}
