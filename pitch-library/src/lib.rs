//! Track loading, play queue and configuration for Pitch

mod config;
mod loader;
mod playlist;

pub use config::{Config, PhaseLockSetting};
pub use loader::{mix_to_mono, LoadError, LoadedTrack, TrackLoader, TrackMetadata};
pub use playlist::Playlist;
