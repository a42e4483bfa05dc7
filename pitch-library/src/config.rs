//! Simple configuration persistence for Pitch
//!
//! Stores shifter tuning, the last pitch setting and the last played track.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Phase reconstruction strategy as stored in the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseLockSetting {
    #[default]
    Gradient,
    Peak,
}

impl PhaseLockSetting {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "gradient" | "heap" => Some(Self::Gradient),
            "peak" | "peaks" => Some(Self::Peak),
            _ => None,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Gradient => "gradient",
            Self::Peak => "peak",
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Largest pitch shift accepted in either direction
    pub max_semitones: f32,
    /// Spectral magnitude below which phases are not propagated
    pub magnitude_threshold: f32,
    /// Restart phase of components without history
    pub onset_seeding: bool,
    pub phase_lock: PhaseLockSetting,
    /// Pitch shift in use when the player last quit
    pub semitones: f32,
    /// Last track that was played
    pub last_track: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_semitones: 24.0,
            magnitude_threshold: 1e-4,
            onset_seeding: true,
            phase_lock: PhaseLockSetting::Gradient,
            semitones: 0.0,
            last_track: None,
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pitch")
            .join("config.txt")
    }

    /// Parse config from simple key=value format.
    ///
    /// Unknown keys are ignored; invalid values keep their defaults.
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            let applied = match key {
                "max_semitones" => value
                    .parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite() && *v > 0.0 && *v <= 48.0)
                    .map(|v| config.max_semitones = v),
                "magnitude_threshold" => value
                    .parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .map(|v| config.magnitude_threshold = v),
                "onset_seeding" => parse_bool(value).map(|v| config.onset_seeding = v),
                "phase_lock" => PhaseLockSetting::parse(value).map(|v| config.phase_lock = v),
                "semitones" => value
                    .parse::<f32>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(|v| config.semitones = v),
                "last_track" => {
                    config.last_track = (!value.is_empty()).then(|| PathBuf::from(value));
                    Some(())
                }
                _ => Some(()), // Ignore unknown keys
            };

            if applied.is_none() {
                debug!(key, value, "ignoring invalid config value");
            }
        }

        config.semitones = config.semitones.clamp(-config.max_semitones, config.max_semitones);
        config
    }

    /// Serialize config to simple key=value format
    pub fn serialize(&self) -> String {
        let mut lines = vec![
            "# Pitch Configuration".to_string(),
            format!("max_semitones={}", self.max_semitones),
            format!("magnitude_threshold={}", self.magnitude_threshold),
            format!("onset_seeding={}", self.onset_seeding),
            format!("phase_lock={}", self.phase_lock.as_str()),
            format!("semitones={}", self.semitones),
        ];

        if let Some(ref track) = self.last_track {
            lines.push(format!("last_track={}", track.display()));
        }

        lines.join("\n")
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert_eq!(Config::parse(""), Config::default());
    }

    #[test]
    fn test_parse_all_keys() {
        let content = "max_semitones=12\nmagnitude_threshold=0.001\nonset_seeding=off\n\
                       phase_lock=peak\nsemitones=-3\nlast_track=/music/song.wav";
        let config = Config::parse(content);

        assert_eq!(config.max_semitones, 12.0);
        assert_eq!(config.magnitude_threshold, 0.001);
        assert!(!config.onset_seeding);
        assert_eq!(config.phase_lock, PhaseLockSetting::Peak);
        assert_eq!(config.semitones, -3.0);
        assert_eq!(config.last_track, Some(PathBuf::from("/music/song.wav")));
    }

    #[test]
    fn test_parse_with_comments_and_unknown_keys() {
        let content = "# Comment\ncolour=blue\nsemitones=2\n# Another comment";
        let config = Config::parse(content);
        assert_eq!(config.semitones, 2.0);
        assert_eq!(config.max_semitones, 24.0);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let content = "max_semitones=-4\nmagnitude_threshold=NaN\nonset_seeding=maybe\n\
                       phase_lock=wobbly\nsemitones=inf\nnot a pair";
        assert_eq!(Config::parse(content), Config::default());
    }

    #[test]
    fn test_semitones_clamped_to_range() {
        let config = Config::parse("max_semitones=12\nsemitones=30");
        assert_eq!(config.semitones, 12.0);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config {
            max_semitones: 18.0,
            phase_lock: PhaseLockSetting::Peak,
            semitones: 7.0,
            last_track: Some(PathBuf::from("/test/path.wav")),
            ..Config::default()
        };

        assert_eq!(Config::parse(&config.serialize()), config);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir()
            .join(format!("pitch-config-test-{}", std::process::id()))
            .join("config.txt");
        let config = Config {
            semitones: -5.0,
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
