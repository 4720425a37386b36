//src/config.rs
use comfy_table::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use thiserror::Error;

use crate::model::DEFAULT_REST_TIME;
use crate::units::WeightUnit;
use crate::validation::REST_TIME_MAX;

const CONFIG_FILE_NAME: &str = "config.toml";
pub(crate) const APP_DIR: &str = "workout-tracker";
const CONFIG_ENV_VAR: &str = "WORKOUT_CONFIG_DIR"; // Environment variable name

pub const DEFAULT_PR_SESSIONS: usize = 3;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Could not determine configuration directory.")]
    CannotDetermineConfigDir,
    #[error("I/O error accessing config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file (TOML): {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize config data (TOML): {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid color name: {0}")]
    InvalidColor(String),
    #[error("Default rest time must be between 0 and {max} seconds, got {0}.", max = REST_TIME_MAX)]
    InvalidRestTime(u32),
    #[error("Personal record window must cover at least one session.")]
    InvalidPrSessions,
}

/// Read access to the user's preferences.
pub trait Preferences {
    fn weight_unit(&self) -> WeightUnit;
    fn default_rest_time(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum StandardColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    DarkGrey,
    Grey,
}

impl From<StandardColor> for Color {
    fn from(value: StandardColor) -> Self {
        match value {
            StandardColor::Black => Self::Black,
            StandardColor::Red => Self::Red,
            StandardColor::Green => Self::Green,
            StandardColor::Yellow => Self::Yellow,
            StandardColor::Blue => Self::Blue,
            StandardColor::Magenta => Self::Magenta,
            StandardColor::Cyan => Self::Cyan,
            StandardColor::White => Self::White,
            StandardColor::DarkGrey => Self::DarkGrey,
            StandardColor::Grey => Self::Grey,
        }
    }
}

pub fn parse_color(color_str: &str) -> Result<StandardColor, Error> {
    StandardColor::iter()
        .find(|color| format!("{color:?}").eq_ignore_ascii_case(color_str))
        .ok_or_else(|| Error::InvalidColor(color_str.to_string()))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Theme {
    pub header_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header_color: "Green".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)] // Ensure defaults are used if fields are missing
pub struct Config {
    pub weight_unit: WeightUnit,
    pub default_rest_time: u32,
    pub auto_start_rest_timer: bool,
    /// How many recent sessions the progress view inspects for records.
    pub personal_record_sessions: usize,
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            weight_unit: WeightUnit::default(),
            default_rest_time: DEFAULT_REST_TIME,
            auto_start_rest_timer: true,
            personal_record_sessions: DEFAULT_PR_SESSIONS,
            theme: Theme::default(),
        }
    }
}

impl Preferences for Config {
    fn weight_unit(&self) -> WeightUnit {
        self.weight_unit
    }

    fn default_rest_time(&self) -> u32 {
        self.default_rest_time
    }
}

impl Config {
    /// # Errors
    /// Returns `Error::InvalidRestTime` when above the allowed maximum.
    pub fn set_default_rest_time(&mut self, seconds: u32) -> Result<(), Error> {
        if seconds > REST_TIME_MAX {
            return Err(Error::InvalidRestTime(seconds));
        }
        self.default_rest_time = seconds;
        Ok(())
    }

    /// # Errors
    /// Returns `Error::InvalidPrSessions` for zero.
    pub fn set_personal_record_sessions(&mut self, sessions: usize) -> Result<(), Error> {
        if sessions == 0 {
            return Err(Error::InvalidPrSessions);
        }
        self.personal_record_sessions = sessions;
        Ok(())
    }
}

/// Determines the path to the configuration file.
pub fn get_config_path() -> Result<PathBuf, Error> {
    let config_dir_path = if let Ok(path_str) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path_str);
        if !path.is_dir() {
            tracing::warn!(
                var = CONFIG_ENV_VAR,
                path = %path.display(),
                "Config directory override does not exist; creating it"
            );
            fs::create_dir_all(&path)?;
        }
        path
    } else {
        let base_config_dir = dirs::config_dir().ok_or(Error::CannotDetermineConfigDir)?;
        base_config_dir.join(APP_DIR)
    };

    if !config_dir_path.exists() {
        fs::create_dir_all(&config_dir_path)?;
    }

    Ok(config_dir_path.join(CONFIG_FILE_NAME))
}

/// Loads the configuration, writing defaults when the file does not exist yet.
pub fn load(config_path: &Path) -> Result<Config, Error> {
    if config_path.exists() {
        let config_content = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&config_content)?;
        Ok(config)
    } else {
        let default_config = Config::default();
        save(config_path, &default_config)?;
        Ok(default_config)
    }
}

pub fn save(config_path: &Path, config: &Config) -> Result<(), Error> {
    if let Some(parent_dir) = config_path.parent() {
        if !parent_dir.exists() {
            fs::create_dir_all(parent_dir)?;
        }
    }
    let config_content = toml::to_string_pretty(config)?;
    fs::write(config_path, config_content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let config = load(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "weight_unit = \"lb\"\n").unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.weight_unit(), WeightUnit::Pounds);
        assert_eq!(config.default_rest_time(), DEFAULT_REST_TIME);
        assert_eq!(config.personal_record_sessions, DEFAULT_PR_SESSIONS);
    }

    #[test]
    fn saved_preferences_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let mut config = Config {
            weight_unit: WeightUnit::Pounds,
            ..Config::default()
        };
        config.set_default_rest_time(120).unwrap();
        save(&path, &config).unwrap();
        assert_eq!(load(&path).unwrap(), config);
    }

    #[test]
    fn rejects_invalid_values() {
        let mut config = Config::default();
        assert!(matches!(
            config.set_default_rest_time(REST_TIME_MAX + 1),
            Err(Error::InvalidRestTime(_))
        ));
        assert!(matches!(
            config.set_personal_record_sessions(0),
            Err(Error::InvalidPrSessions)
        ));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn parses_colors_case_insensitively() {
        assert_eq!(parse_color("cyan").unwrap(), StandardColor::Cyan);
        assert!(matches!(parse_color("chartreuse"), Err(Error::InvalidColor(_))));
    }
}
