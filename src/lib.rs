//src/lib.rs
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// --- Declare modules ---
pub mod clock;
mod config;
pub mod db;
mod error;
mod events;
mod exercises;
pub mod model;
pub mod session;
mod stats;
pub mod store;
mod templates;
pub mod units;
pub mod validation;
mod workouts;

// --- Expose public types ---
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    get_config_path as get_config_path_util, load as load_config_util, parse_color,
    save as save_config_util, Config, Error as ConfigError, Preferences, StandardColor, Theme,
};
pub use db::{get_db_path as get_db_path_util, DbError, SqliteStore};
pub use error::{EntityKind, Error, Result};
pub use events::{Action, Change, ChangeEvent};
pub use model::{
    Category, Exercise, MuscleGroup, SetConfig, TemplateExercise, Workout, WorkoutExercise,
    WorkoutSet, WorkoutTemplate,
};
pub use session::{SessionError, SessionStatus, WorkoutSession};
pub use stats::{
    ExerciseHistoryEntry, ExerciseProgress, ExerciseStats, FrequentExercise, ProgressSession,
    ProgressSet, TimeRange, Trend, TrendDirection, WorkoutStats,
};
pub use store::{DateRange, Store};
pub use units::WeightUnit;
pub use validation::{Field, Reason, ValidationError};

/// Entry point for every operation: owns the store, the preferences and the clock.
///
/// Reads take `&self`, writes take `&mut self`, so writes against one store
/// are serialized. `rusqlite::Connection` is `Send` but not `Sync`, so callers
/// sharing a service across threads wrap it in a `Mutex`.
pub struct AppService<S: Store = SqliteStore> {
    pub config: Config,
    store: S,
    clock: Arc<dyn Clock>,
    db_path: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl AppService<SqliteStore> {
    /// Initializes the application service from the on-disk config and database.
    /// # Errors
    /// Returns `anyhow::Error` if config/db path determination, loading, or initialization fails.
    pub fn initialize() -> anyhow::Result<Self> {
        let config_path =
            config::get_config_path().context("Failed to determine configuration file path")?;
        let config = config::load(&config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"))?;

        let db_path = db::get_db_path().context("Failed to determine database path")?;
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open database at {db_path:?}"))?;
        tracing::debug!(db = %db_path.display(), config = %config_path.display(), "Service initialized");

        Ok(Self {
            config,
            store,
            clock: Arc::new(SystemClock),
            db_path: Some(db_path),
            config_path: Some(config_path),
        })
    }
}

impl<S: Store> AppService<S> {
    /// Builds a service that is not tied to any file: config changes stay in memory.
    pub fn new(store: S, config: Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            store,
            clock,
            db_path: None,
            config_path: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    pub fn get_db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn get_config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Saves the current configuration state.
    /// # Errors
    /// Returns `ConfigError` if saving fails.
    pub fn save_config(&self) -> Result<(), ConfigError> {
        match &self.config_path {
            Some(path) => config::save(path, &self.config),
            None => Ok(()),
        }
    }

    /// Sets the display unit for weights.
    /// # Errors
    /// Returns `ConfigError` variants if saving fails.
    pub fn set_weight_unit(&mut self, unit: WeightUnit) -> Result<(), ConfigError> {
        self.config.weight_unit = unit;
        self.save_config()
    }

    /// Sets the rest time given to new sets.
    /// # Errors
    /// - `ConfigError::InvalidRestTime` if above the maximum.
    /// - `ConfigError` variants if saving fails.
    pub fn set_default_rest_time(&mut self, seconds: u32) -> Result<(), ConfigError> {
        self.config.set_default_rest_time(seconds)?;
        self.save_config()
    }

    /// # Errors
    /// - `ConfigError::InvalidPrSessions` for zero.
    /// - `ConfigError` variants if saving fails.
    pub fn set_personal_record_sessions(&mut self, sessions: usize) -> Result<(), ConfigError> {
        self.config.set_personal_record_sessions(sessions)?;
        self.save_config()
    }

    /// Turns the rest countdown after completing a set on or off.
    /// # Errors
    /// Returns `ConfigError` variants if saving fails.
    pub fn set_auto_start_rest_timer(&mut self, enabled: bool) -> Result<(), ConfigError> {
        self.config.auto_start_rest_timer = enabled;
        self.save_config()
    }

    /// Seconds of rest to count down after `set`, if a countdown should start.
    ///
    /// `None` unless the set is completed, auto-start is enabled, and the set
    /// has a rest time.
    pub fn rest_countdown(&self, set: &WorkoutSet) -> Option<u32> {
        (self.config.auto_start_rest_timer && set.completed && set.rest_time > 0)
            .then_some(set.rest_time)
    }

    pub(crate) fn preferences(&self) -> &dyn Preferences {
        &self.config
    }
}
