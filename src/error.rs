//src/error.rs
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::config::Error as ConfigError;
use crate::db::DbError;
use crate::session::SessionError;
use crate::store::ExerciseReferences;
use crate::validation::{Field, Reason, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Exercise,
    Workout,
    WorkoutExercise,
    WorkoutSet,
    Template,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exercise => "Exercise",
            Self::Workout => "Workout",
            Self::WorkoutExercise => "Workout exercise",
            Self::WorkoutSet => "Set",
            Self::Template => "Template",
        };
        f.write_str(name)
    }
}

/// Failure of a service operation.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Storage error: {0}")]
    Storage(#[source] DbError),
    #[error(
        "Exercise {exercise} is still used by {} workout entries and {} template entries",
        .references.workout_entries,
        .references.template_entries
    )]
    Referential {
        exercise: Uuid,
        references: ExerciseReferences,
    },
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: Uuid },
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<DbError> for Error {
    fn from(e: DbError) -> Self {
        match e {
            DbError::ExerciseNotFound(id) => Self::NotFound {
                kind: EntityKind::Exercise,
                id,
            },
            DbError::WorkoutNotFound(id) => Self::NotFound {
                kind: EntityKind::Workout,
                id,
            },
            DbError::TemplateNotFound(id) => Self::NotFound {
                kind: EntityKind::Template,
                id,
            },
            DbError::ExerciseNameNotUnique(_) => {
                Self::Validation(ValidationError::new(Field::ExerciseName, Reason::Duplicate))
            }
            other => Self::Storage(other),
        }
    }
}

impl Error {
    pub(crate) const fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
