//src/exercises.rs
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{EntityKind, Error, Result};
use crate::events::{Change, ChangeEvent};
use crate::model::{dedup_muscle_groups, Category, Exercise, MuscleGroup};
use crate::store::{ExerciseQuery, Store};
use crate::validation::{check_exercise_name, clean_notes, Field, Reason, ValidationError};
use crate::AppService;

/// The library inserted by `seed_sample_exercises`.
const SAMPLE_EXERCISES: [(&str, Category, &[MuscleGroup]); 4] = [
    (
        "Bench Press",
        Category::Chest,
        &[
            MuscleGroup::PectoralMajor,
            MuscleGroup::AnteriorDeltoid,
            MuscleGroup::TricepsBrachii,
        ],
    ),
    (
        "Squat",
        Category::Legs,
        &[
            MuscleGroup::Quadriceps,
            MuscleGroup::Glutes,
            MuscleGroup::Hamstrings,
        ],
    ),
    (
        "Deadlift",
        Category::Back,
        &[
            MuscleGroup::ErectorSpinae,
            MuscleGroup::Glutes,
            MuscleGroup::Hamstrings,
        ],
    ),
    (
        "Pull-up",
        Category::Back,
        &[MuscleGroup::LatissimusDorsi, MuscleGroup::BicepsBrachii],
    ),
];

/// Fails with `Duplicate` when another exercise already uses `name`.
fn ensure_unique_name<S: Store>(store: &S, name: &str, except: Option<Uuid>) -> Result<()> {
    match store.find_exercise_by_name(name)? {
        Some(existing) if Some(existing.id) != except => Err(ValidationError::new(
            Field::ExerciseName,
            Reason::Duplicate,
        )
        .into()),
        _ => Ok(()),
    }
}

fn insert_new_exercise<S: Store>(
    store: &S,
    now: DateTime<Utc>,
    name: &str,
    category: Category,
    muscle_groups: &[MuscleGroup],
    notes: Option<&str>,
) -> Result<Exercise> {
    check_exercise_name(name)?;
    let name = name.trim();
    ensure_unique_name(store, name, None)?;

    let exercise = Exercise {
        id: Uuid::new_v4(),
        name: name.to_string(),
        category,
        muscle_groups: dedup_muscle_groups(muscle_groups),
        notes: clean_notes(notes),
        created_at: now,
        updated_at: now,
    };
    store.insert_exercise(&exercise)?;
    Ok(exercise)
}

impl<S: Store> AppService<S> {
    /// Creates a new exercise definition.
    /// # Errors
    /// - `Error::Validation` if the name is invalid or already taken.
    /// - `Error::Storage` if the insert fails.
    pub fn create_exercise(
        &mut self,
        name: &str,
        category: Category,
        muscle_groups: &[MuscleGroup],
        notes: Option<&str>,
    ) -> Result<Change<Exercise>> {
        let now = self.now();
        let exercise = insert_new_exercise(&self.store, now, name, category, muscle_groups, notes)?;
        tracing::debug!(id = %exercise.id, name = %exercise.name, "Created exercise");
        let event = ChangeEvent::created(EntityKind::Exercise, exercise.id);
        Ok(Change::new(exercise, event))
    }

    /// All exercises sorted by name.
    /// # Errors
    /// Returns `Error::Storage` if the query fails.
    pub fn fetch_all_exercises(&self) -> Result<Vec<Exercise>> {
        Ok(self.store.query_exercises(&ExerciseQuery::default())?)
    }

    /// # Errors
    /// - `Error::NotFound` if no exercise has this id.
    /// - `Error::Storage` if the query fails.
    pub fn get_exercise(&self, id: Uuid) -> Result<Exercise> {
        self.store
            .get_exercise(id)?
            .ok_or_else(|| Error::not_found(EntityKind::Exercise, id))
    }

    /// Resolves an identifier (UUID or case-insensitive name) to an exercise.
    /// # Errors
    /// - `Error::Validation` if the identifier is empty.
    /// - `Error::Storage` if the lookup fails.
    pub fn resolve_exercise(&self, identifier: &str) -> Result<Option<Exercise>> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::new(Field::ExerciseName, Reason::Empty).into());
        }
        if let Ok(id) = Uuid::parse_str(trimmed) {
            if let Some(exercise) = self.store.get_exercise(id)? {
                return Ok(Some(exercise));
            }
        }
        Ok(self.store.find_exercise_by_name(trimmed)?)
    }

    /// Persists edits to an exercise and refreshes `updated_at`.
    /// # Errors
    /// - `Error::Validation` if the name is invalid or already used by another exercise.
    /// - `Error::NotFound` if the exercise does not exist.
    /// - `Error::Storage` if the update fails.
    pub fn update_exercise(&mut self, mut exercise: Exercise) -> Result<Change<Exercise>> {
        check_exercise_name(&exercise.name)?;
        exercise.name = exercise.name.trim().to_string();
        ensure_unique_name(&self.store, &exercise.name, Some(exercise.id))?;
        exercise.muscle_groups = dedup_muscle_groups(&exercise.muscle_groups);
        exercise.notes = clean_notes(exercise.notes.as_deref());
        exercise.updated_at = self.now();

        self.store.update_exercise(&exercise)?;
        let event = ChangeEvent::updated(EntityKind::Exercise, exercise.id);
        Ok(Change::new(exercise, event))
    }

    /// Deletes an exercise.
    ///
    /// When workouts or templates still reference it the delete is refused,
    /// unless `cascade` is set, in which case those entries are removed first.
    /// # Errors
    /// - `Error::NotFound` if the exercise does not exist.
    /// - `Error::Referential` if it is referenced and `cascade` is false.
    /// - `Error::Storage` if deletion fails; nothing is removed in that case.
    pub fn delete_exercise(&mut self, id: Uuid, cascade: bool) -> Result<Change<Exercise>> {
        let exercise = self.get_exercise(id)?;
        self.store.transaction(|store| -> Result<()> {
            let references = store.count_exercise_references(id)?;
            if !references.is_empty() {
                if !cascade {
                    return Err(Error::Referential {
                        exercise: id,
                        references,
                    });
                }
                store.delete_exercise_references(id)?;
                tracing::info!(
                    exercise = %exercise.name,
                    workout_entries = references.workout_entries,
                    template_entries = references.template_entries,
                    "Removed entries referencing exercise"
                );
            }
            store.delete_exercise(id)?;
            Ok(())
        })?;
        let event = ChangeEvent::deleted(EntityKind::Exercise, id);
        Ok(Change::new(exercise, event))
    }

    /// Case-insensitive substring search over name, category and notes.
    /// A blank query returns every exercise.
    /// # Errors
    /// Returns `Error::Storage` if the query fails.
    pub fn search_exercises(&self, query: &str) -> Result<Vec<Exercise>> {
        self.filter_exercises(None, Some(query))
    }

    /// # Errors
    /// Returns `Error::Storage` if the query fails.
    pub fn filter_exercises(
        &self,
        category: Option<Category>,
        text: Option<&str>,
    ) -> Result<Vec<Exercise>> {
        Ok(self.store.query_exercises(&ExerciseQuery { text, category })?)
    }

    /// Inserts the sample library when no exercises exist yet.
    /// Returns the exercises created, which is empty when the library was not empty.
    /// # Errors
    /// Returns `Error::Storage` if any insert fails; none are kept in that case.
    pub fn seed_sample_exercises(&mut self) -> Result<Vec<Change<Exercise>>> {
        if !self.fetch_all_exercises()?.is_empty() {
            return Ok(Vec::new());
        }
        let now = self.now();
        let created = self.store.transaction(|store| {
            SAMPLE_EXERCISES
                .iter()
                .map(|(name, category, groups)| {
                    insert_new_exercise(store, now, name, *category, groups, None)
                })
                .collect::<Result<Vec<_>>>()
        })?;
        tracing::info!(count = created.len(), "Seeded sample exercises");
        Ok(created
            .into_iter()
            .map(|e| {
                let event = ChangeEvent::created(EntityKind::Exercise, e.id);
                Change::new(e, event)
            })
            .collect())
    }
}
