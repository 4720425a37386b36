//src/store.rs
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::DbError;
use crate::model::{Category, Exercise, Workout, WorkoutExercise, WorkoutTemplate};

/// A closed `[start, end]` or half-open `[start, end)` span of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub end_inclusive: bool,
}

impl DateRange {
    #[must_use]
    pub const fn inclusive(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            end_inclusive: true,
        }
    }

    #[must_use]
    pub const fn half_open(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            end_inclusive: false,
        }
    }

    #[must_use]
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.start
            && if self.end_inclusive {
                *instant <= self.end
            } else {
                *instant < self.end
            }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, Default)]
pub struct ExerciseQuery<'a> {
    /// Case-insensitive substring matched against name, category and notes.
    pub text: Option<&'a str>,
    pub category: Option<Category>,
}

#[derive(Debug, Clone, Default)]
pub struct WorkoutQuery {
    pub range: Option<DateRange>,
    /// By workout date. Undated workouts sort as the oldest.
    pub order: SortOrder,
    pub limit: Option<u32>,
}

/// Selects workout-exercise entries, newest workout first.
#[derive(Debug, Clone, Default)]
pub struct EntryQuery {
    pub exercise_id: Option<Uuid>,
    pub range: Option<DateRange>,
    /// Skip entries whose workout has no date.
    pub dated_only: bool,
    pub limit: Option<u32>,
}

/// A workout-exercise entry together with the date of the workout owning it.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseEntry {
    pub workout_id: Uuid,
    pub workout_date: Option<DateTime<Utc>>,
    pub entry: WorkoutExercise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExerciseReferences {
    pub workout_entries: usize,
    pub template_entries: usize,
}

impl ExerciseReferences {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.workout_entries == 0 && self.template_entries == 0
    }
}

/// Persistence for the entity graph.
///
/// Workouts and templates are written as whole aggregates: `insert_*` and
/// `update_*` persist the parent together with every child in one atomic
/// write, and `delete_*` removes the children with it.
pub trait Store {
    fn insert_exercise(&self, exercise: &Exercise) -> Result<(), DbError>;
    fn update_exercise(&self, exercise: &Exercise) -> Result<(), DbError>;
    fn delete_exercise(&self, id: Uuid) -> Result<(), DbError>;
    fn get_exercise(&self, id: Uuid) -> Result<Option<Exercise>, DbError>;
    /// Exact, case-insensitive name lookup.
    fn find_exercise_by_name(&self, name: &str) -> Result<Option<Exercise>, DbError>;
    /// Matching exercises sorted by name.
    fn query_exercises(&self, query: &ExerciseQuery) -> Result<Vec<Exercise>, DbError>;
    fn count_exercise_references(&self, exercise_id: Uuid) -> Result<ExerciseReferences, DbError>;
    /// Removes every workout and template entry pointing at the exercise.
    fn delete_exercise_references(&self, exercise_id: Uuid) -> Result<(), DbError>;

    fn insert_workout(&self, workout: &Workout) -> Result<(), DbError>;
    fn update_workout(&self, workout: &Workout) -> Result<(), DbError>;
    fn delete_workout(&self, id: Uuid) -> Result<(), DbError>;
    fn get_workout(&self, id: Uuid) -> Result<Option<Workout>, DbError>;
    fn query_workouts(&self, query: &WorkoutQuery) -> Result<Vec<Workout>, DbError>;
    fn query_entries(&self, query: &EntryQuery) -> Result<Vec<ExerciseEntry>, DbError>;
    fn workout_id_for_entry(&self, workout_exercise_id: Uuid) -> Result<Option<Uuid>, DbError>;
    fn workout_id_for_set(&self, set_id: Uuid) -> Result<Option<Uuid>, DbError>;
    /// Heaviest completed set ever recorded for the exercise.
    fn max_completed_weight(&self, exercise_id: Uuid) -> Result<Option<f64>, DbError>;

    fn insert_template(&self, template: &WorkoutTemplate) -> Result<(), DbError>;
    fn update_template(&self, template: &WorkoutTemplate) -> Result<(), DbError>;
    fn delete_template(&self, id: Uuid) -> Result<(), DbError>;
    fn get_template(&self, id: Uuid) -> Result<Option<WorkoutTemplate>, DbError>;
    /// All templates sorted by name.
    fn list_templates(&self) -> Result<Vec<WorkoutTemplate>, DbError>;

    /// Runs `f` atomically: if it returns an error nothing it wrote is kept.
    /// Calls made while a transaction is already open join it.
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn inclusive_range_keeps_both_edges() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        let range = DateRange::inclusive(start, end);
        assert!(range.contains(&start));
        assert!(range.contains(&end));
        assert!(!range.contains(&(end + chrono::Duration::seconds(1))));
        assert!(!DateRange::half_open(start, end).contains(&end));
    }
}
