//src/workouts.rs
use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{EntityKind, Error, Result};
use crate::events::{Change, ChangeEvent};
use crate::model::{Workout, WorkoutExercise, WorkoutSet};
use crate::session::WorkoutSession;
use crate::store::{DateRange, SortOrder, Store, WorkoutQuery};
use crate::units::to_storage;
use crate::validation::{
    check_reps, check_rest_time, check_weight, check_workout_name, clean_notes,
};
use crate::AppService;

fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(NaiveTime::MIN))
}

pub(crate) fn check_set(set: &WorkoutSet) -> Result<()> {
    check_weight(set.weight)?;
    check_reps(i64::from(set.reps))?;
    check_rest_time(i64::from(set.rest_time))?;
    Ok(())
}

impl<S: Store> AppService<S> {
    pub(crate) fn load_workout(&self, id: Uuid) -> Result<Workout> {
        self.store
            .get_workout(id)?
            .ok_or_else(|| Error::not_found(EntityKind::Workout, id))
    }

    fn load_workout_for_entry(&self, workout_exercise_id: Uuid) -> Result<Workout> {
        let workout_id = self
            .store
            .workout_id_for_entry(workout_exercise_id)?
            .ok_or_else(|| Error::not_found(EntityKind::WorkoutExercise, workout_exercise_id))?;
        self.load_workout(workout_id)
    }

    fn load_workout_for_set(&self, set_id: Uuid) -> Result<Workout> {
        let workout_id = self
            .store
            .workout_id_for_set(set_id)?
            .ok_or_else(|| Error::not_found(EntityKind::WorkoutSet, set_id))?;
        self.load_workout(workout_id)
    }

    /// Refreshes `updated_at` and rewrites the workout graph.
    fn save_workout(&self, workout: &mut Workout) -> Result<()> {
        workout.updated_at = self.now();
        self.store.update_workout(workout)?;
        Ok(())
    }

    /// Creates an empty workout with no duration recorded.
    /// # Errors
    /// - `Error::Validation` if the name is invalid.
    /// - `Error::Storage` if the insert fails.
    pub fn create_workout(
        &mut self,
        name: &str,
        date: Option<DateTime<Utc>>,
        notes: Option<&str>,
    ) -> Result<Change<Workout>> {
        check_workout_name(name)?;
        let now = self.now();
        let workout = Workout {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            date,
            notes: clean_notes(notes),
            duration: 0,
            created_at: now,
            updated_at: now,
            exercises: Vec::new(),
        };
        self.store.insert_workout(&workout)?;
        tracing::debug!(id = %workout.id, name = %workout.name, "Created workout");
        let event = ChangeEvent::created(EntityKind::Workout, workout.id);
        Ok(Change::new(workout, event))
    }

    /// Every workout, newest date first.
    /// # Errors
    /// Returns `Error::Storage` if the query fails.
    pub fn fetch_all_workouts(&self) -> Result<Vec<Workout>> {
        Ok(self.store.query_workouts(&WorkoutQuery::default())?)
    }

    /// Workouts dated within the UTC day `[day 00:00, next day 00:00)`, oldest first.
    /// # Errors
    /// Returns `Error::Storage` if the query fails.
    pub fn fetch_for_day(&self, day: NaiveDate) -> Result<Vec<Workout>> {
        let start = start_of_day(day);
        let query = WorkoutQuery {
            range: Some(DateRange::half_open(start, start + chrono::Duration::days(1))),
            order: SortOrder::Ascending,
            limit: None,
        };
        Ok(self.store.query_workouts(&query)?)
    }

    /// Workouts of the calendar month containing `date`, grouped by day.
    /// # Errors
    /// Returns `Error::Storage` if the query fails.
    pub fn fetch_month(&self, date: NaiveDate) -> Result<BTreeMap<NaiveDate, Vec<Workout>>> {
        let Some(first) = date.with_day(1) else {
            return Ok(BTreeMap::new());
        };
        let Some(next) = first.checked_add_months(Months::new(1)) else {
            return Ok(BTreeMap::new());
        };
        let query = WorkoutQuery {
            range: Some(DateRange::half_open(start_of_day(first), start_of_day(next))),
            order: SortOrder::Ascending,
            limit: None,
        };

        let mut by_day: BTreeMap<NaiveDate, Vec<Workout>> = BTreeMap::new();
        for workout in self.store.query_workouts(&query)? {
            if let Some(day) = workout.date.map(|d| d.date_naive()) {
                by_day.entry(day).or_default().push(workout);
            }
        }
        Ok(by_day)
    }

    /// # Errors
    /// - `Error::NotFound` if the workout does not exist.
    /// - `Error::Storage` if the query fails.
    pub fn get_workout(&self, id: Uuid) -> Result<Workout> {
        self.load_workout(id)
    }

    /// # Errors
    /// - `Error::NotFound` if no set has this id.
    /// - `Error::Storage` if the query fails.
    pub fn get_set(&self, set_id: Uuid) -> Result<WorkoutSet> {
        self.load_workout_for_set(set_id)?
            .exercises
            .into_iter()
            .flat_map(|we| we.sets)
            .find(|s| s.id == set_id)
            .ok_or_else(|| Error::not_found(EntityKind::WorkoutSet, set_id))
    }

    /// Persists the whole workout graph and refreshes `updated_at`.
    /// # Errors
    /// - `Error::Validation` if the name or any set is out of bounds.
    /// - `Error::NotFound` if the workout does not exist.
    /// - `Error::Storage` if the write fails; the stored workout is left unchanged.
    pub fn update_workout(&mut self, mut workout: Workout) -> Result<Change<Workout>> {
        check_workout_name(&workout.name)?;
        workout
            .exercises
            .iter()
            .flat_map(|we| we.sets.iter())
            .try_for_each(check_set)?;
        workout.name = workout.name.trim().to_string();
        self.save_workout(&mut workout)?;
        let event = ChangeEvent::updated(EntityKind::Workout, workout.id);
        Ok(Change::new(workout, event))
    }

    /// Deletes the workout together with its exercises and sets.
    /// # Errors
    /// - `Error::NotFound` if the workout does not exist.
    /// - `Error::Storage` if deletion fails.
    pub fn delete_workout(&mut self, id: Uuid) -> Result<Change<Workout>> {
        let workout = self.load_workout(id)?;
        self.store.delete_workout(id)?;
        tracing::debug!(id = %id, "Deleted workout");
        let event = ChangeEvent::deleted(EntityKind::Workout, id);
        Ok(Change::new(workout, event))
    }

    /// Dates the workout now, for sessions begun on the spot.
    /// # Errors
    /// - `Error::NotFound` if the workout does not exist.
    /// - `Error::Storage` if the update fails.
    pub fn start_workout(&mut self, id: Uuid) -> Result<Change<Workout>> {
        let mut workout = self.load_workout(id)?;
        workout.date = Some(self.now());
        self.save_workout(&mut workout)?;
        let event = ChangeEvent::updated(EntityKind::Workout, id);
        Ok(Change::new(workout, event))
    }

    /// Records the final duration in whole seconds.
    /// # Errors
    /// - `Error::NotFound` if the workout does not exist.
    /// - `Error::Storage` if the update fails.
    pub fn end_workout(&mut self, id: Uuid, duration: u32) -> Result<Change<Workout>> {
        let mut workout = self.load_workout(id)?;
        workout.duration = duration;
        self.save_workout(&mut workout)?;
        tracing::debug!(id = %id, duration, "Ended workout");
        let event = ChangeEvent::updated(EntityKind::Workout, id);
        Ok(Change::new(workout, event))
    }

    /// Ends `session` at the current time and persists its duration.
    /// # Errors
    /// - `Error::Session` if the session is not running or paused.
    /// - Anything `end_workout` returns.
    pub fn end_session(
        &mut self,
        id: Uuid,
        session: &mut WorkoutSession,
    ) -> Result<Change<Workout>> {
        // Check the workout exists before the session is consumed.
        self.load_workout(id)?;
        let duration = session.end(self.now())?;
        self.end_workout(id, duration)
    }

    /// Appends an exercise after the workout's current last entry.
    /// # Errors
    /// - `Error::NotFound` if the workout or exercise does not exist.
    /// - `Error::Storage` if the write fails.
    pub fn add_exercise_to_workout(
        &mut self,
        workout_id: Uuid,
        exercise_id: Uuid,
    ) -> Result<Change<WorkoutExercise>> {
        let mut workout = self.load_workout(workout_id)?;
        self.get_exercise(exercise_id)?;

        let order = workout
            .exercises
            .iter()
            .map(|e| e.order)
            .max()
            .map_or(0, |max| max + 1);
        let entry = WorkoutExercise {
            id: Uuid::new_v4(),
            exercise_id,
            order,
            sets: Vec::new(),
        };
        workout.exercises.push(entry.clone());
        self.save_workout(&mut workout)?;
        let event = ChangeEvent::created(EntityKind::WorkoutExercise, entry.id);
        Ok(Change::new(entry, event))
    }

    /// Removes an exercise entry and its sets from its workout.
    /// # Errors
    /// - `Error::NotFound` if the entry does not exist.
    /// - `Error::Storage` if the write fails.
    pub fn remove_exercise_from_workout(
        &mut self,
        workout_exercise_id: Uuid,
    ) -> Result<Change<WorkoutExercise>> {
        let mut workout = self.load_workout_for_entry(workout_exercise_id)?;
        let index = workout
            .exercises
            .iter()
            .position(|e| e.id == workout_exercise_id)
            .ok_or_else(|| Error::not_found(EntityKind::WorkoutExercise, workout_exercise_id))?;
        let removed = workout.exercises.remove(index);
        self.save_workout(&mut workout)?;
        let event = ChangeEvent::deleted(EntityKind::WorkoutExercise, removed.id);
        Ok(Change::new(removed, event))
    }

    /// Adds the next set to an exercise entry.
    ///
    /// Weight and reps are copied from the preceding set so the user only edits
    /// what changed. Rest time comes from the preferences. The new set is
    /// numbered one past the highest existing number.
    /// # Errors
    /// - `Error::NotFound` if the entry does not exist.
    /// - `Error::Storage` if the write fails.
    pub fn add_set(&mut self, workout_exercise_id: Uuid) -> Result<Change<WorkoutSet>> {
        let mut workout = self.load_workout_for_entry(workout_exercise_id)?;
        let rest_time = self.preferences().default_rest_time();
        let now = self.now();

        let entry = workout
            .exercises
            .iter_mut()
            .find(|e| e.id == workout_exercise_id)
            .ok_or_else(|| Error::not_found(EntityKind::WorkoutExercise, workout_exercise_id))?;
        let (weight, reps) = entry
            .sets_in_order()
            .last()
            .map_or((0.0, 0), |prev| (prev.weight, prev.reps));
        let set = WorkoutSet {
            id: Uuid::new_v4(),
            set_number: entry
                .sets
                .iter()
                .map(|s| s.set_number)
                .max()
                .map_or(1, |n| n.saturating_add(1)),
            weight,
            reps,
            rest_time,
            completed: false,
            created_at: now,
        };
        entry.sets.push(set.clone());

        self.save_workout(&mut workout)?;
        let event = ChangeEvent::created(EntityKind::WorkoutSet, set.id);
        Ok(Change::new(set, event))
    }

    /// Edits a set. `weight` is in the display unit and stored as kilograms.
    ///
    /// The weight bound applies to the stored kilogram value, so in pounds
    /// the largest accepted input is about 2204.6.
    /// # Errors
    /// - `Error::Validation` if the converted weight or reps are out of bounds.
    /// - `Error::NotFound` if the set does not exist.
    /// - `Error::Storage` if the write fails.
    pub fn update_set(
        &mut self,
        set_id: Uuid,
        weight: f64,
        reps: u32,
        completed: bool,
    ) -> Result<Change<WorkoutSet>> {
        let weight_kg = to_storage(weight, self.preferences().weight_unit());
        check_weight(weight_kg)?;
        check_reps(i64::from(reps))?;

        let mut workout = self.load_workout_for_set(set_id)?;
        let (entry, index) = workout
            .find_set_mut(set_id)
            .ok_or_else(|| Error::not_found(EntityKind::WorkoutSet, set_id))?;
        let set = &mut entry.sets[index];
        set.weight = weight_kg;
        set.reps = reps;
        set.completed = completed;
        let updated = set.clone();

        self.save_workout(&mut workout)?;
        let event = ChangeEvent::updated(EntityKind::WorkoutSet, set_id);
        Ok(Change::new(updated, event))
    }

    /// Marks a set done or not done, leaving weight and reps alone.
    /// # Errors
    /// - `Error::NotFound` if the set does not exist.
    /// - `Error::Storage` if the write fails.
    pub fn set_completed(&mut self, set_id: Uuid, completed: bool) -> Result<Change<WorkoutSet>> {
        let mut workout = self.load_workout_for_set(set_id)?;
        let (entry, index) = workout
            .find_set_mut(set_id)
            .ok_or_else(|| Error::not_found(EntityKind::WorkoutSet, set_id))?;
        entry.sets[index].completed = completed;
        let updated = entry.sets[index].clone();

        self.save_workout(&mut workout)?;
        let event = ChangeEvent::updated(EntityKind::WorkoutSet, set_id);
        Ok(Change::new(updated, event))
    }

    /// Deletes a set and renumbers the remaining ones from 1.
    /// # Errors
    /// - `Error::NotFound` if the set does not exist.
    /// - `Error::Storage` if the write fails.
    pub fn remove_set(&mut self, set_id: Uuid) -> Result<Change<WorkoutSet>> {
        let mut workout = self.load_workout_for_set(set_id)?;
        let (entry, index) = workout
            .find_set_mut(set_id)
            .ok_or_else(|| Error::not_found(EntityKind::WorkoutSet, set_id))?;
        let removed = entry.sets.remove(index);
        entry.sets.sort_by_key(|s| s.set_number);
        for (position, set) in entry.sets.iter_mut().enumerate() {
            set.set_number = u32::try_from(position + 1).unwrap_or(u32::MAX);
        }

        self.save_workout(&mut workout)?;
        let event = ChangeEvent::deleted(EntityKind::WorkoutSet, set_id);
        Ok(Change::new(removed, event))
    }
}
