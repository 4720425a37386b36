//src/templates.rs
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{EntityKind, Error, Result};
use crate::events::{Change, ChangeEvent};
use crate::model::{SetConfig, TemplateExercise, Workout, WorkoutExercise, WorkoutSet, WorkoutTemplate};
use crate::store::Store;
use crate::units::to_storage;
use crate::validation::{
    check_reps, check_rest_time, check_template_name, check_weight, check_workout_name,
    clean_notes, NAME_MAX,
};
use crate::AppService;

const COPY_SUFFIX: &str = " (Copy)";

/// "`name` (Copy)", shortening `name` so the result stays a valid workout name.
fn copy_name(name: &str) -> String {
    let room = NAME_MAX - COPY_SUFFIX.chars().count();
    let base: String = name.trim().chars().take(room).collect();
    format!("{}{COPY_SUFFIX}", base.trim_end())
}

fn pick_name(override_name: Option<&str>, fallback: impl FnOnce() -> String) -> String {
    override_name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map_or_else(fallback, ToString::to_string)
}

/// Sets for a materialized workout, numbered 1..n in configured order.
/// Duplicate or missing numbers in stored data cannot break the numbering.
fn sets_from_config(configs: &[SetConfig], now: DateTime<Utc>) -> Vec<WorkoutSet> {
    let mut ordered: Vec<&SetConfig> = configs.iter().collect();
    ordered.sort_by_key(|c| c.set_number);
    ordered
        .into_iter()
        .enumerate()
        .map(|(position, config)| WorkoutSet {
            id: Uuid::new_v4(),
            set_number: u32::try_from(position + 1).unwrap_or(u32::MAX),
            weight: config.weight,
            reps: config.reps,
            rest_time: config.rest_time,
            completed: false,
            created_at: now,
        })
        .collect()
}

impl<S: Store> AppService<S> {
    fn load_template(&self, id: Uuid) -> Result<WorkoutTemplate> {
        self.store
            .get_template(id)?
            .ok_or_else(|| Error::not_found(EntityKind::Template, id))
    }

    /// Copies a workout to `to_date`.
    ///
    /// Exercise order, set numbers, weights, reps and rest times are kept.
    /// Every copied set starts not completed and the duration starts at zero.
    /// # Errors
    /// - `Error::NotFound` if the source workout does not exist.
    /// - `Error::Validation` if `new_name` is invalid.
    /// - `Error::Storage` if the write fails; no part of the copy is kept.
    pub fn duplicate_workout(
        &mut self,
        source_id: Uuid,
        to_date: DateTime<Utc>,
        new_name: Option<&str>,
    ) -> Result<Change<Workout>> {
        let source = self.load_workout(source_id)?;
        let name = pick_name(new_name, || copy_name(&source.name));
        check_workout_name(&name)?;
        let now = self.now();

        let exercises = source
            .exercises_in_order()
            .into_iter()
            .map(|we| WorkoutExercise {
                id: Uuid::new_v4(),
                exercise_id: we.exercise_id,
                order: we.order,
                sets: we
                    .sets_in_order()
                    .into_iter()
                    .map(|set| WorkoutSet {
                        id: Uuid::new_v4(),
                        completed: false,
                        created_at: now,
                        ..set.clone()
                    })
                    .collect(),
            })
            .collect();

        let copy = Workout {
            id: Uuid::new_v4(),
            name,
            date: Some(to_date),
            notes: source.notes.clone(),
            duration: 0,
            created_at: now,
            updated_at: now,
            exercises,
        };
        self.store
            .transaction(|store| store.insert_workout(&copy))?;
        tracing::info!(
            source = %source.id,
            copy = %copy.id,
            sets = copy.total_sets(),
            "Duplicated workout"
        );
        let event = ChangeEvent::created(EntityKind::Workout, copy.id);
        Ok(Change::new(copy, event))
    }

    /// Captures a workout's exercises and set configuration as a template.
    /// Completion state is never recorded.
    /// # Errors
    /// - `Error::NotFound` if the workout does not exist.
    /// - `Error::Validation` if the name is invalid.
    /// - `Error::Storage` if the write fails; no part of the template is kept.
    pub fn create_template(&mut self, workout_id: Uuid, name: &str) -> Result<Change<WorkoutTemplate>> {
        check_template_name(name)?;
        let workout = self.load_workout(workout_id)?;
        let now = self.now();

        let exercises = workout
            .exercises_in_order()
            .into_iter()
            .map(|we| TemplateExercise {
                id: Uuid::new_v4(),
                exercise_id: we.exercise_id,
                order: we.order,
                sets: we
                    .sets_in_order()
                    .into_iter()
                    .map(|set| SetConfig {
                        set_number: set.set_number,
                        weight: set.weight,
                        reps: set.reps,
                        rest_time: set.rest_time,
                    })
                    .collect(),
            })
            .collect();

        let template = WorkoutTemplate {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            notes: workout.notes.clone(),
            created_at: now,
            updated_at: now,
            exercises,
        };
        self.store
            .transaction(|store| store.insert_template(&template))?;
        tracing::info!(
            workout = %workout.id,
            template = %template.id,
            exercises = template.exercises.len(),
            "Created template from workout"
        );
        let event = ChangeEvent::created(EntityKind::Template, template.id);
        Ok(Change::new(template, event))
    }

    /// Builds a template from scratch. Weights are in the display unit and
    /// are bounded after conversion to kilograms.
    /// # Errors
    /// - `Error::Validation` if the name or any configured set is out of bounds.
    /// - `Error::NotFound` if an exercise does not exist.
    /// - `Error::Storage` if the write fails; no part of the template is kept.
    pub fn create_template_from_config(
        &mut self,
        name: &str,
        notes: Option<&str>,
        exercises: &[(Uuid, Vec<SetConfig>)],
    ) -> Result<Change<WorkoutTemplate>> {
        check_template_name(name)?;
        let unit = self.preferences().weight_unit();
        let now = self.now();

        let mut template_exercises = Vec::with_capacity(exercises.len());
        for (order, (exercise_id, configs)) in exercises.iter().enumerate() {
            self.get_exercise(*exercise_id)?;
            let sets = configs
                .iter()
                .map(|config| -> Result<SetConfig> {
                    let weight = to_storage(config.weight, unit);
                    check_weight(weight)?;
                    check_reps(i64::from(config.reps))?;
                    check_rest_time(i64::from(config.rest_time))?;
                    Ok(SetConfig { weight, ..*config })
                })
                .collect::<Result<Vec<_>>>()?;
            template_exercises.push(TemplateExercise {
                id: Uuid::new_v4(),
                exercise_id: *exercise_id,
                order: i32::try_from(order).unwrap_or(i32::MAX),
                sets,
            });
        }

        let template = WorkoutTemplate {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            notes: clean_notes(notes),
            created_at: now,
            updated_at: now,
            exercises: template_exercises,
        };
        self.store
            .transaction(|store| store.insert_template(&template))?;
        tracing::info!(template = %template.id, "Created template");
        let event = ChangeEvent::created(EntityKind::Template, template.id);
        Ok(Change::new(template, event))
    }

    /// Materializes a workout from a template, dated `date`.
    ///
    /// One not-completed set is created per configured entry. Malformed stored
    /// entries were already replaced by defaults when the template was read.
    /// # Errors
    /// - `Error::NotFound` if the template does not exist.
    /// - `Error::Validation` if `name` is invalid.
    /// - `Error::Storage` if the write fails; no part of the workout is kept.
    pub fn create_workout_from_template(
        &mut self,
        template_id: Uuid,
        date: DateTime<Utc>,
        name: Option<&str>,
    ) -> Result<Change<Workout>> {
        let template = self.load_template(template_id)?;
        let name = pick_name(name, || template.name.clone());
        check_workout_name(&name)?;
        let now = self.now();

        let exercises: Vec<WorkoutExercise> = template
            .exercises_in_order()
            .into_iter()
            .map(|te| WorkoutExercise {
                id: Uuid::new_v4(),
                exercise_id: te.exercise_id,
                order: te.order,
                sets: sets_from_config(&te.sets, now),
            })
            .collect();

        let workout = Workout {
            id: Uuid::new_v4(),
            name,
            date: Some(date),
            notes: template.notes.clone(),
            duration: 0,
            created_at: now,
            updated_at: now,
            exercises,
        };
        self.store
            .transaction(|store| store.insert_workout(&workout))?;
        tracing::info!(
            template = %template.id,
            workout = %workout.id,
            sets = workout.total_sets(),
            "Created workout from template"
        );
        let event = ChangeEvent::created(EntityKind::Workout, workout.id);
        Ok(Change::new(workout, event))
    }

    /// All templates sorted by name.
    /// # Errors
    /// Returns `Error::Storage` if the query fails.
    pub fn list_templates(&self) -> Result<Vec<WorkoutTemplate>> {
        Ok(self.store.list_templates()?)
    }

    /// # Errors
    /// - `Error::NotFound` if the template does not exist.
    /// - `Error::Storage` if the query fails.
    pub fn get_template(&self, id: Uuid) -> Result<WorkoutTemplate> {
        self.load_template(id)
    }

    /// Renames a template and replaces its notes.
    /// # Errors
    /// - `Error::Validation` if the name is invalid.
    /// - `Error::NotFound` if the template does not exist.
    /// - `Error::Storage` if the write fails.
    pub fn update_template(
        &mut self,
        id: Uuid,
        name: &str,
        notes: Option<&str>,
    ) -> Result<Change<WorkoutTemplate>> {
        check_template_name(name)?;
        let mut template = self.load_template(id)?;
        template.name = name.trim().to_string();
        template.notes = clean_notes(notes);
        template.updated_at = self.now();
        self.store.update_template(&template)?;
        let event = ChangeEvent::updated(EntityKind::Template, id);
        Ok(Change::new(template, event))
    }

    /// Deletes a template and its exercise entries.
    /// # Errors
    /// - `Error::NotFound` if the template does not exist.
    /// - `Error::Storage` if deletion fails.
    pub fn delete_template(&mut self, id: Uuid) -> Result<Change<WorkoutTemplate>> {
        let template = self.load_template(id)?;
        self.store.delete_template(id)?;
        let event = ChangeEvent::deleted(EntityKind::Template, id);
        Ok(Change::new(template, event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn copy_names_stay_within_limit() {
        assert_eq!(copy_name("Leg Day"), "Leg Day (Copy)");
        let long = "x".repeat(NAME_MAX);
        let copied = copy_name(&long);
        assert_eq!(copied.chars().count(), NAME_MAX);
        assert!(copied.ends_with(COPY_SUFFIX));
    }

    #[test]
    fn override_names_win_unless_blank() {
        assert_eq!(pick_name(Some(" Push "), || "fallback".into()), "Push");
        assert_eq!(pick_name(Some("  "), || "fallback".into()), "fallback");
        assert_eq!(pick_name(None, || "fallback".into()), "fallback");
    }

    #[test]
    fn materialized_sets_are_renumbered_and_incomplete() {
        let now = Utc.with_ymd_and_hms(2025, 2, 3, 7, 0, 0).unwrap();
        let configs = [
            SetConfig {
                set_number: 2,
                weight: 80.0,
                reps: 8,
                rest_time: 90,
            },
            SetConfig {
                set_number: 1,
                weight: 60.0,
                reps: 10,
                rest_time: 60,
            },
            SetConfig {
                set_number: 2,
                weight: 85.0,
                reps: 6,
                rest_time: 120,
            },
        ];
        let sets = sets_from_config(&configs, now);
        let numbers: Vec<u32> = sets.iter().map(|s| s.set_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(sets[0].weight, 60.0);
        assert_eq!(sets[1].weight, 80.0);
        assert_eq!(sets[2].rest_time, 120);
        assert!(sets.iter().all(|s| !s.completed));
    }
}
