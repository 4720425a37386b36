//src/model.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::validation::{REPS_MAX, REST_TIME_MAX, WEIGHT_MAX};

/// Rest time used when neither the caller nor stored data provide one.
pub const DEFAULT_REST_TIME: u32 = 90;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Category {
    Chest,
    Back,
    Shoulders,
    Biceps,
    Triceps,
    Legs,
    Core,
    Cardio,
    #[default]
    Other,
}

impl Category {
    /// Decodes a stored category, falling back to `Other` for unknown text.
    #[must_use]
    pub fn from_stored(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(ascii_case_insensitive)]
pub enum MuscleGroup {
    #[strum(serialize = "Pectoral Major")]
    PectoralMajor,
    #[strum(serialize = "Pectoral Minor")]
    PectoralMinor,
    #[strum(serialize = "Latissimus Dorsi")]
    LatissimusDorsi,
    Trapezius,
    Rhomboids,
    #[strum(serialize = "Erector Spinae")]
    ErectorSpinae,
    #[strum(serialize = "Anterior Deltoid")]
    AnteriorDeltoid,
    #[strum(serialize = "Medial Deltoid")]
    MedialDeltoid,
    #[strum(serialize = "Posterior Deltoid")]
    PosteriorDeltoid,
    #[strum(serialize = "Biceps Brachii")]
    BicepsBrachii,
    #[strum(serialize = "Triceps Brachii")]
    TricepsBrachii,
    Forearms,
    Quadriceps,
    Hamstrings,
    Glutes,
    Calves,
    #[strum(serialize = "Hip Flexors")]
    HipFlexors,
    Adductors,
    Abductors,
    #[strum(serialize = "Rectus Abdominis")]
    RectusAbdominis,
    Obliques,
    #[strum(serialize = "Transverse Abdominis")]
    TransverseAbdominis,
}

impl MuscleGroup {
    #[must_use]
    pub const fn category(self) -> Category {
        match self {
            Self::PectoralMajor | Self::PectoralMinor => Category::Chest,
            Self::LatissimusDorsi | Self::Trapezius | Self::Rhomboids | Self::ErectorSpinae => {
                Category::Back
            }
            Self::AnteriorDeltoid | Self::MedialDeltoid | Self::PosteriorDeltoid => {
                Category::Shoulders
            }
            Self::BicepsBrachii => Category::Biceps,
            Self::TricepsBrachii => Category::Triceps,
            Self::Forearms => Category::Other,
            Self::Quadriceps
            | Self::Hamstrings
            | Self::Glutes
            | Self::Calves
            | Self::HipFlexors
            | Self::Adductors
            | Self::Abductors => Category::Legs,
            Self::RectusAbdominis | Self::Obliques | Self::TransverseAbdominis => Category::Core,
        }
    }

    #[must_use]
    pub fn for_category(category: Category) -> Vec<Self> {
        Self::iter().filter(|m| m.category() == category).collect()
    }
}

/// Removes repeated muscle groups, keeping the first occurrence.
#[must_use]
pub fn dedup_muscle_groups(groups: &[MuscleGroup]) -> Vec<MuscleGroup> {
    let mut out: Vec<MuscleGroup> = Vec::with_capacity(groups.len());
    for group in groups {
        if !out.contains(group) {
            out.push(*group);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exercise {
    pub id: Uuid,
    pub name: String,
    pub category: Category,
    pub muscle_groups: Vec<MuscleGroup>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSet {
    pub id: Uuid,
    pub set_number: u32,
    /// Always kilograms.
    pub weight: f64,
    pub reps: u32,
    pub rest_time: u32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl WorkoutSet {
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.weight * f64::from(self.reps)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutExercise {
    pub id: Uuid,
    pub exercise_id: Uuid,
    pub order: i32,
    pub sets: Vec<WorkoutSet>,
}

impl WorkoutExercise {
    /// Sets ordered by set number.
    #[must_use]
    pub fn sets_in_order(&self) -> Vec<&WorkoutSet> {
        let mut sets: Vec<&WorkoutSet> = self.sets.iter().collect();
        sets.sort_by_key(|s| s.set_number);
        sets
    }

    pub fn completed_sets(&self) -> impl Iterator<Item = &WorkoutSet> {
        self.sets.iter().filter(|s| s.completed)
    }

    #[must_use]
    pub fn completed_sets_count(&self) -> usize {
        self.completed_sets().count()
    }

    /// Volume over every set, completed or not.
    #[must_use]
    pub fn total_volume(&self) -> f64 {
        self.sets.iter().map(WorkoutSet::volume).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Workout {
    pub id: Uuid,
    pub name: String,
    pub date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Whole seconds.
    pub duration: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub exercises: Vec<WorkoutExercise>,
}

impl Workout {
    /// Exercises ordered by their `order` field.
    #[must_use]
    pub fn exercises_in_order(&self) -> Vec<&WorkoutExercise> {
        let mut exercises: Vec<&WorkoutExercise> = self.exercises.iter().collect();
        exercises.sort_by_key(|e| e.order);
        exercises
    }

    #[must_use]
    pub fn total_sets(&self) -> usize {
        self.exercises.iter().map(|e| e.sets.len()).sum()
    }

    #[must_use]
    pub fn completed_sets(&self) -> usize {
        self.exercises
            .iter()
            .map(WorkoutExercise::completed_sets_count)
            .sum()
    }

    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn progress(&self) -> f64 {
        let total = self.total_sets();
        if total == 0 {
            0.0
        } else {
            self.completed_sets() as f64 / total as f64
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        let total = self.total_sets();
        total > 0 && self.completed_sets() == total
    }

    #[must_use]
    pub fn total_volume(&self) -> f64 {
        self.exercises.iter().map(WorkoutExercise::total_volume).sum()
    }

    /// "m:ss" below an hour, "h:mm:ss" otherwise.
    #[must_use]
    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration)
    }

    pub(crate) fn find_set_mut(&mut self, set_id: Uuid) -> Option<(&mut WorkoutExercise, usize)> {
        self.exercises.iter_mut().find_map(|we| {
            let index = we.sets.iter().position(|s| s.id == set_id)?;
            Some((we, index))
        })
    }
}

#[must_use]
pub fn format_duration(total_seconds: u32) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// One planned set inside a template. Serialized as
/// `{"setNumber":1,"weight":100.0,"reps":5,"restTime":90}` with weight in kg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetConfig {
    pub set_number: u32,
    pub weight: f64,
    pub reps: u32,
    pub rest_time: u32,
}

impl SetConfig {
    /// Encodes a configuration list in the stored JSON shape.
    ///
    /// # Errors
    /// Returns `serde_json::Error` if a weight is not a finite number.
    pub fn encode_list(configs: &[Self]) -> Result<String, serde_json::Error> {
        serde_json::to_string(configs)
    }

    /// Decodes stored configuration. Never fails: unreadable data yields an
    /// empty list and missing, mistyped or out-of-range fields fall back to
    /// defaults (weight 0, reps 0, rest 90, set number = position).
    #[must_use]
    pub fn decode_list(raw: &str) -> Vec<Self> {
        let entries = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(entries)) => entries,
            Ok(other) => {
                tracing::warn!(kind = %json_kind(&other), "Set configuration is not a list; ignoring it");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable set configuration; ignoring it");
                return Vec::new();
            }
        };

        entries
            .iter()
            .enumerate()
            .map(|(index, entry)| Self::decode_entry(index, entry))
            .collect()
    }

    fn decode_entry(index: usize, entry: &Value) -> Self {
        let position = u32::try_from(index + 1).unwrap_or(u32::MAX);
        let field = |name: &str| entry.get(name);

        let set_number = field("setNumber")
            .and_then(as_whole_number)
            .filter(|n| *n >= 1);
        let weight = field("weight")
            .and_then(Value::as_f64)
            .filter(|w| (0.0..=WEIGHT_MAX).contains(w));
        let reps = field("reps")
            .and_then(as_whole_number)
            .filter(|r| *r <= REPS_MAX);
        let rest_time = field("restTime")
            .and_then(as_whole_number)
            .filter(|r| *r <= REST_TIME_MAX);

        if set_number.is_none() || weight.is_none() || reps.is_none() || rest_time.is_none() {
            tracing::warn!(index, entry = %entry, "Malformed set configuration entry; using defaults");
        }

        Self {
            set_number: set_number.unwrap_or(position),
            weight: weight.unwrap_or(0.0),
            reps: reps.unwrap_or(0),
            rest_time: rest_time.unwrap_or(DEFAULT_REST_TIME),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn as_whole_number(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
        .map(|f| f as u32)
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateExercise {
    pub id: Uuid,
    pub exercise_id: Uuid,
    pub order: i32,
    pub sets: Vec<SetConfig>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutTemplate {
    pub id: Uuid,
    pub name: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub exercises: Vec<TemplateExercise>,
}

impl WorkoutTemplate {
    #[must_use]
    pub fn exercises_in_order(&self) -> Vec<&TemplateExercise> {
        let mut exercises: Vec<&TemplateExercise> = self.exercises.iter().collect();
        exercises.sort_by_key(|e| e.order);
        exercises
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 7, 10, 0, 0).unwrap()
    }

    fn set(number: u32, weight: f64, reps: u32, completed: bool) -> WorkoutSet {
        WorkoutSet {
            id: Uuid::new_v4(),
            set_number: number,
            weight,
            reps,
            rest_time: DEFAULT_REST_TIME,
            completed,
            created_at: ts(),
        }
    }

    fn leg_day() -> Workout {
        let squat = WorkoutExercise {
            id: Uuid::new_v4(),
            exercise_id: Uuid::new_v4(),
            order: 0,
            sets: vec![
                set(1, 100.0, 5, true),
                set(2, 100.0, 5, true),
                set(3, 110.0, 3, false),
            ],
        };
        let lunge = WorkoutExercise {
            id: Uuid::new_v4(),
            exercise_id: Uuid::new_v4(),
            order: 1,
            sets: vec![set(1, 20.0, 10, true)],
        };
        Workout {
            id: Uuid::new_v4(),
            name: "Leg Day".into(),
            date: Some(ts()),
            notes: None,
            duration: 0,
            created_at: ts(),
            updated_at: ts(),
            exercises: vec![squat, lunge],
        }
    }

    #[test]
    fn leg_day_derived_values() {
        let workout = leg_day();
        assert_eq!(workout.total_sets(), 4);
        assert_eq!(workout.completed_sets(), 3);
        assert!((workout.progress() - 0.75).abs() < f64::EPSILON);
        assert!(!workout.is_completed());
        assert!((workout.total_volume() - 1530.0).abs() < 1e-9);
    }

    #[test]
    fn empty_workout_is_neither_complete_nor_in_progress() {
        let mut workout = leg_day();
        workout.exercises.clear();
        assert_eq!(workout.total_sets(), 0);
        assert_eq!(workout.progress(), 0.0);
        assert!(!workout.is_completed());
    }

    #[test]
    fn all_sets_completed_marks_workout_completed() {
        let mut workout = leg_day();
        for we in &mut workout.exercises {
            for s in &mut we.sets {
                s.completed = true;
            }
        }
        assert!(workout.is_completed());
        assert_eq!(workout.progress(), 1.0);
    }

    #[test]
    fn sets_and_exercises_follow_explicit_order() {
        let mut workout = leg_day();
        workout.exercises.reverse();
        workout.exercises[1].sets.reverse();
        let ordered = workout.exercises_in_order();
        assert_eq!(ordered[0].order, 0);
        let numbers: Vec<u32> = ordered[0].sets_in_order().iter().map(|s| s.set_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn muscle_group_lookup() {
        assert_eq!(MuscleGroup::Forearms.category(), Category::Other);
        assert_eq!(MuscleGroup::Glutes.category(), Category::Legs);
        assert_eq!(
            "Pectoral Major".parse::<MuscleGroup>().unwrap(),
            MuscleGroup::PectoralMajor
        );
        assert_eq!(MuscleGroup::LatissimusDorsi.to_string(), "Latissimus Dorsi");
        assert_eq!(MuscleGroup::for_category(Category::Shoulders).len(), 3);
        assert!(MuscleGroup::for_category(Category::Cardio).is_empty());
        assert_eq!(Category::from_stored("legs"), Category::Legs);
        assert_eq!(Category::from_stored("Plyometrics"), Category::Other);
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(754), "12:34");
        assert_eq!(format_duration(3_725), "1:02:05");
    }

    #[test]
    fn set_configuration_uses_stable_schema() {
        let configs = [SetConfig {
            set_number: 1,
            weight: 100.0,
            reps: 5,
            rest_time: 120,
        }];
        let raw = SetConfig::encode_list(&configs).unwrap();
        assert_eq!(raw, r#"[{"setNumber":1,"weight":100.0,"reps":5,"restTime":120}]"#);
        assert_eq!(SetConfig::decode_list(&raw), configs);
    }

    #[test]
    fn malformed_entries_get_defaults() {
        let raw = r#"[{"setNumber":1,"weight":60,"reps":8},{"reps":"ten"},{"setNumber":3,"weight":-5,"reps":4,"restTime":60}]"#;
        let decoded = SetConfig::decode_list(raw);
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].rest_time, DEFAULT_REST_TIME);
        assert_eq!(decoded[0].weight, 60.0);
        assert_eq!(
            decoded[1],
            SetConfig {
                set_number: 2,
                weight: 0.0,
                reps: 0,
                rest_time: DEFAULT_REST_TIME
            }
        );
        assert_eq!(decoded[2].weight, 0.0);
        assert_eq!(decoded[2].rest_time, 60);
    }

    #[test]
    fn out_of_range_entries_get_defaults() {
        let raw = r#"[{"setNumber":0,"weight":1500.0,"reps":5,"restTime":90},{"setNumber":2,"weight":100.0,"reps":2000,"restTime":4000}]"#;
        let decoded = SetConfig::decode_list(raw);
        assert_eq!(
            decoded,
            vec![
                SetConfig {
                    set_number: 1,
                    weight: 0.0,
                    reps: 5,
                    rest_time: 90
                },
                SetConfig {
                    set_number: 2,
                    weight: 100.0,
                    reps: 0,
                    rest_time: DEFAULT_REST_TIME
                },
            ]
        );
    }

    #[test]
    fn unreadable_configuration_is_empty() {
        assert!(SetConfig::decode_list("not json").is_empty());
        assert!(SetConfig::decode_list(r#"{"setNumber":1}"#).is_empty());
    }
}
