//src/stats.rs
use chrono::{DateTime, Duration, Months, Utc};
use std::collections::HashMap;
use strum_macros::{Display, EnumIter};
use uuid::Uuid;

use crate::config::Preferences;
use crate::error::Result;
use crate::model::{Exercise, WorkoutSet};
use crate::store::{DateRange, EntryQuery, ExerciseEntry, Store, WorkoutQuery};
use crate::units::{from_storage, WeightUnit};
use crate::AppService;

/// How many exercises the frequency ranking keeps.
pub const FREQUENT_EXERCISE_LIMIT: usize = 5;
/// Relative change, in percent, below which a trend counts as flat.
pub const FLAT_TREND_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorkoutStats {
    pub total_workouts: usize,
    /// Kilograms, over every set.
    pub total_volume: f64,
    pub total_sets: usize,
    /// Seconds.
    pub total_duration: u64,
    pub average_duration: f64,
}

/// Totals over an exercise's completed sets. Weights in kilograms.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExerciseStats {
    pub total_sets: usize,
    pub total_reps: u64,
    pub total_volume: f64,
    pub max_weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseHistoryEntry {
    pub workout_id: Uuid,
    pub date: DateTime<Utc>,
    pub total_sets: usize,
    pub average_reps: f64,
    /// Kilograms.
    pub max_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

/// Change against the preceding period of equal length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trend {
    pub percent_change: f64,
    pub direction: TrendDirection,
}

impl Trend {
    /// `None` when there is no baseline to compare against.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn between(baseline: usize, current: usize) -> Option<Self> {
        if baseline == 0 {
            return None;
        }
        let percent_change = (current as f64 - baseline as f64) / baseline as f64 * 100.0;
        let direction = if percent_change.abs() < FLAT_TREND_THRESHOLD {
            TrendDirection::Flat
        } else if percent_change > 0.0 {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        };
        Some(Self {
            percent_change,
            direction,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrequentExercise {
    pub exercise: Exercise,
    pub times_performed: usize,
    pub last_performed: DateTime<Utc>,
    pub trend: Option<Trend>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumIter)]
pub enum TimeRange {
    Week,
    #[default]
    Month,
    #[strum(serialize = "3 Months")]
    ThreeMonths,
    Year,
    #[strum(serialize = "All Time")]
    AllTime,
}

impl TimeRange {
    /// `(start, end)` ending at `now`. "All time" reaches back ten years.
    #[must_use]
    pub fn bounds(self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let months_back = |months: u32| now.checked_sub_months(Months::new(months)).unwrap_or(now);
        let start = match self {
            Self::Week => now - Duration::days(7),
            Self::Month => months_back(1),
            Self::ThreeMonths => months_back(3),
            Self::Year => months_back(12),
            Self::AllTime => months_back(120),
        };
        (start, now)
    }
}

/// A completed set as shown in the progress view. Weight is in the display unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSet {
    pub set_number: u32,
    pub weight: f64,
    pub reps: u32,
    pub is_personal_record: bool,
}

impl ProgressSet {
    #[must_use]
    pub fn volume(&self) -> f64 {
        self.weight * f64::from(self.reps)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSession {
    pub workout_id: Uuid,
    pub date: DateTime<Utc>,
    pub sets: Vec<ProgressSet>,
}

impl ProgressSession {
    #[must_use]
    pub fn max_weight(&self) -> f64 {
        self.sets.iter().map(|s| s.weight).fold(0.0, f64::max)
    }

    #[must_use]
    pub fn total_volume(&self) -> f64 {
        self.sets.iter().map(ProgressSet::volume).sum()
    }
}

/// Recent sessions of one exercise, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseProgress {
    pub unit: WeightUnit,
    pub sessions: Vec<ProgressSession>,
}

impl ExerciseProgress {
    #[must_use]
    pub fn latest_max_weight(&self) -> f64 {
        self.sessions.first().map_or(0.0, ProgressSession::max_weight)
    }

    #[must_use]
    pub fn previous_max_weight(&self) -> Option<f64> {
        self.sessions.get(1).map(ProgressSession::max_weight)
    }

    #[must_use]
    pub fn latest_total_volume(&self) -> f64 {
        self.sessions.first().map_or(0.0, ProgressSession::total_volume)
    }

    #[must_use]
    pub fn previous_total_volume(&self) -> Option<f64> {
        self.sessions.get(1).map(ProgressSession::total_volume)
    }

    #[must_use]
    pub fn personal_records(&self) -> usize {
        self.sessions
            .iter()
            .flat_map(|s| s.sets.iter())
            .filter(|s| s.is_personal_record)
            .count()
    }
}

fn count_by_exercise(entries: &[ExerciseEntry]) -> HashMap<Uuid, usize> {
    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    for entry in entries {
        *counts.entry(entry.entry.exercise_id).or_default() += 1;
    }
    counts
}

impl<S: Store> AppService<S> {
    /// Totals over workouts dated within `[start, end]` (both inclusive), or
    /// over every workout unless both bounds are given.
    /// # Errors
    /// Returns `Error::Storage` if the query fails; no partial totals are returned.
    #[allow(clippy::cast_precision_loss)]
    pub fn get_workout_stats(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<WorkoutStats> {
        let range = match (start, end) {
            (Some(start), Some(end)) => Some(DateRange::inclusive(start, end)),
            _ => None,
        };
        let workouts = self.store.query_workouts(&WorkoutQuery {
            range,
            ..WorkoutQuery::default()
        })?;

        let total_workouts = workouts.len();
        let total_duration: u64 = workouts.iter().map(|w| u64::from(w.duration)).sum();
        Ok(WorkoutStats {
            total_workouts,
            total_volume: workouts.iter().map(|w| w.total_volume()).sum(),
            total_sets: workouts.iter().map(|w| w.total_sets()).sum(),
            total_duration,
            average_duration: if total_workouts == 0 {
                0.0
            } else {
                total_duration as f64 / total_workouts as f64
            },
        })
    }

    /// Totals over every completed set ever logged for the exercise.
    /// # Errors
    /// - `Error::NotFound` if the exercise does not exist.
    /// - `Error::Storage` if the query fails.
    pub fn get_exercise_stats(&self, exercise_id: Uuid) -> Result<ExerciseStats> {
        self.get_exercise(exercise_id)?;
        let entries = self.store.query_entries(&EntryQuery {
            exercise_id: Some(exercise_id),
            ..EntryQuery::default()
        })?;

        let mut stats = ExerciseStats::default();
        for set in entries.iter().flat_map(|e| e.entry.completed_sets()) {
            stats.total_sets += 1;
            stats.total_reps += u64::from(set.reps);
            stats.total_volume += set.volume();
            stats.max_weight = stats.max_weight.max(set.weight);
        }
        Ok(stats)
    }

    /// The exercise's `limit` most recent dated sessions, newest first.
    ///
    /// The limit applies before sessions without completed sets are dropped,
    /// so fewer than `limit` entries may come back.
    /// # Errors
    /// - `Error::NotFound` if the exercise does not exist.
    /// - `Error::Storage` if the query fails.
    #[allow(clippy::cast_precision_loss)]
    pub fn get_exercise_history(
        &self,
        exercise_id: Uuid,
        limit: u32,
    ) -> Result<Vec<ExerciseHistoryEntry>> {
        self.get_exercise(exercise_id)?;
        let entries = self.store.query_entries(&EntryQuery {
            exercise_id: Some(exercise_id),
            dated_only: true,
            limit: Some(limit),
            ..EntryQuery::default()
        })?;

        Ok(entries
            .into_iter()
            .filter_map(|e| {
                let date = e.workout_date?;
                let completed: Vec<&WorkoutSet> = e.entry.completed_sets().collect();
                if completed.is_empty() {
                    return None;
                }
                let total_reps: u64 = completed.iter().map(|s| u64::from(s.reps)).sum();
                Some(ExerciseHistoryEntry {
                    workout_id: e.workout_id,
                    date,
                    total_sets: completed.len(),
                    average_reps: total_reps as f64 / completed.len() as f64,
                    max_weight: completed.iter().map(|s| s.weight).fold(0.0, f64::max),
                })
            })
            .collect())
    }

    /// The most performed exercises in `[start, end]`, top five first.
    ///
    /// Each carries its trend against the preceding period of the same length.
    /// Ties rank the more recently performed exercise first.
    /// # Errors
    /// Returns `Error::Storage` if a query fails.
    pub fn get_frequent_exercises(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FrequentExercise>> {
        let current = self.store.query_entries(&EntryQuery {
            range: Some(DateRange::inclusive(start, end)),
            ..EntryQuery::default()
        })?;
        let baseline_start = start - (end - start);
        let baseline = self.store.query_entries(&EntryQuery {
            range: Some(DateRange::half_open(baseline_start, start)),
            ..EntryQuery::default()
        })?;
        let baseline_counts = count_by_exercise(&baseline);

        let mut grouped: HashMap<Uuid, (usize, DateTime<Utc>)> = HashMap::new();
        for entry in &current {
            let Some(date) = entry.workout_date else {
                continue;
            };
            let slot = grouped.entry(entry.entry.exercise_id).or_insert((0, date));
            slot.0 += 1;
            slot.1 = slot.1.max(date);
        }

        let mut ranked: Vec<(Uuid, usize, DateTime<Utc>)> = grouped
            .into_iter()
            .map(|(id, (count, last))| (id, count, last))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(b.2.cmp(&a.2)));
        ranked.truncate(FREQUENT_EXERCISE_LIMIT);

        ranked
            .into_iter()
            .map(|(exercise_id, times_performed, last_performed)| -> Result<FrequentExercise> {
                let baseline = baseline_counts.get(&exercise_id).copied().unwrap_or(0);
                Ok(FrequentExercise {
                    exercise: self.get_exercise(exercise_id)?,
                    times_performed,
                    last_performed,
                    trend: Trend::between(baseline, times_performed),
                })
            })
            .collect()
    }

    /// `get_frequent_exercises` over a preset range ending now.
    /// # Errors
    /// Returns `Error::Storage` if a query fails.
    pub fn get_frequent_exercises_in(&self, range: TimeRange) -> Result<Vec<FrequentExercise>> {
        let (start, end) = range.bounds(self.now());
        self.get_frequent_exercises(start, end)
    }

    /// The `sessions` most recent dated sessions of the exercise with
    /// personal records flagged.
    ///
    /// Only completed sets with weight and reps above zero are listed. A set is
    /// a record when it is in the newest session and its weight is at least the
    /// heaviest completed set ever logged. Older sessions are never flagged.
    /// # Errors
    /// - `Error::NotFound` if the exercise does not exist.
    /// - `Error::Storage` if a query fails.
    pub fn get_exercise_progress(&self, exercise_id: Uuid, sessions: usize) -> Result<ExerciseProgress> {
        self.get_exercise(exercise_id)?;
        let unit = self.preferences().weight_unit();
        let entries = self.store.query_entries(&EntryQuery {
            exercise_id: Some(exercise_id),
            dated_only: true,
            limit: Some(u32::try_from(sessions).unwrap_or(u32::MAX)),
            ..EntryQuery::default()
        })?;
        let all_time_max = self.store.max_completed_weight(exercise_id)?.unwrap_or(0.0);
        let newest = entries.first().map(|e| e.entry.id);

        let sessions = entries
            .iter()
            .filter_map(|e| {
                let date = e.workout_date?;
                let eligible = Some(e.entry.id) == newest;
                let sets: Vec<ProgressSet> = e
                    .entry
                    .sets_in_order()
                    .into_iter()
                    .filter(|s| s.completed && s.weight > 0.0 && s.reps > 0)
                    .map(|s| ProgressSet {
                        set_number: s.set_number,
                        weight: from_storage(s.weight, unit),
                        reps: s.reps,
                        is_personal_record: eligible && s.weight >= all_time_max,
                    })
                    .collect();
                (!sets.is_empty()).then(|| ProgressSession {
                    workout_id: e.workout_id,
                    date,
                    sets,
                })
            })
            .collect();

        Ok(ExerciseProgress { unit, sessions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn trend_needs_a_baseline() {
        assert_eq!(Trend::between(0, 4), None);
        let up = Trend::between(2, 3).unwrap();
        assert_eq!(up.direction, TrendDirection::Up);
        assert!((up.percent_change - 50.0).abs() < 1e-9);
        assert_eq!(Trend::between(4, 2).unwrap().direction, TrendDirection::Down);
        assert_eq!(Trend::between(3, 3).unwrap().direction, TrendDirection::Flat);
        assert_eq!(Trend::between(3, 0).unwrap().percent_change, -100.0);
    }

    #[test]
    fn time_ranges_end_now() {
        let now = Utc.with_ymd_and_hms(2025, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(TimeRange::Week.bounds(now).0, now - Duration::days(7));
        // Month arithmetic clamps to the last valid day.
        assert_eq!(
            TimeRange::Month.bounds(now).0,
            Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap()
        );
        assert_eq!(
            TimeRange::AllTime.bounds(now).0,
            Utc.with_ymd_and_hms(2015, 3, 31, 12, 0, 0).unwrap()
        );
        assert_eq!(TimeRange::ThreeMonths.to_string(), "3 Months");
    }
}
