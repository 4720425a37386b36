//src/validation.rs
use std::fmt;
use thiserror::Error;

pub const EXERCISE_NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 50;
pub const WEIGHT_MAX: f64 = 1000.0;
pub const REPS_MAX: u32 = 1000;
pub const REST_TIME_MAX: u32 = 3600;

/// The input field a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ExerciseName,
    WorkoutName,
    TemplateName,
    Weight,
    Reps,
    RestTime,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExerciseName => "exercise name",
            Self::WorkoutName => "workout name",
            Self::TemplateName => "template name",
            Self::Weight => "weight",
            Self::Reps => "reps",
            Self::RestTime => "rest time",
        };
        f.write_str(name)
    }
}

/// Machine-readable reason code for a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Empty,
    TooShort,
    TooLong,
    OutOfRange,
    Malformed,
    Duplicate,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Empty => "must not be empty",
            Self::TooShort => "is too short",
            Self::TooLong => "is too long",
            Self::OutOfRange => "is out of range",
            Self::Malformed => "is not a valid number",
            Self::Duplicate => "is already in use",
        };
        f.write_str(text)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: Field,
    pub reason: Reason,
}

impl ValidationError {
    #[must_use]
    pub const fn new(field: Field, reason: Reason) -> Self {
        Self { field, reason }
    }
}

fn check_name(name: &str, field: Field, min: usize) -> Result<(), ValidationError> {
    let length = name.trim().chars().count();
    if length == 0 {
        Err(ValidationError::new(field, Reason::Empty))
    } else if length < min {
        Err(ValidationError::new(field, Reason::TooShort))
    } else if length > NAME_MAX {
        Err(ValidationError::new(field, Reason::TooLong))
    } else {
        Ok(())
    }
}

/// Exercise names are 2 to 50 characters after trimming.
pub fn check_exercise_name(name: &str) -> Result<(), ValidationError> {
    check_name(name, Field::ExerciseName, EXERCISE_NAME_MIN)
}

/// Workout names are non-empty and at most 50 characters after trimming.
pub fn check_workout_name(name: &str) -> Result<(), ValidationError> {
    check_name(name, Field::WorkoutName, 1)
}

pub fn check_template_name(name: &str) -> Result<(), ValidationError> {
    check_name(name, Field::TemplateName, 1)
}

pub fn check_weight(weight: f64) -> Result<(), ValidationError> {
    if weight.is_nan() {
        return Err(ValidationError::new(Field::Weight, Reason::Malformed));
    }
    if (0.0..=WEIGHT_MAX).contains(&weight) {
        Ok(())
    } else {
        Err(ValidationError::new(Field::Weight, Reason::OutOfRange))
    }
}

pub fn check_reps(reps: i64) -> Result<(), ValidationError> {
    if (0..=i64::from(REPS_MAX)).contains(&reps) {
        Ok(())
    } else {
        Err(ValidationError::new(Field::Reps, Reason::OutOfRange))
    }
}

pub fn check_rest_time(seconds: i64) -> Result<(), ValidationError> {
    if (0..=i64::from(REST_TIME_MAX)).contains(&seconds) {
        Ok(())
    } else {
        Err(ValidationError::new(Field::RestTime, Reason::OutOfRange))
    }
}

#[must_use]
pub fn validate_exercise_name(name: &str) -> bool {
    check_exercise_name(name).is_ok()
}

#[must_use]
pub fn validate_workout_name(name: &str) -> bool {
    check_workout_name(name).is_ok()
}

#[must_use]
pub fn validate_weight(weight: f64) -> bool {
    check_weight(weight).is_ok()
}

#[must_use]
pub fn validate_reps(reps: i64) -> bool {
    check_reps(reps).is_ok()
}

/// Keeps only ASCII digits.
#[must_use]
pub fn sanitize_reps_input(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// Keeps digits and the first decimal separator, normalised to ".".
/// Later separators are dropped.
#[must_use]
pub fn sanitize_weight_input(input: &str) -> String {
    let mut seen_separator = false;
    input
        .chars()
        .filter_map(|c| match c {
            '0'..='9' => Some(c),
            '.' | ',' if !seen_separator => {
                seen_separator = true;
                Some('.')
            }
            _ => None,
        })
        .collect()
}

/// Trims free-text notes; blank notes become `None`.
pub(crate) fn clean_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exercise_name_bounds() {
        assert!(!validate_exercise_name("A"));
        assert!(validate_exercise_name("Ab"));
        assert!(!validate_exercise_name("   "));
        assert!(validate_exercise_name(&"x".repeat(50)));
        assert!(!validate_exercise_name(&"x".repeat(51)));
        assert_eq!(
            check_exercise_name(" A "),
            Err(ValidationError::new(Field::ExerciseName, Reason::TooShort))
        );
    }

    #[test]
    fn workout_name_bounds() {
        assert!(validate_workout_name("A"));
        assert!(!validate_workout_name(""));
        assert!(!validate_workout_name(" \n "));
        assert_eq!(
            check_workout_name(&"y".repeat(51)),
            Err(ValidationError::new(Field::WorkoutName, Reason::TooLong))
        );
    }

    #[test]
    fn numeric_bounds() {
        assert!(validate_weight(0.0));
        assert!(validate_weight(1000.0));
        assert!(!validate_weight(1000.01));
        assert!(!validate_weight(-0.5));
        assert!(!validate_weight(f64::NAN));
        assert!(validate_reps(0));
        assert!(validate_reps(1000));
        assert!(!validate_reps(1001));
        assert!(!validate_reps(-1));
    }

    #[test]
    fn sanitizes_numeric_input() {
        assert_eq!(sanitize_reps_input("1a2 b3"), "123");
        assert_eq!(sanitize_reps_input("8.5"), "85");
        assert_eq!(sanitize_weight_input("82,5kg"), "82.5");
        assert_eq!(sanitize_weight_input("1.2.3"), "1.23");
        assert_eq!(sanitize_weight_input("12,5.3"), "12.53");
        assert_eq!(sanitize_weight_input("abc"), "");
    }
}
