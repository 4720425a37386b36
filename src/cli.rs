// src/cli.rs
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use uuid::Uuid;
use workout_tracker_lib::units::parse_weight;

#[derive(Parser, Debug)]
#[command(author, version, about = "Track workouts, templates and training statistics", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Print listings as CSV instead of tables
    #[arg(long, global = true)]
    pub export_csv: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CategoryCli {
    Chest,
    Back,
    Shoulders,
    Biceps,
    Triceps,
    Legs,
    Core,
    Cardio,
    Other,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitsCli {
    Kg,
    Lb,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleCli {
    On,
    Off,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TimeRangeCli {
    Week,
    #[default]
    Month,
    ThreeMonths,
    Year,
    All,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    match s.trim().to_lowercase().as_str() {
        "today" => Ok(chrono::Local::now().date_naive()),
        "yesterday" => Ok(chrono::Local::now().date_naive() - chrono::Duration::days(1)),
        "tomorrow" => Ok(chrono::Local::now().date_naive() + chrono::Duration::days(1)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d")
            .map_err(|_| format!("Invalid date '{s}'. Use YYYY-MM-DD, today, yesterday or tomorrow.")),
    }
}

fn parse_weight_arg(s: &str) -> Result<f64, String> {
    parse_weight(s).ok_or_else(|| format!("Invalid weight '{s}'"))
}

/// Accepts whole seconds, "m:ss" or "h:mm:ss".
fn parse_duration(s: &str) -> Result<u32, String> {
    let invalid = || format!("Invalid duration '{s}'. Use seconds, m:ss or h:mm:ss.");
    let parts = s
        .trim()
        .split(':')
        .map(|p| p.parse::<u32>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    let seconds = match parts.as_slice() {
        [secs] => u64::from(*secs),
        [m, sec] if *sec < 60 => u64::from(*m) * 60 + u64::from(*sec),
        [h, m, sec] if *m < 60 && *sec < 60 => {
            u64::from(*h) * 3600 + u64::from(*m) * 60 + u64::from(*sec)
        }
        _ => return Err(invalid()),
    };
    u32::try_from(seconds).map_err(|_| invalid())
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Define a new exercise
    CreateExercise {
        /// Name of the exercise (e.g., "Bench Press")
        name: String,
        #[arg(short, long, value_enum, default_value_t = CategoryCli::Other)]
        category: CategoryCli,
        /// Comma-separated muscle groups (e.g., "Pectoral Major,Triceps Brachii")
        #[arg(short, long)]
        muscles: Option<String>,
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Edit an exercise (identifier is the ID or name)
    EditExercise {
        identifier: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long, value_enum)]
        category: Option<CategoryCli>,
        /// Comma-separated muscle groups; an empty string clears them
        #[arg(short, long)]
        muscles: Option<String>,
        /// New notes; an empty string clears them
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Delete an exercise
    DeleteExercise {
        identifier: String,
        /// Also remove every workout and template entry using it
        #[arg(long)]
        cascade: bool,
    },
    /// List exercises
    ListExercises {
        #[arg(short, long, value_enum)]
        category: Option<CategoryCli>,
        /// Case-insensitive text matched against name, category and notes
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Add the sample exercises to an empty library
    Seed,
    /// Create an empty workout
    CreateWorkout {
        name: String,
        /// Workout date (YYYY-MM-DD, today, yesterday). Omit to date it when started.
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Date a workout now and begin it
    StartWorkout { id: Uuid },
    /// Record the final duration of a workout
    EndWorkout {
        id: Uuid,
        /// Seconds, m:ss or h:mm:ss
        #[arg(value_parser = parse_duration)]
        duration: u32,
    },
    /// Delete a workout with all its exercises and sets
    DeleteWorkout { id: Uuid },
    /// List workouts
    List {
        /// Only workouts on this day
        #[arg(long, value_parser = parse_date, conflicts_with = "month")]
        date: Option<NaiveDate>,
        /// Workouts of the month containing this day
        #[arg(long, value_parser = parse_date)]
        month: Option<NaiveDate>,
        /// Show only the last N workouts
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Show a workout with its exercises and sets
    Show { id: Uuid },
    /// Append an exercise to a workout
    AddExercise {
        workout: Uuid,
        /// Exercise ID or name
        exercise: String,
    },
    /// Remove an exercise entry (and its sets) from a workout
    RemoveExercise { entry: Uuid },
    /// Add a set to a workout exercise entry
    AddSet {
        entry: Uuid,
        /// Weight in your display unit ("," or "." accepted)
        #[arg(short, long, value_parser = parse_weight_arg)]
        weight: Option<f64>,
        #[arg(short, long)]
        reps: Option<u32>,
    },
    /// Change a set's weight, reps or completion
    EditSet {
        set: Uuid,
        #[arg(short, long, value_parser = parse_weight_arg)]
        weight: Option<f64>,
        #[arg(short, long)]
        reps: Option<u32>,
        #[arg(long)]
        completed: Option<bool>,
    },
    /// Mark a set as done
    CompleteSet {
        set: Uuid,
        /// Mark as not done instead
        #[arg(long)]
        undo: bool,
    },
    /// Delete a set; the remaining sets are renumbered
    RemoveSet { set: Uuid },
    /// Copy a workout to another day with every set reset to not done
    Duplicate {
        id: Uuid,
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Save a workout's exercises and sets as a template
    CreateTemplate { workout: Uuid, name: String },
    /// List templates
    ListTemplates,
    /// Create a workout from a template
    UseTemplate {
        template: Uuid,
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Rename a template or change its notes
    EditTemplate {
        id: Uuid,
        name: String,
        #[arg(short, long)]
        notes: Option<String>,
    },
    DeleteTemplate { id: Uuid },
    /// Workout totals and most frequent exercises over a time range
    Stats {
        #[arg(short, long, value_enum, default_value_t = TimeRangeCli::Month)]
        range: TimeRangeCli,
    },
    /// Totals over every completed set of an exercise
    ExerciseStats { identifier: String },
    /// Recent sessions of an exercise
    History {
        identifier: String,
        #[arg(short, long, default_value_t = 5)]
        limit: u32,
    },
    /// Recent sessions with personal records flagged
    Progress {
        identifier: String,
        /// Number of sessions (defaults to the configured value)
        #[arg(short, long)]
        sessions: Option<usize>,
    },
    /// Set the weight display unit
    SetUnits {
        #[arg(value_enum)]
        units: UnitsCli,
    },
    /// Set the default rest time for new sets (seconds)
    SetRestTime { seconds: u32 },
    /// Start the rest countdown automatically when a set is marked done
    SetAutoRest {
        #[arg(value_enum)]
        state: ToggleCli,
    },
    /// Show the path to the database file
    DbPath,
    /// Show the path to the config file
    ConfigPath,
    /// Generate shell completion script
    GenerateCompletion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

// Function to parse CLI arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_accept_clock_notation() {
        assert_eq!(parse_duration("90"), Ok(90));
        assert_eq!(parse_duration("12:34"), Ok(754));
        assert_eq!(parse_duration("1:02:05"), Ok(3_725));
        assert!(parse_duration("1:75").is_err());
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn auto_rest_toggle_parses() {
        let cli = Cli::try_parse_from(["workout-tracker", "set-auto-rest", "off"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::SetAutoRest {
                state: ToggleCli::Off
            }
        ));
        assert!(Cli::try_parse_from(["workout-tracker", "set-auto-rest", "maybe"]).is_err());
    }

    #[test]
    fn command_definition_is_consistent() {
        build_cli_command().debug_assert();
    }
}
