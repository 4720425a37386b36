//src/main.rs
mod cli;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use std::io::{self, stdout};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

use workout_tracker_lib::units::{format_weight, from_storage};
use workout_tracker_lib::{
    AppService, Category, Error, Exercise, ExerciseProgress, MuscleGroup, TimeRange, WeightUnit,
    Workout, WorkoutStats, WorkoutTemplate,
};

const LOG_ENV_VAR: &str = "WORKOUT_LOG";

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();

    // --- Check for completion generation request FIRST ---
    let cli_args = cli::parse_args();
    let export_csv = cli_args.export_csv;

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command();
        let bin_name = cmd.get_name().to_string();
        eprintln!("Generating completion script for {shell}...");
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout());
        return Ok(());
    }

    // Initialize the application service (loads config, connects to DB)
    let mut service =
        AppService::initialize().context("Failed to initialize application service")?;
    let unit = service.config.weight_unit;

    match cli_args.command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already");
        }

        // --- Exercise Commands ---
        cli::Commands::CreateExercise {
            name,
            category,
            muscles,
            notes,
        } => {
            let groups = parse_muscles(muscles.as_deref())?;
            match service.create_exercise(&name, cli_category(category), &groups, notes.as_deref())
            {
                Ok(change) => println!(
                    "Successfully defined exercise: '{}' (Category: {}) ID: {}",
                    change.entity.name, change.entity.category, change.entity.id
                ),
                Err(e) => bail!("Error creating exercise: {}", e),
            }
        }
        cli::Commands::EditExercise {
            identifier,
            name,
            category,
            muscles,
            notes,
        } => {
            let mut exercise = require_exercise(&service, &identifier)?;
            if let Some(name) = name {
                exercise.name = name;
            }
            if let Some(category) = category {
                exercise.category = cli_category(category);
            }
            if let Some(muscles) = muscles {
                exercise.muscle_groups = parse_muscles(Some(muscles.as_str()))?;
            }
            if let Some(notes) = notes {
                exercise.notes = Some(notes);
            }
            match service.update_exercise(exercise) {
                Ok(change) => println!("Successfully updated exercise '{}'.", change.entity.name),
                Err(e) => bail!("Error editing exercise '{}': {}", identifier, e),
            }
        }
        cli::Commands::DeleteExercise {
            identifier,
            cascade,
        } => {
            let exercise = require_exercise(&service, &identifier)?;
            match service.delete_exercise(exercise.id, cascade) {
                Ok(change) => println!("Successfully deleted exercise '{}'.", change.entity.name),
                Err(e @ Error::Referential { .. }) => {
                    bail!("{}. Re-run with --cascade to remove those entries too.", e)
                }
                Err(e) => bail!("Error deleting exercise '{}': {}", identifier, e),
            }
        }
        cli::Commands::ListExercises { category, search } => {
            let exercises =
                service.filter_exercises(category.map(cli_category), search.as_deref())?;
            if exercises.is_empty() {
                println!("No exercises found.");
            } else {
                print_exercise_table(&exercises, header_color(&service));
            }
        }
        cli::Commands::Seed => {
            let created = service.seed_sample_exercises()?;
            if created.is_empty() {
                println!("Exercise library is not empty; nothing seeded.");
            } else {
                println!("Added {} sample exercises.", created.len());
            }
        }

        // --- Workout Commands ---
        cli::Commands::CreateWorkout { name, date, notes } => {
            let date = date.map(|d| on_day(&service, d));
            match service.create_workout(&name, date, notes.as_deref()) {
                Ok(change) => println!(
                    "Created workout '{}' ID: {}",
                    change.entity.name, change.entity.id
                ),
                Err(e) => bail!("Error creating workout: {}", e),
            }
        }
        cli::Commands::StartWorkout { id } => {
            let change = service.start_workout(id)?;
            println!(
                "Started workout '{}' at {}.",
                change.entity.name,
                format_local(change.entity.date)
            );
        }
        cli::Commands::EndWorkout { id, duration } => {
            let change = service.end_workout(id, duration)?;
            println!(
                "Workout '{}' ended after {}.",
                change.entity.name,
                change.entity.formatted_duration()
            );
        }
        cli::Commands::DeleteWorkout { id } => match service.delete_workout(id) {
            Ok(change) => println!("Successfully deleted workout '{}'.", change.entity.name),
            Err(e) => bail!("Error deleting workout {}: {}", id, e),
        },
        cli::Commands::List { date, month, limit } => {
            let workouts: Vec<Workout> = if let Some(day) = date {
                service.fetch_for_day(day)?
            } else if let Some(day) = month {
                service.fetch_month(day)?.into_values().flatten().collect()
            } else {
                service.fetch_all_workouts()?.into_iter().take(limit).collect()
            };
            if workouts.is_empty() {
                println!("No workouts found matching the criteria.");
            } else if export_csv {
                print_workout_csv(&workouts, unit)?;
            } else {
                print_workout_table(&workouts, header_color(&service), unit);
            }
        }
        cli::Commands::Show { id } => {
            let workout = service.get_workout(id)?;
            print_workout_detail(&service, &workout)?;
        }
        cli::Commands::AddExercise { workout, exercise } => {
            let exercise = require_exercise(&service, &exercise)?;
            let change = service.add_exercise_to_workout(workout, exercise.id)?;
            println!(
                "Added '{}' to workout. Entry ID: {}",
                exercise.name, change.entity.id
            );
        }
        cli::Commands::RemoveExercise { entry } => {
            service.remove_exercise_from_workout(entry)?;
            println!("Removed exercise entry {entry}.");
        }
        cli::Commands::AddSet {
            entry,
            weight,
            reps,
        } => {
            let mut set = service.add_set(entry)?.into_entity();
            if weight.is_some() || reps.is_some() {
                let weight = weight.unwrap_or_else(|| from_storage(set.weight, unit));
                set = service
                    .update_set(set.id, weight, reps.unwrap_or(set.reps), false)?
                    .into_entity();
            }
            println!(
                "Added set {} ({} {} x {}) ID: {}",
                set.set_number,
                format_weight(from_storage(set.weight, unit)),
                unit,
                set.reps,
                set.id
            );
        }
        cli::Commands::EditSet {
            set,
            weight,
            reps,
            completed,
        } => {
            let current = service.get_set(set)?;
            let change = service.update_set(
                set,
                weight.unwrap_or_else(|| from_storage(current.weight, unit)),
                reps.unwrap_or(current.reps),
                completed.unwrap_or(current.completed),
            )?;
            println!("Updated set {}.", change.entity.set_number);
        }
        cli::Commands::CompleteSet { set, undo } => {
            let change = service.set_completed(set, !undo)?;
            let state = if change.entity.completed { "done" } else { "not done" };
            println!("Set {} marked {state}.", change.entity.set_number);
            if let Some(seconds) = service.rest_countdown(&change.entity) {
                println!("Rest for {seconds} seconds.");
            }
        }
        cli::Commands::RemoveSet { set } => {
            service.remove_set(set)?;
            println!("Removed set {set}.");
        }

        // --- Template & duplication Commands ---
        cli::Commands::Duplicate { id, date, name } => {
            let to_date = on_day(&service, date.unwrap_or_else(|| Local::now().date_naive()));
            let change = service.duplicate_workout(id, to_date, name.as_deref())?;
            println!(
                "Created '{}' ({} sets) ID: {}",
                change.entity.name,
                change.entity.total_sets(),
                change.entity.id
            );
        }
        cli::Commands::CreateTemplate { workout, name } => {
            let change = service.create_template(workout, &name)?;
            println!(
                "Saved template '{}' ID: {}",
                change.entity.name, change.entity.id
            );
        }
        cli::Commands::ListTemplates => {
            let templates = service.list_templates()?;
            if templates.is_empty() {
                println!("No templates saved.");
            } else {
                print_template_table(&service, &templates, header_color(&service))?;
            }
        }
        cli::Commands::UseTemplate {
            template,
            date,
            name,
        } => {
            let date = on_day(&service, date.unwrap_or_else(|| Local::now().date_naive()));
            let change = service.create_workout_from_template(template, date, name.as_deref())?;
            println!(
                "Created workout '{}' ({} sets) ID: {}",
                change.entity.name,
                change.entity.total_sets(),
                change.entity.id
            );
        }
        cli::Commands::EditTemplate { id, name, notes } => {
            let change = service.update_template(id, &name, notes.as_deref())?;
            println!("Updated template '{}'.", change.entity.name);
        }
        cli::Commands::DeleteTemplate { id } => {
            let change = service.delete_template(id)?;
            println!("Deleted template '{}'.", change.entity.name);
        }

        // --- Statistics Commands ---
        cli::Commands::Stats { range } => {
            let range = cli_time_range(range);
            let (start, end) = range.bounds(service.now());
            let stats = service.get_workout_stats(Some(start), Some(end))?;
            print_workout_stats(&stats, range, unit);
            let frequent = service.get_frequent_exercises(start, end)?;
            if !frequent.is_empty() {
                print_frequent_table(&frequent, header_color(&service));
            }
        }
        cli::Commands::ExerciseStats { identifier } => {
            let exercise = require_exercise(&service, &identifier)?;
            let stats = service.get_exercise_stats(exercise.id)?;
            println!("\n--- Statistics for '{}' ---", exercise.name);
            println!("Completed Sets: {}", stats.total_sets);
            println!("Total Reps: {}", stats.total_reps);
            println!(
                "Total Volume: {} {unit}",
                format_weight(from_storage(stats.total_volume, unit))
            );
            println!(
                "Max Weight: {} {unit}",
                format_weight(from_storage(stats.max_weight, unit))
            );
        }
        cli::Commands::History { identifier, limit } => {
            let exercise = require_exercise(&service, &identifier)?;
            let history = service.get_exercise_history(exercise.id, limit)?;
            if history.is_empty() {
                println!("No completed sessions for '{}'.", exercise.name);
            } else {
                print_history_table(&history, header_color(&service), unit);
            }
        }
        cli::Commands::Progress {
            identifier,
            sessions,
        } => {
            let exercise = require_exercise(&service, &identifier)?;
            let sessions = sessions.unwrap_or(service.config.personal_record_sessions);
            let progress = service.get_exercise_progress(exercise.id, sessions)?;
            print_progress(&exercise, &progress);
        }

        // --- Config Commands ---
        cli::Commands::SetUnits { units } => {
            let unit = match units {
                cli::UnitsCli::Kg => WeightUnit::Kilograms,
                cli::UnitsCli::Lb => WeightUnit::Pounds,
            };
            service.set_weight_unit(unit)?;
            println!("Weights will be shown in {unit}.");
        }
        cli::Commands::SetRestTime { seconds } => {
            service.set_default_rest_time(seconds)?;
            println!("Default rest time set to {seconds} seconds.");
        }
        cli::Commands::SetAutoRest { state } => {
            let enabled = state == cli::ToggleCli::On;
            service.set_auto_start_rest_timer(enabled)?;
            let word = if enabled { "on" } else { "off" };
            println!("Automatic rest countdown turned {word}.");
        }
        cli::Commands::DbPath => match service.get_db_path() {
            Some(path) => println!("Database file is located at: {}", path.display()),
            None => println!("Database is in memory."),
        },
        cli::Commands::ConfigPath => match service.get_config_path() {
            Some(path) => println!("Config file is located at: {}", path.display()),
            None => println!("Config is not backed by a file."),
        },
    }

    Ok(())
}

const fn cli_category(category: cli::CategoryCli) -> Category {
    match category {
        cli::CategoryCli::Chest => Category::Chest,
        cli::CategoryCli::Back => Category::Back,
        cli::CategoryCli::Shoulders => Category::Shoulders,
        cli::CategoryCli::Biceps => Category::Biceps,
        cli::CategoryCli::Triceps => Category::Triceps,
        cli::CategoryCli::Legs => Category::Legs,
        cli::CategoryCli::Core => Category::Core,
        cli::CategoryCli::Cardio => Category::Cardio,
        cli::CategoryCli::Other => Category::Other,
    }
}

const fn cli_time_range(range: cli::TimeRangeCli) -> TimeRange {
    match range {
        cli::TimeRangeCli::Week => TimeRange::Week,
        cli::TimeRangeCli::Month => TimeRange::Month,
        cli::TimeRangeCli::ThreeMonths => TimeRange::ThreeMonths,
        cli::TimeRangeCli::Year => TimeRange::Year,
        cli::TimeRangeCli::All => TimeRange::AllTime,
    }
}

fn parse_muscles(muscles: Option<&str>) -> Result<Vec<MuscleGroup>> {
    muscles
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| MuscleGroup::from_str(m).with_context(|| format!("Unknown muscle group '{m}'")))
        .collect()
}

fn require_exercise(service: &AppService, identifier: &str) -> Result<Exercise> {
    service
        .resolve_exercise(identifier)?
        .with_context(|| format!("Exercise '{identifier}' not found"))
}

/// `day` at the current time of day, so same-day workouts keep their order.
fn on_day(service: &AppService, day: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&day.and_time(service.now().time()))
}

fn header_color(service: &AppService) -> Color {
    workout_tracker_lib::parse_color(&service.config.theme.header_color)
        .map(Color::from)
        .unwrap_or(Color::Green)
}

fn format_local(date: Option<DateTime<Utc>>) -> String {
    date.map_or_else(
        || "-".to_string(),
        |d| d.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    )
}

fn weight_cell(kg: f64, unit: WeightUnit) -> Cell {
    Cell::new(format_weight(from_storage(kg, unit)))
}

fn exercise_name(service: &AppService, id: uuid::Uuid) -> Result<String> {
    match service.get_exercise(id) {
        Ok(exercise) => Ok(exercise.name),
        Err(Error::NotFound { .. }) => Ok("(deleted)".to_string()),
        Err(e) => Err(e.into()),
    }
}

fn new_table(header: Vec<Cell>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// Prints exercise definitions in a formatted table.
fn print_exercise_table(exercises: &[Exercise], header_color: Color) {
    let mut table = new_table(vec![
        Cell::new("ID").fg(header_color),
        Cell::new("Name").fg(header_color),
        Cell::new("Category").fg(header_color),
        Cell::new("Muscles").fg(header_color),
        Cell::new("Notes").fg(header_color),
    ]);
    for exercise in exercises {
        let muscles: Vec<String> = exercise.muscle_groups.iter().map(ToString::to_string).collect();
        table.add_row(vec![
            Cell::new(exercise.id.to_string()),
            Cell::new(&exercise.name),
            Cell::new(exercise.category.to_string()),
            Cell::new(if muscles.is_empty() {
                "-".to_string()
            } else {
                muscles.join(", ")
            }),
            Cell::new(exercise.notes.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
}

/// Prints workouts in a formatted table.
fn print_workout_table(workouts: &[Workout], header_color: Color, unit: WeightUnit) {
    let mut table = new_table(vec![
        Cell::new("ID").fg(header_color),
        Cell::new("Date (Local)").fg(header_color),
        Cell::new("Name").fg(header_color),
        Cell::new("Exercises").fg(header_color),
        Cell::new("Sets (done/total)").fg(header_color),
        Cell::new(format!("Volume ({unit})")).fg(header_color),
        Cell::new("Duration").fg(header_color),
    ]);
    for workout in workouts {
        let name_cell = if workout.is_completed() {
            Cell::new(&workout.name).add_attribute(Attribute::Bold)
        } else {
            Cell::new(&workout.name)
        };
        table.add_row(vec![
            Cell::new(workout.id.to_string()),
            Cell::new(format_local(workout.date)),
            name_cell,
            Cell::new(workout.exercises.len().to_string()),
            Cell::new(format!("{}/{}", workout.completed_sets(), workout.total_sets())),
            weight_cell(workout.total_volume(), unit),
            Cell::new(workout.formatted_duration()),
        ]);
    }
    println!("{table}");
}

fn print_workout_csv(workouts: &[Workout], unit: WeightUnit) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record([
        "Id",
        "Date_Local",
        "Name",
        "Exercises",
        "Completed_Sets",
        "Total_Sets",
        &format!("Volume_{unit}"),
        "Duration_Seconds",
        "Notes",
    ])?;
    for workout in workouts {
        writer.write_record([
            workout.id.to_string(),
            workout
                .date
                .map(|d| d.with_timezone(&Local).to_rfc3339())
                .unwrap_or_default(),
            workout.name.clone(),
            workout.exercises.len().to_string(),
            workout.completed_sets().to_string(),
            workout.total_sets().to_string(),
            format_weight(from_storage(workout.total_volume(), unit)),
            workout.duration.to_string(),
            workout.notes.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn print_workout_detail(service: &AppService, workout: &Workout) -> Result<()> {
    let unit = service.config.weight_unit;
    let header_color = header_color(service);
    println!("\n--- {} ---", workout.name);
    println!("Date: {}", format_local(workout.date));
    println!("Duration: {}", workout.formatted_duration());
    println!(
        "Progress: {}/{} sets ({:.0}%)",
        workout.completed_sets(),
        workout.total_sets(),
        workout.progress() * 100.0
    );
    if let Some(notes) = &workout.notes {
        println!("Notes: {notes}");
    }

    for entry in workout.exercises_in_order() {
        println!(
            "\n{} (entry {})",
            exercise_name(service, entry.exercise_id)?,
            entry.id
        );
        let mut table = new_table(vec![
            Cell::new("Set").fg(header_color),
            Cell::new(format!("Weight ({unit})")).fg(header_color),
            Cell::new("Reps").fg(header_color),
            Cell::new("Rest (s)").fg(header_color),
            Cell::new("Done").fg(header_color),
            Cell::new("Set ID").fg(header_color),
        ]);
        for set in entry.sets_in_order() {
            table.add_row(vec![
                Cell::new(set.set_number.to_string()),
                weight_cell(set.weight, unit),
                Cell::new(set.reps.to_string()),
                Cell::new(set.rest_time.to_string()),
                Cell::new(if set.completed { "✓" } else { "" }),
                Cell::new(set.id.to_string()),
            ]);
        }
        println!("{table}");
    }
    Ok(())
}

fn print_template_table(
    service: &AppService,
    templates: &[WorkoutTemplate],
    header_color: Color,
) -> Result<()> {
    let mut table = new_table(vec![
        Cell::new("ID").fg(header_color),
        Cell::new("Name").fg(header_color),
        Cell::new("Exercises").fg(header_color),
        Cell::new("Sets").fg(header_color),
        Cell::new("Notes").fg(header_color),
    ]);
    for template in templates {
        let names = template
            .exercises_in_order()
            .into_iter()
            .map(|te| exercise_name(service, te.exercise_id))
            .collect::<Result<Vec<_>>>()?;
        let sets: usize = template.exercises.iter().map(|te| te.sets.len()).sum();
        table.add_row(vec![
            Cell::new(template.id.to_string()),
            Cell::new(&template.name),
            Cell::new(names.join(", ")),
            Cell::new(sets.to_string()),
            Cell::new(template.notes.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
    Ok(())
}

fn print_workout_stats(stats: &WorkoutStats, range: TimeRange, unit: WeightUnit) {
    println!("\n--- Workouts ({range}) ---");
    println!("Workouts: {}", stats.total_workouts);
    println!("Sets: {}", stats.total_sets);
    println!(
        "Volume: {} {unit}",
        format_weight(from_storage(stats.total_volume, unit))
    );
    println!(
        "Total Duration: {}",
        workout_tracker_lib::model::format_duration(
            u32::try_from(stats.total_duration).unwrap_or(u32::MAX)
        )
    );
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let average = stats.average_duration.round() as u32;
    println!(
        "Average Duration: {}",
        workout_tracker_lib::model::format_duration(average)
    );
}

fn print_frequent_table(frequent: &[workout_tracker_lib::FrequentExercise], header_color: Color) {
    let mut table = new_table(vec![
        Cell::new("Exercise").fg(header_color),
        Cell::new("Times").fg(header_color),
        Cell::new("Last Performed").fg(header_color),
        Cell::new("Trend").fg(header_color),
    ]);
    for item in frequent {
        let trend = item.trend.map_or_else(
            || "-".to_string(),
            |t| format!("{} {:+.0}%", t.direction, t.percent_change),
        );
        table.add_row(vec![
            Cell::new(&item.exercise.name),
            Cell::new(item.times_performed.to_string()),
            Cell::new(format_local(Some(item.last_performed))),
            Cell::new(trend),
        ]);
    }
    println!("{table}");
}

fn print_history_table(
    history: &[workout_tracker_lib::ExerciseHistoryEntry],
    header_color: Color,
    unit: WeightUnit,
) {
    let mut table = new_table(vec![
        Cell::new("Date (Local)").fg(header_color),
        Cell::new("Sets").fg(header_color),
        Cell::new("Avg Reps").fg(header_color),
        Cell::new(format!("Max Weight ({unit})")).fg(header_color),
        Cell::new("Workout ID").fg(header_color),
    ]);
    for entry in history {
        table.add_row(vec![
            Cell::new(format_local(Some(entry.date))),
            Cell::new(entry.total_sets.to_string()),
            Cell::new(format!("{:.1}", entry.average_reps)),
            weight_cell(entry.max_weight, unit),
            Cell::new(entry.workout_id.to_string()),
        ]);
    }
    println!("{table}");
}

fn print_progress(exercise: &Exercise, progress: &ExerciseProgress) {
    let unit = progress.unit;
    println!("\n--- Progress for '{}' ---", exercise.name);
    if progress.sessions.is_empty() {
        println!("No completed sessions yet.");
        return;
    }
    for session in &progress.sessions {
        println!("\n{}", format_local(Some(session.date)));
        for set in &session.sets {
            let marker = if set.is_personal_record { "  PR!" } else { "" };
            println!(
                "  Set {}: {} {unit} x {}{marker}",
                set.set_number,
                format_weight(set.weight),
                set.reps
            );
        }
    }
    println!(
        "\nLatest max: {} {unit}",
        format_weight(progress.latest_max_weight())
    );
    if let Some(previous) = progress.previous_max_weight() {
        println!("Previous max: {} {unit}", format_weight(previous));
    }
    println!(
        "Latest volume: {} {unit}",
        format_weight(progress.latest_total_volume())
    );
    if let Some(previous) = progress.previous_total_volume() {
        println!("Previous volume: {} {unit}", format_weight(previous));
    }
}
