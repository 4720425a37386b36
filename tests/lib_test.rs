use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use uuid::Uuid;
use workout_tracker_lib::validation::validate_exercise_name;
use workout_tracker_lib::{
    Action, AppService, Category, Clock, Config, EntityKind, Error, FixedClock, MuscleGroup,
    Reason, SessionStatus, SetConfig, SqliteStore, TrendDirection, WeightUnit, Workout, WorkoutSession,
};

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
}

// Helper function to create a test service with in-memory database
fn create_test_service() -> Result<(AppService, Arc<FixedClock>)> {
    let clock = Arc::new(FixedClock::new(base_time()));
    let store = SqliteStore::open_in_memory()?;
    let service = AppService::new(store, Config::default(), clock.clone());
    Ok((service, clock))
}

fn create_exercise(service: &mut AppService, name: &str, category: Category) -> Result<Uuid> {
    Ok(service.create_exercise(name, category, &[], None)?.entity.id)
}

/// Adds a set to `entry` and sets its values. `weight` is in the display unit.
fn log_set(
    service: &mut AppService,
    entry: Uuid,
    weight: f64,
    reps: u32,
    completed: bool,
) -> Result<Uuid> {
    let set = service.add_set(entry)?.entity;
    service.update_set(set.id, weight, reps, completed)?;
    Ok(set.id)
}

/// Squat: 100x5 done, 100x5 done, 110x3 not done. Lunge: 20x10 done.
fn create_leg_day(
    service: &mut AppService,
    date: DateTime<Utc>,
    squat: Uuid,
    lunge: Uuid,
) -> Result<Workout> {
    let workout = service.create_workout("Leg Day", Some(date), Some("Heavy"))?.entity;
    let squat_entry = service.add_exercise_to_workout(workout.id, squat)?.entity.id;
    log_set(service, squat_entry, 100.0, 5, true)?;
    log_set(service, squat_entry, 100.0, 5, true)?;
    log_set(service, squat_entry, 110.0, 3, false)?;
    let lunge_entry = service.add_exercise_to_workout(workout.id, lunge)?.entity.id;
    log_set(service, lunge_entry, 20.0, 10, true)?;
    Ok(service.get_workout(workout.id)?)
}

/// A dated workout with one exercise and the given (weight, reps, completed) sets.
fn create_session(
    service: &mut AppService,
    date: DateTime<Utc>,
    exercise: Uuid,
    sets: &[(f64, u32, bool)],
) -> Result<Uuid> {
    let workout = service.create_workout("Session", Some(date), None)?.entity;
    let entry = service.add_exercise_to_workout(workout.id, exercise)?.entity.id;
    for &(weight, reps, completed) in sets {
        log_set(service, entry, weight, reps, completed)?;
    }
    Ok(workout.id)
}

fn set_values(workout: &Workout) -> Vec<(f64, u32, u32, bool)> {
    workout
        .exercises_in_order()
        .into_iter()
        .flat_map(|we| we.sets_in_order())
        .map(|s| (s.weight, s.reps, s.rest_time, s.completed))
        .collect()
}

fn setup_leg_day() -> Result<(AppService, Arc<FixedClock>, Workout, Uuid, Uuid)> {
    let (mut service, clock) = create_test_service()?;
    let squat = create_exercise(&mut service, "Squat", Category::Legs)?;
    let lunge = create_exercise(&mut service, "Lunge", Category::Legs)?;
    let workout = create_leg_day(&mut service, base_time(), squat, lunge)?;
    Ok((service, clock, workout, squat, lunge))
}

#[test]
fn test_leg_day_aggregates() -> Result<()> {
    let (_service, _clock, workout, _, _) = setup_leg_day()?;

    assert_eq!(workout.total_sets(), 4);
    assert_eq!(workout.completed_sets(), 3);
    assert!((workout.progress() - 0.75).abs() < f64::EPSILON);
    assert!((workout.total_volume() - 1530.0).abs() < 1e-9);
    assert!(!workout.is_completed());
    assert_eq!(workout.notes.as_deref(), Some("Heavy"));

    let orders: Vec<i32> = workout.exercises_in_order().iter().map(|e| e.order).collect();
    assert_eq!(orders, vec![0, 1]);
    Ok(())
}

#[test]
fn test_duplicate_workout_resets_completion() -> Result<()> {
    let (mut service, _clock, source, _, _) = setup_leg_day()?;
    let tomorrow = base_time() + Duration::days(1);

    let change = service.duplicate_workout(source.id, tomorrow, None)?;
    assert_eq!(change.event.action, Action::Created);
    assert_eq!(change.event.kind, EntityKind::Workout);

    let copy = service.get_workout(change.entity.id)?;
    assert_ne!(copy.id, source.id);
    assert_eq!(copy.name, "Leg Day (Copy)");
    assert_eq!(copy.date, Some(tomorrow));
    assert_eq!(copy.duration, 0);
    assert_eq!(copy.notes, source.notes);
    assert_eq!(copy.total_sets(), 4);
    assert_eq!(copy.completed_sets(), 0);
    assert!(copy.progress().abs() < f64::EPSILON);

    let expected: Vec<_> = set_values(&source)
        .into_iter()
        .map(|(w, r, rest, _)| (w, r, rest, false))
        .collect();
    assert_eq!(set_values(&copy), expected);

    // The source keeps its completion state.
    assert_eq!(service.get_workout(source.id)?.completed_sets(), 3);

    let named = service.duplicate_workout(source.id, tomorrow, Some("Leg Day B"))?;
    assert_eq!(named.entity.name, "Leg Day B");
    Ok(())
}

#[test]
fn test_template_round_trip() -> Result<()> {
    let (mut service, _clock, source, squat, lunge) = setup_leg_day()?;

    let template = service.create_template(source.id, "Legs A")?.entity;
    assert_eq!(template.notes, source.notes);
    let exercise_ids: Vec<Uuid> = template
        .exercises_in_order()
        .iter()
        .map(|te| te.exercise_id)
        .collect();
    assert_eq!(exercise_ids, vec![squat, lunge]);

    let date = base_time() + Duration::days(3);
    let workout = service
        .create_workout_from_template(template.id, date, None)?
        .entity;
    let workout = service.get_workout(workout.id)?;
    assert_eq!(workout.name, "Legs A");
    assert_eq!(workout.exercises.len(), 2);
    assert_eq!(workout.total_sets(), 4);
    assert_eq!(workout.completed_sets(), 0);

    let expected: Vec<_> = set_values(&source)
        .into_iter()
        .map(|(w, r, rest, _)| (w, r, rest, false))
        .collect();
    assert_eq!(set_values(&workout), expected);
    Ok(())
}

#[test]
fn test_malformed_template_configuration_uses_defaults() -> Result<()> {
    let (mut service, _clock, source, _, _) = setup_leg_day()?;
    let template = service.create_template(source.id, "Legs A")?.entity;
    let ordered = template.exercises_in_order();

    service.store().connection().execute(
        "UPDATE template_exercises SET sets_configuration = ?1 WHERE id = ?2",
        rusqlite::params![
            r#"[{"setNumber":1,"weight":50.0},{"reps":"eight"}]"#,
            ordered[0].id.to_string()
        ],
    )?;
    service.store().connection().execute(
        "UPDATE template_exercises SET sets_configuration = '{not json' WHERE id = ?1",
        rusqlite::params![ordered[1].id.to_string()],
    )?;

    let workout = service
        .create_workout_from_template(template.id, base_time(), Some("Recovered"))?
        .entity;
    let workout = service.get_workout(workout.id)?;
    assert_eq!(workout.exercises.len(), 2);
    assert_eq!(
        set_values(&workout),
        vec![(50.0, 0, 90, false), (0.0, 0, 90, false)]
    );
    Ok(())
}

#[test]
fn test_out_of_range_template_entries_use_defaults() -> Result<()> {
    let (mut service, _clock, source, _, _) = setup_leg_day()?;
    let template = service.create_template(source.id, "Legs A")?.entity;
    let ordered = template.exercises_in_order();

    service.store().connection().execute(
        "UPDATE template_exercises SET sets_configuration = ?1 WHERE id = ?2",
        rusqlite::params![
            r#"[{"setNumber":1,"weight":100.0,"reps":5,"restTime":90},
                {"setNumber":2,"weight":100.0,"reps":5,"restTime":4000},
                {"setNumber":3,"weight":1500.0,"reps":5,"restTime":90},
                {"setNumber":4,"weight":100.0,"reps":2000,"restTime":90}]"#,
            ordered[0].id.to_string()
        ],
    )?;

    let workout = service
        .create_workout_from_template(template.id, base_time(), None)?
        .entity;
    let workout = service.get_workout(workout.id)?;
    // The second exercise keeps its captured single set.
    assert_eq!(
        set_values(&workout),
        vec![
            (100.0, 5, 90, false),
            (100.0, 5, 90, false),
            (0.0, 5, 90, false),
            (100.0, 0, 90, false),
            (20.0, 10, 90, false),
        ]
    );
    Ok(())
}

#[test]
fn test_template_from_config_converts_display_unit() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    let bench = create_exercise(&mut service, "Bench Press", Category::Chest)?;
    service.set_weight_unit(WeightUnit::Pounds)?;

    let configs = vec![
        SetConfig {
            set_number: 1,
            weight: 225.0,
            reps: 5,
            rest_time: 120,
        },
        SetConfig {
            set_number: 2,
            weight: 225.0,
            reps: 5,
            rest_time: 120,
        },
    ];
    let template = service
        .create_template_from_config("Push", None, &[(bench, configs)])?
        .entity;
    let stored = service.get_template(template.id)?;
    let sets = &stored.exercises[0].sets;
    assert_eq!(sets.len(), 2);
    assert!((sets[0].weight - 225.0 / 2.20462).abs() < 1e-6);

    let too_heavy = vec![SetConfig {
        set_number: 1,
        weight: 5000.0,
        reps: 1,
        rest_time: 90,
    }];
    let err = service
        .create_template_from_config("Max", None, &[(bench, too_heavy)])
        .unwrap_err();
    assert!(matches!(err, Error::Validation(e) if e.reason == Reason::OutOfRange));
    assert_eq!(service.list_templates()?.len(), 1);
    Ok(())
}

#[test]
fn test_template_edit_and_delete() -> Result<()> {
    let (mut service, clock, source, _, _) = setup_leg_day()?;
    let template = service.create_template(source.id, "Legs A")?.entity;

    clock.advance(Duration::minutes(5));
    let updated = service
        .update_template(template.id, "Legs B", Some("Deload"))?
        .entity;
    assert_eq!(updated.name, "Legs B");
    assert_eq!(updated.notes.as_deref(), Some("Deload"));
    assert!(updated.updated_at > template.updated_at);
    assert_eq!(updated.exercises.len(), 2);

    service.delete_template(template.id)?;
    assert!(service.list_templates()?.is_empty());
    assert!(matches!(
        service.get_template(template.id),
        Err(Error::NotFound {
            kind: EntityKind::Template,
            ..
        })
    ));
    Ok(())
}

#[test]
fn test_workout_stats_include_boundaries() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    let start = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(2025, 3, 31, 23, 59, 59).unwrap();

    for (date, duration) in [
        (start, 1200),
        (end, 1800),
        (start - Duration::seconds(1), 600),
        (end + Duration::seconds(1), 600),
    ] {
        let workout = service.create_workout("Run", Some(date), None)?.entity;
        service.end_workout(workout.id, duration)?;
    }

    let stats = service.get_workout_stats(Some(start), Some(end))?;
    assert_eq!(stats.total_workouts, 2);
    assert_eq!(stats.total_duration, 3000);
    assert!((stats.average_duration - 1500.0).abs() < f64::EPSILON);

    let all = service.get_workout_stats(None, None)?;
    assert_eq!(all.total_workouts, 4);

    // Sub-microsecond offsets still fall outside the range.
    service.create_workout("Run", Some(end + Duration::nanoseconds(300)), None)?;
    let stats = service.get_workout_stats(Some(start), Some(end))?;
    assert_eq!(stats.total_workouts, 2);

    let empty = service.get_workout_stats(
        Some(start - Duration::days(60)),
        Some(start - Duration::days(30)),
    )?;
    assert_eq!(empty.total_workouts, 0);
    assert!(empty.average_duration.abs() < f64::EPSILON);
    Ok(())
}

#[test]
fn test_exercise_stats_count_completed_sets_only() -> Result<()> {
    let (mut service, _clock, _workout, squat, _) = setup_leg_day()?;

    let stats = service.get_exercise_stats(squat)?;
    assert_eq!(stats.total_sets, 2);
    assert_eq!(stats.total_reps, 10);
    assert!((stats.total_volume - 1000.0).abs() < 1e-9);
    assert!((stats.max_weight - 100.0).abs() < 1e-9);

    let press = create_exercise(&mut service, "Overhead Press", Category::Shoulders)?;
    create_session(
        &mut service,
        base_time(),
        press,
        &[(40.0, 8, false), (40.0, 8, false)],
    )?;
    let zeros = service.get_exercise_stats(press)?;
    assert_eq!(zeros.total_sets, 0);
    assert_eq!(zeros.total_reps, 0);
    assert!(zeros.total_volume.abs() < f64::EPSILON);
    assert!(zeros.max_weight.abs() < f64::EPSILON);

    assert!(matches!(
        service.get_exercise_stats(Uuid::new_v4()),
        Err(Error::NotFound {
            kind: EntityKind::Exercise,
            ..
        })
    ));
    Ok(())
}

#[test]
fn test_exercise_history_limit_and_exclusion() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    let squat = create_exercise(&mut service, "Squat", Category::Legs)?;

    let day = |n: i64| base_time() - Duration::days(n);
    create_session(&mut service, day(3), squat, &[(90.0, 5, true)])?;
    let second = create_session(&mut service, day(2), squat, &[(95.0, 5, true)])?;
    let newest = create_session(
        &mut service,
        day(1),
        squat,
        &[(100.0, 5, true), (105.0, 2, true)],
    )?;

    let history = service.get_exercise_history(squat, 2)?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].workout_id, newest);
    assert_eq!(history[1].workout_id, second);
    assert_eq!(history[0].total_sets, 2);
    assert!((history[0].average_reps - 3.5).abs() < f64::EPSILON);
    assert!((history[0].max_weight - 105.0).abs() < 1e-9);

    // A newer session with nothing completed is dropped rather than zero-filled.
    create_session(&mut service, base_time(), squat, &[(100.0, 5, false)])?;
    let history = service.get_exercise_history(squat, 3)?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].workout_id, newest);
    Ok(())
}

#[test]
fn test_progress_flags_records_in_newest_session_only() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    let squat = create_exercise(&mut service, "Squat", Category::Legs)?;

    let day = |n: i64| base_time() - Duration::days(n);
    create_session(&mut service, day(10), squat, &[(100.0, 5, true)])?;
    create_session(&mut service, day(5), squat, &[(120.0, 3, true)])?;
    create_session(
        &mut service,
        day(1),
        squat,
        &[(110.0, 5, true), (120.0, 2, true), (0.0, 0, true)],
    )?;

    let progress = service.get_exercise_progress(squat, 3)?;
    assert_eq!(progress.sessions.len(), 3);

    let newest = &progress.sessions[0];
    assert_eq!(newest.sets.len(), 2);
    assert!(!newest.sets[0].is_personal_record);
    assert!(newest.sets[1].is_personal_record);
    assert!(progress.sessions[1]
        .sets
        .iter()
        .all(|s| !s.is_personal_record));
    assert_eq!(progress.personal_records(), 1);
    assert!((progress.latest_max_weight() - 120.0).abs() < 1e-9);
    assert_eq!(progress.previous_max_weight(), Some(120.0));
    assert!((progress.latest_total_volume() - 790.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_progress_reports_display_unit() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    let squat = create_exercise(&mut service, "Squat", Category::Legs)?;
    create_session(&mut service, base_time(), squat, &[(100.0, 5, true)])?;

    service.set_weight_unit(WeightUnit::Pounds)?;
    let progress = service.get_exercise_progress(squat, 3)?;
    assert_eq!(progress.unit, WeightUnit::Pounds);
    assert!((progress.sessions[0].sets[0].weight - 220.462).abs() < 1e-6);
    Ok(())
}

#[test]
fn test_frequent_exercises_rank_and_trend() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    let squat = create_exercise(&mut service, "Squat", Category::Legs)?;
    let bench = create_exercise(&mut service, "Bench Press", Category::Chest)?;
    let row = create_exercise(&mut service, "Row", Category::Back)?;

    let end = base_time();
    let start = end - Duration::days(7);
    // Current period.
    create_session(&mut service, end - Duration::days(1), squat, &[])?;
    create_session(&mut service, end - Duration::days(3), squat, &[])?;
    create_session(&mut service, end - Duration::days(2), bench, &[])?;
    // Preceding period of equal length.
    create_session(&mut service, start - Duration::days(2), squat, &[])?;
    create_session(&mut service, start - Duration::days(3), row, &[])?;

    let frequent = service.get_frequent_exercises(start, end)?;
    assert_eq!(frequent.len(), 2);

    assert_eq!(frequent[0].exercise.id, squat);
    assert_eq!(frequent[0].times_performed, 2);
    assert_eq!(frequent[0].last_performed, end - Duration::days(1));
    let trend = frequent[0].trend.expect("squat has a baseline");
    assert_eq!(trend.direction, TrendDirection::Up);
    assert!((trend.percent_change - 100.0).abs() < 1e-9);

    assert_eq!(frequent[1].exercise.id, bench);
    assert_eq!(frequent[1].trend, None);
    Ok(())
}

#[test]
fn test_frequent_exercises_keep_top_five() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    for (i, name) in ["A1", "B2", "C3", "D4", "E5", "F6"].iter().enumerate() {
        let id = create_exercise(&mut service, name, Category::Other)?;
        for n in 0..=i {
            let offset = i64::try_from(n)?;
            create_session(&mut service, base_time() - Duration::hours(offset + 1), id, &[])?;
        }
    }

    let frequent =
        service.get_frequent_exercises(base_time() - Duration::days(1), base_time())?;
    let names: Vec<&str> = frequent.iter().map(|f| f.exercise.name.as_str()).collect();
    assert_eq!(names, vec!["F6", "E5", "D4", "C3", "B2"]);
    Ok(())
}

#[test]
fn test_delete_referenced_exercise() -> Result<()> {
    let (mut service, _clock, workout, squat, lunge) = setup_leg_day()?;
    service.create_template(workout.id, "Legs A")?;

    let err = service.delete_exercise(squat, false).unwrap_err();
    match err {
        Error::Referential {
            exercise,
            references,
        } => {
            assert_eq!(exercise, squat);
            assert_eq!(references.workout_entries, 1);
            assert_eq!(references.template_entries, 1);
        }
        other => panic!("expected referential error, got {other:?}"),
    }
    assert!(service.get_exercise(squat).is_ok());
    assert_eq!(service.get_workout(workout.id)?.total_sets(), 4);

    let change = service.delete_exercise(squat, true)?;
    assert_eq!(change.event.action, Action::Deleted);
    let workout = service.get_workout(workout.id)?;
    assert_eq!(workout.exercises.len(), 1);
    assert_eq!(workout.exercises[0].exercise_id, lunge);
    assert_eq!(service.list_templates()?[0].exercises.len(), 1);

    // Unreferenced exercises go without cascading.
    let curl = create_exercise(&mut service, "Curl", Category::Biceps)?;
    service.delete_exercise(curl, false)?;
    assert_eq!(service.fetch_all_exercises()?.len(), 1);
    Ok(())
}

#[test]
fn test_exercise_names_validated_and_unique() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    assert!(!validate_exercise_name("A"));
    assert!(validate_exercise_name("Ab"));

    let err = service
        .create_exercise("A", Category::Other, &[], None)
        .unwrap_err();
    assert!(matches!(err, Error::Validation(e) if e.reason == Reason::TooShort));

    create_exercise(&mut service, "Bench Press", Category::Chest)?;
    let err = service
        .create_exercise("  bench press ", Category::Chest, &[], None)
        .unwrap_err();
    assert!(matches!(err, Error::Validation(e) if e.reason == Reason::Duplicate));

    // Renaming onto an existing name is refused too.
    let squat = service.create_exercise("Squat", Category::Legs, &[], None)?.entity;
    let mut renamed = squat.clone();
    renamed.name = "BENCH PRESS".to_string();
    assert!(matches!(
        service.update_exercise(renamed),
        Err(Error::Validation(e)) if e.reason == Reason::Duplicate
    ));
    Ok(())
}

#[test]
fn test_exercise_search_and_listing() -> Result<()> {
    let (mut service, clock) = create_test_service()?;
    service.create_exercise(
        "Squat",
        Category::Legs,
        &[MuscleGroup::Quadriceps, MuscleGroup::Glutes, MuscleGroup::Quadriceps],
        Some("Low bar"),
    )?;
    service.create_exercise("bench press", Category::Chest, &[], None)?;
    service.create_exercise("Deadlift", Category::Back, &[], Some("Sumo stance"))?;

    let names: Vec<String> = service
        .fetch_all_exercises()?
        .into_iter()
        .map(|e| e.name)
        .collect();
    assert_eq!(names, vec!["bench press", "Deadlift", "Squat"]);

    assert_eq!(service.search_exercises("LEGS")?[0].name, "Squat");
    assert_eq!(service.search_exercises("sumo")?[0].name, "Deadlift");
    assert_eq!(service.search_exercises("  ")?.len(), 3);
    assert!(service.search_exercises("zzz")?.is_empty());
    assert_eq!(
        service.filter_exercises(Some(Category::Chest), None)?[0].name,
        "bench press"
    );

    let squat = service
        .resolve_exercise("SQUAT")?
        .expect("resolves by name");
    assert_eq!(
        squat.muscle_groups,
        vec![MuscleGroup::Quadriceps, MuscleGroup::Glutes]
    );
    assert_eq!(
        service.resolve_exercise(&squat.id.to_string())?,
        Some(squat.clone())
    );

    clock.advance(Duration::minutes(1));
    let mut edited = squat.clone();
    edited.notes = Some("High bar".to_string());
    let updated = service.update_exercise(edited)?.entity;
    assert!(updated.updated_at > squat.updated_at);
    assert_eq!(
        service.get_exercise(squat.id)?.notes.as_deref(),
        Some("High bar")
    );
    Ok(())
}

#[test]
fn test_seed_sample_exercises_only_when_empty() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    let seeded = service.seed_sample_exercises()?;
    assert_eq!(seeded.len(), 4);
    assert!(seeded.iter().all(|c| c.event.action == Action::Created));
    assert!(service.seed_sample_exercises()?.is_empty());
    assert_eq!(service.fetch_all_exercises()?.len(), 4);
    Ok(())
}

#[test]
fn test_set_editing_and_renumbering() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    let squat = create_exercise(&mut service, "Squat", Category::Legs)?;
    let workout = service.create_workout("Legs", Some(base_time()), None)?.entity;
    let entry = service.add_exercise_to_workout(workout.id, squat)?.entity.id;

    let first = service.add_set(entry)?.entity;
    assert_eq!(first.set_number, 1);
    assert!(first.weight.abs() < f64::EPSILON);
    assert_eq!(first.rest_time, 90);
    service.update_set(first.id, 80.0, 8, false)?;

    service.set_default_rest_time(120)?;
    let second = service.add_set(entry)?.entity;
    assert_eq!(second.set_number, 2);
    assert!((second.weight - 80.0).abs() < f64::EPSILON);
    assert_eq!(second.reps, 8);
    assert_eq!(second.rest_time, 120);
    let third = service.add_set(entry)?.entity;

    service.set_completed(third.id, true)?;
    assert!(service.get_set(third.id)?.completed);

    service.remove_set(second.id)?;
    let workout = service.get_workout(workout.id)?;
    let numbers: Vec<(Uuid, u32)> = workout.exercises[0]
        .sets_in_order()
        .iter()
        .map(|s| (s.id, s.set_number))
        .collect();
    assert_eq!(numbers, vec![(first.id, 1), (third.id, 2)]);

    assert!(matches!(
        service.get_set(second.id),
        Err(Error::NotFound {
            kind: EntityKind::WorkoutSet,
            ..
        })
    ));

    service.remove_exercise_from_workout(entry)?;
    assert!(service.get_workout(workout.id)?.exercises.is_empty());
    Ok(())
}

#[test]
fn test_add_set_after_renumbered_sets() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    let squat = create_exercise(&mut service, "Squat", Category::Legs)?;
    let workout = service.create_workout("Legs", Some(base_time()), None)?.entity;
    let entry = service.add_exercise_to_workout(workout.id, squat)?.entity.id;
    service.add_set(entry)?;
    let second = service.add_set(entry)?.entity;

    let mut edited = service.get_workout(workout.id)?;
    for set in edited.exercises[0].sets.iter_mut() {
        if set.id == second.id {
            set.set_number = 3;
        }
    }
    service.update_workout(edited)?;

    let next = service.add_set(entry)?.entity;
    assert_eq!(next.set_number, 4);
    let numbers: Vec<u32> = service.get_workout(workout.id)?.exercises[0]
        .sets_in_order()
        .iter()
        .map(|s| s.set_number)
        .collect();
    assert_eq!(numbers, vec![1, 3, 4]);
    Ok(())
}

#[test]
fn test_rest_countdown_follows_preference() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    let squat = create_exercise(&mut service, "Squat", Category::Legs)?;
    let workout = service.create_workout("Legs", Some(base_time()), None)?.entity;
    let entry = service.add_exercise_to_workout(workout.id, squat)?.entity.id;
    let set = service.add_set(entry)?.entity;

    assert_eq!(service.rest_countdown(&set), None);
    let done = service.set_completed(set.id, true)?.entity;
    assert_eq!(service.rest_countdown(&done), Some(90));

    service.set_auto_start_rest_timer(false)?;
    assert!(!service.config.auto_start_rest_timer);
    assert_eq!(service.rest_countdown(&done), None);
    Ok(())
}

#[test]
fn test_update_set_converts_and_validates() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    let squat = create_exercise(&mut service, "Squat", Category::Legs)?;
    let workout = service.create_workout("Legs", Some(base_time()), None)?.entity;
    let entry = service.add_exercise_to_workout(workout.id, squat)?.entity.id;
    let set = service.add_set(entry)?.entity;

    service.set_weight_unit(WeightUnit::Pounds)?;
    let updated = service.update_set(set.id, 220.462, 5, true)?.entity;
    assert!((updated.weight - 100.0).abs() < 1e-6);
    assert!((service.get_set(set.id)?.weight - 100.0).abs() < 1e-6);

    // 3000 lb is above the 1000 kg ceiling.
    let err = service.update_set(set.id, 3000.0, 5, true).unwrap_err();
    assert!(matches!(err, Error::Validation(e) if e.reason == Reason::OutOfRange));
    let err = service.update_set(set.id, 100.0, 1001, true).unwrap_err();
    assert!(matches!(err, Error::Validation(e) if e.reason == Reason::OutOfRange));
    assert!((service.get_set(set.id)?.weight - 100.0).abs() < 1e-6);
    Ok(())
}

#[test]
fn test_failed_workout_update_leaves_stored_graph() -> Result<()> {
    let (mut service, _clock, workout, _, _) = setup_leg_day()?;

    let mut broken = workout.clone();
    broken.name = "Renamed".to_string();
    // Squat then has three sets numbered 1, which the schema rejects.
    for set in broken.exercises.iter_mut().flat_map(|we| we.sets.iter_mut()) {
        set.set_number = 1;
    }
    let err = service.update_workout(broken).unwrap_err();
    assert!(matches!(err, Error::Storage(_)));

    let stored = service.get_workout(workout.id)?;
    assert_eq!(stored.name, "Leg Day");
    assert_eq!(stored.total_sets(), 4);
    assert_eq!(set_values(&stored), set_values(&workout));
    Ok(())
}

#[test]
fn test_workout_names_validated() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    let err = service.create_workout("   ", None, None).unwrap_err();
    assert!(matches!(err, Error::Validation(e) if e.reason == Reason::Empty));
    let long = "x".repeat(51);
    let err = service.create_workout(&long, None, None).unwrap_err();
    assert!(matches!(err, Error::Validation(e) if e.reason == Reason::TooLong));
    assert!(service.fetch_all_workouts()?.is_empty());
    Ok(())
}

#[test]
fn test_fetch_all_for_day_and_month() -> Result<()> {
    let (mut service, _clock) = create_test_service()?;
    let at = |d: u32, h: u32, m: u32, s: u32| Utc.with_ymd_and_hms(2025, 3, d, h, m, s).unwrap();

    let late = service.create_workout("Late", Some(at(10, 23, 59, 59)), None)?.entity;
    let early = service.create_workout("Early", Some(at(10, 0, 0, 0)), None)?.entity;
    let next = service.create_workout("Next", Some(at(11, 0, 0, 0)), None)?.entity;
    let february = Utc.with_ymd_and_hms(2025, 2, 28, 18, 0, 0).unwrap();
    service.create_workout("February", Some(february), None)?;

    let day = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
    let ids: Vec<Uuid> = service.fetch_for_day(day)?.iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);

    let all: Vec<Uuid> = service.fetch_all_workouts()?.iter().map(|w| w.id).collect();
    assert_eq!(all[0], next.id);
    assert_eq!(all.len(), 4);

    let month = service.fetch_month(day)?;
    assert_eq!(month.len(), 2);
    assert_eq!(month[&day].len(), 2);
    assert_eq!(month[&NaiveDate::from_ymd_opt(2025, 3, 11).unwrap()].len(), 1);
    Ok(())
}

#[test]
fn test_delete_workout_cascades() -> Result<()> {
    let (mut service, _clock, workout, squat, _) = setup_leg_day()?;
    let set_id = workout.exercises[0].sets[0].id;

    let change = service.delete_workout(workout.id)?;
    assert_eq!(change.event.action, Action::Deleted);
    assert!(service.fetch_all_workouts()?.is_empty());
    assert!(service.get_set(set_id).is_err());
    assert_eq!(service.get_exercise_stats(squat)?.total_sets, 0);
    // The exercise is no longer referenced.
    service.delete_exercise(squat, false)?;
    Ok(())
}

#[test]
fn test_session_lifecycle_persists_duration() -> Result<()> {
    let (mut service, clock) = create_test_service()?;
    let workout = service.create_workout("Push", None, None)?.entity;
    let started = service.start_workout(workout.id)?.entity;
    assert_eq!(started.date, Some(base_time()));

    let mut session = WorkoutSession::new();
    session.start(clock.now())?;
    clock.advance(Duration::minutes(10));
    session.pause(clock.now())?;
    assert_eq!(session.status(), SessionStatus::Paused);
    clock.advance(Duration::minutes(5));
    session.resume(clock.now())?;
    clock.advance(Duration::minutes(5));

    let ended = service.end_session(workout.id, &mut session)?.entity;
    assert_eq!(ended.duration, 900);
    assert_eq!(ended.formatted_duration(), "15:00");
    assert_eq!(session.status(), SessionStatus::Ended);
    assert_eq!(service.get_workout(workout.id)?.duration, 900);

    let err = service.end_session(workout.id, &mut session).unwrap_err();
    assert!(matches!(err, Error::Session(_)));
    Ok(())
}

#[test]
fn test_adjusted_session_time_overrides_elapsed() -> Result<()> {
    let (mut service, clock) = create_test_service()?;
    let workout = service.create_workout("Pull", Some(base_time()), None)?.entity;

    let mut session = WorkoutSession::new();
    session.start(clock.now())?;
    clock.advance(Duration::minutes(3));
    session.adjust_elapsed(3600, clock.now())?;
    assert_eq!(session.status(), SessionStatus::Active);
    clock.advance(Duration::seconds(30));

    let ended = service.end_session(workout.id, &mut session)?.entity;
    assert_eq!(ended.duration, 3630);
    Ok(())
}
