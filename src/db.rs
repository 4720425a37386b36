//src/db.rs
use chrono::{DateTime, Utc};
use rusqlite::{named_params, params, Connection, OptionalExtension, Row, ToSql};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{
    dedup_muscle_groups, Category, Exercise, MuscleGroup, SetConfig, TemplateExercise, Workout,
    WorkoutExercise, WorkoutSet, WorkoutTemplate,
};
use crate::store::{
    EntryQuery, ExerciseEntry, ExerciseQuery, ExerciseReferences, SortOrder, Store, WorkoutQuery,
};

const DB_FILE_NAME: &str = "workouts.sqlite";
/// Fixed-width UTC timestamps so text order matches time order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database connection failed: {0}")]
    Connection(#[source] rusqlite::Error),
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing database file")]
    Io(#[from] std::io::Error),
    #[error("Database query failed: {0}")]
    QueryFailed(#[source] rusqlite::Error),
    #[error("Database insert failed: {0}")]
    InsertFailed(#[source] rusqlite::Error),
    #[error("Database update failed: {0}")]
    UpdateFailed(#[source] rusqlite::Error),
    #[error("Database delete failed: {0}")]
    DeleteFailed(#[source] rusqlite::Error),
    #[error("Transaction failed: {0}")]
    Transaction(#[source] rusqlite::Error),
    #[error("Failed to encode stored data: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Exercise name must be unique (case-insensitive): '{0}' already exists.")]
    ExerciseNameNotUnique(String),
    #[error("Exercise not found: {0}")]
    ExerciseNotFound(Uuid),
    #[error("Workout not found: {0}")]
    WorkoutNotFound(Uuid),
    #[error("Template not found: {0}")]
    TemplateNotFound(Uuid),
}

/// Gets the path to the SQLite database file within the app's data directory.
pub fn get_db_path() -> Result<PathBuf, DbError> {
    let data_dir = dirs::data_dir().ok_or(DbError::DataDir)?;
    let app_dir = data_dir.join(crate::config::APP_DIR);
    if !app_dir.exists() {
        std::fs::create_dir_all(&app_dir)?;
    }
    Ok(app_dir.join(DB_FILE_NAME))
}

/// SQLite-backed [`Store`].
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and initializes the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path).map_err(DbError::Connection)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory().map_err(DbError::Connection)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(DbError::Connection)?;
        init(&conn)?;
        Ok(Self { conn })
    }

    /// Direct access for maintenance queries and tests.
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    fn insert_workout_children(&self, workout: &Workout) -> Result<(), DbError> {
        for we in &workout.exercises {
            self.conn
                .execute(
                    "INSERT INTO workout_exercises (id, workout_id, exercise_id, sort_order)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        we.id.to_string(),
                        workout.id.to_string(),
                        we.exercise_id.to_string(),
                        we.order
                    ],
                )
                .map_err(DbError::InsertFailed)?;
            for set in &we.sets {
                self.conn
                    .execute(
                        "INSERT INTO workout_sets
                            (id, workout_exercise_id, set_number, weight, reps, rest_time, completed, created_at)
                         VALUES (:id, :we_id, :set_number, :weight, :reps, :rest_time, :completed, :created_at)",
                        named_params! {
                            ":id": set.id.to_string(),
                            ":we_id": we.id.to_string(),
                            ":set_number": set.set_number,
                            ":weight": set.weight,
                            ":reps": set.reps,
                            ":rest_time": set.rest_time,
                            ":completed": set.completed,
                            ":created_at": ts_to_sql(&set.created_at),
                        },
                    )
                    .map_err(DbError::InsertFailed)?;
            }
        }
        Ok(())
    }

    fn load_workout_exercises(&self, workout_id: &str) -> Result<Vec<WorkoutExercise>, DbError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, exercise_id, sort_order FROM workout_exercises
                 WHERE workout_id = ?1 ORDER BY sort_order ASC",
            )
            .map_err(DbError::QueryFailed)?;
        let rows = stmt
            .query_map(params![workout_id], |row| {
                Ok((get_uuid(row, 0)?, get_uuid(row, 1)?, row.get::<_, i32>(2)?))
            })
            .map_err(DbError::QueryFailed)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::QueryFailed)?;

        rows.into_iter()
            .map(|(id, exercise_id, order)| {
                Ok(WorkoutExercise {
                    id,
                    exercise_id,
                    order,
                    sets: self.load_sets(id)?,
                })
            })
            .collect()
    }

    fn load_sets(&self, workout_exercise_id: Uuid) -> Result<Vec<WorkoutSet>, DbError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, set_number, weight, reps, rest_time, completed, created_at
                 FROM workout_sets WHERE workout_exercise_id = ?1 ORDER BY set_number ASC",
            )
            .map_err(DbError::QueryFailed)?;
        let sets = stmt
            .query_map(params![workout_exercise_id.to_string()], map_row_to_set)
            .map_err(DbError::QueryFailed)?;
        sets.collect::<Result<Vec<_>, _>>()
            .map_err(DbError::QueryFailed)
    }

    fn hydrate_workout(&self, row: WorkoutRow) -> Result<Workout, DbError> {
        let exercises = self.load_workout_exercises(&row.id.to_string())?;
        Ok(Workout {
            id: row.id,
            name: row.name,
            date: row.date,
            notes: row.notes,
            duration: row.duration,
            created_at: row.created_at,
            updated_at: row.updated_at,
            exercises,
        })
    }

    fn insert_template_children(&self, template: &WorkoutTemplate) -> Result<(), DbError> {
        for te in &template.exercises {
            let sets_configuration = SetConfig::encode_list(&te.sets)?;
            self.conn
                .execute(
                    "INSERT INTO template_exercises (id, template_id, exercise_id, sort_order, sets_configuration)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        te.id.to_string(),
                        template.id.to_string(),
                        te.exercise_id.to_string(),
                        te.order,
                        sets_configuration
                    ],
                )
                .map_err(DbError::InsertFailed)?;
        }
        Ok(())
    }

    fn load_template_exercises(&self, template_id: Uuid) -> Result<Vec<TemplateExercise>, DbError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, exercise_id, sort_order, sets_configuration FROM template_exercises
                 WHERE template_id = ?1 ORDER BY sort_order ASC",
            )
            .map_err(DbError::QueryFailed)?;
        let rows = stmt
            .query_map(params![template_id.to_string()], |row| {
                let raw: String = row.get(3)?;
                Ok(TemplateExercise {
                    id: get_uuid(row, 0)?,
                    exercise_id: get_uuid(row, 1)?,
                    order: row.get(2)?,
                    sets: SetConfig::decode_list(&raw),
                })
            })
            .map_err(DbError::QueryFailed)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DbError::QueryFailed)
    }

    fn hydrate_template(&self, row: TemplateRow) -> Result<WorkoutTemplate, DbError> {
        Ok(WorkoutTemplate {
            exercises: self.load_template_exercises(row.id)?,
            id: row.id,
            name: row.name,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn lookup_id(&self, sql: &str, id: Uuid) -> Result<Option<Uuid>, DbError> {
        self.conn
            .query_row(sql, params![id.to_string()], |row| get_uuid(row, 0))
            .optional()
            .map_err(DbError::QueryFailed)
    }
}

/// Initializes the database tables if they don't exist.
pub fn init(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS exercises (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE,
            category TEXT NOT NULL,
            muscle_groups TEXT NOT NULL DEFAULT '[]', -- JSON array of muscle group names
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS workouts (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            date TEXT,
            notes TEXT,
            duration INTEGER NOT NULL DEFAULT 0 CHECK(duration >= 0),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS workout_exercises (
            id TEXT PRIMARY KEY NOT NULL,
            workout_id TEXT NOT NULL REFERENCES workouts(id) ON DELETE CASCADE,
            exercise_id TEXT NOT NULL REFERENCES exercises(id),
            sort_order INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS workout_sets (
            id TEXT PRIMARY KEY NOT NULL,
            workout_exercise_id TEXT NOT NULL REFERENCES workout_exercises(id) ON DELETE CASCADE,
            set_number INTEGER NOT NULL CHECK(set_number >= 1),
            weight REAL NOT NULL CHECK(weight >= 0), -- kilograms
            reps INTEGER NOT NULL CHECK(reps >= 0),
            rest_time INTEGER NOT NULL,
            completed INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE(workout_exercise_id, set_number)
        );

        CREATE TABLE IF NOT EXISTS templates (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS template_exercises (
            id TEXT PRIMARY KEY NOT NULL,
            template_id TEXT NOT NULL REFERENCES templates(id) ON DELETE CASCADE,
            exercise_id TEXT NOT NULL REFERENCES exercises(id),
            sort_order INTEGER NOT NULL,
            sets_configuration TEXT NOT NULL DEFAULT '[]' -- [{setNumber, weight, reps, restTime}]
        );

        CREATE INDEX IF NOT EXISTS idx_workouts_date ON workouts(date);
        CREATE INDEX IF NOT EXISTS idx_workout_exercises_workout ON workout_exercises(workout_id);
        CREATE INDEX IF NOT EXISTS idx_workout_exercises_exercise ON workout_exercises(exercise_id);
        CREATE INDEX IF NOT EXISTS idx_workout_sets_entry ON workout_sets(workout_exercise_id);
        CREATE INDEX IF NOT EXISTS idx_template_exercises_template ON template_exercises(template_id);",
    )
    .map_err(DbError::Connection)
}

fn ts_to_sql(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_ts(idx: usize, text: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn get_ts(row: &Row, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let text: String = row.get(idx)?;
    parse_ts(idx, &text)
}

fn get_opt_ts(row: &Row, idx: usize) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| parse_ts(idx, &t)).transpose()
}

fn get_uuid(row: &Row, idx: usize) -> Result<Uuid, rusqlite::Error> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text).map_err(|e| conversion_error(idx, e))
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation)
}

fn encode_muscle_groups(groups: &[MuscleGroup]) -> Result<String, DbError> {
    let groups = dedup_muscle_groups(groups);
    let names: Vec<&str> = groups.iter().map(AsRef::as_ref).collect();
    Ok(serde_json::to_string(&names)?)
}

fn decode_muscle_groups(raw: &str) -> Vec<MuscleGroup> {
    let names: Vec<String> = serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Unreadable muscle group list; treating as empty");
        Vec::new()
    });
    names
        .iter()
        .filter_map(|name| match name.parse::<MuscleGroup>() {
            Ok(group) => Some(group),
            Err(_) => {
                tracing::warn!(muscle = %name, "Skipping unknown muscle group");
                None
            }
        })
        .collect()
}

fn map_row_to_exercise(row: &Row) -> Result<Exercise, rusqlite::Error> {
    let category: String = row.get(2)?;
    let muscle_groups: String = row.get(3)?;
    Ok(Exercise {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        category: Category::from_stored(&category),
        muscle_groups: decode_muscle_groups(&muscle_groups),
        notes: row.get(4)?,
        created_at: get_ts(row, 5)?,
        updated_at: get_ts(row, 6)?,
    })
}

fn map_row_to_set(row: &Row) -> Result<WorkoutSet, rusqlite::Error> {
    Ok(WorkoutSet {
        id: get_uuid(row, 0)?,
        set_number: row.get(1)?,
        weight: row.get(2)?,
        reps: row.get(3)?,
        rest_time: row.get(4)?,
        completed: row.get(5)?,
        created_at: get_ts(row, 6)?,
    })
}

struct WorkoutRow {
    id: Uuid,
    name: String,
    date: Option<DateTime<Utc>>,
    notes: Option<String>,
    duration: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const WORKOUT_COLUMNS: &str = "id, name, date, notes, duration, created_at, updated_at";

fn map_row_to_workout(row: &Row) -> Result<WorkoutRow, rusqlite::Error> {
    Ok(WorkoutRow {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        date: get_opt_ts(row, 2)?,
        notes: row.get(3)?,
        duration: row.get(4)?,
        created_at: get_ts(row, 5)?,
        updated_at: get_ts(row, 6)?,
    })
}

struct TemplateRow {
    id: Uuid,
    name: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn map_row_to_template(row: &Row) -> Result<TemplateRow, rusqlite::Error> {
    Ok(TemplateRow {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        notes: row.get(2)?,
        created_at: get_ts(row, 3)?,
        updated_at: get_ts(row, 4)?,
    })
}

/// Appends a date-range predicate on `column` to `sql`.
fn push_range_filter(
    sql: &mut String,
    params_map: &mut HashMap<String, Box<dyn ToSql>>,
    column: &str,
    range: &crate::store::DateRange,
) {
    let end_op = if range.end_inclusive { "<=" } else { "<" };
    sql.push_str(&format!(
        " AND {column} IS NOT NULL AND {column} >= :start AND {column} {end_op} :end"
    ));
    params_map.insert(":start".into(), Box::new(ts_to_sql(&range.start)));
    params_map.insert(":end".into(), Box::new(ts_to_sql(&range.end)));
}

fn as_query_params(params_map: &HashMap<String, Box<dyn ToSql>>) -> Vec<(&str, &dyn ToSql)> {
    params_map
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_ref()))
        .collect()
}

impl Store for SqliteStore {
    fn insert_exercise(&self, exercise: &Exercise) -> Result<(), DbError> {
        let muscle_groups = encode_muscle_groups(&exercise.muscle_groups)?;
        self.conn
            .execute(
                "INSERT INTO exercises (id, name, category, muscle_groups, notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    exercise.id.to_string(),
                    exercise.name,
                    exercise.category.as_ref(),
                    muscle_groups,
                    exercise.notes,
                    ts_to_sql(&exercise.created_at),
                    ts_to_sql(&exercise.updated_at),
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    DbError::ExerciseNameNotUnique(exercise.name.clone())
                } else {
                    DbError::InsertFailed(e)
                }
            })?;
        Ok(())
    }

    fn update_exercise(&self, exercise: &Exercise) -> Result<(), DbError> {
        let muscle_groups = encode_muscle_groups(&exercise.muscle_groups)?;
        let rows_affected = self
            .conn
            .execute(
                "UPDATE exercises SET name = :name, category = :category, muscle_groups = :muscles,
                        notes = :notes, updated_at = :updated_at
                 WHERE id = :id",
                named_params! {
                    ":id": exercise.id.to_string(),
                    ":name": exercise.name,
                    ":category": exercise.category.as_ref(),
                    ":muscles": muscle_groups,
                    ":notes": exercise.notes,
                    ":updated_at": ts_to_sql(&exercise.updated_at),
                },
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    DbError::ExerciseNameNotUnique(exercise.name.clone())
                } else {
                    DbError::UpdateFailed(e)
                }
            })?;
        if rows_affected == 0 {
            Err(DbError::ExerciseNotFound(exercise.id))
        } else {
            Ok(())
        }
    }

    fn delete_exercise(&self, id: Uuid) -> Result<(), DbError> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM exercises WHERE id = ?1", params![id.to_string()])
            .map_err(DbError::DeleteFailed)?;
        if rows_affected == 0 {
            Err(DbError::ExerciseNotFound(id))
        } else {
            Ok(())
        }
    }

    fn get_exercise(&self, id: Uuid) -> Result<Option<Exercise>, DbError> {
        self.conn
            .query_row(
                "SELECT id, name, category, muscle_groups, notes, created_at, updated_at
                 FROM exercises WHERE id = ?1",
                params![id.to_string()],
                map_row_to_exercise,
            )
            .optional()
            .map_err(DbError::QueryFailed)
    }

    fn find_exercise_by_name(&self, name: &str) -> Result<Option<Exercise>, DbError> {
        self.conn
            .query_row(
                "SELECT id, name, category, muscle_groups, notes, created_at, updated_at
                 FROM exercises WHERE name = ?1 COLLATE NOCASE",
                params![name],
                map_row_to_exercise,
            )
            .optional()
            .map_err(DbError::QueryFailed)
    }

    fn query_exercises(&self, query: &ExerciseQuery) -> Result<Vec<Exercise>, DbError> {
        let mut sql = "SELECT id, name, category, muscle_groups, notes, created_at, updated_at
                       FROM exercises WHERE 1=1"
            .to_string();
        let mut params_map: HashMap<String, Box<dyn ToSql>> = HashMap::new();
        if let Some(category) = query.category {
            sql.push_str(" AND category = :category");
            params_map.insert(":category".into(), Box::new(category.as_ref().to_string()));
        }
        sql.push_str(" ORDER BY name COLLATE NOCASE ASC");

        let mut stmt = self.conn.prepare(&sql).map_err(DbError::QueryFailed)?;
        let exercises = stmt
            .query_map(as_query_params(&params_map).as_slice(), map_row_to_exercise)
            .map_err(DbError::QueryFailed)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::QueryFailed)?;

        // SQLite LIKE only folds ASCII, so text matching happens here.
        let needle = query
            .text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);
        Ok(match needle {
            None => exercises,
            Some(needle) => exercises
                .into_iter()
                .filter(|e| {
                    e.name.to_lowercase().contains(&needle)
                        || e.category.as_ref().to_lowercase().contains(&needle)
                        || e.notes
                            .as_deref()
                            .is_some_and(|n| n.to_lowercase().contains(&needle))
                })
                .collect(),
        })
    }

    fn count_exercise_references(&self, exercise_id: Uuid) -> Result<ExerciseReferences, DbError> {
        let id = exercise_id.to_string();
        let count = |sql: &str| -> Result<usize, DbError> {
            self.conn
                .query_row(sql, params![id], |row| row.get::<_, i64>(0))
                .map(|n| usize::try_from(n).unwrap_or_default())
                .map_err(DbError::QueryFailed)
        };
        Ok(ExerciseReferences {
            workout_entries: count("SELECT COUNT(*) FROM workout_exercises WHERE exercise_id = ?1")?,
            template_entries: count(
                "SELECT COUNT(*) FROM template_exercises WHERE exercise_id = ?1",
            )?,
        })
    }

    fn delete_exercise_references(&self, exercise_id: Uuid) -> Result<(), DbError> {
        self.transaction(|store| {
            let id = exercise_id.to_string();
            store
                .conn
                .execute("DELETE FROM workout_exercises WHERE exercise_id = ?1", params![id])
                .map_err(DbError::DeleteFailed)?;
            store
                .conn
                .execute("DELETE FROM template_exercises WHERE exercise_id = ?1", params![id])
                .map_err(DbError::DeleteFailed)?;
            Ok(())
        })
    }

    fn insert_workout(&self, workout: &Workout) -> Result<(), DbError> {
        self.transaction(|store| {
            store
                .conn
                .execute(
                    "INSERT INTO workouts (id, name, date, notes, duration, created_at, updated_at)
                     VALUES (:id, :name, :date, :notes, :duration, :created_at, :updated_at)",
                    named_params! {
                        ":id": workout.id.to_string(),
                        ":name": workout.name,
                        ":date": workout.date.as_ref().map(ts_to_sql),
                        ":notes": workout.notes,
                        ":duration": workout.duration,
                        ":created_at": ts_to_sql(&workout.created_at),
                        ":updated_at": ts_to_sql(&workout.updated_at),
                    },
                )
                .map_err(DbError::InsertFailed)?;
            store.insert_workout_children(workout)
        })
    }

    fn update_workout(&self, workout: &Workout) -> Result<(), DbError> {
        self.transaction(|store| {
            let rows_affected = store
                .conn
                .execute(
                    "UPDATE workouts SET name = :name, date = :date, notes = :notes,
                            duration = :duration, updated_at = :updated_at
                     WHERE id = :id",
                    named_params! {
                        ":id": workout.id.to_string(),
                        ":name": workout.name,
                        ":date": workout.date.as_ref().map(ts_to_sql),
                        ":notes": workout.notes,
                        ":duration": workout.duration,
                        ":updated_at": ts_to_sql(&workout.updated_at),
                    },
                )
                .map_err(DbError::UpdateFailed)?;
            if rows_affected == 0 {
                return Err(DbError::WorkoutNotFound(workout.id));
            }
            // Children are rewritten wholesale; sets go with their entries.
            store
                .conn
                .execute(
                    "DELETE FROM workout_exercises WHERE workout_id = ?1",
                    params![workout.id.to_string()],
                )
                .map_err(DbError::UpdateFailed)?;
            store.insert_workout_children(workout)
        })
    }

    fn delete_workout(&self, id: Uuid) -> Result<(), DbError> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM workouts WHERE id = ?1", params![id.to_string()])
            .map_err(DbError::DeleteFailed)?;
        if rows_affected == 0 {
            Err(DbError::WorkoutNotFound(id))
        } else {
            Ok(())
        }
    }

    fn get_workout(&self, id: Uuid) -> Result<Option<Workout>, DbError> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {WORKOUT_COLUMNS} FROM workouts WHERE id = ?1"),
                params![id.to_string()],
                map_row_to_workout,
            )
            .optional()
            .map_err(DbError::QueryFailed)?;
        row.map(|r| self.hydrate_workout(r)).transpose()
    }

    fn query_workouts(&self, query: &WorkoutQuery) -> Result<Vec<Workout>, DbError> {
        let mut sql = format!("SELECT {WORKOUT_COLUMNS} FROM workouts WHERE 1=1");
        let mut params_map: HashMap<String, Box<dyn ToSql>> = HashMap::new();

        if let Some(range) = &query.range {
            push_range_filter(&mut sql, &mut params_map, "date", range);
        }
        match query.order {
            SortOrder::Ascending => sql.push_str(" ORDER BY date ASC, created_at ASC"),
            SortOrder::Descending => sql.push_str(" ORDER BY date DESC, created_at DESC"),
        }
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT :limit");
            params_map.insert(":limit".into(), Box::new(limit));
        }

        let mut stmt = self.conn.prepare(&sql).map_err(DbError::QueryFailed)?;
        let rows = stmt
            .query_map(as_query_params(&params_map).as_slice(), map_row_to_workout)
            .map_err(DbError::QueryFailed)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::QueryFailed)?;

        rows.into_iter().map(|r| self.hydrate_workout(r)).collect()
    }

    fn query_entries(&self, query: &EntryQuery) -> Result<Vec<ExerciseEntry>, DbError> {
        let mut sql = "SELECT we.id, we.workout_id, we.exercise_id, we.sort_order, w.date
                       FROM workout_exercises we JOIN workouts w ON w.id = we.workout_id
                       WHERE 1=1"
            .to_string();
        let mut params_map: HashMap<String, Box<dyn ToSql>> = HashMap::new();

        if let Some(exercise_id) = query.exercise_id {
            sql.push_str(" AND we.exercise_id = :exercise_id");
            params_map.insert(":exercise_id".into(), Box::new(exercise_id.to_string()));
        }
        if query.dated_only {
            sql.push_str(" AND w.date IS NOT NULL");
        }
        if let Some(range) = &query.range {
            push_range_filter(&mut sql, &mut params_map, "w.date", range);
        }
        sql.push_str(" ORDER BY w.date DESC, w.created_at DESC, we.sort_order ASC");
        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT :limit");
            params_map.insert(":limit".into(), Box::new(limit));
        }

        let mut stmt = self.conn.prepare(&sql).map_err(DbError::QueryFailed)?;
        let rows = stmt
            .query_map(as_query_params(&params_map).as_slice(), |row| {
                Ok((
                    get_uuid(row, 0)?,
                    get_uuid(row, 1)?,
                    get_uuid(row, 2)?,
                    row.get::<_, i32>(3)?,
                    get_opt_ts(row, 4)?,
                ))
            })
            .map_err(DbError::QueryFailed)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::QueryFailed)?;

        rows.into_iter()
            .map(|(id, workout_id, exercise_id, order, workout_date)| {
                Ok(ExerciseEntry {
                    workout_id,
                    workout_date,
                    entry: WorkoutExercise {
                        id,
                        exercise_id,
                        order,
                        sets: self.load_sets(id)?,
                    },
                })
            })
            .collect()
    }

    fn workout_id_for_entry(&self, workout_exercise_id: Uuid) -> Result<Option<Uuid>, DbError> {
        self.lookup_id(
            "SELECT workout_id FROM workout_exercises WHERE id = ?1",
            workout_exercise_id,
        )
    }

    fn workout_id_for_set(&self, set_id: Uuid) -> Result<Option<Uuid>, DbError> {
        self.lookup_id(
            "SELECT we.workout_id FROM workout_sets s
             JOIN workout_exercises we ON we.id = s.workout_exercise_id
             WHERE s.id = ?1",
            set_id,
        )
    }

    fn max_completed_weight(&self, exercise_id: Uuid) -> Result<Option<f64>, DbError> {
        self.conn
            .query_row(
                "SELECT MAX(s.weight) FROM workout_sets s
                 JOIN workout_exercises we ON we.id = s.workout_exercise_id
                 WHERE we.exercise_id = ?1 AND s.completed = 1",
                params![exercise_id.to_string()],
                |row| row.get::<_, Option<f64>>(0),
            )
            .map_err(DbError::QueryFailed)
    }

    fn insert_template(&self, template: &WorkoutTemplate) -> Result<(), DbError> {
        self.transaction(|store| {
            store
                .conn
                .execute(
                    "INSERT INTO templates (id, name, notes, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        template.id.to_string(),
                        template.name,
                        template.notes,
                        ts_to_sql(&template.created_at),
                        ts_to_sql(&template.updated_at),
                    ],
                )
                .map_err(DbError::InsertFailed)?;
            store.insert_template_children(template)
        })
    }

    fn update_template(&self, template: &WorkoutTemplate) -> Result<(), DbError> {
        self.transaction(|store| {
            let rows_affected = store
                .conn
                .execute(
                    "UPDATE templates SET name = ?2, notes = ?3, updated_at = ?4 WHERE id = ?1",
                    params![
                        template.id.to_string(),
                        template.name,
                        template.notes,
                        ts_to_sql(&template.updated_at),
                    ],
                )
                .map_err(DbError::UpdateFailed)?;
            if rows_affected == 0 {
                return Err(DbError::TemplateNotFound(template.id));
            }
            store
                .conn
                .execute(
                    "DELETE FROM template_exercises WHERE template_id = ?1",
                    params![template.id.to_string()],
                )
                .map_err(DbError::UpdateFailed)?;
            store.insert_template_children(template)
        })
    }

    fn delete_template(&self, id: Uuid) -> Result<(), DbError> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM templates WHERE id = ?1", params![id.to_string()])
            .map_err(DbError::DeleteFailed)?;
        if rows_affected == 0 {
            Err(DbError::TemplateNotFound(id))
        } else {
            Ok(())
        }
    }

    fn get_template(&self, id: Uuid) -> Result<Option<WorkoutTemplate>, DbError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, notes, created_at, updated_at FROM templates WHERE id = ?1",
                params![id.to_string()],
                map_row_to_template,
            )
            .optional()
            .map_err(DbError::QueryFailed)?;
        row.map(|r| self.hydrate_template(r)).transpose()
    }

    fn list_templates(&self) -> Result<Vec<WorkoutTemplate>, DbError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, name, notes, created_at, updated_at FROM templates
                 ORDER BY name COLLATE NOCASE ASC",
            )
            .map_err(DbError::QueryFailed)?;
        let rows = stmt
            .query_map([], map_row_to_template)
            .map_err(DbError::QueryFailed)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(DbError::QueryFailed)?;
        rows.into_iter().map(|r| self.hydrate_template(r)).collect()
    }

    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<DbError>,
    {
        if !self.conn.is_autocommit() {
            return f(self);
        }
        tracing::debug!("Beginning transaction");
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| E::from(DbError::Transaction(e)))?;
        // Dropping `tx` on the error path rolls everything back.
        let out = f(self)?;
        tx.commit().map_err(|e| E::from(DbError::Transaction(e)))?;
        tracing::debug!("Committed transaction");
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap()
    }

    fn exercise(name: &str) -> Exercise {
        Exercise {
            id: Uuid::new_v4(),
            name: name.into(),
            category: Category::Legs,
            muscle_groups: vec![MuscleGroup::Quadriceps, MuscleGroup::Glutes],
            notes: None,
            created_at: ts(),
            updated_at: ts(),
        }
    }

    fn workout_for(exercise_id: Uuid) -> Workout {
        Workout {
            id: Uuid::new_v4(),
            name: "Legs".into(),
            date: Some(ts()),
            notes: None,
            duration: 0,
            created_at: ts(),
            updated_at: ts(),
            exercises: vec![WorkoutExercise {
                id: Uuid::new_v4(),
                exercise_id,
                order: 0,
                sets: vec![WorkoutSet {
                    id: Uuid::new_v4(),
                    set_number: 1,
                    weight: 100.0,
                    reps: 5,
                    rest_time: 90,
                    completed: true,
                    created_at: ts(),
                }],
            }],
        }
    }

    #[test]
    fn timestamps_are_fixed_width() {
        let a = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        let b = a + chrono::Duration::nanoseconds(300);
        assert_eq!(ts_to_sql(&a), "2025-03-01T09:30:00.000000000Z");
        assert_eq!(ts_to_sql(&b), "2025-03-01T09:30:00.000000300Z");
        assert!(ts_to_sql(&a) < ts_to_sql(&b));
        assert_eq!(parse_ts(0, &ts_to_sql(&b)).unwrap(), b);
    }

    #[test]
    fn muscle_groups_are_stored_once() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut squat = exercise("Squat");
        squat.muscle_groups = vec![
            MuscleGroup::Quadriceps,
            MuscleGroup::Glutes,
            MuscleGroup::Quadriceps,
        ];
        store.insert_exercise(&squat).unwrap();
        let raw: String = store
            .connection()
            .query_row(
                "SELECT muscle_groups FROM exercises WHERE id = ?1",
                [squat.id.to_string()],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(raw, r#"["Quadriceps","Glutes"]"#);
    }

    #[test]
    fn workout_graph_round_trips() {
        let store = SqliteStore::open_in_memory().unwrap();
        let squat = exercise("Squat");
        store.insert_exercise(&squat).unwrap();
        let workout = workout_for(squat.id);
        store.insert_workout(&workout).unwrap();
        assert_eq!(store.get_workout(workout.id).unwrap(), Some(workout));
        assert_eq!(store.get_exercise(squat.id).unwrap(), Some(squat));
    }

    #[test]
    fn failed_graph_write_leaves_nothing_behind() {
        let store = SqliteStore::open_in_memory().unwrap();
        // The entry references an exercise that does not exist, so the
        // child insert trips the foreign key after the parent row went in.
        let workout = workout_for(Uuid::new_v4());
        assert!(store.insert_workout(&workout).is_err());
        assert!(store.get_workout(workout.id).unwrap().is_none());
        assert!(store.connection().is_autocommit());
    }

    #[test]
    fn duplicate_names_are_rejected_case_insensitively() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.insert_exercise(&exercise("Bench Press")).unwrap();
        let err = store.insert_exercise(&exercise("bench press")).unwrap_err();
        assert!(matches!(err, DbError::ExerciseNameNotUnique(_)));
    }

    #[test]
    fn deleting_referenced_exercise_is_refused_by_schema() {
        let store = SqliteStore::open_in_memory().unwrap();
        let squat = exercise("Squat");
        store.insert_exercise(&squat).unwrap();
        store.insert_workout(&workout_for(squat.id)).unwrap();
        assert!(store.delete_exercise(squat.id).is_err());
    }
}
