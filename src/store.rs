use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::error::{McqError, StoreOperation};
use crate::export::{DB_COLUMNS, to_db_row};
use crate::model::McqRecord;

pub trait QuestionStore {
    fn ensure_schema(&self) -> Result<(), McqError>;
    fn fetch_existing_questions(&self) -> Result<Vec<String>, McqError>;
    fn insert_batch(&self, records: &[McqRecord]) -> Result<usize, McqError>;
    fn count(&self) -> Result<i64, McqError>;
}

// One connection per operation, closed when the call returns.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // A database file created by another tool, or by a failed run, may lack the table.
    pub fn has_schema(&self) -> Result<bool, McqError> {
        let connection = self
            .open()
            .map_err(unavailable(StoreOperation::InspectSchema))?;
        connection
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'mcqs')",
                [],
                |row| row.get(0),
            )
            .map_err(unavailable(StoreOperation::InspectSchema))
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        let connection = Connection::open(&self.db_path)?;
        configure_connection(&connection)?;
        Ok(connection)
    }
}

fn unavailable(operation: StoreOperation) -> impl Fn(rusqlite::Error) -> McqError {
    move |source| McqError::StoreUnavailable { operation, source }
}

fn configure_connection(connection: &Connection) -> rusqlite::Result<()> {
    connection.pragma_update(None, "journal_mode", "WAL")?;
    connection.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

fn insert_sql() -> String {
    let placeholders = (1..=DB_COLUMNS.len())
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO mcqs ({}) VALUES ({placeholders})",
        DB_COLUMNS.join(", ")
    )
}

impl QuestionStore for SqliteStore {
    fn ensure_schema(&self) -> Result<(), McqError> {
        let connection = self
            .open()
            .map_err(unavailable(StoreOperation::CreateSchema))?;
        connection
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS mcqs (
                  id INTEGER PRIMARY KEY AUTOINCREMENT,
                  question TEXT NOT NULL,
                  option_a TEXT,
                  option_b TEXT,
                  option_c TEXT,
                  option_d TEXT,
                  correct_answer INTEGER,
                  difficulty TEXT DEFAULT 'Medium',
                  subject_name TEXT DEFAULT 'General',
                  topic_name TEXT DEFAULT 'Unknown',
                  sub_topic_name TEXT DEFAULT ''
                );
                ",
            )
            .map_err(unavailable(StoreOperation::CreateSchema))?;

        debug!(path = %self.db_path.display(), "mcqs table ready");
        Ok(())
    }

    fn fetch_existing_questions(&self) -> Result<Vec<String>, McqError> {
        let fetch = || -> rusqlite::Result<Vec<String>> {
            let connection = self.open()?;
            let mut statement = connection.prepare("SELECT question FROM mcqs ORDER BY id ASC")?;
            let questions = statement
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(questions)
        };

        let questions = fetch().map_err(unavailable(StoreOperation::FetchExisting))?;
        info!(count = questions.len(), "fetched existing questions");
        Ok(questions)
    }

    fn insert_batch(&self, records: &[McqRecord]) -> Result<usize, McqError> {
        let insert = || -> rusqlite::Result<usize> {
            let mut connection = self.open()?;
            let transaction = connection.transaction()?;
            {
                let mut statement = transaction.prepare(&insert_sql())?;
                for record in records {
                    let row = to_db_row(record);
                    statement.execute(params![
                        row.question,
                        row.option_a,
                        row.option_b,
                        row.option_c,
                        row.option_d,
                        row.correct_answer,
                        row.difficulty,
                        row.subject_name,
                        row.topic_name,
                        row.sub_topic_name,
                    ])?;
                }
            }
            transaction.commit()?;
            Ok(records.len())
        };

        let inserted = insert().map_err(unavailable(StoreOperation::InsertBatch))?;
        info!(inserted, path = %self.db_path.display(), "inserted question batch");
        Ok(inserted)
    }

    fn count(&self) -> Result<i64, McqError> {
        let connection = self.open().map_err(unavailable(StoreOperation::Count))?;
        connection
            .query_row("SELECT COUNT(*) FROM mcqs", [], |row| row.get(0))
            .map_err(unavailable(StoreOperation::Count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{McqDraft, OptionSlot};

    fn record(question: &str) -> McqRecord {
        McqDraft {
            question: Some(question.to_string()),
            options: vec![
                (OptionSlot::A, "w".to_string()),
                (OptionSlot::B, "x".to_string()),
                (OptionSlot::C, "y".to_string()),
                (OptionSlot::D, "z".to_string()),
            ],
            correct_answer: Some("c".to_string()),
            subject_name: Some("AWS".to_string()),
            ..McqDraft::default()
        }
        .finish()
        .expect("test record should be well-formed")
    }

    fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = SqliteStore::new(dir.path().join("mcq.sqlite"));
        store.ensure_schema().expect("schema should be created");
        (dir, store)
    }

    #[test]
    fn has_schema_reports_table_presence() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = SqliteStore::new(dir.path().join("bare.sqlite"));

        assert!(!store.has_schema().expect("bare database should be inspectable"));
        store.ensure_schema().expect("schema should be created");
        assert!(store.has_schema().expect("database should be inspectable"));
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let (_dir, store) = temp_store();
        store.ensure_schema().expect("second schema pass should succeed");
        assert_eq!(store.count().expect("count should succeed"), 0);
    }

    #[test]
    fn inserted_rows_are_fetched_in_insert_order() {
        let (_dir, store) = temp_store();
        let inserted = store
            .insert_batch(&[record("First?"), record("Second?")])
            .expect("insert should succeed");

        assert_eq!(inserted, 2);
        assert_eq!(
            store.fetch_existing_questions().expect("fetch should succeed"),
            vec!["First?".to_string(), "Second?".to_string()]
        );
    }

    #[test]
    fn inserted_row_carries_every_column() {
        let (_dir, store) = temp_store();
        store
            .insert_batch(&[record("Columns?")])
            .expect("insert should succeed");

        let connection = Connection::open(store.db_path()).expect("db should open");
        let row: (String, String, i64, String, String, String, String) = connection
            .query_row(
                "SELECT question, option_d, correct_answer, difficulty, subject_name, topic_name, sub_topic_name FROM mcqs",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .expect("row should exist");

        assert_eq!(
            row,
            (
                "Columns?".to_string(),
                "z".to_string(),
                3,
                "Medium".to_string(),
                "AWS".to_string(),
                "Unknown".to_string(),
                String::new(),
            )
        );
    }

    #[test]
    fn failed_insert_leaves_no_partial_batch() {
        let (_dir, store) = temp_store();
        let connection = Connection::open(store.db_path()).expect("db should open");
        connection
            .execute_batch(
                "
                CREATE TRIGGER reject_poison BEFORE INSERT ON mcqs
                WHEN NEW.question = 'Poison?'
                BEGIN SELECT RAISE(ABORT, 'poisoned row'); END;
                ",
            )
            .expect("trigger should be created");
        drop(connection);

        let result = store.insert_batch(&[record("Fine?"), record("Poison?")]);

        assert!(matches!(
            result,
            Err(McqError::StoreUnavailable {
                operation: StoreOperation::InsertBatch,
                ..
            })
        ));
        assert_eq!(store.count().expect("count should succeed"), 0);
    }

    #[test]
    fn unreachable_database_reports_store_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = SqliteStore::new(dir.path().join("missing").join("mcq.sqlite"));

        let result = store.fetch_existing_questions();

        assert!(matches!(result, Err(McqError::StoreUnavailable { .. })));
    }
}
