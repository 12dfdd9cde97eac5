//! Saved workflow sessions

use super::schema::init_schema;
use crate::workflow::WorkflowState;
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::{Path, PathBuf};

/// Listing entry for a saved session
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionSummary {
    pub name: String,
    pub status: String,
    pub goal: String,
    pub task_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Session storage keyed by session name
pub struct SessionStore {
    conn: Connection,
}

impl SessionStore {
    /// Open or create a session database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create session directory at {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open session database at {}", path.display()))?;

        init_schema(&conn)?;

        Ok(Self { conn })
    }

    /// In-memory store (nothing survives the process)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Default database path
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().context("Could not determine data directory")?;
        Ok(data_dir.join("taskflow").join("sessions.db"))
    }

    /// Save (or overwrite) a session
    pub fn save(&mut self, name: &str, state: &WorkflowState) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let json = serde_json::to_string(state).context("Failed to serialize session state")?;

        self.conn.execute(
            "INSERT INTO sessions (name, status, goal, task_count, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(name) DO UPDATE SET
                status = excluded.status,
                goal = excluded.goal,
                task_count = excluded.task_count,
                state = excluded.state,
                updated_at = excluded.updated_at",
            (
                name,
                state.status.as_str(),
                &state.goal,
                state.tasks.len() as i64,
                &json,
                &now,
                &now,
            ),
        )?;

        tracing::debug!(session = name, status = %state.status, "Saved session");
        Ok(())
    }

    /// Load a session by name
    pub fn load(&self, name: &str) -> Result<Option<WorkflowState>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT state FROM sessions WHERE name = ?1",
                [name],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|json| {
            serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse saved session '{}'", name))
        })
        .transpose()
    }

    /// All sessions, most recently updated first
    pub fn list(&self) -> Result<Vec<SessionSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, status, goal, task_count, created_at, updated_at
             FROM sessions
             ORDER BY updated_at DESC, name ASC",
        )?;

        let sessions = stmt
            .query_map([], |row| {
                Ok(SessionSummary {
                    name: row.get(0)?,
                    status: row.get(1)?,
                    goal: row.get(2)?,
                    task_count: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(sessions)
    }

    /// Delete a session; false if it didn't exist
    pub fn delete(&mut self, name: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM sessions WHERE name = ?1", [name])?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Plan, Step};
    use crate::workflow::{WorkflowAction, WorkflowStatus};
    use tempfile::TempDir;

    fn editing_state() -> WorkflowState {
        let mut state = WorkflowState::new();
        state.reduce(WorkflowAction::SetGoal("poster".into()));
        state.reduce(WorkflowAction::StartPlanning);
        let epoch = state.epoch;
        state.reduce(WorkflowAction::PlanReceived {
            epoch,
            plan: Plan::new(
                "poster",
                vec![
                    Step::new("step1", "image.generate"),
                    Step::new("step2", "image.upscale").with_dependency("image", "$step1.output"),
                ],
            ),
        });
        state
    }

    #[test]
    fn test_save_and_load() {
        let mut store = SessionStore::open_in_memory().unwrap();
        let state = editing_state();

        store.save("poster", &state).unwrap();
        let loaded = store.load("poster").unwrap().unwrap();

        assert_eq!(loaded, state);
        assert_eq!(loaded.status, WorkflowStatus::Editing);
        assert_eq!(loaded.task("step2").unwrap().column, 1);
    }

    #[test]
    fn test_load_missing() {
        let store = SessionStore::open_in_memory().unwrap();
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites() {
        let mut store = SessionStore::open_in_memory().unwrap();
        let mut state = editing_state();
        store.save("poster", &state).unwrap();

        state.reduce(WorkflowAction::Reset);
        store.save("poster", &state).unwrap();

        let sessions = store.list().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].status, "idle");
        assert_eq!(sessions[0].task_count, 0);
    }

    #[test]
    fn test_list_and_delete() {
        let mut store = SessionStore::open_in_memory().unwrap();
        store.save("a", &editing_state()).unwrap();
        store.save("b", &WorkflowState::new()).unwrap();

        let names: Vec<_> = store.list().unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"a".to_string()));

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_open_file_creates_parent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sessions.db");

        {
            let mut store = SessionStore::open(&path).unwrap();
            store.save("poster", &editing_state()).unwrap();
        }

        let store = SessionStore::open(&path).unwrap();
        assert!(store.load("poster").unwrap().is_some());
    }
}
