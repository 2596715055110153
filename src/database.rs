#[cfg(feature = "database")]
use async_trait::async_trait;
#[cfg(feature = "database")]
use sqlx::{migrate::MigrateDatabase, Row, SqlitePool};
#[cfg(feature = "database")]
use tracing::{debug, info};

#[cfg(feature = "database")]
use crate::collaborators::{ProjectStore, StoreError};
#[cfg(feature = "database")]
use crate::workflow::{ProjectId, ProjectState};

#[cfg(feature = "database")]
impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database {
            reason: e.to_string(),
        }
    }
}

#[cfg(feature = "database")]
/// Project store backed by SQLite, one row per project
pub struct SqliteProjectStore {
    pool: SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteProjectStore {
    /// Connect, creating the database and running migrations when needed
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        if !sqlx::Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            sqlx::Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePool::connect(database_url).await?;

        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database {
                reason: format!("migration failed: {e}"),
            })?;
        info!("Database migrations completed");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn stored_version(&self, project_id: &ProjectId) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT version FROM project_states WHERE project_id = ?1")
            .bind(project_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<i64, _>("version") as u64).unwrap_or(0))
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl ProjectStore for SqliteProjectStore {
    async fn load_project_state(&self, project_id: &ProjectId) -> Result<ProjectState, StoreError> {
        let row = sqlx::query("SELECT snapshot FROM project_states WHERE project_id = ?1")
            .bind(project_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let snapshot: String = row.get("snapshot");
                Ok(serde_json::from_str(&snapshot)?)
            }
            None => Err(StoreError::NotFound {
                project_id: project_id.clone(),
            }),
        }
    }

    async fn save_project_state(
        &self,
        state: &ProjectState,
        expected_version: u64,
    ) -> Result<(), StoreError> {
        let snapshot = serde_json::to_string(state)?;

        let result = if expected_version == 0 {
            sqlx::query(
                r#"
                INSERT INTO project_states (project_id, version, current_stage, snapshot, updated_at)
                VALUES (?1, ?2, ?3, ?4, datetime('now'))
                ON CONFLICT(project_id) DO NOTHING
                "#,
            )
            .bind(state.project_id.as_str())
            .bind(state.version as i64)
            .bind(state.current_stage.as_str())
            .bind(&snapshot)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE project_states
                SET version = ?2, current_stage = ?3, snapshot = ?4, updated_at = datetime('now')
                WHERE project_id = ?1 AND version = ?5
                "#,
            )
            .bind(state.project_id.as_str())
            .bind(state.version as i64)
            .bind(state.current_stage.as_str())
            .bind(&snapshot)
            .bind(expected_version as i64)
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            let found = self.stored_version(&state.project_id).await?;
            return Err(StoreError::ConcurrentModification {
                project_id: state.project_id.clone(),
                expected: expected_version,
                found,
            });
        }

        debug!(
            project_id = %state.project_id,
            version = state.version,
            "Saved project state to database"
        );
        Ok(())
    }
}
