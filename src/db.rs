use std::sync::Arc;

use anyhow::anyhow;
use once_cell::sync::Lazy;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};

use crate::directory::{EmployeeDirectory, SupervisorReplacement};
use crate::error::{LibError, Result};
use crate::models::{EmployeeId, EmployeeRecord, RoleRef};

pub static MIGRATOR: Lazy<Migrator> = Lazy::new(|| {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
});

pub async fn create_hierarchy_tables(pool: &PgPool) -> std::result::Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[derive(Debug, Clone, FromRow)]
struct EmployeeRow {
    id: String,
    name: String,
    role: Json<RoleRef>,
    is_admin: bool,
    reports_to: Vec<String>,
    updated_at: chrono::NaiveDateTime,
}

impl From<EmployeeRow> for EmployeeRecord {
    fn from(value: EmployeeRow) -> Self {
        Self {
            id: EmployeeId(value.id),
            name: value.name,
            role: value.role.0,
            is_admin: value.is_admin,
            reports_to: value.reports_to.into_iter().map(EmployeeId).collect(),
            updated_at: Some(value.updated_at),
        }
    }
}

fn db_err(public: &'static str, err: sqlx::Error) -> LibError {
    LibError::upstream_failure(public, anyhow!(err))
}

/// Employee directory backed by `hierarchy.employees`.
#[derive(Debug, Clone)]
pub struct PgEmployeeDirectory {
    pool: Arc<PgPool>,
}

impl PgEmployeeDirectory {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn from_pool(pool: &PgPool) -> Self {
        Self {
            pool: Arc::new(pool.clone()),
        }
    }

    pub fn pool(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }

    async fn employee_exists(&self, employee_id: &EmployeeId) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1
                FROM hierarchy.employees
                WHERE btrim(id) = $1
            )
            "#,
        )
        .bind(employee_id.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to query employee", err))?;

        Ok(exists.0)
    }
}

impl EmployeeDirectory for PgEmployeeDirectory {
    async fn load_employees(&self) -> Result<Vec<EmployeeRecord>> {
        let rows = sqlx::query_as::<_, EmployeeRow>(
            r#"
            SELECT id, name, role, is_admin, reports_to, updated_at
            FROM hierarchy.employees
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to load employees", err))?;

        Ok(rows.into_iter().map(EmployeeRecord::from).collect())
    }

    async fn replace_supervisors(&self, replacement: &SupervisorReplacement) -> Result<()> {
        let supervisor_ids = replacement
            .supervisor_ids
            .iter()
            .map(|id| id.as_str())
            .collect::<Vec<_>>();

        let updated = sqlx::query(
            r#"
            UPDATE hierarchy.employees
            SET reports_to = $2,
                updated_at = clock_timestamp()::timestamp
            WHERE btrim(id) = $1
              AND updated_at IS NOT DISTINCT FROM $3::timestamp
            "#,
        )
        .bind(replacement.employee_id.as_str())
        .bind(&supervisor_ids)
        .bind(replacement.expected_updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|err| db_err("Failed to update supervisors", err))?;

        if updated.rows_affected() > 0 {
            return Ok(());
        }

        if self.employee_exists(&replacement.employee_id).await? {
            Err(LibError::upstream_conflict(
                "Employee was modified by someone else; reload and try again",
                anyhow!(
                    "employee {} changed since {:?}",
                    replacement.employee_id,
                    replacement.expected_updated_at
                ),
            ))
        } else {
            Err(LibError::not_found(
                "Employee not found",
                &replacement.employee_id,
            ))
        }
    }
}
