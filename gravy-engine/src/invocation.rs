//! The `OperationInvocation` state machine (§4.6): `STARTING` →
//! (dibs acquired) → `IN_PROGRESS` → `SUCCESS` | `PROBLEM`, or
//! `STARTING` → `DIBS_DENIED`. Persisted so a deferred invocation can be
//! picked up by a worker that didn't create it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::errors::ApiError;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Starting,
    InProgress,
    Success,
    Problem,
    DibsDenied,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OperationInvocation {
    pub id: Uuid,
    pub operation_name: String,
    pub account_id: Uuid,
    pub configured_addon_id: Option<Uuid>,
    #[sqlx(json)]
    pub state: InvocationState,
    #[sqlx(json)]
    pub arguments: Value,
    #[sqlx(json)]
    pub result: Option<Value>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub locked_by: Option<Uuid>,
    pub locked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn map_db_error(e: sqlx::Error) -> ApiError {
    ApiError::DatabaseError(e)
}

#[derive(Debug, Clone)]
pub struct InvocationRepository {
    pool: PgPool,
}

impl InvocationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        operation_name: &str,
        account_id: Uuid,
        configured_addon_id: Option<Uuid>,
        arguments: Value,
    ) -> Result<OperationInvocation, ApiError> {
        sqlx::query_as::<_, OperationInvocation>(
            r#"
            INSERT INTO operation_invocations
                (id, operation_name, account_id, configured_addon_id, state, arguments, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(operation_name)
        .bind(account_id)
        .bind(configured_addon_id)
        .bind(sqlx::types::Json(InvocationState::Starting))
        .bind(sqlx::types::Json(&arguments))
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<OperationInvocation>, ApiError> {
        sqlx::query_as::<_, OperationInvocation>("SELECT * FROM operation_invocations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_error)
    }

    /// Acquires the exclusive execution lease ("dibs", §5) with one
    /// conditional update: only an invocation with no current lease can
    /// transition to `IN_PROGRESS`. Returns `None` if another worker
    /// already holds it, the Rust equivalent of `SELECT ... FOR UPDATE
    /// SKIP LOCKED`.
    pub async fn acquire_dibs(&self, id: Uuid, worker_id: Uuid) -> Result<Option<OperationInvocation>, ApiError> {
        sqlx::query_as::<_, OperationInvocation>(
            r#"
            UPDATE operation_invocations
            SET state = $1, locked_by = $2, locked_at = NOW(), updated_at = NOW()
            WHERE id = $3 AND locked_at IS NULL
            RETURNING *
            "#,
        )
        .bind(sqlx::types::Json(InvocationState::InProgress))
        .bind(worker_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)
    }

    pub async fn mark_success(&self, id: Uuid, result: Value) -> Result<OperationInvocation, ApiError> {
        sqlx::query_as::<_, OperationInvocation>(
            r#"
            UPDATE operation_invocations
            SET state = $1, result = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(sqlx::types::Json(InvocationState::Success))
        .bind(sqlx::types::Json(Some(result)))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    /// Records a truncated error (§7 "no stack traces over the wire"):
    /// `message` is clipped so a verbose provider error can't blow up a
    /// row.
    pub async fn mark_problem(&self, id: Uuid, kind: &str, message: &str) -> Result<OperationInvocation, ApiError> {
        const MAX_MESSAGE_LEN: usize = 2000;
        let truncated: String = message.chars().take(MAX_MESSAGE_LEN).collect();
        sqlx::query_as::<_, OperationInvocation>(
            r#"
            UPDATE operation_invocations
            SET state = $1, error_kind = $2, error_message = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(sqlx::types::Json(InvocationState::Problem))
        .bind(kind)
        .bind(truncated)
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    pub async fn mark_dibs_denied(&self, id: Uuid) -> Result<OperationInvocation, ApiError> {
        sqlx::query_as::<_, OperationInvocation>(
            "UPDATE operation_invocations SET state = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(sqlx::types::Json(InvocationState::DibsDenied))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_state_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&InvocationState::InProgress).unwrap(), "\"in_progress\"");
        assert_eq!(serde_json::to_string(&InvocationState::DibsDenied).unwrap(), "\"dibs_denied\"");
    }
}
