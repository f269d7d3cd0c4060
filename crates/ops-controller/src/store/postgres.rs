//! Postgres tenant store.
//!
//! Runtime-checked sqlx queries over the schema in `migrations/`. Unique
//! violations map to [`StoreError::Conflict`]; everything else the database
//! reports becomes [`StoreError::Unavailable`] with the detail kept
//! server-side.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{ConnectionId, OperationId, UserId};
use sqlx::PgPool;
use uuid::Uuid;

use super::{OperationRecord, StoreError, TenantStore, UnitRecord, UnitStatus};

/// Postgres implementation of [`TenantStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the given database URL.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("failed to connect: {e}")))?;
        Ok(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct OperationRow {
    id: String,
    admin_password: String,
}

impl From<OperationRow> for OperationRecord {
    fn from(row: OperationRow) -> Self {
        Self {
            id: OperationId(row.id),
            admin_password: row.admin_password,
        }
    }
}

#[derive(sqlx::FromRow)]
struct UnitRow {
    id: String,
    op_id: String,
    callsign: String,
    socket_id: Option<String>,
    lat: f64,
    lng: f64,
    status: String,
    last_seen: DateTime<Utc>,
}

impl TryFrom<UnitRow> for UnitRecord {
    type Error = StoreError;

    fn try_from(row: UnitRow) -> Result<Self, StoreError> {
        let status = UnitStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Unavailable(format!("unrecognized unit status {:?}", row.status))
        })?;
        let connection_id = match row.socket_id {
            Some(raw) => Some(ConnectionId(Uuid::parse_str(&raw).map_err(|e| {
                StoreError::Unavailable(format!("malformed socket id {raw:?}: {e}"))
            })?)),
            None => None,
        };
        Ok(Self {
            id: UserId(row.id),
            op_id: OperationId(row.op_id),
            call_sign: row.callsign,
            connection_id,
            lat: row.lat,
            lng: row.lng,
            status,
            last_seen: row.last_seen,
        })
    }
}

fn query_error(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn insert_error(e: sqlx::Error, conflict: String) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(conflict),
        _ => query_error(e),
    }
}

#[async_trait]
impl TenantStore for PgStore {
    async fn get_operation(
        &self,
        id: &OperationId,
    ) -> Result<Option<OperationRecord>, StoreError> {
        let row = sqlx::query_as::<_, OperationRow>(
            "SELECT id, admin_password FROM operations WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(row.map(OperationRecord::from))
    }

    async fn insert_operation(&self, operation: OperationRecord) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO operations (id, admin_password) VALUES ($1, $2)")
            .bind(operation.id.as_str())
            .bind(&operation.admin_password)
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(e, format!("operation {} already exists", operation.id)))?;
        Ok(())
    }

    async fn list_operations(&self) -> Result<Vec<OperationRecord>, StoreError> {
        let rows = sqlx::query_as::<_, OperationRow>(
            "SELECT id, admin_password FROM operations ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(rows.into_iter().map(OperationRecord::from).collect())
    }

    async fn channels(&self, op_id: &OperationId) -> Result<Vec<String>, StoreError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT name FROM channels WHERE op_id = $1 ORDER BY id")
                .bind(op_id.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(query_error)?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    async fn insert_channel(&self, op_id: &OperationId, name: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO channels (op_id, name) VALUES ($1, $2)")
            .bind(op_id.as_str())
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(e, format!("channel {name} already exists in {op_id}")))?;
        Ok(())
    }

    async fn delete_channel(&self, op_id: &OperationId, name: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM channels WHERE op_id = $1 AND name = $2")
            .bind(op_id.as_str())
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(query_error)?;
        Ok(())
    }

    async fn insert_token(&self, token: &str, op_id: &OperationId) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO operation_tokens (token, op_id) VALUES ($1, $2)")
            .bind(token)
            .bind(op_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| insert_error(e, "token already exists".to_string()))?;
        Ok(())
    }

    async fn token_operation(&self, token: &str) -> Result<Option<OperationId>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT op_id FROM operation_tokens WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await
                .map_err(query_error)?;

        Ok(row.map(|(op_id,)| OperationId(op_id)))
    }

    async fn upsert_unit(&self, unit: UnitRecord) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO units (id, op_id, callsign, socket_id, lat, lng, status, last_seen)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                op_id = EXCLUDED.op_id,
                callsign = EXCLUDED.callsign,
                socket_id = EXCLUDED.socket_id,
                lat = EXCLUDED.lat,
                lng = EXCLUDED.lng,
                status = EXCLUDED.status,
                last_seen = EXCLUDED.last_seen
            ",
        )
        .bind(unit.id.as_str())
        .bind(unit.op_id.as_str())
        .bind(&unit.call_sign)
        .bind(unit.connection_id.map(|c| c.to_string()))
        .bind(unit.lat)
        .bind(unit.lng)
        .bind(unit.status.as_str())
        .bind(unit.last_seen)
        .execute(&self.pool)
        .await
        .map_err(query_error)?;
        Ok(())
    }

    async fn get_unit(&self, id: &UserId) -> Result<Option<UnitRecord>, StoreError> {
        let row = sqlx::query_as::<_, UnitRow>(
            r"
            SELECT id, op_id, callsign, socket_id, lat, lng, status, last_seen
            FROM units WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        row.map(UnitRecord::try_from).transpose()
    }

    async fn units_for_operation(
        &self,
        op_id: &OperationId,
    ) -> Result<Vec<UnitRecord>, StoreError> {
        let rows = sqlx::query_as::<_, UnitRow>(
            r"
            SELECT id, op_id, callsign, socket_id, lat, lng, status, last_seen
            FROM units WHERE op_id = $1
            ",
        )
        .bind(op_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        rows.into_iter().map(UnitRecord::try_from).collect()
    }

    async fn mark_unit_offline(
        &self,
        id: &UserId,
        connection_id: ConnectionId,
    ) -> Result<Option<UnitRecord>, StoreError> {
        let row = sqlx::query_as::<_, UnitRow>(
            r"
            UPDATE units
            SET status = 'OFFLINE', socket_id = NULL, last_seen = $3
            WHERE id = $1 AND socket_id = $2
            RETURNING id, op_id, callsign, socket_id, lat, lng, status, last_seen
            ",
        )
        .bind(id.as_str())
        .bind(connection_id.to_string())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        row.map(UnitRecord::try_from).transpose()
    }
}
