//! Backend PostgreSQL
//!
//! El contador vive en la tabla `counters` y se actualiza dentro de una
//! transacción SERIALIZABLE: si dos transacciones leen el mismo valor, solo
//! una confirma y la otra recibe un fallo de serialización (SQLSTATE 40001)
//! o de unicidad (23505 cuando ambas intentan crear el contador).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

use super::{CounterTransaction, DocumentStore, StoreError};
use crate::models::route::{RouteId, RouteRecord};

const SERIALIZATION_FAILURE: &str = "40001";
const UNIQUE_VIOLATION: &str = "23505";

/// Traduce errores de sqlx, separando los conflictos de concurrencia
fn map_sqlx_error(name: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        let code = db.code();
        if matches!(code.as_deref(), Some(SERIALIZATION_FAILURE) | Some(UNIQUE_VIOLATION)) {
            return StoreError::Conflict(name.to_string());
        }
    }
    StoreError::Backend(err.to_string())
}

fn backend_error(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[derive(Debug, sqlx::FromRow)]
struct RouteRow {
    operator: String,
    color_code: String,
    route_name: String,
    route_number: i32,
    geometry: String,
    created_at: DateTime<Utc>,
}

impl From<RouteRow> for RouteRecord {
    fn from(row: RouteRow) -> Self {
        Self {
            operator: row.operator,
            color_code: row.color_code,
            route_name: row.route_name,
            route_number: row.route_number,
            geometry: row.geometry,
            created_at: row.created_at,
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Crear las tablas si todavía no existen
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS counters (
                name TEXT PRIMARY KEY,
                last_id BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS routes (
                id TEXT PRIMARY KEY,
                operator TEXT NOT NULL,
                color_code TEXT NOT NULL,
                route_name TEXT NOT NULL,
                route_number INTEGER NOT NULL,
                geometry TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        info!("✅ Esquema PostgreSQL verificado");
        Ok(())
    }
}

struct PgCounterTransaction {
    tx: Transaction<'static, Postgres>,
    name: String,
    staged: Option<u64>,
}

#[async_trait]
impl CounterTransaction for PgCounterTransaction {
    async fn read(&mut self) -> Result<Option<u64>, StoreError> {
        let last_id: Option<i64> =
            sqlx::query_scalar("SELECT last_id FROM counters WHERE name = $1")
                .bind(&self.name)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(|e| map_sqlx_error(&self.name, e))?;

        last_id
            .map(|v| {
                u64::try_from(v).map_err(|_| {
                    StoreError::Backend(format!("negative counter value {} in '{}'", v, self.name))
                })
            })
            .transpose()
    }

    fn stage(&mut self, value: u64) {
        self.staged = Some(value);
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let PgCounterTransaction { mut tx, name, staged } = *self;

        if let Some(value) = staged {
            let value = i64::try_from(value)
                .map_err(|_| StoreError::Backend(format!("counter '{}' overflow", name)))?;

            sqlx::query(
                r#"
                INSERT INTO counters (name, last_id) VALUES ($1, $2)
                ON CONFLICT (name) DO UPDATE SET last_id = EXCLUDED.last_id
                "#,
            )
            .bind(&name)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error(&name, e))?;
        }

        tx.commit().await.map_err(|e| map_sqlx_error(&name, e))?;
        debug!("💾 Contador '{}' confirmado", name);
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PgStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn begin_counter(&self, name: &str) -> Result<Box<dyn CounterTransaction>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend_error)?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(backend_error)?;

        Ok(Box::new(PgCounterTransaction {
            tx,
            name: name.to_string(),
            staged: None,
        }))
    }

    async fn put_route(&self, id: &RouteId, record: &RouteRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO routes (id, operator, color_code, route_name, route_number, geometry, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                operator = EXCLUDED.operator,
                color_code = EXCLUDED.color_code,
                route_name = EXCLUDED.route_name,
                route_number = EXCLUDED.route_number,
                geometry = EXCLUDED.geometry,
                created_at = EXCLUDED.created_at
            "#,
        )
        .bind(id.as_key())
        .bind(&record.operator)
        .bind(&record.color_code)
        .bind(&record.route_name)
        .bind(record.route_number)
        .bind(&record.geometry)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(())
    }

    async fn insert_route(&self, record: &RouteRecord) -> Result<RouteId, StoreError> {
        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO routes (id, operator, color_code, route_name, route_number, geometry, created_at)
            VALUES (gen_random_uuid()::text, $1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&record.operator)
        .bind(&record.color_code)
        .bind(&record.route_name)
        .bind(record.route_number)
        .bind(&record.geometry)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(RouteId::Opaque(id))
    }

    async fn get_route(&self, id: &RouteId) -> Result<Option<RouteRecord>, StoreError> {
        let row = sqlx::query_as::<_, RouteRow>(
            r#"
            SELECT operator, color_code, route_name, route_number, geometry, created_at
            FROM routes WHERE id = $1
            "#,
        )
        .bind(id.as_key())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_error)?;

        Ok(row.map(RouteRecord::from))
    }
}
