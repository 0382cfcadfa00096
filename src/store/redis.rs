//! Backend Redis
//!
//! El contador se incrementa con concurrencia optimista: `WATCH` sobre la
//! clave, `GET`, y luego `MULTI`/`SET`/`EXEC`. Si otra conexión tocó la
//! clave entre medio, Redis aborta el `EXEC` y devolvemos un conflicto.
//! `WATCH` es por conexión, así que cada transacción abre la suya propia;
//! el resto de operaciones van por el `ConnectionManager` compartido.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use tracing::{debug, info};
use uuid::Uuid;

use super::{CounterTransaction, DocumentStore, StoreError};
use crate::config::store::RedisConfig;
use crate::models::route::{RouteId, RouteRecord};

fn backend_error(err: redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Cliente Redis que implementa el store de documentos
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    manager: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    /// Crear nuevo cliente Redis
    pub async fn new(config: &RedisConfig) -> anyhow::Result<Self> {
        info!("🔗 Conectando a Redis: {}", config.redis_url);

        let client = redis::Client::open(config.redis_url.clone())?;
        let manager = ConnectionManager::new(client.clone()).await?;

        // Test de conexión usando un comando simple
        let mut conn = manager.clone();
        let _: () = redis::cmd("PING").query_async(&mut conn).await?;

        info!("✅ Redis conectado exitosamente");

        Ok(Self {
            client,
            manager,
            prefix: config.key_prefix.clone(),
        })
    }

    /// Generar clave con prefijo
    fn make_key(&self, collection: &str, identifier: &str) -> String {
        format!("{}:{}:{}", self.prefix, collection, identifier)
    }

    fn counter_key(&self, name: &str) -> String {
        self.make_key("counters", name)
    }

    fn route_key(&self, id: &RouteId) -> String {
        self.make_key("routes", &id.as_key())
    }
}

struct RedisCounterTransaction {
    conn: redis::aio::Connection,
    key: String,
    staged: Option<u64>,
}

#[async_trait]
impl CounterTransaction for RedisCounterTransaction {
    async fn read(&mut self) -> Result<Option<u64>, StoreError> {
        self.conn
            .get::<_, Option<u64>>(&self.key)
            .await
            .map_err(backend_error)
    }

    fn stage(&mut self, value: u64) {
        self.staged = Some(value);
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let RedisCounterTransaction { mut conn, key, staged } = *self;
        let Some(value) = staged else {
            return Ok(());
        };

        // EXEC devuelve nil si la clave vigilada cambió
        let result: Option<(String,)> = redis::pipe()
            .atomic()
            .set(&key, value)
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;

        match result {
            Some(_) => {
                debug!("💾 Contador {} = {}", key, value);
                Ok(())
            }
            None => Err(StoreError::Conflict(key)),
        }
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    fn backend_name(&self) -> &'static str {
        "redis"
    }

    async fn begin_counter(&self, name: &str) -> Result<Box<dyn CounterTransaction>, StoreError> {
        let key = self.counter_key(name);
        let mut conn = self
            .client
            .get_async_connection()
            .await
            .map_err(backend_error)?;

        redis::cmd("WATCH")
            .arg(&key)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(backend_error)?;

        Ok(Box::new(RedisCounterTransaction {
            conn,
            key,
            staged: None,
        }))
    }

    async fn put_route(&self, id: &RouteId, record: &RouteRecord) -> Result<(), StoreError> {
        let mut conn = self.manager.clone();
        let payload = serde_json::to_string(record)?;

        conn.set::<_, _, ()>(self.route_key(id), payload)
            .await
            .map_err(backend_error)
    }

    async fn insert_route(&self, record: &RouteRecord) -> Result<RouteId, StoreError> {
        let mut conn = self.manager.clone();
        let payload = serde_json::to_string(record)?;
        let id = RouteId::Opaque(Uuid::new_v4().to_string());

        let created: bool = conn
            .set_nx(self.route_key(&id), payload)
            .await
            .map_err(backend_error)?;

        if created {
            Ok(id)
        } else {
            Err(StoreError::Conflict(id.as_key()))
        }
    }

    async fn get_route(&self, id: &RouteId) -> Result<Option<RouteRecord>, StoreError> {
        let mut conn = self.manager.clone();

        let raw: Option<String> = conn.get(self.route_key(id)).await.map_err(backend_error)?;
        match raw {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }
}
