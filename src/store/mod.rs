//! Store de documentos
//!
//! Este módulo define el contrato mínimo que el núcleo necesita del store
//! compartido: un contador transaccional y escrituras de rutas por clave o
//! con id generado por el propio store. Hay tres backends: PostgreSQL,
//! Redis y memoria (tests y desarrollo local).

pub mod memory;
pub mod postgres;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::route::{RouteId, RouteRecord};

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use redis::RedisStore;

/// Errores del store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Otra transacción modificó el documento entre la lectura y el commit
    #[error("Concurrent modification of '{0}'")]
    Conflict(String),

    #[error("Store backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Transacción abierta sobre un único documento contador
///
/// `read` y `commit` forman una unidad atómica: si otra transacción confirmó
/// un cambio sobre el mismo contador después de nuestra lectura, `commit`
/// falla con [`StoreError::Conflict`] y nada queda escrito.
#[async_trait]
pub trait CounterTransaction: Send {
    /// Valor actual del contador; `None` si el documento no existe
    async fn read(&mut self) -> Result<Option<u64>, StoreError>;

    /// Deja preparado el nuevo valor; no se escribe hasta `commit`
    fn stage(&mut self, value: u64);

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}

/// Capacidades del store de las que depende el núcleo
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Nombre corto del backend, para logs y health
    fn backend_name(&self) -> &'static str;

    async fn begin_counter(&self, name: &str) -> Result<Box<dyn CounterTransaction>, StoreError>;

    /// Escribe la ruta bajo un id elegido por el llamador (sobrescribe)
    async fn put_route(&self, id: &RouteId, record: &RouteRecord) -> Result<(), StoreError>;

    /// Inserta la ruta con un id opaco generado por el store
    async fn insert_route(&self, record: &RouteRecord) -> Result<RouteId, StoreError>;

    async fn get_route(&self, id: &RouteId) -> Result<Option<RouteRecord>, StoreError>;
}
