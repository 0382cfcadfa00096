//! Estrategias de identidad
//!
//! Decide cómo recibe su id una ruta nueva. `SequenceIdentity` pide un
//! entero al asignador y luego escribe la ruta con ese id; `OpaqueIdentity`
//! deja que el store genere la clave en una sola inserción, sin tocar el
//! contador. La estrategia activa se elige con `ID_STRATEGY`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::config::{AllocatorConfig, IdStrategyKind};
use crate::models::route::{RouteId, RouteRecord};
use crate::repositories::route_repository::RouteRepository;
use crate::services::sequence_allocator::SequenceAllocator;
use crate::store::DocumentStore;
use crate::utils::errors::AppResult;

#[async_trait]
pub trait IdentityStrategy: Send + Sync {
    fn kind(&self) -> IdStrategyKind;

    /// Asigna el id y persiste la ruta; devuelve el id asignado
    async fn persist(&self, record: &RouteRecord) -> AppResult<RouteId>;
}

/// Ids enteros densos a partir del contador compartido
pub struct SequenceIdentity {
    allocator: SequenceAllocator,
    repository: RouteRepository,
}

impl SequenceIdentity {
    pub fn new(allocator: SequenceAllocator, repository: RouteRepository) -> Self {
        Self {
            allocator,
            repository,
        }
    }
}

#[async_trait]
impl IdentityStrategy for SequenceIdentity {
    fn kind(&self) -> IdStrategyKind {
        IdStrategyKind::Sequence
    }

    async fn persist(&self, record: &RouteRecord) -> AppResult<RouteId> {
        let id = RouteId::Sequence(self.allocator.allocate_next().await?);
        if let Err(e) = self.repository.save(&id, record).await {
            // El número ya está confirmado en el contador: queda un hueco
            warn!("⚠️ Id {} consumido sin ruta guardada", id);
            return Err(e);
        }
        Ok(id)
    }
}

/// Ids opacos generados por el store
pub struct OpaqueIdentity {
    repository: RouteRepository,
}

impl OpaqueIdentity {
    pub fn new(repository: RouteRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl IdentityStrategy for OpaqueIdentity {
    fn kind(&self) -> IdStrategyKind {
        IdStrategyKind::Opaque
    }

    async fn persist(&self, record: &RouteRecord) -> AppResult<RouteId> {
        self.repository.insert(record).await
    }
}

/// Construye la estrategia configurada sobre un store compartido
pub fn identity_from_config(
    kind: IdStrategyKind,
    store: Arc<dyn DocumentStore>,
    allocator: &AllocatorConfig,
) -> Arc<dyn IdentityStrategy> {
    let repository = RouteRepository::new(store.clone());
    match kind {
        IdStrategyKind::Sequence => Arc::new(SequenceIdentity::new(
            SequenceAllocator::from_config(store, allocator),
            repository,
        )),
        IdStrategyKind::Opaque => Arc::new(OpaqueIdentity::new(repository)),
    }
}
