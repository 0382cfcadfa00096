//! Store en memoria
//!
//! Implementa el mismo contrato que los backends reales con concurrencia
//! optimista: cada documento contador lleva una versión y el commit solo
//! prospera si la versión no cambió desde la lectura.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::{CounterTransaction, DocumentStore, StoreError};
use crate::models::route::{RouteId, RouteRecord};

#[derive(Debug, Clone, Copy)]
struct CounterDoc {
    last_id: u64,
    version: u64,
}

#[derive(Debug, Default)]
struct MemoryState {
    counters: HashMap<String, CounterDoc>,
    routes: HashMap<String, (RouteId, RouteRecord)>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("memory store poisoned".to_string()))
    }

    /// Valor confirmado del contador, sin abrir transacción
    pub fn counter_value(&self, name: &str) -> Option<u64> {
        self.lock()
            .ok()
            .and_then(|state| state.counters.get(name).map(|doc| doc.last_id))
    }

    pub fn route_count(&self) -> usize {
        self.lock().map(|state| state.routes.len()).unwrap_or(0)
    }
}

struct MemoryCounterTransaction {
    store: MemoryStore,
    name: String,
    // versión observada en la lectura; 0 = documento ausente
    seen_version: Option<u64>,
    staged: Option<u64>,
}

#[async_trait]
impl CounterTransaction for MemoryCounterTransaction {
    async fn read(&mut self) -> Result<Option<u64>, StoreError> {
        let doc = self.store.lock()?.counters.get(&self.name).copied();
        self.seen_version = Some(doc.map_or(0, |d| d.version));
        Ok(doc.map(|d| d.last_id))
    }

    fn stage(&mut self, value: u64) {
        self.staged = Some(value);
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let Some(value) = self.staged else {
            return Ok(());
        };

        let mut state = self.store.lock()?;
        let current_version = state.counters.get(&self.name).map_or(0, |d| d.version);

        // Sin lectura previa no hay nada contra qué comparar
        let seen = self.seen_version.unwrap_or(current_version);
        if seen != current_version {
            log::debug!(
                "🔁 Conflicto en contador '{}': versión leída {}, actual {}",
                self.name,
                seen,
                current_version
            );
            return Err(StoreError::Conflict(self.name.clone()));
        }

        state.counters.insert(
            self.name.clone(),
            CounterDoc {
                last_id: value,
                version: current_version + 1,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn begin_counter(&self, name: &str) -> Result<Box<dyn CounterTransaction>, StoreError> {
        Ok(Box::new(MemoryCounterTransaction {
            store: self.clone(),
            name: name.to_string(),
            seen_version: None,
            staged: None,
        }))
    }

    async fn put_route(&self, id: &RouteId, record: &RouteRecord) -> Result<(), StoreError> {
        self.lock()?
            .routes
            .insert(id.as_key(), (id.clone(), record.clone()));
        Ok(())
    }

    async fn insert_route(&self, record: &RouteRecord) -> Result<RouteId, StoreError> {
        let id = RouteId::Opaque(Uuid::new_v4().simple().to_string());
        self.lock()?
            .routes
            .insert(id.as_key(), (id.clone(), record.clone()));
        Ok(id)
    }

    async fn get_route(&self, id: &RouteId) -> Result<Option<RouteRecord>, StoreError> {
        Ok(self
            .lock()?
            .routes
            .get(&id.as_key())
            .map(|(_, record)| record.clone()))
    }
}
