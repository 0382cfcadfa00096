use std::sync::Arc;
use tracing::debug;

use crate::models::route::{RouteId, RouteRecord, StoredRoute};
use crate::store::DocumentStore;
use crate::utils::errors::AppError;

/// Acceso a la colección de rutas
///
/// Una sola escritura por llamada; los fallos del store se devuelven como
/// `Persistence` sin reintentos.
#[derive(Clone)]
pub struct RouteRepository {
    store: Arc<dyn DocumentStore>,
}

impl RouteRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Guarda la ruta bajo un id ya asignado
    pub async fn save(&self, id: &RouteId, record: &RouteRecord) -> Result<(), AppError> {
        self.store
            .put_route(id, record)
            .await
            .map_err(|e| AppError::Persistence(format!("Error saving route {}: {}", id, e)))?;

        debug!("💾 Ruta {} guardada en {}", id, self.store.backend_name());
        Ok(())
    }

    /// Inserta la ruta dejando que el store genere el id
    pub async fn insert(&self, record: &RouteRecord) -> Result<RouteId, AppError> {
        let id = self
            .store
            .insert_route(record)
            .await
            .map_err(|e| AppError::Persistence(format!("Error inserting route: {}", e)))?;

        debug!("💾 Ruta {} insertada en {}", id, self.store.backend_name());
        Ok(id)
    }

    pub async fn find_by_id(&self, id: &RouteId) -> Result<Option<StoredRoute>, AppError> {
        let record = self
            .store
            .get_route(id)
            .await
            .map_err(|e| AppError::Persistence(format!("Error finding route {}: {}", id, e)))?;

        Ok(record.map(|record| StoredRoute {
            id: id.clone(),
            record,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::route::RouteMetadata;
    use crate::store::MemoryStore;

    fn record() -> RouteRecord {
        RouteRecord::new(
            RouteMetadata {
                operator: "Viação Azul".into(),
                color_code: "#0033AA".into(),
                route_name: "Centro - Rodoviária".into(),
                route_number: 12,
            },
            r#"{"type":"FeatureCollection","features":[]}"#.into(),
        )
    }

    #[tokio::test]
    async fn test_save_then_find() {
        let store = MemoryStore::new();
        let repository = RouteRepository::new(Arc::new(store.clone()));
        let id = RouteId::Sequence(7);

        repository.save(&id, &record()).await.unwrap();

        let found = repository.find_by_id(&id).await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.record.route_number, 12);
        assert_eq!(store.route_count(), 1);
    }

    #[tokio::test]
    async fn test_insert_generates_opaque_ids() {
        let repository = RouteRepository::new(Arc::new(MemoryStore::new()));

        let first = repository.insert(&record()).await.unwrap();
        let second = repository.insert(&record()).await.unwrap();

        assert!(matches!(first, RouteId::Opaque(_)));
        assert_ne!(first, second);
        assert!(repository.find_by_id(&first).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_missing_route() {
        let repository = RouteRepository::new(Arc::new(MemoryStore::new()));
        assert!(repository
            .find_by_id(&RouteId::Sequence(99))
            .await
            .unwrap()
            .is_none());
    }
}
