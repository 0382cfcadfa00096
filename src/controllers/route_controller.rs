use std::sync::Arc;
use tracing::info;

use crate::dto::route_dto::RouteSubmission;
use crate::models::route::{RouteId, RouteRecord, StoredRoute};
use crate::repositories::route_repository::RouteRepository;
use crate::services::identity_strategy::IdentityStrategy;
use crate::services::normalizer_service::normalize;
use crate::services::upload_service::ScopedUpload;
use crate::state::AppState;
use crate::utils::errors::{not_found_error, AppError, AppResult};

pub struct RouteController {
    identity: Arc<dyn IdentityStrategy>,
    repository: RouteRepository,
}

impl RouteController {
    pub fn new(state: &AppState) -> Self {
        Self {
            identity: state.identity.clone(),
            repository: RouteRepository::new(state.store.clone()),
        }
    }

    /// Ingesta completa de una ruta: validar, normalizar, asignar id y guardar
    pub async fn ingest(&self, submission: RouteSubmission, upload: ScopedUpload) -> AppResult<RouteId> {
        // Validar antes de tocar el archivo; si falla, el upload se borra al soltarse
        let metadata = submission.into_metadata()?;

        let bytes = upload
            .read_bytes()
            .await
            .map_err(|e| AppError::Internal(format!("Cannot read upload: {}", e)));
        let normalized =
            bytes.and_then(|raw| normalize(&raw, upload.extension()).map_err(AppError::from));
        let source = upload.original_name().to_string();
        upload.release();
        let geometry = normalized?;

        let record = RouteRecord::new(metadata, geometry);
        let id = self.identity.persist(&record).await?;

        info!(
            "🚌 Ruta {} guardada: '{}' nº {} de {} ({}, id {})",
            id,
            record.route_name,
            record.route_number,
            record.operator,
            source,
            self.identity.kind()
        );
        Ok(id)
    }

    pub async fn get_by_id(&self, raw_id: &str) -> AppResult<StoredRoute> {
        let id = RouteId::parse(raw_id);
        self.repository
            .find_by_id(&id)
            .await?
            .ok_or_else(|| not_found_error("Route", raw_id))
    }
}
