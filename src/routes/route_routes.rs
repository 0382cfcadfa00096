use axum::{
    extract::{Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::controllers::route_controller::RouteController;
use crate::dto::route_dto::{ApiResponse, IngestResponse, RouteSubmission};
use crate::models::route::StoredRoute;
use crate::services::upload_service::ScopedUpload;
use crate::state::AppState;
use crate::utils::errors::{validation_error, AppError};

pub fn create_route_router() -> Router<AppState> {
    Router::new()
        .route("/enviar", post(submit_route))
        .route("/rotas/:id", get(get_route))
        .route("/health", get(health))
}

/// Recibe el formulario: campos de texto más un archivo (el primero con nombre)
async fn submit_route(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<IngestResponse>>, AppError> {
    let mut submission = RouteSubmission::default();
    let mut upload: Option<ScopedUpload> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("⚠️ Multipart inválido: {}", e);
        validation_error("body", "malformed multipart body")
    })? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(file_name) = field.file_name().map(str::to_string) {
            if upload.is_some() {
                continue;
            }
            let bytes = field
                .bytes()
                .await
                .map_err(|_| validation_error("geojson", "file could not be read"))?;
            let spooled = ScopedUpload::spool(&state.config.upload_dir, &file_name, &bytes)
                .await
                .map_err(|e| AppError::Internal(format!("Cannot spool upload: {}", e)))?;
            upload = Some(spooled);
            continue;
        }

        let slot = match name.as_str() {
            "companhia" => &mut submission.operator,
            "cor" => &mut submission.color_code,
            "rota" => &mut submission.route_name,
            "nrota" => &mut submission.route_number,
            _ => continue,
        };
        *slot = field
            .text()
            .await
            .map_err(|_| validation_error("body", "malformed multipart body"))?;
    }

    let Some(upload) = upload else {
        // Sin archivo: los campos se validan igual para informar primero de ellos
        submission.into_metadata()?;
        return Err(validation_error("geojson", "a route file is required"));
    };

    let controller = RouteController::new(&state);
    let id = controller.ingest(submission, upload).await?;

    Ok(Json(ApiResponse::success_with_message(
        IngestResponse { id: id.clone() },
        format!("Rota {} cadastrada com sucesso", id),
    )))
}

async fn get_route(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StoredRoute>, AppError> {
    let controller = RouteController::new(&state);
    let route = controller.get_by_id(&id).await?;
    Ok(Json(route))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "store": state.store.backend_name(),
        "id_strategy": state.identity.kind().to_string(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
