//! Ingesta de rutas de ônibus
//!
//! Recibe una ruta (KML o GeoJSON) junto con su metadata, la normaliza a una
//! FeatureCollection GeoJSON y la guarda en el store compartido bajo un id
//! asignado por la estrategia configurada.

pub mod config;
pub mod controllers;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;

use axum::{extract::DefaultBodyLimit, Router};
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

use middleware::cors::cors_middleware;
use state::AppState;

/// Router completo de la aplicación
///
/// Las rutas de la API tienen prioridad; el resto se sirve desde `PUBLIC_DIR`.
pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();

    Router::new()
        .merge(routes::route_routes::create_route_router())
        .fallback_service(ServeDir::new(&config.public_dir))
        .layer(DefaultBodyLimit::max(config.upload_max_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors_middleware(&config.cors_origins)),
        )
        .with_state(state)
}
