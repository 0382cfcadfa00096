use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use route_ingest::config::{EnvironmentConfig, StoreBackend};
use route_ingest::database::DatabaseConnection;
use route_ingest::state::AppState;
use route_ingest::store::{DocumentStore, MemoryStore, RedisStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🚌 Route Ingest - ingesta de rutas de ônibus");
    info!("============================================");

    let config = EnvironmentConfig::from_env().map_err(|e| {
        error!("❌ Configuración inválida: {}", e);
        anyhow::anyhow!("Error de configuración: {}", e)
    })?;

    let store = connect_store(&config).await?;
    info!(
        "🗄️ Entorno: {} | store: {} | estrategia de id: {}",
        config.environment,
        store.backend_name(),
        config.id_strategy
    );

    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("No se pudo crear UPLOAD_DIR {}", config.upload_dir.display()))?;
    if !config.public_dir.is_dir() {
        warn!("⚠️ PUBLIC_DIR {} no existe; solo se sirve la API", config.public_dir.display());
    }

    let addr: SocketAddr = config
        .server_url()
        .parse()
        .with_context(|| format!("Dirección inválida: {}", config.server_url()))?;

    let app = route_ingest::build_app(AppState::new(store, config));

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   POST /enviar      - Enviar ruta (multipart)");
    info!("   GET  /rotas/:id   - Obtener ruta");
    info!("   GET  /health      - Health check");
    info!("   GET  /*           - Formulario estático");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!("❌ Error del servidor: {}", e);
            e
        })?;

    info!("👋 Servidor terminado");
    Ok(())
}

/// Abrir el backend de store configurado
async fn connect_store(config: &EnvironmentConfig) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let database = config
                .database
                .as_ref()
                .context("DATABASE_URL must be set for the postgres backend")?;
            let connection = DatabaseConnection::new(database).await.map_err(|e| {
                error!("❌ Error conectando a la base de datos: {}", e);
                e
            })?;
            Arc::new(connection.store())
        }
        StoreBackend::Redis => {
            let redis = RedisStore::new(&config.redis).await.map_err(|e| {
                error!("❌ Error conectando a Redis: {}", e);
                e
            })?;
            Arc::new(redis)
        }
        StoreBackend::Memory => {
            warn!("⚠️ Store en memoria: los datos se pierden al reiniciar");
            Arc::new(MemoryStore::new())
        }
    };
    Ok(store)
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo escuchar Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el handler de SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
