//! Conexión a PostgreSQL
//!
//! Este módulo abre el pool de conexiones y prepara el esquema del store.

use anyhow::Result;
use sqlx::PgPool;
use tracing::info;

use crate::config::database::DatabaseConfig;
use crate::store::PgStore;

/// Pool de conexiones ya verificado
pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Conectar y verificar el esquema
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("🐘 Conectando a PostgreSQL: {}", config.masked_url());

        let pool = config.create_pool().await?;
        PgStore::new(pool.clone()).ensure_schema().await?;

        info!("✅ PostgreSQL conectado ({} conexiones máx.)", config.max_connections);
        Ok(Self { pool })
    }

    /// Store de documentos sobre este pool
    pub fn store(&self) -> PgStore {
        PgStore::new(self.pool.clone())
    }
}
