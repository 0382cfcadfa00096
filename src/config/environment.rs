//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de configuración.
//! Todo tiene un valor por defecto salvo `DATABASE_URL` con backend postgres;
//! un valor presente pero inválido es un error, nunca un pánico.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use super::database::DatabaseConfig;
use super::store::{IdStrategyKind, RedisConfig, StoreBackend};

/// Errores de configuración
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Parámetros del reintento del asignador de secuencia
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
    pub counter_name: String,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            counter_name: "rotas".to_string(),
            max_attempts: 8,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(250),
        }
    }
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
    pub store_backend: StoreBackend,
    pub database: Option<DatabaseConfig>,
    pub redis: RedisConfig,
    pub id_strategy: IdStrategyKind,
    pub allocator: AllocatorConfig,
    pub upload_dir: PathBuf,
    pub upload_max_bytes: usize,
    pub public_dir: PathBuf,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
            cors_origins: Vec::new(),
            store_backend: StoreBackend::Memory,
            database: None,
            redis: RedisConfig::default(),
            id_strategy: IdStrategyKind::Sequence,
            allocator: AllocatorConfig::default(),
            upload_dir: env::temp_dir(),
            upload_max_bytes: 10 * 1024 * 1024,
            public_dir: PathBuf::from("public"),
        }
    }
}

/// Leer y parsear una variable opcional
fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(None),
    }
}

impl EnvironmentConfig {
    /// Construir la configuración desde el entorno del proceso
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let store_backend = parse_var("STORE_BACKEND")?.unwrap_or(StoreBackend::Postgres);
        let database = match store_backend {
            StoreBackend::Postgres => Some(DatabaseConfig::from_env()?),
            _ => None,
        };

        let allocator = AllocatorConfig {
            counter_name: parse_var("COUNTER_NAME")?.unwrap_or(defaults.allocator.counter_name),
            max_attempts: parse_var("ALLOCATOR_MAX_ATTEMPTS")?
                .unwrap_or(defaults.allocator.max_attempts),
            base_delay: parse_var("ALLOCATOR_BASE_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.allocator.base_delay),
            max_delay: parse_var("ALLOCATOR_MAX_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.allocator.max_delay),
        };
        if allocator.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "ALLOCATOR_MAX_ATTEMPTS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            environment: parse_var("ENVIRONMENT")?.unwrap_or(defaults.environment),
            port: parse_var("PORT")?.unwrap_or(defaults.port),
            host: parse_var("HOST")?.unwrap_or(defaults.host),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            store_backend,
            database,
            redis: RedisConfig::from_env()?,
            id_strategy: parse_var("ID_STRATEGY")?.unwrap_or(defaults.id_strategy),
            allocator,
            upload_dir: parse_var("UPLOAD_DIR")?.unwrap_or(defaults.upload_dir),
            upload_max_bytes: parse_var("UPLOAD_MAX_BYTES")?.unwrap_or(defaults.upload_max_bytes),
            public_dir: parse_var("PUBLIC_DIR")?.unwrap_or(defaults.public_dir),
        })
    }

    /// Obtener la URL del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
