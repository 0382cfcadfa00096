//! Configuración del store y de la estrategia de identidad

use std::env;
use std::fmt;
use std::str::FromStr;

use super::environment::ConfigError;

/// Backend del store de documentos
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(other.to_string()),
        }
    }
}

/// Cómo se asigna el id de una ruta nueva
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdStrategyKind {
    /// Entero denso desde el contador transaccional
    Sequence,
    /// Id opaco generado por el store al insertar
    Opaque,
}

impl FromStr for IdStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sequence" => Ok(IdStrategyKind::Sequence),
            "opaque" => Ok(IdStrategyKind::Opaque),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for IdStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdStrategyKind::Sequence => f.write_str("sequence"),
            IdStrategyKind::Opaque => f.write_str("opaque"),
        }
    }
}

/// Configuración de Redis
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub redis_url: String,
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            key_prefix: "route_ingest".to_string(),
        }
    }
}

impl RedisConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            key_prefix: env::var("REDIS_KEY_PREFIX").unwrap_or(defaults.key_prefix),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Postgres".parse::<StoreBackend>(), Ok(StoreBackend::Postgres));
        assert_eq!("redis".parse::<StoreBackend>(), Ok(StoreBackend::Redis));
        assert_eq!("MEMORY".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("firestore".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_id_strategy_from_str() {
        assert_eq!("sequence".parse::<IdStrategyKind>(), Ok(IdStrategyKind::Sequence));
        assert_eq!("Opaque".parse::<IdStrategyKind>(), Ok(IdStrategyKind::Opaque));
        assert!("uuid".parse::<IdStrategyKind>().is_err());
        assert_eq!(IdStrategyKind::Opaque.to_string(), "opaque");
    }
}
