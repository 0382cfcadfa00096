//! Configuración del proyecto
//!
//! Este módulo contiene la configuración de base de datos, del store,
//! variables de entorno y otras configuraciones del sistema.

pub mod database;
pub mod environment;
pub mod store;

pub use environment::*;
pub use store::{IdStrategyKind, RedisConfig, StoreBackend};
