//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum. Solo contiene handles; la coordinación entre
//! peticiones vive en el store.

use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::services::identity_strategy::{identity_from_config, IdentityStrategy};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<EnvironmentConfig>,
    pub identity: Arc<dyn IdentityStrategy>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: EnvironmentConfig) -> Self {
        let identity = identity_from_config(config.id_strategy, store.clone(), &config.allocator);
        Self {
            store,
            config: Arc::new(config),
            identity,
        }
    }
}
