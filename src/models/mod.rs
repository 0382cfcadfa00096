//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos tal como se guardan en el store.

pub mod route;
