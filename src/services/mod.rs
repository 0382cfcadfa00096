//! Services module
//!
//! Este módulo contiene la lógica de negocio de la ingesta: normalización de
//! formatos, asignación de ids y manejo de los archivos subidos.

pub mod identity_strategy;
pub mod kml_converter;
pub mod normalizer_service;
pub mod sequence_allocator;
pub mod upload_service;

pub use identity_strategy::{IdentityStrategy, OpaqueIdentity, SequenceIdentity};
pub use normalizer_service::{normalize, NormalizeError};
pub use sequence_allocator::{AllocationError, SequenceAllocator};
