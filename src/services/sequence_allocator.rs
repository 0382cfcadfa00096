//! Asignador de secuencia
//!
//! Entrega enteros densos y únicos a partir del contador compartido del
//! store. Cada intento es una transacción completa leer → incrementar →
//! escribir; si el store rechaza el commit por modificación concurrente se
//! reintenta con backoff exponencial y jitter, hasta un máximo de intentos.
//! No hay locks en proceso: varias instancias del servicio comparten el
//! mismo contador.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AllocatorConfig;
use crate::store::{DocumentStore, StoreError};

/// Errores del asignador
#[derive(Error, Debug)]
pub enum AllocationError {
    #[error("counter contention: gave up after {attempts} attempts")]
    Contention { attempts: u32 },

    #[error(transparent)]
    Store(StoreError),
}

/// Política de reintento ante conflictos
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&AllocatorConfig::default())
    }
}

impl From<&AllocatorConfig> for RetryPolicy {
    fn from(config: &AllocatorConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay,
            max_delay: config.max_delay,
        }
    }
}

impl RetryPolicy {
    /// Tope de espera tras el intento `attempt` (1-based): base·2^(n-1), acotado
    pub fn delay_cap(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Espera aleatoria uniforme en `[0, cap]` ("full jitter")
    fn jittered_delay(&self, attempt: u32) -> Duration {
        let cap = self.delay_cap(attempt);
        let cap_micros = u64::try_from(cap.as_micros()).unwrap_or(u64::MAX);
        if cap_micros == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(rand::thread_rng().gen_range(0..=cap_micros))
    }
}

#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn DocumentStore>,
    counter: String,
    policy: RetryPolicy,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn DocumentStore>, counter: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            store,
            counter: counter.into(),
            policy,
        }
    }

    pub fn from_config(store: Arc<dyn DocumentStore>, config: &AllocatorConfig) -> Self {
        Self::new(store, config.counter_name.clone(), RetryPolicy::from(config))
    }

    /// Un intento: leer, calcular el siguiente valor y confirmar
    async fn try_allocate(&self) -> Result<u64, StoreError> {
        let mut tx = self.store.begin_counter(&self.counter).await?;

        let next = match tx.read().await? {
            None => 1,
            Some(last) => last
                .checked_add(1)
                .ok_or_else(|| StoreError::Backend(format!("counter '{}' overflow", self.counter)))?,
        };

        tx.stage(next);
        tx.commit().await?;
        Ok(next)
    }

    /// Siguiente id de la secuencia
    pub async fn allocate_next(&self) -> Result<u64, AllocationError> {
        for attempt in 1..=self.policy.max_attempts {
            match self.try_allocate().await {
                Ok(id) => {
                    debug!("🔢 Id {} asignado en el intento {}", id, attempt);
                    return Ok(id);
                }
                Err(e) if e.is_conflict() => {
                    if attempt == self.policy.max_attempts {
                        break;
                    }
                    let delay = self.policy.jittered_delay(attempt);
                    debug!(
                        "🔁 Conflicto en '{}' (intento {}/{}), reintentando en {:?}",
                        self.counter, attempt, self.policy.max_attempts, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(AllocationError::Store(e)),
            }
        }

        warn!(
            "⚠️ Contador '{}' sin asignar tras {} intentos",
            self.counter, self.policy.max_attempts
        );
        Err(AllocationError::Contention {
            attempts: self.policy.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::route::{RouteId, RouteRecord};
    use crate::store::{CounterTransaction, MemoryStore};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    /// Store cuyo commit siempre choca, o siempre falla por otra causa
    struct RejectingStore {
        attempts: Arc<AtomicU32>,
        conflict: bool,
    }

    struct RejectingTransaction {
        conflict: bool,
    }

    #[async_trait]
    impl CounterTransaction for RejectingTransaction {
        async fn read(&mut self) -> Result<Option<u64>, StoreError> {
            Ok(Some(41))
        }

        fn stage(&mut self, _value: u64) {}

        async fn commit(self: Box<Self>) -> Result<(), StoreError> {
            if self.conflict {
                Err(StoreError::Conflict("rotas".into()))
            } else {
                Err(StoreError::Backend("connection reset".into()))
            }
        }
    }

    #[async_trait]
    impl DocumentStore for RejectingStore {
        fn backend_name(&self) -> &'static str {
            "rejecting"
        }

        async fn begin_counter(&self, _name: &str) -> Result<Box<dyn CounterTransaction>, StoreError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(RejectingTransaction {
                conflict: self.conflict,
            }))
        }

        async fn put_route(&self, _id: &RouteId, _record: &RouteRecord) -> Result<(), StoreError> {
            unreachable!("allocator never writes routes")
        }

        async fn insert_route(&self, _record: &RouteRecord) -> Result<RouteId, StoreError> {
            unreachable!("allocator never writes routes")
        }

        async fn get_route(&self, _id: &RouteId) -> Result<Option<RouteRecord>, StoreError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_fresh_counter_starts_at_one() {
        let store = MemoryStore::new();
        let allocator = SequenceAllocator::new(Arc::new(store.clone()), "rotas", fast_policy(3));

        assert_eq!(allocator.allocate_next().await.unwrap(), 1);
        assert_eq!(allocator.allocate_next().await.unwrap(), 2);
        assert_eq!(allocator.allocate_next().await.unwrap(), 3);
        assert_eq!(store.counter_value("rotas"), Some(3));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_are_dense_and_unique() {
        const N: u64 = 40;
        let store = MemoryStore::new();
        let allocator = SequenceAllocator::new(Arc::new(store.clone()), "rotas", fast_policy(200));

        let handles: Vec<_> = (0..N)
            .map(|_| {
                let allocator = allocator.clone();
                tokio::spawn(async move { allocator.allocate_next().await })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            let id = handle.await.unwrap().unwrap();
            assert!(ids.insert(id), "duplicated id {id}");
        }

        assert_eq!(ids, (1..=N).collect::<HashSet<_>>());
        assert_eq!(store.counter_value("rotas"), Some(N));
    }

    #[tokio::test]
    async fn test_contention_after_max_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let store = RejectingStore {
            attempts: attempts.clone(),
            conflict: true,
        };
        let allocator = SequenceAllocator::new(Arc::new(store), "rotas", fast_policy(4));

        let err = allocator.allocate_next().await.unwrap_err();
        assert!(matches!(err, AllocationError::Contention { attempts: 4 }));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_backend_failure_is_not_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let store = RejectingStore {
            attempts: attempts.clone(),
            conflict: false,
        };
        let allocator = SequenceAllocator::new(Arc::new(store), "rotas", fast_policy(4));

        let err = allocator.allocate_next().await.unwrap_err();
        assert!(matches!(err, AllocationError::Store(StoreError::Backend(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_delay_cap_grows_and_saturates() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(250),
        };
        assert_eq!(policy.delay_cap(1), Duration::from_millis(10));
        assert_eq!(policy.delay_cap(2), Duration::from_millis(20));
        assert_eq!(policy.delay_cap(4), Duration::from_millis(80));
        assert_eq!(policy.delay_cap(6), Duration::from_millis(250));
        assert_eq!(policy.delay_cap(64), Duration::from_millis(250));
        for attempt in 1..10 {
            assert!(policy.jittered_delay(attempt) <= policy.delay_cap(attempt));
        }
    }
}
