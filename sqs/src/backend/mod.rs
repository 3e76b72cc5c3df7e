//! Concrete stores behind the [`KV`](crate::kv::KV) and [`Incrementer`](crate::kv::Incrementer) traits
//!
//! | env         | cluster/queue meta | incrementer | messages |
//! |-------------|--------------------|-------------|----------|
//! | production  | redis              | redis       | redis    |
//! | development | sled               | sled        | memory   |
//! | test        | memory             | memory      | memory   |
//!
//! The incrementer always works on the metadata store, since queue counters are
//! both bootstrapped with `put` and advanced with `increment` under the same key.
use std::sync::Arc;

use sqs_conf::{Env, Storage as StorageConfig};

use crate::error::Result;
use crate::kv::{DynIncrementer, DynKV};

pub use self::memory::{MemoryIncrementer, MemoryKV};
pub use self::redis::{RedisIncrementer, RedisKV};
pub use self::sled::{SledIncrementer, SledKV};

pub mod memory;
pub mod redis;
pub mod sled;

#[derive(Clone)]
pub struct Backends {
    pub cluster_meta: DynKV,
    pub meta: DynKV,
    pub message: DynKV,
    pub incrementer: DynIncrementer,
}

impl Backends {
    /// Chooses the stores for the deployment environment, called once at boot.
    pub async fn from_env(env: Env, cfg: &StorageConfig) -> Result<Self> {
        let backends = match env {
            Env::Production => {
                let kv = RedisKV::connect(&cfg.redis).await?;
                let incrementer: DynIncrementer = Arc::new(RedisIncrementer::new(&kv));
                let kv: DynKV = Arc::new(kv);
                Self { cluster_meta: kv.clone(), meta: kv.clone(), message: kv, incrementer }
            }
            Env::Development => {
                let kv = SledKV::open(&cfg.sled.path)?;
                let incrementer: DynIncrementer = Arc::new(SledIncrementer::new(&kv));
                let kv: DynKV = Arc::new(kv);
                Self { cluster_meta: kv.clone(), meta: kv, message: Arc::new(MemoryKV::new()), incrementer }
            }
            Env::Test => Self::memory(),
        };
        log::info!("storage backends selected for env {env}");
        Ok(backends)
    }

    /// Every store in process memory, sharing one map.
    #[inline]
    pub fn memory() -> Self {
        let kv = MemoryKV::new();
        let incrementer: DynIncrementer = Arc::new(MemoryIncrementer::new(&kv));
        let kv: DynKV = Arc::new(kv);
        Self { cluster_meta: kv.clone(), meta: kv.clone(), message: kv, incrementer }
    }
}
