//! Resource pool directory: selection and capacity policy for admission pools.
//!
//! Pools bound concurrent worker throughput. The quota arithmetic lives in an
//! external [`AdmissionController`]; this module owns only the selection keys
//! (direction, size class, destination endpoint) and the capacity parameters,
//! which are fixed once at coordinator start-up. Pools are created lazily and
//! never evicted, so the map grows monotonically with the set of endpoints
//! seen.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{FtmConfig, PRIVILEGED_BUDGET_MULTIPLIER};
use crate::location::EndpointId;
use crate::worker::WorkerRef;

/// Downloads below this total size use the small-transfer pools.
pub const SMALL_TRANSFER_THRESHOLD: i64 = 20 * 1024;

/// Size class of a download, from its total transfer size.
pub fn is_small_transfer(size: i64) -> bool {
    size < SMALL_TRANSFER_THRESHOLD
}

/// How a pool meters its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityMode {
    /// Enforce the byte budget.
    Metered,
    /// Hand out resources greedily; the budget is advisory. Used when no
    /// resumable-download cache backs partial transfers.
    Unmetered,
}

/// Capacity parameters a pool is created with. Fixed for the pool's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolCapacity {
    pub mode: CapacityMode,
    pub budget_bytes: i64,
}

/// Key selecting a pool: transfer direction, size class, and destination.
/// Uploads of every kind share one pool regardless of destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKey {
    Download { small: bool, endpoint: EndpointId },
    Upload,
}

/// External admission controller owning quota arithmetic and arbitration.
pub trait AdmissionController: Send + Sync {
    /// Admit a worker with an advisory priority hint. The pool keeps only
    /// the weak reference; the job retains exclusive ownership.
    fn admit(&self, worker: WorkerRef, priority: i8);
}

/// Builds the admission controller for a newly created pool.
pub type PoolFactory =
    Box<dyn FnMut(&PoolKey, PoolCapacity) -> Arc<dyn AdmissionController> + Send>;

/// Lazily populated, never-evicted map of admission pools.
pub struct PoolDirectory {
    factory: PoolFactory,
    download_capacity: PoolCapacity,
    upload_capacity: PoolCapacity,
    pools: HashMap<PoolKey, Arc<dyn AdmissionController>>,
}

impl PoolDirectory {
    /// Capacity parameters are derived from `cfg` here, once. Later changes
    /// to the privileged or cache flags do not resize existing pools or
    /// affect pools created afterwards by this directory. The upload pool is
    /// created eagerly; download pools on first use per (size class,
    /// endpoint).
    pub fn new(cfg: &FtmConfig, mut factory: PoolFactory) -> Self {
        let mode = if cfg.resumable_cache {
            CapacityMode::Metered
        } else {
            CapacityMode::Unmetered
        };
        let mut download_budget = cfg.download_budget_bytes;
        if cfg.privileged_account {
            download_budget *= PRIVILEGED_BUDGET_MULTIPLIER;
        }
        let download_capacity = PoolCapacity {
            mode,
            budget_bytes: download_budget,
        };
        let upload_capacity = PoolCapacity {
            mode,
            budget_bytes: cfg.upload_budget_bytes,
        };

        let mut pools: HashMap<PoolKey, Arc<dyn AdmissionController>> = HashMap::new();
        pools.insert(PoolKey::Upload, factory(&PoolKey::Upload, upload_capacity));

        Self {
            factory,
            download_capacity,
            upload_capacity,
            pools,
        }
    }

    /// Pool for a download of the given size class to the given endpoint.
    pub fn download_pool(
        &mut self,
        small: bool,
        endpoint: EndpointId,
    ) -> Arc<dyn AdmissionController> {
        self.pool(PoolKey::Download { small, endpoint })
    }

    /// The single process-wide pool shared by all upload-class jobs.
    pub fn upload_pool(&mut self) -> Arc<dyn AdmissionController> {
        self.pool(PoolKey::Upload)
    }

    fn pool(&mut self, key: PoolKey) -> Arc<dyn AdmissionController> {
        if let Some(pool) = self.pools.get(&key) {
            return Arc::clone(pool);
        }
        let capacity = match key {
            PoolKey::Download { .. } => self.download_capacity,
            PoolKey::Upload => self.upload_capacity,
        };
        tracing::debug!(?key, ?capacity, "creating resource pool");
        let pool = (self.factory)(&key, capacity);
        self.pools.insert(key, Arc::clone(&pool));
        pool
    }

    /// Number of pools created so far. Monotonically increasing.
    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct NoopPool;

    impl AdmissionController for NoopPool {
        fn admit(&self, _worker: WorkerRef, _priority: i8) {}
    }

    fn recording_factory() -> (PoolFactory, Arc<Mutex<Vec<(PoolKey, PoolCapacity)>>>) {
        let created: Arc<Mutex<Vec<(PoolKey, PoolCapacity)>>> = Arc::new(Mutex::new(Vec::new()));
        let record = Arc::clone(&created);
        let factory: PoolFactory = Box::new(move |key, capacity| {
            record.lock().unwrap().push((*key, capacity));
            Arc::new(NoopPool)
        });
        (factory, created)
    }

    #[test]
    fn size_class_threshold() {
        assert!(is_small_transfer(10 * 1024));
        assert!(is_small_transfer(SMALL_TRANSFER_THRESHOLD - 1));
        assert!(!is_small_transfer(SMALL_TRANSFER_THRESHOLD));
        assert!(!is_small_transfer(50 * 1024));
    }

    #[test]
    fn upload_pool_exists_at_startup_and_is_shared() {
        let (factory, created) = recording_factory();
        let mut dir = PoolDirectory::new(&FtmConfig::default(), factory);
        assert_eq!(created.lock().unwrap().len(), 1);
        assert_eq!(created.lock().unwrap()[0].0, PoolKey::Upload);

        let a = dir.upload_pool();
        let b = dir.upload_pool();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(dir.pool_count(), 1);
    }

    #[test]
    fn download_pools_split_by_size_class_and_endpoint() {
        let (factory, _created) = recording_factory();
        let mut dir = PoolDirectory::new(&FtmConfig::default(), factory);

        let small_a = dir.download_pool(true, EndpointId(1));
        let large_a = dir.download_pool(false, EndpointId(1));
        let small_b = dir.download_pool(true, EndpointId(2));
        assert!(!Arc::ptr_eq(&small_a, &large_a));
        assert!(!Arc::ptr_eq(&small_a, &small_b));

        // Same key resolves to the cached pool, not a new one.
        let small_a_again = dir.download_pool(true, EndpointId(1));
        assert!(Arc::ptr_eq(&small_a, &small_a_again));
        assert_eq!(dir.pool_count(), 4); // upload + 3 download pools
    }

    #[test]
    fn privileged_account_multiplies_download_budget() {
        let (factory, created) = recording_factory();
        let cfg = FtmConfig {
            privileged_account: true,
            ..FtmConfig::default()
        };
        let mut dir = PoolDirectory::new(&cfg, factory);
        dir.download_pool(false, EndpointId(1));

        let created = created.lock().unwrap();
        let (_, capacity) = created[1];
        assert_eq!(
            capacity.budget_bytes,
            cfg.download_budget_bytes * PRIVILEGED_BUDGET_MULTIPLIER
        );
        // The upload budget is not multiplied.
        assert_eq!(created[0].1.budget_bytes, cfg.upload_budget_bytes);
    }

    #[test]
    fn privilege_flag_is_read_once_at_startup() {
        let (factory, created) = recording_factory();
        let mut cfg = FtmConfig::default();
        let mut dir = PoolDirectory::new(&cfg, factory);

        // Flipping the flag after start-up must not change the budget of
        // pools created later.
        cfg.privileged_account = true;
        dir.download_pool(true, EndpointId(9));

        let created = created.lock().unwrap();
        let (_, capacity) = created[1];
        assert_eq!(capacity.budget_bytes, FtmConfig::default().download_budget_bytes);
    }

    #[test]
    fn capacity_mode_follows_resumable_cache_flag() {
        let (factory, created) = recording_factory();
        let cfg = FtmConfig {
            resumable_cache: false,
            ..FtmConfig::default()
        };
        let mut dir = PoolDirectory::new(&cfg, factory);
        dir.download_pool(true, EndpointId(1));
        for (_, capacity) in created.lock().unwrap().iter() {
            assert_eq!(capacity.mode, CapacityMode::Unmetered);
        }

        let (factory, created) = recording_factory();
        let mut dir = PoolDirectory::new(&FtmConfig::default(), factory);
        dir.download_pool(true, EndpointId(1));
        for (_, capacity) in created.lock().unwrap().iter() {
            assert_eq!(capacity.mode, CapacityMode::Metered);
        }
    }
}
