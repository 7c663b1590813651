use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::ImageCache;
use crate::loader::{CacheKey, ImageSource};
use crate::session::ShutdownSignal;

pub const DEFAULT_PREFETCH_WORKERS: usize = 2;

/// Called from a worker thread after a prefetched image lands in the cache.
pub type ReadyNotifier = Arc<dyn Fn(&CacheKey) + Send + Sync>;

// ---------------------------------------------------------------------------
// In-flight tracking
// ---------------------------------------------------------------------------

type InFlight = Arc<Mutex<HashSet<CacheKey>>>;

/// Removes its key from the in-flight set when the task ends, whatever the
/// outcome (including a panicking decoder).
struct InFlightGuard {
    in_flight: InFlight,
    key: CacheKey,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}

// ---------------------------------------------------------------------------
// Background decode workers
// ---------------------------------------------------------------------------

/// Warms the cache for likely-next images on a fixed-size worker pool.
///
/// At most one decode per key is outstanding. Failures are logged and
/// remembered (see `has_failed`) but never surfaced; the foreground path
/// retries synchronously if the user actually navigates there. Tasks are never cancelled, but a task that starts after
/// shutdown skips its decode.
pub struct Prefetcher<S: ImageSource> {
    pool: rayon::ThreadPool,
    source: Arc<S>,
    cache: Arc<ImageCache>,
    in_flight: InFlight,
    failed: Arc<Mutex<HashSet<CacheKey>>>,
    shutdown: ShutdownSignal,
    notify: Option<ReadyNotifier>,
}

impl<S: ImageSource> Prefetcher<S> {
    pub fn new(
        workers: usize,
        source: Arc<S>,
        cache: Arc<ImageCache>,
        shutdown: ShutdownSignal,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("prefetch-{}", i))
            .panic_handler(|_| log::error!("[prefetch] decode task panicked"))
            .build()?;
        Ok(Self {
            pool,
            source,
            cache,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            failed: Arc::new(Mutex::new(HashSet::new())),
            shutdown,
            notify: None,
        })
    }

    pub fn with_notifier(mut self, notify: ReadyNotifier) -> Self {
        self.set_notifier(notify);
        self
    }

    pub fn set_notifier(&mut self, notify: ReadyNotifier) {
        self.notify = Some(notify);
    }

    /// Queue decodes for every key that is neither cached nor in flight.
    /// Returns how many tasks were dispatched.
    pub fn schedule<I>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = CacheKey>,
    {
        let mut dispatched = 0;
        for key in keys {
            if self.cache.contains(&key) {
                continue;
            }
            // check-and-insert under one lock keeps duplicates out
            if !self.in_flight.lock().insert(key.clone()) {
                continue;
            }
            log::debug!("[prefetch] queue {}", key);
            self.dispatch(key);
            dispatched += 1;
        }
        dispatched
    }

    fn dispatch(&self, key: CacheKey) {
        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            key,
        };
        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        let failed = Arc::clone(&self.failed);
        let shutdown = self.shutdown.clone();
        let notify = self.notify.clone();

        self.pool.spawn(move || {
            let key = &guard.key;
            if shutdown.is_triggered() {
                return;
            }
            match source.decode(&key.id, key.variant) {
                Ok(decoded) => {
                    failed.lock().remove(key);
                    if cache.put(key.clone(), Arc::new(decoded)) {
                        if let Some(notify) = &notify {
                            notify(key);
                        }
                    }
                }
                Err(e) => {
                    log::debug!("[prefetch] dropped {}: {}", key, e);
                    failed.lock().insert(key.clone());
                }
            }
        });
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.lock().contains(key)
    }

    /// Whether the last background decode of `key` failed.
    pub fn has_failed(&self, key: &CacheKey) -> bool {
        self.failed.lock().contains(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight_count() == 0
    }

    pub fn cache(&self) -> &Arc<ImageCache> {
        &self.cache
    }
}
