use once_cell::sync::OnceCell;
use rayon::ThreadPoolBuilder;
use std::sync::Arc;

static THREAD_POOL: OnceCell<Arc<rayon::ThreadPool>> = OnceCell::new();

/// Upper bound on hashing workers when the config asks for "auto" (0).
const DEFAULT_MAX_THREADS: usize = 8;

/// Initialize the global hashing pool with the specified number of threads
///
/// # Errors
///
/// Returns an error if the pool cannot be built or was already initialized
pub fn init_thread_pool(num_threads: usize) -> anyhow::Result<()> {
    let pool = build_pool(num_threads)?;

    THREAD_POOL
        .set(Arc::new(pool))
        .map_err(|_| anyhow::anyhow!("Thread pool already initialized"))?;

    Ok(())
}

fn build_pool(num_threads: usize) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("snaptrack-hash-{i}"))
        .build()
}

/// Get the global hashing pool, building it with default settings if needed.
///
/// Returns `None` only if the OS refused to spawn worker threads; callers then
/// fall back to rayon's implicit global pool.
pub fn get_thread_pool() -> Option<Arc<rayon::ThreadPool>> {
    THREAD_POOL
        .get_or_try_init(|| build_pool(num_cpus::get().min(DEFAULT_MAX_THREADS)).map(Arc::new))
        .ok()
        .cloned()
}

/// Run a function in the configured thread pool
pub fn run_in_pool<F, R>(f: F) -> R
where
    F: FnOnce() -> R + Send,
    R: Send,
{
    match get_thread_pool() {
        Some(pool) => pool.install(f),
        None => f(),
    }
}

/// Configure the pool from the `[performance]` section.
///
/// A value of 0 leaves the default (cpu count, capped at 8).
///
/// # Errors
///
/// Returns an error if the thread pool has already been initialized
pub fn configure_from_config(config: &crate::config::Config) -> anyhow::Result<()> {
    if config.performance.parallel_threads > 0 {
        init_thread_pool(config.performance.parallel_threads.min(num_cpus::get().max(1)))?;
    }
    Ok(())
}

mod num_cpus {
    use std::sync::LazyLock;

    static NUM_CPUS: LazyLock<usize> = LazyLock::new(|| {
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
    });

    pub fn get() -> usize {
        *NUM_CPUS
    }
}
