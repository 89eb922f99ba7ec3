//! Thread pool ownership.
//!
//! The pipeline never touches rayon's implicit global pool: a `PipelineFactory`
//! builds one `rayon::ThreadPool` and every stage call runs inside
//! `pool.install(...)`, so the pool's lifetime is explicit and scoped to
//! whoever constructed the factory, not to the process.

use std::sync::Arc;

use rayon::ThreadPool;

use crate::error::{CoreError, CoreResult};

/// How many worker threads the pipeline's thread pool should use.
#[derive(Debug, Clone, Copy)]
pub enum ThreadPoolConfig {
    /// One thread per logical core, rayon's default.
    Auto,
    /// Exactly `n` worker threads.
    Fixed(usize),
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        ThreadPoolConfig::Auto
    }
}

/// Owns the pipeline's work-stealing thread pool and hands it to each stage.
///
/// Constructing a `PipelineFactory` is the one place a thread pool gets
/// created; `vectorize()` takes a `&PipelineFactory` rather than building its
/// own pool, so a long-lived service process can build one factory at
/// startup and reuse it for every request.
pub struct PipelineFactory {
    pool: Arc<ThreadPool>,
}

impl PipelineFactory {
    pub fn new(config: ThreadPoolConfig) -> CoreResult<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let ThreadPoolConfig::Fixed(n) = config {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| CoreError::internal("thread_pool_build", e.to_string()))?;
        Ok(Self { pool: Arc::new(pool) })
    }

    /// Runs `f` inside this factory's thread pool so that any `rayon`
    /// parallel iterators `f` uses are scheduled on it rather than the
    /// global pool.
    pub fn install<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(f)
    }

    pub fn current_num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

impl Default for PipelineFactory {
    fn default() -> Self {
        Self::new(ThreadPoolConfig::Auto).expect("default thread pool construction cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_runs_work_on_its_own_pool() {
        let factory = PipelineFactory::new(ThreadPoolConfig::Fixed(2)).unwrap();
        assert_eq!(factory.current_num_threads(), 2);
        let sum: i32 = factory.install(|| (0..100).sum());
        assert_eq!(sum, 4950);
    }
}
