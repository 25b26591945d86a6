use crate::foundation::error::{StereoError, StereoResult};

/// Build a dedicated rayon pool. `None` sizes it to the available cores.
pub(crate) fn build_thread_pool(threads: Option<usize>) -> StereoResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(StereoError::validation("'threads' must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| StereoError::validation(format!("failed to build rayon thread pool: {e}")))
}
