pub mod perf {
    //!
    //! A module for performance critical constants which depend on consensus parameters.
    //! The constants in this module should all be revisited if mainnet consensus parameters change.
    //!

    use std::time::Duration;

    /// The default number of threads used for batched signature verification
    const DEFAULT_HEAVY_CHECK_THREADS: usize = 4;

    #[derive(Clone, Debug)]
    pub struct PerfParams {
        /// Number of threads in the heavy check (signature verification) pool
        pub heavy_check_threads: usize,

        /// Batches smaller than this are verified inline on the calling thread
        pub heavy_check_batch_threshold: usize,

        /// Tick period of the background flusher
        pub flush_period: Duration,

        /// Pending writes size above which a commit is forced
        pub max_non_flushed_size: usize,

        /// Pending writes age above which a commit is forced
        pub max_non_flushed_period: Duration,

        /// Interval between events of a local emitter
        pub emit_interval: Duration,

        pub events_cache_size: usize,
        pub vectors_cache_size: usize,
        pub blocks_cache_size: usize,
    }

    pub const PERF_PARAMS: PerfParams = PerfParams {
        heavy_check_threads: DEFAULT_HEAVY_CHECK_THREADS,
        heavy_check_batch_threshold: 8,
        flush_period: Duration::from_millis(10),
        max_non_flushed_size: 20 * 1024 * 1024,
        max_non_flushed_period: Duration::from_secs(30 * 60),
        emit_interval: Duration::from_millis(200),
        events_cache_size: 50_000,
        vectors_cache_size: 50_000,
        blocks_cache_size: 2_000,
    };
}
