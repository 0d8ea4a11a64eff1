// Cache traffic counters
pub const CACHE_HIT_COUNTER: &str = "cache_aside_hits_total";
pub const CACHE_MISS_COUNTER: &str = "cache_aside_misses_total";
pub const CACHE_EVICTION_COUNTER: &str = "cache_aside_evictions_total";

// Failure counters
pub const CACHE_WRITE_FAILURE_COUNTER: &str = "cache_aside_write_failures_total";
pub const STORE_UNAVAILABLE_COUNTER: &str = "cache_aside_store_unavailable_total";
