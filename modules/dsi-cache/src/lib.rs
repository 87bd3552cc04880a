//! In-process caching layer: the keyword-metric TTL cache and the Quota
//! Manager that tracks per-service daily usage against the durable store.

pub mod quota;
pub mod ttl_cache;

pub use quota::{QuotaLimit, QuotaManager};
pub use ttl_cache::KeywordMetricCache;
