//! Circuit breaker and retry/backoff primitives every outbound collaborator
//! call in `dsi-pipeline` is wrapped with (§4.3, §4.4).

pub mod circuit_breaker;
pub mod retry;

pub use circuit_breaker::{Admission, CircuitBreakerRegistry};
pub use retry::retry;
