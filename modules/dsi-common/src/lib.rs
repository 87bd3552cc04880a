//! Shared vocabulary for the digital-landscape analytics pipeline.
//!
//! Every other crate in the workspace depends on this one for the row types
//! the State Store persists, the error taxonomy outbound calls are classified
//! against, and the layered configuration model.

pub mod config;
pub mod convert;
pub mod domain;
pub mod error;
mod sqlx_rows;
pub mod types;

pub use config::{PipelineConfig, RequestOverride};
pub use domain::normalize_domain;
pub use error::{Classification, PipelineError};
pub use types::*;
