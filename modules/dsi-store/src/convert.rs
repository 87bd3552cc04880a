//! Re-exports of the string<->enum conversions shared by the per-table
//! modules. The conversions themselves live in `dsi_common::convert` so that
//! the `sqlx::FromRow` impls for `dsi-common` row types (which must live in
//! `dsi-common` per Rust's orphan rule) can use them too.

pub use dsi_common::convert::*;
