pub mod analytics_impl;
pub mod backend;
pub mod events;
pub mod favorites;
pub mod queries;
pub mod schema;
pub mod session;

pub use backend::PgBackend;

/// Re-export the `sqlx` crate so consumers (especially integration tests)
/// can run ad-hoc queries without an extra dependency.
pub use sqlx;
