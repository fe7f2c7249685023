/// Re-export `Config` from `genielytics-core` for use within this crate.
///
/// All environment-variable parsing lives in `genielytics-core` so it can be
/// shared with integration tests and future crates without depending on the
/// full server.
pub use genielytics_core::config::Config;
