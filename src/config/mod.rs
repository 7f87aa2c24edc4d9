//! Configuration loading and logging setup.
//!
//! [`Config`] is read from a TOML file (or defaults) and overlaid with credentials from the
//! `FIXTRAIL_TOKENS` environment variable. The command-line layer that drives this crate is
//! expected to call [`Config::load`] once at startup and [`init_logging`] before any work starts.

#[expect(clippy::module_inception, reason = "mirrors the config file it loads")]
mod config;
mod logging;

pub use config::{Config, PAGE_SIZE, TOKENS_ENV_VAR};
pub use logging::{LogLevel, init_logging};
