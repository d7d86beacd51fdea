pub mod browser;
pub mod cleanup;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod install;
pub mod log_sanitize;
pub mod pipeline;
pub mod preflight;
pub mod toolchain;

pub use error::{Error, ErrorKind, Result};
