//! # Core Runtime Module
//!
//! Ambient infrastructure shared by the File API crates:
//! - Configuration of the host helper script location
//! - Logging and tracing initialisation
//!
//! ## Overview
//!
//! Nothing in here talks to the host. The binding layer (`core-fileapi`)
//! reads [`FileApiOptions`](config::FileApiOptions) to know which helper
//! module to import, and embedders call
//! [`init_logging`](logging::init_logging) once at startup.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{FileApiOptions, FileApiOptionsBuilder};
pub use error::{Error, Result};
pub use logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
