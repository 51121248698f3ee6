//! # File API Configuration
//!
//! Tells the binding layer where the host-side helper script lives.
//!
//! ## Overview
//!
//! The helper module is a small script exposing `getAttribute`,
//! `constructBlob`, `registerEventHandlers` and friends. Hosts load it with a
//! dynamic `import` of [`FileApiOptions::full_script_path`], which joins a
//! base path and a script path. Defaults point at the conventional
//! per-package asset location:
//!
//! ```text
//! ./_content/ + fileapi/fileapi.js  =>  ./_content/fileapi/fileapi.js
//! ```
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::FileApiOptions;
//!
//! let options = FileApiOptions::builder()
//!     .base_path("/static/")
//!     .script_path("js/fileapi.js")
//!     .build()
//!     .expect("valid options");
//!
//! assert_eq!(options.full_script_path(), "/static/js/fileapi.js");
//! ```
//!
//! Options can also be read from JSON, missing keys falling back to the
//! defaults:
//!
//! ```
//! use core_runtime::config::FileApiOptions;
//!
//! let options = FileApiOptions::from_json(r#"{ "basePath": "./assets/" }"#).unwrap();
//! assert_eq!(options.full_script_path(), "./assets/fileapi/fileapi.js");
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default directory static package assets are served from.
pub const DEFAULT_BASE_PATH: &str = "./_content/";

/// Package namespace the helper script is published under.
pub const DEFAULT_NAMESPACE: &str = "fileapi";

/// Location of the helper script below [`DEFAULT_BASE_PATH`].
pub const DEFAULT_SCRIPT_PATH: &str = "fileapi/fileapi.js";

/// Location of the host helper module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileApiOptions {
    /// Directory (or URL prefix) the script path is resolved against.
    pub base_path: String,

    /// Script location relative to `base_path`. A rooted path or an absolute
    /// URL replaces the base entirely.
    pub script_path: String,
}

impl Default for FileApiOptions {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            script_path: DEFAULT_SCRIPT_PATH.to_string(),
        }
    }
}

impl FileApiOptions {
    /// Creates a new builder for constructing `FileApiOptions`.
    pub fn builder() -> FileApiOptionsBuilder {
        FileApiOptionsBuilder::default()
    }

    /// Parses options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: FileApiOptions = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid File API options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// The resolvable path handed to the host's `import`.
    pub fn full_script_path(&self) -> String {
        let script = self.script_path.as_str();
        if self.base_path.is_empty() || is_rooted(script) {
            return script.to_string();
        }

        if self.base_path.ends_with('/') || self.base_path.ends_with('\\') {
            format!("{}{}", self.base_path, script)
        } else {
            format!("{}/{}", self.base_path, script)
        }
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.script_path.trim().is_empty() {
            return Err(Error::Config("Script path cannot be empty".to_string()));
        }

        if self.script_path.ends_with('/') {
            return Err(Error::Config(format!(
                "Script path must name a file, got directory '{}'",
                self.script_path
            )));
        }

        Ok(())
    }
}

fn is_rooted(path: &str) -> bool {
    path.starts_with('/') || path.starts_with('\\') || path.contains("://")
}

/// Builder for [`FileApiOptions`].
#[derive(Debug, Default)]
pub struct FileApiOptionsBuilder {
    base_path: Option<String>,
    script_path: Option<String>,
}

impl FileApiOptionsBuilder {
    /// Sets the base path. Default: [`DEFAULT_BASE_PATH`].
    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the script path. Default: [`DEFAULT_SCRIPT_PATH`].
    pub fn script_path(mut self, path: impl Into<String>) -> Self {
        self.script_path = Some(path.into());
        self
    }

    /// Builds and validates the options.
    pub fn build(self) -> Result<FileApiOptions> {
        let defaults = FileApiOptions::default();
        let options = FileApiOptions {
            base_path: self.base_path.unwrap_or(defaults.base_path),
            script_path: self.script_path.unwrap_or(defaults.script_path),
        };
        options.validate()?;
        Ok(options)
    }
}
