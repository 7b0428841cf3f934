// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use super::error::ConfigError;

/// Where config YAML comes from.
pub trait ConfigSource {
    /// Human-readable origin for error messages and logs.
    fn origin(&self) -> String;

    fn load(&self) -> Result<String, ConfigError>;
}

/// Config file on disk.
pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigSource for FileSource {
    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<String, ConfigError> {
        std::fs::read_to_string(&self.path).map_err(|source| ConfigError::IoError {
            origin: self.origin(),
            source,
        })
    }
}

/// In-memory YAML, for tests and embedded defaults.
pub struct StringSource {
    pub content: String,
}

impl StringSource {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

impl ConfigSource for StringSource {
    fn origin(&self) -> String {
        "<inline>".to_string()
    }

    fn load(&self) -> Result<String, ConfigError> {
        Ok(self.content.clone())
    }
}
