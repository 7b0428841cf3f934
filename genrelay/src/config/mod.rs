// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

// Config loader and validator
//
// Loads genrelay.yaml, validates structure, resolves variable
// interpolation, applies defaults, and computes a config hash.

mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use error::ConfigError;
pub use interpolation::{resolve_variables, resolve_with};
pub use loader::load_config;
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::*;
