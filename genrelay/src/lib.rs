// Copyright 2026 The Genrelay Project
// SPDX-License-Identifier: Apache-2.0

pub mod client;
pub mod config;
pub mod consumer;
pub mod relay;
pub mod source;
pub mod stream;
pub mod usage;
