// Copyright 2026 damlog Contributors
// SPDX-License-Identifier: Apache-2.0

//! damlog runtime library: browser acquisition, store client, pipeline
//! orchestration and the HTTP surface around the `damlog` core.
//!
//! This library crate exposes the runtime modules for the binary and for
//! integration testing.

pub mod acquisition;
pub mod audit;
pub mod cli;
pub mod config;
pub mod pipeline;
pub mod renderer;
pub mod rest;
pub mod store;
