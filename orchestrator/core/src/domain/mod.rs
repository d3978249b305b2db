// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod config;
pub mod instance;
pub mod plugin;
pub mod registry;
pub mod repository;
pub mod runtime;

pub use config::*;
pub use instance::*;
pub use plugin::*;
pub use registry::*;
pub use repository::*;
pub use runtime::*;
