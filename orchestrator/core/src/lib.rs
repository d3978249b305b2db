// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! OpenClaw orchestration core
//!
//! Turns declarative instance/plugin configuration into running Docker
//! containers and keeps the persisted records in sync with live state.
//!
//! # Architecture
//!
//! - **domain:** types, trait seams (runtime, repositories), typed errors
//! - **application:** lifecycle managers and store-coordinating services
//! - **infrastructure:** bollard-backed runtime, in-memory repositories

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
