// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Host port allocation.
//!
//! Instance ports come from the record store (max assigned + 1); plugin ports
//! come from scanning every published port on the host. A plugin port stays
//! reserved inside the allocator from hand-out until the caller releases it,
//! covering the window between the scan and the moment the created container
//! publishes the port; two concurrent installs therefore cannot pick the same
//! free port. Out-of-process actors binding ports in that window are still
//! possible; the engine rejects the eventual collision at container start.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::runtime::{ContainerRuntime, RuntimeError};

/// First host port handed to agent instances.
pub const INSTANCE_PORT_BASE: u16 = 18790;

/// Next instance port given every port already assigned in the record store.
/// Ports freed by deletion are not reused; the top of the port space pins.
pub fn next_instance_port(existing: &[u16]) -> u16 {
    existing
        .iter()
        .copied()
        .max()
        .map(|max| max.checked_add(1).unwrap_or(u16::MAX))
        .unwrap_or(INSTANCE_PORT_BASE)
}

/// Serialized free-port finder for plugin installs.
pub struct PortAllocator {
    runtime: Arc<dyn ContainerRuntime>,
    reserved: Mutex<HashSet<u16>>,
}

impl PortAllocator {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self {
            runtime,
            reserved: Mutex::new(HashSet::new()),
        }
    }

    /// First host port >= `start` neither published by any container
    /// (running or stopped) nor reserved by an in-flight install. The port
    /// stays reserved until [`PortAllocator::release`].
    pub async fn next_free_port(&self, start: u16) -> Result<u16, RuntimeError> {
        let mut reserved = self.reserved.lock().await;
        let taken = self.runtime.published_ports().await?;
        let mut candidate = start;
        while taken.contains(&candidate) || reserved.contains(&candidate) {
            candidate = candidate.checked_add(1).ok_or_else(|| {
                RuntimeError::OperationFailed("host port space exhausted".to_string())
            })?;
        }
        reserved.insert(candidate);
        debug!(port = candidate, "reserved host port");
        Ok(candidate)
    }

    /// Drop a reservation once the install finished: on success the created
    /// container publishes the port and the scan covers it, on failure the
    /// port is free again.
    pub async fn release(&self, port: u16) {
        self.reserved.lock().await.remove(&port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_instance_starts_at_the_base_port() {
        assert_eq!(next_instance_port(&[]), INSTANCE_PORT_BASE);
    }

    #[test]
    fn next_instance_port_is_one_past_the_maximum() {
        assert_eq!(next_instance_port(&[18790, 18791, 18792]), 18793);
        // Gaps from deleted instances are not reused.
        assert_eq!(next_instance_port(&[18790, 18795]), 18796);
    }

    #[test]
    fn top_of_the_port_space_pins_instead_of_wrapping() {
        assert_eq!(next_instance_port(&[u16::MAX]), u16::MAX);
        assert_eq!(next_instance_port(&[18790, u16::MAX - 1]), u16::MAX);
    }
}
