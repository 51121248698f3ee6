//! Host configuration.

use std::fmt;
use std::sync::Arc;

use bridge_traits::{AccessMode, Clock, SystemClock};

/// Bytes per `progress` event and per stream chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Tunables of a [`MemoryHost`](crate::MemoryHost).
#[derive(Clone)]
pub struct MemoryHostConfig {
    /// Access mode reported to the binding layer.
    pub access_mode: AccessMode,
    /// Read granularity for progress events and streams. Never 0.
    pub chunk_size: usize,
    /// Yield to the scheduler once per call, as a cross-boundary host would.
    pub simulate_latency: bool,
    /// Source of `lastModified` defaults and event timestamps.
    pub clock: Arc<dyn Clock>,
}

impl Default for MemoryHostConfig {
    fn default() -> Self {
        Self {
            access_mode: AccessMode::Remote,
            chunk_size: DEFAULT_CHUNK_SIZE,
            simulate_latency: true,
            clock: Arc::new(SystemClock),
        }
    }
}

impl MemoryHostConfig {
    /// Every call suspends at least once.
    pub fn remote() -> Self {
        Self::default()
    }

    /// Calls complete without suspending.
    pub fn direct() -> Self {
        Self {
            access_mode: AccessMode::Direct,
            simulate_latency: false,
            ..Self::default()
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_latency(mut self, simulate: bool) -> Self {
        self.simulate_latency = simulate;
        self
    }
}

impl fmt::Debug for MemoryHostConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryHostConfig")
            .field("access_mode", &self.access_mode)
            .field("chunk_size", &self.chunk_size)
            .field("simulate_latency", &self.simulate_latency)
            .finish()
    }
}
