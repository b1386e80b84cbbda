//! High-level runtime orchestrator.
//!
//! The runtime owns the simulation worker, wires up the command channel and
//! event bus, and exposes a builder-based API for hosts.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

use ability_core::{AbilityCatalog, EngineConfig};

use crate::api::{EngineHandle, Result, RuntimeError};
use crate::engine::Engine;
use crate::events::{Event, EventBus, Topic};
use crate::workers::{Command, SimulationWorker};

/// Runtime configuration shared across the orchestrator and workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub engine: EngineConfig,
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
    /// Wall-clock period of one tick. `None` means ticks only advance through
    /// [`EngineHandle::step`].
    pub tick_interval: Option<Duration>,
}

impl RuntimeConfig {
    /// Configuration that ticks on its own at the engine's nominal rate.
    pub fn real_time() -> Self {
        Self {
            tick_interval: Some(Duration::from_millis(EngineConfig::MILLIS_PER_TICK)),
            ..Self::default()
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            event_buffer_size: 100,
            command_buffer_size: 32,
            tick_interval: None,
        }
    }
}

/// Main runtime that hosts the ability engine
///
/// Runtime owns the worker; [`EngineHandle`] is the cloneable façade for
/// clients.
pub struct Runtime {
    handle: EngineHandle,
    sim_worker_handle: JoinHandle<()>,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Subscribe to events from a topic
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.handle.subscribe(topic)
    }

    /// Shutdown the runtime gracefully
    ///
    /// Every ACTIVE toggle is deactivated with
    /// [`DeactivationReason::Shutdown`](ability_core::DeactivationReason::Shutdown)
    /// and the scheduler stops accepting work. Returns the number of toggles
    /// that were deactivated.
    pub async fn shutdown(self) -> Result<usize> {
        let deactivated = self.handle.shutdown().await?;
        drop(self.handle);

        self.sim_worker_handle
            .await
            .map_err(RuntimeError::WorkerJoin)?;

        info!(target: "runtime", deactivated, "runtime shut down");
        Ok(deactivated)
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    catalog: Option<AbilityCatalog>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            catalog: None,
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the required ability catalog
    pub fn catalog(mut self, catalog: AbilityCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Tick on a wall-clock interval instead of manual steps
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = Some(interval);
        self
    }

    /// Build the runtime and spawn the simulation worker
    pub async fn build(self) -> Result<Runtime> {
        let catalog = self.catalog.ok_or(RuntimeError::MissingCatalog)?;

        let (command_tx, command_rx) =
            mpsc::channel::<Command>(self.config.command_buffer_size.max(1));
        let bus = EventBus::with_capacity(self.config.event_buffer_size);
        let engine = Arc::new(Engine::new(&self.config.engine, catalog, bus));

        let handle = EngineHandle::new(command_tx, Arc::clone(&engine));

        let sim_worker = SimulationWorker::new(engine, command_rx, self.config.tick_interval);
        let sim_worker_handle = tokio::spawn(async move {
            sim_worker.run().await;
        });

        Ok(Runtime {
            handle,
            sim_worker_handle,
        })
    }
}
