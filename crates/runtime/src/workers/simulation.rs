//! Simulation worker that owns the authoritative tick.
//!
//! Receives commands from [`EngineHandle`](crate::EngineHandle) and advances
//! the [`TickScheduler`](crate::TickScheduler), so every ability callback runs
//! on this task, one at a time.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

use ability_core::{ActorId, ReapSummary, Tick};

use crate::api::Result;
use crate::engine::{Engine, UseOutcome};

/// Commands that can be sent to the simulation worker
pub enum Command {
    /// Cooldown gate, toggle or fire, then set the cooldown.
    UseAbility {
        actor: ActorId,
        ability: String,
        cooldown_ticks: u64,
        reply: oneshot::Sender<Result<UseOutcome>>,
    },
    /// Deactivate a toggle if it is ACTIVE.
    Deactivate {
        actor: ActorId,
        ability: String,
        reply: oneshot::Sender<Result<bool>>,
    },
    /// Tear down all state of a removed actor.
    ActorRemoved {
        actor: ActorId,
        reply: oneshot::Sender<ReapSummary>,
    },
    /// Advance the clock by a number of ticks.
    Step {
        ticks: u64,
        reply: oneshot::Sender<Tick>,
    },
    /// Deactivate everything and stop the worker.
    Shutdown { reply: oneshot::Sender<usize> },
}

/// Background task that processes engine commands and ticks.
pub struct SimulationWorker {
    engine: Arc<Engine>,
    command_rx: mpsc::Receiver<Command>,
    tick_interval: Option<Duration>,
}

impl SimulationWorker {
    pub(crate) fn new(
        engine: Arc<Engine>,
        command_rx: mpsc::Receiver<Command>,
        tick_interval: Option<Duration>,
    ) -> Self {
        info!(
            target: "runtime::worker",
            abilities = engine.catalog().len(),
            tick_interval_ms = tick_interval.map(|d| d.as_millis() as u64),
            "SimulationWorker initialized"
        );

        Self {
            engine,
            command_rx,
            tick_interval,
        }
    }

    /// Main worker loop.
    ///
    /// Exits on [`Command::Shutdown`] or once every handle has been dropped.
    pub async fn run(mut self) {
        let mut ticker = self.tick_interval.map(|period| {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            ticker
        });

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => {
                        let deactivated = self.engine.shutdown();
                        if reply.send(deactivated).is_err() {
                            debug!(target: "runtime::worker", "Shutdown reply channel closed (caller dropped)");
                        }
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        self.engine.shutdown();
                        break;
                    }
                },
                _ = next_tick(&mut ticker) => {
                    self.engine.tick();
                }
            }
        }

        info!(
            target: "runtime::worker",
            tick = self.engine.now().get(),
            "SimulationWorker stopped"
        );
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::UseAbility {
                actor,
                ability,
                cooldown_ticks,
                reply,
            } => {
                let result = self.engine.use_ability(actor, &ability, cooldown_ticks);
                if reply.send(result).is_err() {
                    debug!(target: "runtime::worker", "UseAbility reply channel closed (caller dropped)");
                }
            }
            Command::Deactivate {
                actor,
                ability,
                reply,
            } => {
                let result = self.engine.deactivate(actor, &ability);
                if reply.send(result).is_err() {
                    debug!(target: "runtime::worker", "Deactivate reply channel closed (caller dropped)");
                }
            }
            Command::ActorRemoved { actor, reply } => {
                let summary = self.engine.actor_removed(actor);
                if reply.send(summary).is_err() {
                    debug!(target: "runtime::worker", "ActorRemoved reply channel closed (caller dropped)");
                }
            }
            Command::Step { ticks, reply } => {
                let mut now = self.engine.now();
                for _ in 0..ticks {
                    now = self.engine.tick();
                }
                if reply.send(now).is_err() {
                    debug!(target: "runtime::worker", "Step reply channel closed (caller dropped)");
                }
            }
            Command::Shutdown { .. } => {}
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
