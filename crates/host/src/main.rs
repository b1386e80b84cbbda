//! Ability engine host binary.
//!
//! Composition root that loads configuration, installs logging, registers
//! the sample catalog and drives a short scripted session against the
//! runtime.
//!
//! ```bash
//! ABILITY_LOG_DIR= RUST_LOG=debug cargo run -p ability-host
//! ```
mod abilities;
mod config;

use std::path::Path;

use ability_core::{AbilityCatalog, ActorId, EngineConfig};
use ability_runtime::{EngineHandle, Runtime, Topic};
use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::HostConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = HostConfig::from_env();
    let _guard = setup_logging(config.log_dir.as_deref())?;

    tracing::info!(
        tick_interval = ?config.runtime.tick_interval,
        purge_interval = config.runtime.engine.cooldown_purge_interval,
        "starting ability host"
    );

    let mut catalog = AbilityCatalog::new(&config.runtime.engine);
    abilities::sample_catalog(&mut catalog)?;

    let runtime = Runtime::builder()
        .config(config.runtime.clone())
        .catalog(catalog)
        .build()
        .await?;

    let handle = runtime.handle();
    spawn_event_logger(&handle);

    run_session(&handle, config.idle_ticks).await?;

    let metrics = handle.metrics();
    println!("{}", serde_json::to_string_pretty(&metrics)?);

    let deactivated = runtime.shutdown().await?;
    tracing::info!(deactivated, "host shutdown complete");
    Ok(())
}

/// Two players, one cooldown-gated dash and a pair of toggles.
async fn run_session(handle: &EngineHandle, idle_ticks: u64) -> Result<()> {
    let p1 = ActorId::random();
    let p2 = ActorId::random();
    let dash_cooldown = EngineConfig::ticks_from_millis(2_000);

    let outcome = handle.use_ability(p1, "dash", dash_cooldown).await?;
    tracing::info!(actor = %p1, ?outcome, "first dash");

    let outcome = handle.use_ability(p1, "dash", dash_cooldown).await?;
    tracing::info!(actor = %p1, ?outcome, "second dash");

    handle.use_ability(p2, "cloak", 0).await?;
    handle.use_ability(p2, "regen-aura", 0).await?;

    // Only one caster may hold the aura.
    let outcome = handle.use_ability(p1, "regen-aura", 0).await?;
    tracing::info!(actor = %p1, ?outcome, "aura contested");

    handle.step(idle_ticks).await?;
    let cloak_pulses = handle.ticks_fired(p2, "cloak")?;
    tracing::info!(
        actor = %p2,
        ?cloak_pulses,
        active = handle.active_spell_count(p2),
        "after idle"
    );

    handle.step(dash_cooldown).await?;
    let outcome = handle.use_ability(p1, "dash", dash_cooldown).await?;
    tracing::info!(actor = %p1, ?outcome, "dash after cooldown");

    let summary = handle.actor_removed(p2).await?;
    tracing::info!(actor = %p2, ?summary, "player disconnected");

    let outcome = handle.use_ability(p1, "regen-aura", 0).await?;
    tracing::info!(actor = %p1, ?outcome, "aura after disconnect");

    handle.step(idle_ticks).await?;
    Ok(())
}

fn spawn_event_logger(handle: &EngineHandle) {
    let topics = [Topic::Lifecycle, Topic::Session, Topic::Callback];
    for (topic, mut rx) in handle.subscribe_multiple(&topics) {
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => tracing::debug!(target: "host::events", %topic, "{json}"),
                        Err(error) => {
                            tracing::warn!(target: "host::events", %error, "unserializable event")
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(target: "host::events", %topic, skipped, "event logger lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}

/// Install the stderr layer and, with a log directory, a file layer.
///
/// The returned guard flushes the file writer when dropped.
fn setup_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let Some(dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
        return Ok(None);
    };

    std::fs::create_dir_all(dir)?;
    let file_appender = tracing_appender::rolling::daily(dir, "ability-host.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    tracing::info!("Log file: {}/ability-host.log", dir.display());
    Ok(Some(guard))
}
