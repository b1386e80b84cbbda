use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ability_core::{
    Ability, AbilityCatalog, AbilityContext, AbilityKind, ActorId, CallbackError, Capabilities,
    DeactivationReason, EngineConfig, ReapSummary, Tick,
};
use ability_runtime::{
    Event, LifecycleEvent, Runtime, RuntimeConfig, RuntimeError, SessionEvent, Topic, UseOutcome,
};

/// Ability that counts its callbacks.
struct Probe {
    key: &'static str,
    kind: AbilityKind,
    period: Option<u64>,
    fail_deactivate: bool,
    activations: AtomicU64,
    ticks: AtomicU64,
    reasons: Mutex<Vec<DeactivationReason>>,
}

impl Probe {
    fn toggle(key: &'static str, period: u64) -> Arc<Self> {
        Arc::new(Self::build(key, AbilityKind::Toggleable, Some(period), false))
    }

    fn brittle_toggle(key: &'static str, period: u64) -> Arc<Self> {
        Arc::new(Self::build(key, AbilityKind::Toggleable, Some(period), true))
    }

    fn instant(key: &'static str) -> Arc<Self> {
        Arc::new(Self::build(key, AbilityKind::Instant, None, false))
    }

    fn build(key: &'static str, kind: AbilityKind, period: Option<u64>, fail: bool) -> Self {
        Self {
            key,
            kind,
            period,
            fail_deactivate: fail,
            activations: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            reasons: Mutex::new(Vec::new()),
        }
    }

    fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    fn reasons(&self) -> Vec<DeactivationReason> {
        self.reasons.lock().unwrap().clone()
    }
}

impl Ability for Probe {
    fn key(&self) -> &str {
        self.key
    }

    fn kind(&self) -> AbilityKind {
        self.kind
    }

    fn capabilities(&self) -> Capabilities {
        match self.kind {
            AbilityKind::Toggleable => Capabilities::TOGGLE,
            _ => Capabilities::ACTIVATABLE,
        }
    }

    fn tick_period(&self) -> Option<u64> {
        self.period
    }

    fn on_activate(&self, _ctx: &AbilityContext) -> Result<(), CallbackError> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_tick(&self, _ctx: &AbilityContext) -> Result<(), CallbackError> {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_deactivate(
        &self,
        _ctx: &AbilityContext,
        reason: DeactivationReason,
    ) -> Result<(), CallbackError> {
        self.reasons.lock().unwrap().push(reason);
        if self.fail_deactivate {
            return Err(CallbackError::msg("parting effect failed"));
        }
        Ok(())
    }
}

struct World {
    cloak: Arc<Probe>,
    aura: Arc<Probe>,
    hex: Arc<Probe>,
    dash: Arc<Probe>,
    runtime: Runtime,
}

async fn world(config: RuntimeConfig) -> World {
    let cloak = Probe::toggle("cloak", 5);
    let aura = Probe::toggle("aura", 2);
    let hex = Probe::brittle_toggle("hex", 3);
    let dash = Probe::instant("dash");

    let mut catalog = AbilityCatalog::new(&config.engine);
    catalog.register_arc(cloak.clone()).unwrap();
    catalog.register_arc(aura.clone()).unwrap();
    catalog.register_arc(hex.clone()).unwrap();
    catalog.register_arc(dash.clone()).unwrap();

    let runtime = Runtime::builder()
        .config(config)
        .catalog(catalog)
        .build()
        .await
        .expect("runtime should build");

    World {
        cloak,
        aura,
        hex,
        dash,
        runtime,
    }
}

#[tokio::test]
async fn cloak_ticks_once_per_period_until_deactivated() {
    let w = world(RuntimeConfig::default()).await;
    let handle = w.runtime.handle();
    let p2 = ActorId::random();

    let outcome = handle.use_ability(p2, "cloak", 0).await.unwrap();
    assert_eq!(outcome, UseOutcome::Toggled { active: true });
    assert!(handle.is_spell_active(p2, "cloak").unwrap());

    handle.step(23).await.unwrap();
    assert_eq!(w.cloak.ticks(), 23 / 5);
    assert_eq!(handle.ticks_fired(p2, "cloak").unwrap(), Some(4));

    let outcome = handle.use_ability(p2, "cloak", 0).await.unwrap();
    assert_eq!(outcome, UseOutcome::Toggled { active: false });

    handle.step(50).await.unwrap();
    assert_eq!(w.cloak.ticks(), 4, "no ticks after deactivation");
    assert_eq!(w.cloak.reasons(), vec![DeactivationReason::Requested]);
    assert_eq!(handle.ticks_fired(p2, "cloak").unwrap(), None);
}

#[tokio::test]
async fn dash_cooldown_gates_reuse() {
    let w = world(RuntimeConfig::default()).await;
    let handle = w.runtime.handle();
    let p1 = ActorId::random();

    assert_eq!(handle.step(100).await.unwrap(), Tick(100));
    assert_eq!(
        handle.use_ability(p1, "dash", 40).await.unwrap(),
        UseOutcome::Used
    );

    handle.step(20).await.unwrap();
    assert!(handle.is_on_cooldown(p1, "dash").unwrap());
    assert_eq!(handle.remaining_ticks(p1, "dash").unwrap(), 20);
    assert_eq!(
        handle.use_ability(p1, "dash", 40).await.unwrap(),
        UseOutcome::OnCooldown { remaining: 20 }
    );

    handle.step(21).await.unwrap();
    assert!(!handle.is_on_cooldown(p1, "dash").unwrap());
    assert_eq!(
        handle.use_ability(p1, "dash", 40).await.unwrap(),
        UseOutcome::Used
    );
    assert_eq!(w.dash.activations.load(Ordering::SeqCst), 2);

    let metrics = handle.metrics();
    assert_eq!(metrics.uses, 2);
    assert_eq!(metrics.cooldown_rejections, 1);
}

#[tokio::test]
async fn cooldown_override_bypasses_gate() {
    let w = world(RuntimeConfig::default()).await;
    let handle = w.runtime.handle();
    let tester = ActorId::random();

    handle.set_cooldown_disabled(tester, true);
    for _ in 0..3 {
        assert_eq!(
            handle.use_ability(tester, "dash", 400).await.unwrap(),
            UseOutcome::Used
        );
    }

    handle.set_cooldown_disabled(tester, false);
    assert!(matches!(
        handle.use_ability(tester, "dash", 400).await.unwrap(),
        UseOutcome::OnCooldown { remaining: 400 }
    ));
}

#[tokio::test]
async fn removing_an_actor_reaps_toggles_and_cooldowns() {
    let w = world(RuntimeConfig::default()).await;
    let handle = w.runtime.handle();
    let actor = ActorId::random();
    let mut session = handle.subscribe(Topic::Session);

    handle.use_ability(actor, "cloak", 0).await.unwrap();
    handle.use_ability(actor, "aura", 0).await.unwrap();
    handle.use_ability(actor, "dash", 40).await.unwrap();
    assert_eq!(handle.active_spell_count(actor), 2);

    let summary = handle.actor_removed(actor).await.unwrap();
    assert_eq!(
        summary,
        ReapSummary {
            deactivated: 2,
            cooldowns_cleared: 1,
        }
    );
    assert_eq!(handle.active_spell_count(actor), 0);
    assert!(!handle.is_on_cooldown(actor, "dash").unwrap());
    assert_eq!(w.cloak.reasons(), vec![DeactivationReason::ActorRemoved]);
    assert_eq!(w.aura.reasons(), vec![DeactivationReason::ActorRemoved]);

    match session.recv().await.unwrap() {
        Event::Session(SessionEvent::ActorReaped { actor: reaped, .. }) => {
            assert_eq!(reaped, actor)
        }
        other => panic!("unexpected event {other:?}"),
    }

    // Duplicate disconnect events are harmless.
    assert_eq!(
        handle.actor_removed(actor).await.unwrap(),
        ReapSummary::default()
    );
    assert_eq!(w.cloak.reasons().len(), 1);
}

#[tokio::test]
async fn failing_deactivate_callback_does_not_block_others() {
    let w = world(RuntimeConfig::default()).await;
    let handle = w.runtime.handle();
    let actor = ActorId::random();
    let mut callbacks = handle.subscribe(Topic::Callback);

    handle.use_ability(actor, "hex", 0).await.unwrap();
    handle.use_ability(actor, "cloak", 0).await.unwrap();

    let summary = handle.actor_removed(actor).await.unwrap();
    assert_eq!(summary.deactivated, 2);
    assert_eq!(handle.active_spell_count(actor), 0);
    assert_eq!(w.hex.reasons().len(), 1);
    assert_eq!(w.cloak.reasons().len(), 1);

    match callbacks.recv().await.unwrap() {
        Event::Callback(event) => {
            assert_eq!(event.ability.as_str(), "hex");
            assert!(!event.panicked);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(handle.metrics().callback_failures, 1);
}

#[tokio::test]
async fn lifecycle_events_follow_transitions() {
    let w = world(RuntimeConfig::default()).await;
    let handle = w.runtime.handle();
    let actor = ActorId::random();
    let mut lifecycle = w.runtime.subscribe(Topic::Lifecycle);

    handle.use_ability(actor, "aura", 0).await.unwrap();
    assert!(handle.deactivate(actor, "aura").await.unwrap());
    assert!(!handle.deactivate(actor, "aura").await.unwrap());

    let first = lifecycle.recv().await.unwrap();
    assert!(matches!(
        first,
        Event::Lifecycle(LifecycleEvent::Activated { .. })
    ));
    let second = lifecycle.recv().await.unwrap();
    assert!(matches!(
        second,
        Event::Lifecycle(LifecycleEvent::Deactivated {
            reason: DeactivationReason::Requested,
            ..
        })
    ));
}

#[tokio::test]
async fn invalid_input_is_distinguished_from_illegal_transitions() {
    let w = world(RuntimeConfig::default()).await;
    let handle = w.runtime.handle();
    let actor = ActorId::random();

    let err = handle.use_ability(actor, "  ", 0).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Engine(ref e) if e.is_invalid_argument()));

    let err = handle.use_ability(actor, "fireball", 0).await.unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownAbility(ref key) if key == "fireball"));

    assert!(handle.is_spell_active(actor, "").is_err());
    assert!(handle.remaining_ticks(actor, " ").is_err());

    // Not an error: deactivating something that is not active.
    assert!(!handle.deactivate(actor, "cloak").await.unwrap());
}

#[tokio::test]
async fn expired_cooldowns_are_purged_periodically() {
    let config = RuntimeConfig {
        engine: EngineConfig {
            cooldown_purge_interval: 10,
            ..EngineConfig::default()
        },
        ..RuntimeConfig::default()
    };
    let w = world(config).await;
    let handle = w.runtime.handle();
    let mut session = handle.subscribe(Topic::Session);

    for _ in 0..3 {
        handle.use_ability(ActorId::random(), "dash", 4).await.unwrap();
    }
    assert_eq!(handle.cooldown_stats().entries, 3);

    handle.step(10).await.unwrap();
    assert_eq!(handle.cooldown_stats().entries, 0);
    assert_eq!(handle.cooldown_stats().actors, 0);

    match session.recv().await.unwrap() {
        Event::Session(SessionEvent::CooldownsPurged { removed, tick }) => {
            assert_eq!(removed, 3);
            assert_eq!(tick, Tick(10));
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_actors_each_get_one_task() {
    let w = world(RuntimeConfig::default()).await;
    let handle = w.runtime.handle();
    let actors: Vec<_> = (0..32).map(|_| ActorId::random()).collect();

    let mut tasks = Vec::new();
    for actor in actors.clone() {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            handle.use_ability(actor, "aura", 0).await.unwrap()
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), UseOutcome::Toggled { active: true });
    }

    assert_eq!(handle.active_actor_count(), 32);
    assert_eq!(handle.total_active(), 32);

    handle.step(4).await.unwrap();
    assert_eq!(w.aura.ticks(), 64);
}

#[tokio::test]
async fn shutdown_deactivates_everything() {
    let w = world(RuntimeConfig::default()).await;
    let handle = w.runtime.handle();

    handle.use_ability(ActorId::random(), "cloak", 0).await.unwrap();
    handle.use_ability(ActorId::random(), "aura", 0).await.unwrap();

    let deactivated = w.runtime.shutdown().await.unwrap();
    assert_eq!(deactivated, 2);
    assert_eq!(w.cloak.reasons(), vec![DeactivationReason::Shutdown]);
    assert_eq!(handle.total_active(), 0);

    let err = handle.step(1).await.unwrap_err();
    assert!(matches!(err, RuntimeError::CommandChannelClosed));
}

#[tokio::test]
async fn real_time_mode_advances_without_steps() {
    let w = world(RuntimeConfig {
        tick_interval: Some(Duration::from_millis(1)),
        ..RuntimeConfig::default()
    })
    .await;
    let handle = w.runtime.handle();

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(handle.now() > Tick::ZERO);
    assert!(handle.metrics().ticks > 0);
}

#[tokio::test]
async fn build_requires_catalog() {
    let err = Runtime::builder().build().await.err().unwrap();
    assert!(matches!(err, RuntimeError::MissingCatalog));
}
