//! End-to-end tests for the engine actor: gesture classification, timer and
//! watchdog behavior, wake pairing, and matcher integration. All tests run
//! on a paused tokio clock, so the sleeps below are virtual and the tests
//! are deterministic.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, AtomicUsize, Ordering},
    },
    time::Duration,
};

use config::{
    CustomKeybind, KeybindRegistry, KeybindStep, ThresholdHandle, Thresholds,
};
use tokio::{sync::mpsc, time::sleep};
use volkey_engine::{Engine, WAKE_SAFETY_CEILING, WakeError, WakeSource};
use volkey_protocol::{
    GestureEvent,
    HardwareKey::{VolumeDown, VolumeUp},
    KeyTransition, KeybindId,
};

/// Threshold handle with explicit values for up/down/combo.
fn thresholds(up: u64, down: u64, combo: u64) -> ThresholdHandle {
    ThresholdHandle::new(Thresholds {
        volume_up_long_press_ms: up,
        volume_down_long_press_ms: down,
        combo_long_press_ms: combo,
    })
}

fn engine_with(
    th: ThresholdHandle,
    registry: KeybindRegistry,
) -> (Engine, mpsc::UnboundedReceiver<GestureEvent>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    let (tx, rx) = mpsc::unbounded_channel();
    (Engine::new(th, registry, tx), rx)
}

fn engine(th: ThresholdHandle) -> (Engine, mpsc::UnboundedReceiver<GestureEvent>) {
    engine_with(th, KeybindRegistry::default())
}

/// Collect everything currently queued on the event channel.
fn drain(rx: &mut mpsc::UnboundedReceiver<GestureEvent>) -> Vec<GestureEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        out.push(ev);
    }
    out
}

async fn ms(n: u64) {
    sleep(Duration::from_millis(n)).await;
}

#[tokio::test(start_paused = true)]
async fn short_press_is_passthrough() {
    let (engine, mut rx) = engine(thresholds(600, 600, 600));

    assert!(engine.dispatch(KeyTransition::down(VolumeUp, 0)).await.unwrap());
    ms(100).await;
    assert!(engine.dispatch(KeyTransition::up(VolumeUp, 100)).await.unwrap());
    assert_eq!(drain(&mut rx), vec![GestureEvent::ShortPress(VolumeUp)]);

    // The cancelled long-press timer never fires late.
    ms(1000).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn long_press_fires_at_threshold_and_release_is_silent() {
    let (engine, mut rx) = engine(thresholds(600, 600, 600));

    engine.dispatch(KeyTransition::down(VolumeUp, 0)).await.unwrap();
    ms(500).await;
    assert!(drain(&mut rx).is_empty());
    ms(150).await;
    assert_eq!(drain(&mut rx), vec![GestureEvent::LongPress(VolumeUp)]);

    // The UP after a fired action is a no-op, not a short press.
    engine.dispatch(KeyTransition::up(VolumeUp, 700)).await.unwrap();
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn release_at_threshold_boundary_cancels_timer() {
    let (engine, mut rx) = engine(thresholds(600, 600, 600));

    engine.dispatch(KeyTransition::down(VolumeDown, 0)).await.unwrap();
    ms(500).await;
    engine.dispatch(KeyTransition::up(VolumeDown, 500)).await.unwrap();
    assert_eq!(drain(&mut rx), vec![GestureEvent::ShortPress(VolumeDown)]);
    ms(300).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn combo_long_press_suppresses_single_key_actions() {
    let (engine, mut rx) = engine(thresholds(600, 600, 500));

    engine.dispatch(KeyTransition::down(VolumeUp, 0)).await.unwrap();
    ms(50).await;
    engine.dispatch(KeyTransition::down(VolumeDown, 50)).await.unwrap();
    ms(650).await;
    assert_eq!(drain(&mut rx), vec![GestureEvent::ComboLongPress]);

    // Releases after a fired combo stay silent.
    engine.dispatch(KeyTransition::up(VolumeUp, 800)).await.unwrap();
    engine.dispatch(KeyTransition::up(VolumeDown, 850)).await.unwrap();
    ms(1000).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn abandoned_combo_yields_exactly_one_short_press_per_key() {
    let (engine, mut rx) = engine(thresholds(600, 600, 500));

    engine.dispatch(KeyTransition::down(VolumeUp, 0)).await.unwrap();
    ms(50).await;
    engine.dispatch(KeyTransition::down(VolumeDown, 50)).await.unwrap();
    ms(100).await;
    engine.dispatch(KeyTransition::up(VolumeDown, 150)).await.unwrap();
    assert_eq!(drain(&mut rx), vec![GestureEvent::ShortPress(VolumeDown)]);

    // VolumeUp's single-key timer was cancelled when the pair armed the
    // combo, so holding it long past its threshold fires nothing...
    ms(700).await;
    assert!(drain(&mut rx).is_empty());

    // ...and its unfired release is still a short press.
    engine.dispatch(KeyTransition::up(VolumeUp, 850)).await.unwrap();
    assert_eq!(drain(&mut rx), vec![GestureEvent::ShortPress(VolumeUp)]);
}

#[tokio::test(start_paused = true)]
async fn auto_repeat_does_not_rearm_long_press_timer() {
    let (engine, mut rx) = engine(thresholds(600, 600, 600));

    engine.dispatch(KeyTransition::down(VolumeUp, 0)).await.unwrap();
    ms(400).await;
    engine.dispatch(KeyTransition::repeat(VolumeUp, 400)).await.unwrap();
    ms(100).await;
    assert!(drain(&mut rx).is_empty());
    // Fires at the original 600ms deadline; a re-arm would push it to 1000.
    ms(150).await;
    assert_eq!(drain(&mut rx), vec![GestureEvent::LongPress(VolumeUp)]);
}

#[tokio::test(start_paused = true)]
async fn auto_repeat_does_not_reset_watchdog() {
    // Thresholds far beyond the watchdog so only it can fire.
    let (engine, mut rx) = engine(thresholds(10_000, 10_000, 10_000));

    engine.dispatch(KeyTransition::down(VolumeUp, 0)).await.unwrap();
    ms(1000).await;
    engine.dispatch(KeyTransition::repeat(VolumeUp, 1000)).await.unwrap();
    ms(1000).await;
    engine.dispatch(KeyTransition::repeat(VolumeUp, 2000)).await.unwrap();
    ms(900).await;
    engine.dispatch(KeyTransition::repeat(VolumeUp, 2900)).await.unwrap();

    // Watchdog armed at the first DOWN expires at 3000 despite the repeats.
    // The first detection resets silently.
    ms(200).await;
    assert!(drain(&mut rx).is_empty());

    // The key was force-reset to idle, so its (lost) release is a no-op.
    engine.dispatch(KeyTransition::up(VolumeUp, 3100)).await.unwrap();
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn two_consecutive_watchdog_timeouts_signal_interception() {
    let (engine, mut rx) = engine(thresholds(10_000, 10_000, 10_000));

    engine.dispatch(KeyTransition::down(VolumeUp, 0)).await.unwrap();
    ms(3100).await;
    assert!(drain(&mut rx).is_empty());

    engine.dispatch(KeyTransition::down(VolumeUp, 3100)).await.unwrap();
    ms(3100).await;
    assert_eq!(drain(&mut rx), vec![GestureEvent::SystemInterception]);

    // The streak was reset to zero, so a third lost release is silent again.
    engine.dispatch(KeyTransition::down(VolumeUp, 6200)).await.unwrap();
    ms(3100).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn real_release_resets_interception_streak() {
    let (engine, mut rx) = engine(thresholds(10_000, 10_000, 10_000));

    engine.dispatch(KeyTransition::down(VolumeUp, 0)).await.unwrap();
    ms(3100).await;
    assert!(drain(&mut rx).is_empty());

    // A normal press/release cycle in between clears the streak.
    engine.dispatch(KeyTransition::down(VolumeUp, 3100)).await.unwrap();
    ms(100).await;
    engine.dispatch(KeyTransition::up(VolumeUp, 3200)).await.unwrap();
    assert_eq!(drain(&mut rx), vec![GestureEvent::ShortPress(VolumeUp)]);

    engine.dispatch(KeyTransition::down(VolumeUp, 3300)).await.unwrap();
    ms(3100).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn thresholds_are_read_when_the_timer_is_armed() {
    let handle = thresholds(600, 600, 600);
    let (engine, mut rx) = engine(handle.clone());

    engine.dispatch(KeyTransition::down(VolumeUp, 0)).await.unwrap();
    ms(100).await;
    // Mid-press edit: the already-armed timer keeps its 600ms deadline.
    handle.update(|t| t.volume_up_long_press_ms = 200);
    ms(550).await;
    assert_eq!(drain(&mut rx), vec![GestureEvent::LongPress(VolumeUp)]);
    engine.dispatch(KeyTransition::up(VolumeUp, 650)).await.unwrap();

    // The next press picks up the new value.
    engine.dispatch(KeyTransition::down(VolumeUp, 1000)).await.unwrap();
    ms(250).await;
    assert_eq!(drain(&mut rx), vec![GestureEvent::LongPress(VolumeUp)]);
    engine.dispatch(KeyTransition::up(VolumeUp, 1250)).await.unwrap();
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn zero_thresholds_still_classify_and_recover() {
    let (engine, mut rx) = engine(thresholds(0, 0, 0));

    // Floored to 1ms: any hold becomes a long press almost immediately.
    engine.dispatch(KeyTransition::down(VolumeUp, 0)).await.unwrap();
    ms(10).await;
    assert_eq!(drain(&mut rx), vec![GestureEvent::LongPress(VolumeUp)]);
    engine.dispatch(KeyTransition::up(VolumeUp, 10)).await.unwrap();
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test(start_paused = true)]
async fn out_of_order_up_is_consumed_but_inert() {
    let (engine, mut rx) = engine(thresholds(600, 600, 600));
    assert!(engine.dispatch(KeyTransition::up(VolumeUp, 0)).await.unwrap());
    ms(100).await;
    assert!(drain(&mut rx).is_empty());
}

/// Wake source that counts acquire/release calls and records the ceiling.
#[derive(Default)]
struct CountingWake {
    acquires: AtomicUsize,
    releases: AtomicUsize,
    last_ceiling_ms: AtomicU64,
}

impl WakeSource for CountingWake {
    fn acquire(&self, ceiling: Duration) -> Result<(), WakeError> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        self.last_ceiling_ms
            .store(ceiling.as_millis() as u64, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) -> Result<(), WakeError> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn wake_token_spans_the_press_cycle() {
    let wake = Arc::new(CountingWake::default());
    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = Engine::with_wake(
        thresholds(600, 600, 500),
        KeybindRegistry::default(),
        tx,
        wake.clone(),
    );

    // One short press: one acquire, one release, with the safety ceiling.
    engine.dispatch(KeyTransition::down(VolumeUp, 0)).await.unwrap();
    ms(100).await;
    engine.dispatch(KeyTransition::up(VolumeUp, 100)).await.unwrap();
    assert_eq!(wake.acquires.load(Ordering::SeqCst), 1);
    assert_eq!(wake.releases.load(Ordering::SeqCst), 1);
    assert_eq!(
        wake.last_ceiling_ms.load(Ordering::SeqCst),
        WAKE_SAFETY_CEILING.as_millis() as u64
    );

    // A combo cycle acquires once on the first DOWN and releases once the
    // second key comes up.
    engine.dispatch(KeyTransition::down(VolumeUp, 1000)).await.unwrap();
    ms(50).await;
    engine.dispatch(KeyTransition::down(VolumeDown, 1050)).await.unwrap();
    assert_eq!(wake.acquires.load(Ordering::SeqCst), 2);
    ms(100).await;
    engine.dispatch(KeyTransition::up(VolumeUp, 1150)).await.unwrap();
    assert_eq!(wake.releases.load(Ordering::SeqCst), 1);
    engine.dispatch(KeyTransition::up(VolumeDown, 1200)).await.unwrap();
    assert_eq!(wake.releases.load(Ordering::SeqCst), 2);

    // A watchdog reset also releases the token.
    engine.dispatch(KeyTransition::down(VolumeUp, 2000)).await.unwrap();
    ms(3100).await;
    assert_eq!(wake.acquires.load(Ordering::SeqCst), 3);
    assert_eq!(wake.releases.load(Ordering::SeqCst), 3);

    drain(&mut rx);
}

/// Wake source that always fails.
struct BrokenWake;

impl WakeSource for BrokenWake {
    fn acquire(&self, _ceiling: Duration) -> Result<(), WakeError> {
        Err(WakeError::Unavailable("no wake service".into()))
    }

    fn release(&self) -> Result<(), WakeError> {
        Err(WakeError::Unavailable("no wake service".into()))
    }
}

#[tokio::test(start_paused = true)]
async fn broken_wake_source_never_disturbs_gestures() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = Engine::with_wake(
        thresholds(600, 600, 600),
        KeybindRegistry::default(),
        tx,
        Arc::new(BrokenWake),
    );

    engine.dispatch(KeyTransition::down(VolumeUp, 0)).await.unwrap();
    ms(100).await;
    engine.dispatch(KeyTransition::up(VolumeUp, 100)).await.unwrap();
    assert_eq!(drain(&mut rx), vec![GestureEvent::ShortPress(VolumeUp)]);

    engine.dispatch(KeyTransition::down(VolumeDown, 200)).await.unwrap();
    ms(650).await;
    assert_eq!(drain(&mut rx), vec![GestureEvent::LongPress(VolumeDown)]);
    engine.dispatch(KeyTransition::up(VolumeDown, 850)).await.unwrap();
}

fn double_up_bind() -> CustomKeybind {
    CustomKeybind {
        id: "double-up".into(),
        name: "Double volume up".into(),
        enabled: true,
        steps: vec![
            KeybindStep::short(VolumeUp).threshold(600).delay_after(600),
            KeybindStep::short(VolumeUp).threshold(600),
        ],
        action: "media_next".into(),
        haptic: None,
    }
}

#[tokio::test(start_paused = true)]
async fn matcher_observes_the_stream_alongside_the_recognizer() {
    let registry = KeybindRegistry::new(vec![double_up_bind()]);
    let (engine, mut rx) = engine_with(thresholds(600, 600, 600), registry);

    engine.dispatch(KeyTransition::down(VolumeUp, 0)).await.unwrap();
    ms(50).await;
    engine.dispatch(KeyTransition::up(VolumeUp, 50)).await.unwrap();
    assert_eq!(drain(&mut rx), vec![GestureEvent::ShortPress(VolumeUp)]);

    ms(100).await;
    engine.dispatch(KeyTransition::down(VolumeUp, 150)).await.unwrap();
    ms(50).await;
    engine.dispatch(KeyTransition::up(VolumeUp, 200)).await.unwrap();

    // Both matchers reacted to the same release: passthrough and sequence
    // completion are independent.
    assert_eq!(
        drain(&mut rx),
        vec![
            GestureEvent::ShortPress(VolumeUp),
            GestureEvent::KeybindMatched(KeybindId::from("double-up")),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn registry_edits_apply_from_the_next_event() {
    let registry = KeybindRegistry::new(vec![double_up_bind()]);
    let (engine, mut rx) = engine_with(thresholds(600, 600, 600), registry.clone());

    registry.set_enabled(&"double-up".into(), false);

    for (down, up) in [(0u64, 50u64), (150, 200)] {
        engine.dispatch(KeyTransition::down(VolumeUp, down)).await.unwrap();
        ms(50).await;
        engine.dispatch(KeyTransition::up(VolumeUp, up)).await.unwrap();
        ms(100).await;
    }
    assert_eq!(
        drain(&mut rx),
        vec![
            GestureEvent::ShortPress(VolumeUp),
            GestureEvent::ShortPress(VolumeUp),
        ]
    );
}
