// Tests for the reconciling phase timer
//
// Time is paused, so every sleep advances the clock deterministically.

use interview_sync::session::Phase;
use interview_sync::timer::{remaining_secs, PhaseTag, PhaseTimer};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

fn tag(phase: Phase, question_index: usize, generation: u64) -> PhaseTag {
    PhaseTag {
        phase,
        question_index,
        generation,
    }
}

fn counter() -> (Arc<AtomicU32>, impl FnOnce(PhaseTag) + Send + 'static) {
    let fired = Arc::new(AtomicU32::new(0));
    let handle = fired.clone();
    (fired, move |_| {
        handle.fetch_add(1, Ordering::SeqCst);
    })
}

#[tokio::test(start_paused = true)]
async fn test_remaining_is_computed_from_start_instant() {
    let start = Instant::now();

    assert_eq!(remaining_secs(10, start, start), 10);
    assert_eq!(remaining_secs(10, start, start + Duration::from_millis(999)), 10);
    assert_eq!(remaining_secs(10, start, start + Duration::from_millis(1000)), 9);
    assert_eq!(remaining_secs(10, start, start + Duration::from_millis(9_999)), 1);
    assert_eq!(remaining_secs(10, start, start + Duration::from_secs(60)), 0);
}

#[tokio::test(start_paused = true)]
async fn test_timer_fires_once_at_deadline() {
    let reading = tag(Phase::Reading, 0, 1);
    let (_tx, rx) = watch::channel(reading);
    let mut timer = PhaseTimer::new(rx, Duration::from_millis(100));
    let (fired, on_expire) = counter();

    timer.arm(10, reading, on_expire);
    assert_eq!(timer.remaining(), 10);

    tokio::time::sleep(Duration::from_millis(9_900)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(timer.remaining(), 0);
    assert!(!timer.is_armed());
}

#[tokio::test(start_paused = true)]
async fn test_superseded_tag_never_fires() {
    // Reading armed for 10s; a server event moves the session to answering at 3s
    let reading = tag(Phase::Reading, 1, 4);
    let (tx, rx) = watch::channel(reading);
    let mut timer = PhaseTimer::new(rx, Duration::from_millis(100));
    let (fired, on_expire) = counter();

    timer.arm(10, reading, on_expire);

    tokio::time::sleep(Duration::from_secs(3)).await;
    tx.send_replace(tag(Phase::Answering, 1, 5));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0, "Stale timer must stay inert");
}

#[tokio::test(start_paused = true)]
async fn test_cancel_prevents_expiry() {
    let answering = tag(Phase::Answering, 0, 2);
    let (_tx, rx) = watch::channel(answering);
    let mut timer = PhaseTimer::new(rx, Duration::from_millis(100));
    let (fired, on_expire) = counter();

    timer.arm(5, answering, on_expire);
    tokio::time::sleep(Duration::from_secs(2)).await;
    timer.cancel();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    assert_eq!(timer.remaining(), 0);
    assert!(timer.deadline().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_rearm_replaces_previous_timer() {
    let first = tag(Phase::Reading, 0, 1);
    let second = tag(Phase::Reading, 1, 2);
    let (tx, rx) = watch::channel(first);
    let mut timer = PhaseTimer::new(rx, Duration::from_millis(100));

    let (first_fired, first_expire) = counter();
    let (second_fired, second_expire) = counter();

    timer.arm(4, first, first_expire);
    tokio::time::sleep(Duration::from_secs(2)).await;

    tx.send_replace(second);
    timer.arm(4, second, second_expire);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(first_fired.load(Ordering::SeqCst), 0);
    assert_eq!(second_fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_remaining_survives_stalled_ticks() {
    let reading = tag(Phase::Reading, 0, 1);
    let (_tx, rx) = watch::channel(reading);
    let mut timer = PhaseTimer::new(rx, Duration::from_millis(100));
    let mut remaining = timer.subscribe_remaining();
    let (_fired, on_expire) = counter();

    // Arm from a start instant in the past, as after a host suspend
    timer.arm_at(Instant::now() - Duration::from_secs(7), 10, reading, on_expire);
    assert_eq!(*remaining.borrow_and_update(), 3);

    tokio::time::sleep(Duration::from_millis(1_050)).await;
    assert_eq!(*remaining.borrow(), 2);
}
