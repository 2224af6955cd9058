//! End-to-end session tests over the simulated backend.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use geotrack_core::LocationError;
use geotrack_location::{
    Coordinate, FetchOptions, LocationFetcher, PermissionState, PlatformSnapshot,
    SimulatedBackend, SimulatedSettings,
};
use geotrack_session::{
    LocationView, Screen, SessionEvent, TrackingSession, TrackingStore, View,
};

const FIX: Coordinate = Coordinate::new(30.7333, 76.7794);

const READY: PlatformSnapshot = PlatformSnapshot {
    permission: PermissionState::GRANTED,
    provider_available: true,
};

fn session_at(
    prefs: &Path,
    fresh: Option<Coordinate>,
    timeout: Option<Duration>,
) -> (TrackingSession<SimulatedBackend>, Arc<SimulatedBackend>) {
    let backend = Arc::new(SimulatedBackend::new(SimulatedSettings {
        last_known: None,
        fresh,
        fresh_delay: Duration::from_millis(800),
        status: READY,
    }));
    let options = FetchOptions {
        fresh_fix_timeout: timeout,
        ..FetchOptions::default()
    };
    let fetcher = LocationFetcher::with_options(Arc::clone(&backend), options);
    let store = TrackingStore::open(prefs).unwrap();
    (TrackingSession::new(fetcher, store, "Ada"), backend)
}

#[tokio::test(start_paused = true)]
async fn test_start_persists_and_shows_fix() {
    let dir = tempfile::tempdir().unwrap();
    let prefs = dir.path().join("prefs.json");
    let (mut session, backend) = session_at(&prefs, Some(FIX), None);

    let event = session.start(&READY).await.unwrap();

    assert_eq!(event, SessionEvent::Tracking(FIX));
    assert_eq!(session.screen(), Screen::Location { coordinate: FIX });
    assert!(session.is_tracking());
    assert!(TrackingStore::open(&prefs).unwrap().is_tracking());
    assert_eq!(backend.active_subscriptions(), 0);

    assert_eq!(
        session.view(),
        View::Location(LocationView {
            greeting: "Welcome, Ada".to_string(),
            latitude: Some("Latitude: 30.7333".to_string()),
            longitude: Some("Longitude: 76.7794".to_string()),
            button_label: "Stop Tracking".to_string(),
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_permission_asks_for_it() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, _backend) = session_at(&dir.path().join("prefs.json"), Some(FIX), None);
    let denied = PlatformSnapshot {
        permission: PermissionState::DENIED,
        provider_available: true,
    };

    let event = session.start(&denied).await.unwrap();

    assert_eq!(event, SessionEvent::PermissionRequired);
    assert_eq!(session.screen(), Screen::Welcome);
    assert!(!session.is_tracking());
}

#[tokio::test(start_paused = true)]
async fn test_disabled_provider_asks_to_enable() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, _backend) = session_at(&dir.path().join("prefs.json"), Some(FIX), None);
    let disabled = PlatformSnapshot {
        permission: PermissionState::GRANTED,
        provider_available: false,
    };

    let event = session.start(&disabled).await.unwrap();

    assert_eq!(event, SessionEvent::ProviderPromptRequired);
    assert!(!session.is_tracking());
}

#[tokio::test(start_paused = true)]
async fn test_timeout_reports_failure() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, backend) = session_at(
        &dir.path().join("prefs.json"),
        None,
        Some(Duration::from_secs(5)),
    );

    let event = session.start(&READY).await.unwrap();

    assert_eq!(event, SessionEvent::Failed(LocationError::Unavailable));
    assert_eq!(session.screen(), Screen::Welcome);
    assert_eq!(backend.active_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_start_leaves_flag_off() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, backend) = session_at(&dir.path().join("prefs.json"), Some(FIX), None);
    let stop = session.stop_handle();

    let canceller = async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.cancel_pending();
    };
    let (event, ()) = tokio::join!(session.start(&READY), canceller);

    assert_eq!(event.unwrap(), SessionEvent::Cancelled);
    assert_eq!(session.screen(), Screen::Welcome);
    assert!(!session.is_tracking());
    assert_eq!(backend.active_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_pending_start_drops_the_fix() {
    let dir = tempfile::tempdir().unwrap();
    let prefs = dir.path().join("prefs.json");
    let (mut session, backend) = session_at(&prefs, Some(FIX), None);
    let stop = session.stop_handle();

    let stopper = async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        stop.cancel_pending();
    };
    let (event, ()) = tokio::join!(session.start(&READY), stopper);
    assert_eq!(event.unwrap(), SessionEvent::Cancelled);
    assert_eq!(session.stop().unwrap(), SessionEvent::Stopped);

    // The simulated fix would have landed at 800ms.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(session.screen(), Screen::Welcome);
    assert!(!session.is_tracking());
    assert!(!TrackingStore::open(&prefs).unwrap().is_tracking());
    assert_eq!(backend.active_subscriptions(), 0);

    // Later requests are not affected by the earlier stop.
    assert_eq!(
        session.start(&READY).await.unwrap(),
        SessionEvent::Tracking(FIX)
    );
}

#[tokio::test(start_paused = true)]
async fn test_toggle_stops_and_restore_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let prefs = dir.path().join("prefs.json");

    {
        let (mut session, _backend) = session_at(&prefs, Some(FIX), None);
        assert_eq!(
            session.toggle(&READY).await.unwrap(),
            SessionEvent::Tracking(FIX)
        );
        assert_eq!(
            session.start(&READY).await.unwrap(),
            SessionEvent::AlreadyTracking
        );
    }

    // A new process picks the session back up.
    let (mut session, _backend) = session_at(&prefs, Some(FIX), None);
    assert_eq!(session.screen(), Screen::Welcome);
    assert_eq!(
        session.restore(&READY).await.unwrap(),
        Some(SessionEvent::Tracking(FIX))
    );

    assert_eq!(
        session.toggle(&READY).await.unwrap(),
        SessionEvent::Stopped
    );
    assert_eq!(session.screen(), Screen::Welcome);
    assert!(!TrackingStore::open(&prefs).unwrap().is_tracking());

    let (mut idle, _backend) = session_at(&prefs, Some(FIX), None);
    assert_eq!(idle.restore(&READY).await.unwrap(), None);
}
