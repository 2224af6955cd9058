//! GeoClue2 positioning backend (Linux, system D-Bus).
//!
//! Each subscription runs its own GeoClue client on a spawned task. The
//! client is stopped and deleted when the subscription is removed or the
//! receiver goes away.

use std::collections::HashMap;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use zbus::zvariant::OwnedObjectPath;
use zbus::Connection;

use crate::backend::{PositioningBackend, Subscription, SubscriptionId};
use crate::types::{
    BackendError, Coordinate, PermissionState, PlatformSnapshot, Priority, UpdateRequest,
};

// GClueAccuracyLevel
const ACCURACY_NONE: u32 = 0;
const ACCURACY_COUNTRY: u32 = 1;
const ACCURACY_CITY: u32 = 4;
const ACCURACY_STREET: u32 = 6;
const ACCURACY_EXACT: u32 = 8;

#[zbus::proxy(
    interface = "org.freedesktop.GeoClue2.Manager",
    default_service = "org.freedesktop.GeoClue2",
    default_path = "/org/freedesktop/GeoClue2/Manager",
    gen_blocking = false
)]
trait Manager {
    fn get_client(&self) -> zbus::Result<OwnedObjectPath>;

    fn delete_client(&self, client: &OwnedObjectPath) -> zbus::Result<()>;

    #[zbus(property)]
    fn available_accuracy_level(&self) -> zbus::Result<u32>;
}

#[zbus::proxy(
    interface = "org.freedesktop.GeoClue2.Client",
    default_service = "org.freedesktop.GeoClue2",
    gen_blocking = false
)]
trait Client {
    fn start(&self) -> zbus::Result<()>;

    fn stop(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn set_desktop_id(&self, id: &str) -> zbus::Result<()>;

    #[zbus(property)]
    fn set_requested_accuracy_level(&self, level: u32) -> zbus::Result<()>;

    #[zbus(property)]
    fn set_time_threshold(&self, seconds: u32) -> zbus::Result<()>;

    #[zbus(property)]
    fn location(&self) -> zbus::Result<OwnedObjectPath>;

    #[zbus(signal)]
    fn location_updated(
        &self,
        old_path: zbus::zvariant::ObjectPath<'_>,
        new_path: zbus::zvariant::ObjectPath<'_>,
    ) -> zbus::Result<()>;
}

#[zbus::proxy(
    interface = "org.freedesktop.GeoClue2.Location",
    default_service = "org.freedesktop.GeoClue2",
    gen_blocking = false
)]
trait Location {
    #[zbus(property)]
    fn latitude(&self) -> zbus::Result<f64>;

    #[zbus(property)]
    fn longitude(&self) -> zbus::Result<f64>;
}

fn accuracy_for(priority: Priority) -> u32 {
    match priority {
        Priority::HighAccuracy => ACCURACY_EXACT,
        Priority::Balanced => ACCURACY_STREET,
        Priority::LowPower => ACCURACY_CITY,
        Priority::Passive => ACCURACY_COUNTRY,
    }
}

#[derive(Debug, Clone)]
struct ClientSettings {
    desktop_id: String,
    accuracy: u32,
    time_threshold: u32,
    max_updates: u32,
}

fn client_settings(desktop_id: &str, request: &UpdateRequest) -> ClientSettings {
    ClientSettings {
        desktop_id: desktop_id.to_string(),
        accuracy: if request.wait_for_accurate {
            ACCURACY_EXACT
        } else {
            accuracy_for(request.priority)
        },
        time_threshold: u32::try_from(request.interval.as_secs()).unwrap_or(u32::MAX),
        max_updates: request.max_updates.max(1),
    }
}

#[derive(Debug)]
pub struct GeoClueBackend {
    desktop_id: String,
    last_fix: Arc<Mutex<Option<Coordinate>>>,
    active: Mutex<HashMap<SubscriptionId, CancellationToken>>,
}

impl GeoClueBackend {
    /// `desktop_id` must match an installed .desktop file for the GeoClue agent to authorize it.
    pub fn new(desktop_id: impl Into<String>) -> Self {
        Self {
            desktop_id: desktop_id.into(),
            last_fix: Arc::new(Mutex::new(None)),
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Query the platform state.
    ///
    /// Access is arbitrated by the GeoClue agent when a client starts, so
    /// permissions always read as granted here; a refusal surfaces as a
    /// failed subscription.
    pub async fn probe_status(&self) -> PlatformSnapshot {
        let level = match available_accuracy().await {
            Ok(level) => level,
            Err(e) => {
                tracing::warn!("GeoClue unavailable: {}", e);
                ACCURACY_NONE
            }
        };
        tracing::debug!("GeoClue available accuracy level {}", level);

        PlatformSnapshot {
            permission: PermissionState::GRANTED,
            provider_available: level != ACCURACY_NONE,
        }
    }
}

async fn available_accuracy() -> zbus::Result<u32> {
    let conn = Connection::system().await?;
    let manager = ManagerProxy::new(&conn).await?;
    manager.available_accuracy_level().await
}

impl PositioningBackend for GeoClueBackend {
    async fn last_known_position(&self) -> Result<Option<Coordinate>, BackendError> {
        let fix = *self.last_fix.lock();
        Ok(fix)
    }

    fn request_updates(&self, request: &UpdateRequest) -> Result<Subscription, BackendError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BackendError::Platform(e.to_string()))?;

        let (subscription, tx) = Subscription::channel(request.max_updates as usize);
        let token = CancellationToken::new();
        self.active.lock().insert(subscription.id, token.clone());

        let settings = client_settings(&self.desktop_id, request);
        let last_fix = Arc::clone(&self.last_fix);
        let id = subscription.id;

        runtime.spawn(async move {
            if let Err(e) = run_client(settings, tx, last_fix, token).await {
                tracing::warn!("GeoClue client for {} failed: {}", id, e);
            }
        });

        Ok(subscription)
    }

    fn remove_updates(&self, id: SubscriptionId) {
        if let Some(token) = self.active.lock().remove(&id) {
            token.cancel();
        }
    }
}

async fn run_client(
    settings: ClientSettings,
    tx: mpsc::Sender<Coordinate>,
    last_fix: Arc<Mutex<Option<Coordinate>>>,
    cancel: CancellationToken,
) -> zbus::Result<()> {
    let conn = Connection::system().await?;
    let manager = ManagerProxy::new(&conn).await?;
    let client_path = manager.get_client().await?;
    let client = ClientProxy::builder(&conn)
        .path(client_path.to_string())?
        .build()
        .await?;

    let result = drive_client(&conn, &client, &settings, &tx, &last_fix, &cancel).await;

    if let Err(e) = manager.delete_client(&client_path).await {
        tracing::debug!("Failed to delete GeoClue client: {}", e);
    }

    result
}

async fn drive_client(
    conn: &Connection,
    client: &ClientProxy<'_>,
    settings: &ClientSettings,
    tx: &mpsc::Sender<Coordinate>,
    last_fix: &Mutex<Option<Coordinate>>,
    cancel: &CancellationToken,
) -> zbus::Result<()> {
    client.set_desktop_id(&settings.desktop_id).await?;
    client
        .set_requested_accuracy_level(settings.accuracy)
        .await?;
    client.set_time_threshold(settings.time_threshold).await?;

    // Subscribed before Start so the first LocationUpdated is never missed.
    let updates = client
        .receive_location_updated()
        .await?
        .map(|signal| signal.args().map(|args| args.new_path().to_string()));

    if cancel.is_cancelled() {
        return Ok(());
    }
    client.start().await?;

    let result = forward_fixes(conn, client, settings, updates, tx, last_fix, cancel).await;

    if let Err(e) = client.stop().await {
        tracing::debug!("Failed to stop GeoClue client: {}", e);
    }
    result
}

async fn forward_fixes(
    conn: &Connection,
    client: &ClientProxy<'_>,
    settings: &ClientSettings,
    updates: impl Stream<Item = zbus::Result<String>>,
    tx: &mpsc::Sender<Coordinate>,
    last_fix: &Mutex<Option<Coordinate>>,
    cancel: &CancellationToken,
) -> zbus::Result<()> {
    let mut updates = std::pin::pin!(updates);

    // A fix that landed between Start and the first poll is already on the client.
    let mut current = match client.location().await {
        Ok(path) => location_path(path.as_str()),
        Err(e) => {
            tracing::trace!("No current GeoClue location: {}", e);
            None
        }
    };
    let mut delivered = 0;

    while delivered < settings.max_updates {
        let Some(path) = next_location_path(&mut current, &mut updates, cancel).await? else {
            return Ok(());
        };

        let location = LocationProxy::builder(conn).path(path)?.build().await?;
        let coordinate = Coordinate::new(location.latitude().await?, location.longitude().await?);

        *last_fix.lock() = Some(coordinate);
        if tx.send(coordinate).await.is_err() {
            return Ok(());
        }
        delivered += 1;
    }

    // Hold the client until the subscriber removes it.
    cancel.cancelled().await;
    Ok(())
}

/// GeoClue reports "no location yet" as the root object path.
fn location_path(path: &str) -> Option<String> {
    (path != "/").then(|| path.to_string())
}

/// Next location object to read: the one current at start, then signalled ones.
///
/// Returns `None` once cancelled or when the signal stream ends.
async fn next_location_path<S>(
    current: &mut Option<String>,
    updates: &mut S,
    cancel: &CancellationToken,
) -> zbus::Result<Option<String>>
where
    S: Stream<Item = zbus::Result<String>> + Unpin,
{
    if cancel.is_cancelled() {
        return Ok(None);
    }
    if let Some(path) = current.take() {
        return Ok(Some(path));
    }

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            next = updates.next() => next,
        };
        match next {
            Some(path) => {
                if let Some(path) = location_path(&path?) {
                    return Ok(Some(path));
                }
            }
            None => return Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> impl Stream<Item = zbus::Result<String>> + Unpin {
        futures::stream::iter(
            items
                .iter()
                .map(|path| Ok(path.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_priority_maps_to_accuracy_level() {
        assert_eq!(accuracy_for(Priority::HighAccuracy), ACCURACY_EXACT);
        assert_eq!(accuracy_for(Priority::Balanced), ACCURACY_STREET);
        assert_eq!(accuracy_for(Priority::LowPower), ACCURACY_CITY);
        assert_eq!(accuracy_for(Priority::Passive), ACCURACY_COUNTRY);
    }

    #[tokio::test]
    async fn test_no_fix_cached_before_first_update() {
        let backend = GeoClueBackend::new("geotrack");
        assert_eq!(backend.last_known_position().await, Ok(None));
    }

    #[tokio::test]
    async fn test_removing_a_subscription_cancels_its_client() {
        let backend = GeoClueBackend::new("geotrack");
        let subscription = backend
            .request_updates(&UpdateRequest::single_fix())
            .unwrap();
        let token = backend.active.lock().get(&subscription.id).cloned().unwrap();

        backend.remove_updates(subscription.id);
        assert!(token.is_cancelled());
        assert!(backend.active.lock().is_empty());
    }

    #[test]
    fn test_root_path_means_no_location() {
        assert_eq!(location_path("/"), None);
        assert_eq!(
            location_path("/org/freedesktop/GeoClue2/Location/1"),
            Some("/org/freedesktop/GeoClue2/Location/1".to_string())
        );
    }

    #[tokio::test]
    async fn test_location_current_at_start_is_read_before_signals() {
        let cancel = CancellationToken::new();
        let mut current = location_path("/org/freedesktop/GeoClue2/Location/1");
        let mut updates = paths(&["/org/freedesktop/GeoClue2/Location/2"]);

        let first = next_location_path(&mut current, &mut updates, &cancel).await;
        assert_eq!(first.unwrap().as_deref(), Some("/org/freedesktop/GeoClue2/Location/1"));
        assert_eq!(current, None);

        let second = next_location_path(&mut current, &mut updates, &cancel).await;
        assert_eq!(second.unwrap().as_deref(), Some("/org/freedesktop/GeoClue2/Location/2"));

        let ended = next_location_path(&mut current, &mut updates, &cancel).await;
        assert_eq!(ended.unwrap(), None);
    }

    #[tokio::test]
    async fn test_signalled_root_path_is_skipped() {
        let cancel = CancellationToken::new();
        let mut current = None;
        let mut updates = paths(&["/", "/org/freedesktop/GeoClue2/Location/3"]);

        let next = next_location_path(&mut current, &mut updates, &cancel).await;
        assert_eq!(next.unwrap().as_deref(), Some("/org/freedesktop/GeoClue2/Location/3"));
    }

    #[tokio::test]
    async fn test_cancelled_client_reads_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut current = location_path("/org/freedesktop/GeoClue2/Location/1");
        let mut updates = futures::stream::pending::<zbus::Result<String>>();

        let next = next_location_path(&mut current, &mut updates, &cancel).await;
        assert_eq!(next.unwrap(), None);
    }

    #[test]
    fn test_time_threshold_follows_update_interval() {
        let request = UpdateRequest {
            interval: std::time::Duration::from_secs(5),
            ..UpdateRequest::single_fix()
        };
        let settings = client_settings("geotrack", &request);
        assert_eq!(settings.time_threshold, 5);
        assert_eq!(settings.max_updates, 1);
    }

    #[test]
    fn test_waiting_for_accurate_fix_raises_accuracy() {
        let request = UpdateRequest {
            priority: Priority::LowPower,
            wait_for_accurate: true,
            ..UpdateRequest::single_fix()
        };
        assert_eq!(client_settings("geotrack", &request).accuracy, ACCURACY_EXACT);

        let request = UpdateRequest {
            wait_for_accurate: false,
            ..request
        };
        assert_eq!(client_settings("geotrack", &request).accuracy, ACCURACY_CITY);
    }
}
